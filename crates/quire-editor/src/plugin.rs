//! Plugins and the shared registries they populate.
//!
//! A [`Plugin`] is set up in two parts. [`Plugin::setup`] runs synchronously
//! while the editor is being assembled and must gate every [`Phase`] the
//! plugin contributes to. The future it returns runs on the editor's local
//! task set: it waits until shared state may be mutated, registers into the
//! [`Registries`], marks its signals done and hands back a [`Teardown`].

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::sync::Arc;

use quire_lifecycle::{EntryId, Registry, Scheduler, Signal, Stage};
use quire_markdown::{StringifyHandler, SyntaxExtension};
use regex::Regex;

use crate::convert::DocSerializer;
use crate::error::EditorError;
use crate::extension::{MarkExtension, NodeExtension};
use crate::state::EditorState;
use crate::view::Decoration;

/// Editor build stages, in the order they run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Plugins that must register before anything is built.
    Init,
    /// Markdown parser from the syntax extensions.
    Parser,
    /// Document schema from the node and mark extensions.
    Schema,
    /// Stringifier from the stringify handlers.
    Serializer,
    /// Initial document and view plugins.
    Editor,
}

impl Phase {
    pub const ALL: [Self; 5] = [
        Self::Init,
        Self::Parser,
        Self::Schema,
        Self::Serializer,
        Self::Editor,
    ];

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Init => "init",
            Self::Parser => "parser",
            Self::Schema => "schema",
            Self::Serializer => "serializer",
            Self::Editor => "editor",
        }
    }

    #[must_use]
    pub fn stage(self) -> Stage {
        Stage::new(self.name())
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Signature of a command body. Returns whether the state changed.
pub type CommandFn = dyn Fn(&mut EditorState, Option<&str>) -> Result<bool, EditorError>;

/// Named edit, run with an optional argument.
#[derive(Clone)]
pub struct Command {
    pub name: &'static str,
    pub run: Rc<CommandFn>,
}

impl Command {
    pub fn new<F>(name: &'static str, run: F) -> Self
    where
        F: Fn(&mut EditorState, Option<&str>) -> Result<bool, EditorError> + 'static,
    {
        Self {
            name,
            run: Rc::new(run),
        }
    }
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Command").field(&self.name).finish()
    }
}

/// Signature of an input rule body. Receives the path of the text block.
pub type InputRuleFn = dyn Fn(&mut EditorState, &[usize]) -> Result<bool, EditorError>;

/// Rewrite triggered when the text before the cursor matches `pattern`.
#[derive(Clone)]
pub struct InputRule {
    pub name: &'static str,
    pub pattern: Regex,
    pub run: Rc<InputRuleFn>,
}

impl InputRule {
    pub fn new<F>(name: &'static str, pattern: Regex, run: F) -> Self
    where
        F: Fn(&mut EditorState, &[usize]) -> Result<bool, EditorError> + 'static,
    {
        Self {
            name,
            pattern,
            run: Rc::new(run),
        }
    }
}

impl fmt::Debug for InputRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InputRule")
            .field("name", &self.name)
            .field("pattern", &self.pattern.as_str())
            .finish()
    }
}

/// Slash-menu entry: runs `command` with `arg`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SlashItem {
    pub id: String,
    pub label: String,
    pub command: &'static str,
    pub arg: Option<String>,
}

/// What a view plugin sees when decorations are recomputed.
pub struct ViewContext<'a> {
    pub state: &'a EditorState,
    pub serializer: &'a DocSerializer,
    pub focused: bool,
}

/// Computes widget decorations from the current state.
pub trait ViewPlugin {
    fn decorations(&self, view: &ViewContext<'_>) -> Vec<Decoration>;
}

/// Lists shared by every plugin of one editor.
#[derive(Clone, Default)]
pub struct Registries {
    pub syntax: Registry<SyntaxExtension>,
    pub stringify: Registry<Arc<dyn StringifyHandler>>,
    pub nodes: Registry<Rc<dyn NodeExtension>>,
    pub marks: Registry<Rc<dyn MarkExtension>>,
    pub commands: Registry<Command>,
    pub input_rules: Registry<InputRule>,
    pub slash_items: Registry<SlashItem>,
    pub views: Registry<Rc<dyn ViewPlugin>>,
}

/// Handle a plugin uses to gate phases and reach the registries.
#[derive(Clone)]
pub struct EditorContext {
    scheduler: Scheduler,
    ready: Rc<HashMap<Phase, Signal>>,
    registries: Registries,
    /// Signals created through this handle.
    owned: Rc<RefCell<Vec<Signal>>>,
}

impl EditorContext {
    /// Context with one recorded "ready" signal per phase.
    pub(crate) fn new(scheduler: Scheduler) -> Result<Self, EditorError> {
        let mut ready = HashMap::new();
        for phase in Phase::ALL {
            let signal = scheduler.signal(format!("{phase}-ready"));
            scheduler.record(&signal)?;
            ready.insert(phase, signal);
        }
        Ok(Self {
            scheduler,
            ready: Rc::new(ready),
            registries: Registries::default(),
            owned: Rc::default(),
        })
    }

    /// Handle for one plugin, tracking the signals it creates.
    pub(crate) fn for_plugin(&self) -> Self {
        Self {
            owned: Rc::default(),
            ..self.clone()
        }
    }

    #[must_use]
    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    #[must_use]
    pub fn registries(&self) -> &Registries {
        &self.registries
    }

    /// Create a signal produced by the calling plugin and gate `phase` on it.
    pub fn gate(&self, phase: Phase, name: &str) -> Result<Signal, EditorError> {
        let signal = self.scheduler.signal(name);
        self.scheduler.record(&signal)?;
        self.scheduler.gate(&phase.stage(), &signal);
        self.owned.borrow_mut().push(signal.clone());
        Ok(signal)
    }

    pub fn done(&self, signal: &Signal) -> Result<(), EditorError> {
        Ok(self.scheduler.done(signal)?)
    }

    /// Wait until `phase` has been built.
    pub async fn wait_ready(&self, phase: Phase) -> Result<(), EditorError> {
        let signal = self.ready_signal(phase).clone();
        Ok(self.scheduler.wait(&signal).await?)
    }

    pub(crate) fn ready_signal(&self, phase: Phase) -> &Signal {
        &self.ready[&phase]
    }

    /// Clear every signal created through this handle.
    pub(crate) fn release(&self) {
        for signal in self.owned.borrow_mut().drain(..) {
            self.scheduler.clear(&signal);
        }
    }
}

impl fmt::Debug for EditorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EditorContext")
            .field("scheduler", &self.scheduler)
            .finish_non_exhaustive()
    }
}

/// Undo steps for one plugin, run in reverse order.
#[derive(Default)]
#[must_use]
pub struct Teardown {
    steps: Vec<Box<dyn FnOnce()>>,
}

impl Teardown {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn then(mut self, step: impl FnOnce() + 'static) -> Self {
        self.steps.push(Box::new(step));
        self
    }

    /// Retract the entry `id` from `registry`.
    pub fn retract<T: 'static>(self, registry: &Registry<T>, id: EntryId) -> Self {
        let registry = registry.clone();
        self.then(move || {
            registry.retract(id);
        })
    }

    /// Clear `signal`, releasing anything still waiting on it.
    pub fn clear(self, scheduler: &Scheduler, signal: Signal) -> Self {
        let scheduler = scheduler.clone();
        self.then(move || scheduler.clear(&signal))
    }

    pub fn run(self) {
        for step in self.steps.into_iter().rev() {
            step();
        }
    }
}

impl fmt::Debug for Teardown {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Teardown")
            .field("steps", &self.steps.len())
            .finish()
    }
}

/// Registration future returned by [`Plugin::setup`].
pub type PluginFuture = Pin<Box<dyn Future<Output = Result<Teardown, EditorError>>>>;

/// An editor extension.
pub trait Plugin {
    /// Unique name, used by [`Editor::remove_plugin`](crate::Editor::remove_plugin).
    fn name(&self) -> &'static str;

    /// Gate phases, then return the registration future.
    fn setup(&self, ctx: &EditorContext) -> Result<PluginFuture, EditorError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use quire_lifecycle::SignalState;

    #[test]
    fn test_teardown_runs_in_reverse() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let first = Rc::clone(&log);
        let second = Rc::clone(&log);
        Teardown::new()
            .then(move || first.borrow_mut().push("first"))
            .then(move || second.borrow_mut().push("second"))
            .run();
        assert_eq!(*log.borrow(), vec!["second", "first"]);
    }

    #[test]
    fn test_teardown_retracts_only_its_entry() {
        let registry: Registry<&str> = Registry::new();
        let mine = registry.push("directives");
        registry.push("directives");
        Teardown::new().retract(&registry, mine).run();
        assert_eq!(registry.snapshot(), vec!["directives"]);
    }

    #[test]
    fn test_release_clears_owned_signals() {
        let ctx = EditorContext::new(Scheduler::new()).unwrap();
        let plugin = ctx.for_plugin();
        let signal = plugin.gate(Phase::Parser, "syntax").unwrap();
        assert_eq!(ctx.scheduler().pending(&Phase::Parser.stage()), vec!["syntax"]);
        plugin.release();
        assert_eq!(ctx.scheduler().state(&signal), SignalState::Cleared);
        assert!(ctx.scheduler().pending(&Phase::Parser.stage()).is_empty());
        assert_eq!(
            ctx.scheduler().state(ctx.ready_signal(Phase::Parser)),
            SignalState::Pending
        );
    }
}
