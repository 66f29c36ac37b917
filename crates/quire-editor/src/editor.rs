//! Editor bootstrap and the operations of a running editor.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use quire_markdown::{DisplayNode, MarkdownParser, Stringifier};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::convert::{DocParser, DocSerializer};
use crate::error::EditorError;
use crate::plugin::{EditorContext, Phase, Plugin, Registries, SlashItem, Teardown, ViewContext};
use crate::plugins;
use crate::position::Selection;
use crate::schema::Schema;
use crate::state::EditorState;
use crate::view::DocView;

/// Default bound on each stage wait.
pub const DEFAULT_STAGE_TIMEOUT: Duration = Duration::from_secs(10);

/// Editor settings.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EditorConfig {
    /// Bound on each stage wait; `None` waits forever.
    pub stage_timeout: Option<Duration>,
    /// Install the markdown reveal overlay.
    pub reveal: bool,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            stage_timeout: Some(DEFAULT_STAGE_TIMEOUT),
            reveal: true,
        }
    }
}

/// First plugin failure seen during a build.
type Failure = Rc<RefCell<Option<(&'static str, String)>>>;

/// Collects plugins and runs the build stages.
pub struct EditorBuilder {
    config: EditorConfig,
    plugins: Vec<Box<dyn Plugin>>,
}

impl EditorBuilder {
    #[must_use]
    pub fn new(config: EditorConfig) -> Self {
        Self {
            config,
            plugins: Vec::new(),
        }
    }

    /// Builder with the info-box, coloured-span and (if enabled) reveal plugins.
    #[must_use]
    pub fn standard(config: EditorConfig) -> Self {
        let reveal = config.reveal;
        Self::new(config).with(plugins::standard(reveal))
    }

    #[must_use]
    pub fn with(mut self, plugins: impl IntoIterator<Item = Box<dyn Plugin>>) -> Self {
        self.plugins.extend(plugins);
        self
    }

    #[must_use]
    pub fn with_plugin(mut self, plugin: impl Plugin + 'static) -> Self {
        self.plugins.push(Box::new(plugin));
        self
    }

    /// Set up every plugin and build an editor for `markdown`.
    ///
    /// Plugin registration runs on spawned local tasks, so this must be
    /// awaited inside a [`LocalSet`](tokio::task::LocalSet).
    pub async fn build(self, markdown: &str) -> Result<Editor, EditorError> {
        let scheduler = match self.config.stage_timeout {
            Some(timeout) => quire_lifecycle::Scheduler::new().with_stage_timeout(timeout),
            None => quire_lifecycle::Scheduler::new(),
        };
        let ctx = EditorContext::new(scheduler)?;
        let failure = Failure::default();

        let mut tasks: Vec<(&'static str, JoinHandle<Option<Teardown>>)> = Vec::new();
        for plugin in self.plugins {
            let name = plugin.name();
            let plugin_ctx = ctx.for_plugin();
            let future = match plugin.setup(&plugin_ctx) {
                Ok(future) => future,
                Err(err) => {
                    abort(&tasks);
                    return Err(EditorError::Plugin(name, err.to_string()));
                }
            };
            let failure = Rc::clone(&failure);
            let handle = tokio::task::spawn_local(async move {
                match future.await {
                    Ok(teardown) => Some(teardown),
                    Err(err) => {
                        warn!(plugin = name, error = %err, "Plugin setup failed");
                        // Release the stages this plugin gated.
                        plugin_ctx.release();
                        failure.borrow_mut().get_or_insert((name, err.to_string()));
                        None
                    }
                }
            });
            tasks.push((name, handle));
        }

        let built = match run_stages(&ctx, &failure, markdown).await {
            Ok(built) => built,
            Err(err) => {
                abort(&tasks);
                return Err(err);
            }
        };

        let mut teardowns = Vec::with_capacity(tasks.len());
        for (name, handle) in tasks {
            match handle.await {
                Ok(Some(teardown)) => teardowns.push((name, teardown)),
                Ok(None) => {
                    let (name, reason) = failure
                        .borrow_mut()
                        .take()
                        .unwrap_or((name, "setup failed".to_owned()));
                    return Err(EditorError::Plugin(name, reason));
                }
                Err(err) => return Err(EditorError::Plugin(name, err.to_string())),
            }
        }
        info!(plugins = teardowns.len(), "Editor ready");

        Ok(Editor {
            state: built.state,
            parser: built.parser,
            serializer: built.serializer,
            view: built.view,
            registries: ctx.registries().clone(),
            focused: false,
            teardowns,
            destroyed: false,
        })
    }
}

fn abort(tasks: &[(&'static str, JoinHandle<Option<Teardown>>)]) {
    for (_, handle) in tasks {
        handle.abort();
    }
}

struct Built {
    state: EditorState,
    parser: DocParser,
    serializer: DocSerializer,
    view: DocView,
}

/// Wait for `phase`'s gates, failing early if a plugin already failed.
async fn enter(ctx: &EditorContext, failure: &Failure, phase: Phase) -> Result<(), EditorError> {
    ctx.scheduler().wait_stage(&phase.stage()).await?;
    if let Some((name, reason)) = failure.borrow().clone() {
        return Err(EditorError::Plugin(name, reason));
    }
    debug!(phase = %phase, "Building stage");
    Ok(())
}

fn finish(ctx: &EditorContext, phase: Phase) -> Result<(), EditorError> {
    ctx.done(ctx.ready_signal(phase))
}

async fn run_stages(
    ctx: &EditorContext,
    failure: &Failure,
    markdown: &str,
) -> Result<Built, EditorError> {
    let registries = ctx.registries();

    enter(ctx, failure, Phase::Init).await?;
    finish(ctx, Phase::Init)?;

    enter(ctx, failure, Phase::Parser).await?;
    let markdown_parser = MarkdownParser::new().with_extensions(registries.syntax.snapshot());
    finish(ctx, Phase::Parser)?;

    enter(ctx, failure, Phase::Schema).await?;
    let nodes = registries.nodes.snapshot();
    let marks = registries.marks.snapshot();
    let schema = nodes.iter().fold(Schema::core(), |schema, ext| schema.with_node(ext.spec()));
    let schema = Rc::new(marks.iter().fold(schema, |schema, ext| schema.with_mark(ext.spec())));
    finish(ctx, Phase::Schema)?;

    enter(ctx, failure, Phase::Serializer).await?;
    let mut stringifier = Stringifier::new();
    for handler in registries.stringify.snapshot() {
        stringifier.register(handler);
    }
    let serializer = DocSerializer::new(stringifier)
        .with_nodes(nodes.iter().cloned())
        .with_marks(marks.iter().cloned());
    finish(ctx, Phase::Serializer)?;

    enter(ctx, failure, Phase::Editor).await?;
    let parser = DocParser::new(Rc::clone(&schema), markdown_parser)
        .with_nodes(nodes.iter().cloned())
        .with_marks(marks.iter().cloned());
    let doc = parser.parse(markdown)?;
    let state = EditorState::new(schema, doc);
    let view = DocView::new().with_nodes(nodes).with_marks(marks);
    finish(ctx, Phase::Editor)?;

    Ok(Built {
        state,
        parser,
        serializer,
        view,
    })
}

/// A running editor.
pub struct Editor {
    state: EditorState,
    parser: DocParser,
    serializer: DocSerializer,
    view: DocView,
    registries: Registries,
    focused: bool,
    teardowns: Vec<(&'static str, Teardown)>,
    destroyed: bool,
}

impl Editor {
    fn live(&self) -> Result<(), EditorError> {
        if self.destroyed {
            Err(EditorError::Destroyed)
        } else {
            Ok(())
        }
    }

    pub fn state(&self) -> Result<&EditorState, EditorError> {
        self.live()?;
        Ok(&self.state)
    }

    pub fn focus(&mut self) {
        self.focused = true;
    }

    pub fn blur(&mut self) {
        self.focused = false;
    }

    #[must_use]
    pub fn is_focused(&self) -> bool {
        self.focused
    }

    /// Replace the document with freshly parsed `markdown`.
    pub fn set_markdown(&mut self, markdown: &str) -> Result<(), EditorError> {
        self.live()?;
        let doc = self.parser.parse(markdown)?;
        self.state = EditorState::new(self.parser.shared_schema(), doc);
        Ok(())
    }

    pub fn set_selection(&mut self, selection: Selection) -> Result<(), EditorError> {
        self.live()?;
        self.state.set_selection(selection)
    }

    /// Type `text` over the selection, then run the first matching input rule.
    pub fn insert_text(&mut self, text: &str) -> Result<(), EditorError> {
        self.live()?;
        self.state.insert_text(text)?;

        let Some((path, offset)) = self.state.textblock_at(self.state.selection().head) else {
            return Ok(());
        };
        let before: String = self
            .state
            .node_at(&path)
            .map(|block| block.text_content().chars().take(offset).collect())
            .unwrap_or_default();
        for rule in self.registries.input_rules.snapshot() {
            if rule.pattern.is_match(&before) && (rule.run)(&mut self.state, path.as_slice())? {
                debug!(rule = rule.name, "Applied input rule");
                break;
            }
        }
        Ok(())
    }

    /// Run a registered command. Returns whether the document changed.
    pub fn run_command(&mut self, name: &str, arg: Option<&str>) -> Result<bool, EditorError> {
        self.live()?;
        let command = self
            .registries
            .commands
            .snapshot()
            .into_iter()
            .find(|command| command.name == name)
            .ok_or_else(|| EditorError::UnknownCommand(name.to_owned()))?;
        (command.run)(&mut self.state, arg)
    }

    /// Colour the selection with `class`; a collapsed selection is a no-op.
    pub fn apply_mark(&mut self, class: &str) -> Result<bool, EditorError> {
        self.run_command(plugins::span::APPLY_SPAN_CLASS, Some(class))
    }

    /// Remove colouring from the selection.
    pub fn remove_mark(&mut self) -> Result<bool, EditorError> {
        self.run_command(plugins::span::REMOVE_SPAN_CLASS, None)
    }

    /// Insert an info box of `kind` at the cursor.
    pub fn insert_info_box(&mut self, kind: &str) -> Result<bool, EditorError> {
        self.run_command(plugins::info_box::INSERT_INFO_BOX, Some(kind))
    }

    pub fn slash_items(&self) -> Result<Vec<SlashItem>, EditorError> {
        self.live()?;
        Ok(self.registries.slash_items.snapshot())
    }

    pub fn run_slash_item(&mut self, id: &str) -> Result<bool, EditorError> {
        let item = self
            .slash_items()?
            .into_iter()
            .find(|item| item.id == id)
            .ok_or_else(|| EditorError::UnknownCommand(id.to_owned()))?;
        self.run_command(item.command, item.arg.as_deref())
    }

    /// The document as markdown.
    pub fn markdown(&self) -> Result<String, EditorError> {
        self.live()?;
        self.serializer.serialize(self.state.doc())
    }

    /// The editing surface: the document plus view plugin decorations.
    pub fn view(&self) -> Result<Vec<DisplayNode>, EditorError> {
        self.live()?;
        let context = ViewContext {
            state: &self.state,
            serializer: &self.serializer,
            focused: self.focused,
        };
        let decorations: Vec<_> = self
            .registries
            .views
            .snapshot()
            .iter()
            .flat_map(|view| view.decorations(&context))
            .collect();
        Ok(self.view.render(self.state.doc(), &decorations))
    }

    /// Tear down the plugin called `name`. Returns whether it was installed.
    pub fn remove_plugin(&mut self, name: &str) -> bool {
        let (removed, kept) = std::mem::take(&mut self.teardowns)
            .into_iter()
            .partition::<Vec<_>, _>(|(plugin, _)| *plugin == name);
        self.teardowns = kept;
        let found = !removed.is_empty();
        for (plugin, teardown) in removed {
            debug!(plugin, "Removing plugin");
            teardown.run();
        }
        found
    }

    /// Tear down every plugin, newest first. Calling it again does nothing.
    pub fn destroy(&mut self) {
        if self.destroyed {
            return;
        }
        self.destroyed = true;
        for (plugin, teardown) in self.teardowns.drain(..).rev() {
            debug!(plugin, "Tearing down plugin");
            teardown.run();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin::PluginFuture;
    use pretty_assertions::assert_eq;
    use quire_lifecycle::LifecycleError;
    use quire_markdown::to_html;
    use tokio::task::LocalSet;

    async fn build(markdown: &str) -> Editor {
        LocalSet::new()
            .run_until(EditorBuilder::standard(EditorConfig::default()).build(markdown))
            .await
            .unwrap()
    }

    fn types(editor: &Editor) -> Vec<String> {
        editor
            .state()
            .unwrap()
            .doc()
            .content
            .iter()
            .map(|node| node.node_type.clone())
            .collect()
    }

    #[tokio::test]
    async fn test_info_box_roundtrip() {
        let editor = build(":::warning\nCareful *now*\n:::\n").await;
        let block = &editor.state().unwrap().doc().content[0];
        assert_eq!(block.node_type, "info-box");
        assert_eq!(block.attr_str("kind"), Some("warning"));
        assert_eq!(editor.markdown().unwrap(), ":::warning\nCareful *now*\n:::\n");
    }

    #[tokio::test]
    async fn test_unknown_container_becomes_info() {
        let editor = build(":::Note\nbody\n:::\n").await;
        assert_eq!(types(&editor), vec!["info-box"]);
        assert_eq!(editor.markdown().unwrap(), ":::info\nbody\n:::\n");
    }

    #[tokio::test]
    async fn test_time_expressions_stay_text() {
        let editor = build("Doors at 19:00, talks at :30\n").await;
        assert_eq!(types(&editor), vec!["paragraph"]);
        assert_eq!(editor.markdown().unwrap(), "Doors at 19:00, talks at :30\n");
    }

    #[tokio::test]
    async fn test_coloured_span_roundtrip() {
        let editor = build("a [red text]{.red-2} b\n").await;
        let inline = &editor.state().unwrap().doc().content[0].content;
        assert_eq!(inline[1].marks[0].mark_type, "coloured-span");
        assert_eq!(inline[1].marks[0].attr_str("class"), Some("red-2"));
        assert_eq!(editor.markdown().unwrap(), "a [red text]{.red-2} b\n");
    }

    #[tokio::test]
    async fn test_escaped_span_syntax_is_plain_text() {
        let editor = build("\\[x\\]{.red}\n").await;
        let inline = &editor.state().unwrap().doc().content[0].content;
        assert_eq!(inline.len(), 1);
        assert!(inline[0].marks.is_empty());
        assert_eq!(inline[0].text.as_deref(), Some("[x]{.red}"));
        assert_eq!(editor.markdown().unwrap(), "[x\\]{.red}\n");
    }

    #[tokio::test]
    async fn test_empty_span_is_kept() {
        let editor = build("a []{.red} b\n").await;
        let inline = &editor.state().unwrap().doc().content[0].content;
        assert_eq!(inline.len(), 1);
        assert_eq!(editor.markdown().unwrap(), "a []{.red} b\n");
    }

    #[tokio::test]
    async fn test_apply_and_remove_mark() {
        let mut editor = build("hello world\n").await;
        assert!(!editor.apply_mark("blue-3").unwrap());

        editor.set_selection(Selection::new(1, 6)).unwrap();
        assert!(editor.apply_mark("blue-3").unwrap());
        assert_eq!(editor.markdown().unwrap(), "[hello]{.blue-3} world\n");

        assert!(editor.remove_mark().unwrap());
        assert_eq!(editor.markdown().unwrap(), "hello world\n");
    }

    #[tokio::test]
    async fn test_info_input_rule() {
        let mut editor = build("").await;
        editor.insert_text(":::info").unwrap();
        assert_eq!(types(&editor), vec!["info-box"]);
        assert_eq!(editor.state().unwrap().selection(), Selection::cursor(2));

        editor.insert_text("Inside").unwrap();
        assert_eq!(editor.markdown().unwrap(), ":::info\nInside\n:::\n");
    }

    #[tokio::test]
    async fn test_input_rule_needs_empty_block() {
        let mut editor = build("text\n").await;
        editor.set_selection(Selection::cursor(5)).unwrap();
        editor.insert_text(" :::info").unwrap();
        assert_eq!(types(&editor), vec!["paragraph"]);
    }

    #[tokio::test]
    async fn test_insert_info_box_after_block() {
        let mut editor = build("first\n").await;
        assert!(editor.insert_info_box("error").unwrap());
        assert_eq!(types(&editor), vec!["paragraph", "info-box"]);
        editor.insert_text("oops").unwrap();
        assert_eq!(editor.markdown().unwrap(), "first\n\n:::error\noops\n:::\n");
    }

    #[tokio::test]
    async fn test_slash_items() {
        let mut editor = build("\n").await;
        let items = editor.slash_items().unwrap();
        let ids: Vec<_> = items.iter().map(|item| item.id.as_str()).collect();
        assert_eq!(
            ids,
            vec!["infoBox-info", "infoBox-warning", "infoBox-success", "infoBox-error"]
        );
        assert!(editor.run_slash_item("infoBox-success").unwrap());
        assert_eq!(
            editor.state().unwrap().doc().content[0].attr_str("kind"),
            Some("success")
        );
        assert!(matches!(
            editor.run_slash_item("nope"),
            Err(EditorError::UnknownCommand(_))
        ));
    }

    #[tokio::test]
    async fn test_reveal_only_when_focused() {
        let mut editor = build("# Title\n\nbody\n").await;
        assert_eq!(to_html(&editor.view().unwrap()), "<h1>Title</h1><p>body</p>");

        editor.focus();
        assert_eq!(
            to_html(&editor.view().unwrap()),
            r#"<div class="markdown-reveal" contenteditable="false"># Title</div><h1>Title</h1><p>body</p>"#
        );

        editor.blur();
        assert_eq!(to_html(&editor.view().unwrap()), "<h1>Title</h1><p>body</p>");
    }

    #[tokio::test]
    async fn test_reveal_suppressed_in_tables() {
        let mut editor = build("| a |\n| - |\n| 1 |\n").await;
        editor.focus();
        let html = to_html(&editor.view().unwrap());
        assert!(!html.contains("markdown-reveal"));
    }

    #[tokio::test]
    async fn test_remove_plugin_and_destroy() {
        let mut editor = build("text\n").await;
        editor.focus();
        assert!(editor.remove_plugin("markdown-reveal"));
        assert!(!editor.remove_plugin("markdown-reveal"));
        assert_eq!(to_html(&editor.view().unwrap()), "<p>text</p>");

        editor.destroy();
        editor.destroy();
        assert!(matches!(editor.markdown(), Err(EditorError::Destroyed)));
    }

    struct NeverReady;

    impl Plugin for NeverReady {
        fn name(&self) -> &'static str {
            "never-ready"
        }

        fn setup(&self, ctx: &EditorContext) -> Result<PluginFuture, EditorError> {
            ctx.gate(Phase::Parser, "never-ready")?;
            Ok(Box::pin(std::future::pending()))
        }
    }

    struct Broken;

    impl Plugin for Broken {
        fn name(&self) -> &'static str {
            "broken"
        }

        fn setup(&self, ctx: &EditorContext) -> Result<PluginFuture, EditorError> {
            ctx.gate(Phase::Schema, "broken")?;
            Ok(Box::pin(async {
                Err(EditorError::UnknownCommand("missing".to_owned()))
            }))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_stage_times_out() {
        let config = EditorConfig {
            stage_timeout: Some(Duration::from_millis(50)),
            reveal: false,
        };
        let result = LocalSet::new()
            .run_until(EditorBuilder::new(config).with_plugin(NeverReady).build("x"))
            .await;
        match result {
            Err(EditorError::Lifecycle(LifecycleError::Stalled { stage, pending })) => {
                assert_eq!(stage.as_str(), "parser");
                assert_eq!(pending, vec!["never-ready"]);
            }
            other => panic!("expected a stalled stage, got {:?}", other.map(|_| ())),
        }
    }

    #[tokio::test]
    async fn test_failed_plugin_aborts_build() {
        let result = LocalSet::new()
            .run_until(
                EditorBuilder::standard(EditorConfig::default())
                    .with_plugin(Broken)
                    .build("x"),
            )
            .await;
        assert!(matches!(result, Err(EditorError::Plugin("broken", _))));
    }
}
