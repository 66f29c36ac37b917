//! Coloured spans: `[text]{.class}` as a mark.

use std::rc::Rc;
use std::sync::{Arc, LazyLock};

use quire_markdown::transform::split_spans;
use quire_markdown::{
    DisplayNode, NodeKind, SpanHandler, SyntaxExtension, SyntaxNode, merge_adjacent_text,
};
use regex::Regex;
use serde_json::Value;
use tracing::warn;

use crate::convert::attrs;
use crate::error::EditorError;
use crate::extension::MarkExtension;
use crate::model::Mark;
use crate::plugin::{Command, EditorContext, Phase, Plugin, PluginFuture, Teardown};
use crate::schema::MarkSpec;
use crate::state::EditorState;

/// Command colouring the selection; the argument is the class name.
pub const APPLY_SPAN_CLASS: &str = "ApplySpanClass";
/// Command removing colouring from the selection.
pub const REMOVE_SPAN_CLASS: &str = "RemoveSpanClass";

/// Class used when none is given.
pub const DEFAULT_CLASS: &str = "red";

static CLASS_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z][a-z0-9-]*$").expect("invalid span class regex"));

/// A palette hue with its five shades, lightest first.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Hue {
    pub name: &'static str,
    pub label: &'static str,
    pub shades: [&'static str; 5],
}

pub const PALETTE: [Hue; 9] = [
    Hue {
        name: "red",
        label: "紅",
        shades: ["#fecaca", "#f87171", "#dc2626", "#b91c1c", "#7f1d1d"],
    },
    Hue {
        name: "orange",
        label: "橙",
        shades: ["#fed7aa", "#fb923c", "#ea580c", "#c2410c", "#9a3412"],
    },
    Hue {
        name: "yellow",
        label: "黃",
        shades: ["#fef08a", "#facc15", "#eab308", "#ca8a04", "#a16207"],
    },
    Hue {
        name: "green",
        label: "綠",
        shades: ["#bbf7d0", "#4ade80", "#22c55e", "#16a34a", "#15803d"],
    },
    Hue {
        name: "teal",
        label: "青",
        shades: ["#99f6e4", "#2dd4bf", "#14b8a6", "#0d9488", "#0f766e"],
    },
    Hue {
        name: "blue",
        label: "藍",
        shades: ["#bfdbfe", "#60a5fa", "#2563eb", "#1d4ed8", "#1e3a8a"],
    },
    Hue {
        name: "purple",
        label: "紫",
        shades: ["#e9d5ff", "#c084fc", "#a855f7", "#7c3aed", "#6b21a8"],
    },
    Hue {
        name: "pink",
        label: "粉",
        shades: ["#fbcfe8", "#f472b6", "#ec4899", "#db2777", "#be185d"],
    },
    Hue {
        name: "grey",
        label: "灰",
        shades: ["#e5e7eb", "#9ca3af", "#6b7280", "#4b5563", "#374151"],
    },
];

/// One colour choice in the toolbar.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ColourPreset {
    /// Class name, e.g. `blue-3`.
    pub class: String,
    /// Menu label, e.g. `藍 3`.
    pub label: String,
    pub hex: &'static str,
}

/// Every hue and shade, in palette order.
#[must_use]
pub fn presets() -> Vec<ColourPreset> {
    PALETTE
        .iter()
        .flat_map(|hue| {
            hue.shades.iter().enumerate().map(move |(i, hex)| ColourPreset {
                class: format!("{}-{}", hue.name, i + 1),
                label: format!("{} {}", hue.label, i + 1),
                hex: *hex,
            })
        })
        .collect()
}

/// The `coloured-span` mark type.
#[derive(Debug, Default, Clone, Copy)]
pub struct ColouredSpanMark;

impl MarkExtension for ColouredSpanMark {
    fn name(&self) -> &'static str {
        "coloured-span"
    }

    fn spec(&self) -> MarkSpec {
        MarkSpec::new("coloured-span").with_attr("class", DEFAULT_CLASS)
    }

    fn recognize(&self, node: &SyntaxNode) -> Option<Mark> {
        match &node.kind {
            NodeKind::Span { class } => {
                Some(Mark::new("coloured-span").with_attr("class", class.as_str()))
            }
            _ => None,
        }
    }

    fn serialize(&self, mark: &Mark) -> NodeKind {
        NodeKind::Span {
            class: mark.attr_str("class").unwrap_or(DEFAULT_CLASS).to_owned(),
        }
    }

    fn project(&self, mark: &Mark) -> DisplayNode {
        let class = mark.attr_str("class").unwrap_or(DEFAULT_CLASS);
        DisplayNode::element("span")
            .attr("class", class)
            .attr("data-span-class", class)
    }
}

fn apply_span_class(state: &mut EditorState, class: Option<&str>) -> Result<bool, EditorError> {
    let class = class.unwrap_or(DEFAULT_CLASS);
    if !CLASS_NAME.is_match(class) {
        warn!(class, "Ignoring invalid span class");
        return Ok(false);
    }
    let selection = state.selection();
    if selection.is_empty() {
        return Ok(false);
    }
    let mark = state
        .schema()
        .mark("coloured-span", attrs([("class", Value::from(class))]))?;
    state.add_mark(selection.from(), selection.to(), &mark)
}

fn remove_span_class(state: &mut EditorState, _: Option<&str>) -> Result<bool, EditorError> {
    let selection = state.selection();
    if selection.is_empty() {
        return Ok(false);
    }
    state.remove_mark(selection.from(), selection.to(), "coloured-span")
}

/// Split spans out of text. An empty `[]{.class}` has nothing to colour, so it
/// stays in the text as written.
fn split_editable_spans(tree: SyntaxNode) -> SyntaxNode {
    split_spans(tree).map_siblings(&mut |_, children| {
        if !children.iter().any(is_empty_span) {
            return children;
        }
        let children = children
            .into_iter()
            .map(|node| match node {
                SyntaxNode {
                    kind: NodeKind::Span { class },
                    children,
                } if children.is_empty() => SyntaxNode::text(format!("[]{{.{class}}}")),
                node => node,
            })
            .collect();
        merge_adjacent_text(children)
    })
}

fn is_empty_span(node: &SyntaxNode) -> bool {
    matches!(node.kind, NodeKind::Span { .. }) && node.children.is_empty()
}

/// Splits `[text]{.class}` after parsing and writes spans back.
#[derive(Debug, Default, Clone, Copy)]
pub struct SpanSyntax;

impl Plugin for SpanSyntax {
    fn name(&self) -> &'static str {
        "coloured-span-syntax"
    }

    fn setup(&self, ctx: &EditorContext) -> Result<PluginFuture, EditorError> {
        let signal = ctx.gate(Phase::Init, self.name())?;
        let ctx = ctx.clone();
        Ok(Box::pin(async move {
            let registries = ctx.registries();
            let pass = registries
                .syntax
                .push(SyntaxExtension::pass("coloured-span", split_editable_spans));
            let handler = registries.stringify.push(Arc::new(SpanHandler));
            ctx.done(&signal)?;
            Ok(Teardown::new()
                .retract(&registries.syntax, pass)
                .retract(&registries.stringify, handler)
                .clear(ctx.scheduler(), signal))
        }))
    }
}

/// Adds the `coloured-span` mark type to the schema.
#[derive(Debug, Default, Clone, Copy)]
pub struct SpanSchema;

impl Plugin for SpanSchema {
    fn name(&self) -> &'static str {
        "coloured-span-schema"
    }

    fn setup(&self, ctx: &EditorContext) -> Result<PluginFuture, EditorError> {
        let signal = ctx.gate(Phase::Schema, self.name())?;
        let ctx = ctx.clone();
        Ok(Box::pin(async move {
            ctx.wait_ready(Phase::Init).await?;
            let marks = &ctx.registries().marks;
            let id = marks.push(Rc::new(ColouredSpanMark));
            ctx.done(&signal)?;
            Ok(Teardown::new()
                .retract(marks, id)
                .clear(ctx.scheduler(), signal))
        }))
    }
}

/// `ApplySpanClass` and `RemoveSpanClass`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SpanCommands;

impl Plugin for SpanCommands {
    fn name(&self) -> &'static str {
        "coloured-span-commands"
    }

    fn setup(&self, ctx: &EditorContext) -> Result<PluginFuture, EditorError> {
        let signal = ctx.gate(Phase::Editor, self.name())?;
        let ctx = ctx.clone();
        Ok(Box::pin(async move {
            ctx.wait_ready(Phase::Schema).await?;
            let commands = &ctx.registries().commands;
            let apply = commands.push(Command::new(APPLY_SPAN_CLASS, apply_span_class));
            let remove = commands.push(Command::new(REMOVE_SPAN_CLASS, remove_span_class));
            ctx.done(&signal)?;
            Ok(Teardown::new()
                .retract(commands, apply)
                .retract(commands, remove)
                .clear(ctx.scheduler(), signal))
        }))
    }
}

/// All coloured-span plugins.
#[must_use]
pub fn plugins() -> Vec<Box<dyn Plugin>> {
    vec![
        Box::new(SpanSyntax),
        Box::new(SpanSchema),
        Box::new(SpanCommands),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::DocNode;
    use crate::position::Selection;
    use crate::schema::Schema;
    use pretty_assertions::assert_eq;

    fn state(text: &str) -> EditorState {
        let schema = Schema::core().with_mark(ColouredSpanMark.spec());
        EditorState::new(
            Rc::new(schema),
            DocNode::new("doc").with_content(vec![
                DocNode::new("paragraph").with_content(vec![DocNode::text(text, vec![])]),
            ]),
        )
    }

    #[test]
    fn test_palette_presets() {
        let presets = presets();
        assert_eq!(presets.len(), 45);
        assert_eq!(
            presets[0],
            ColourPreset {
                class: "red-1".to_owned(),
                label: "紅 1".to_owned(),
                hex: "#fecaca",
            }
        );
        assert_eq!(presets[44].class, "grey-5");
        assert_eq!(presets[44].hex, "#374151");
    }

    #[test]
    fn test_apply_defaults_to_red() {
        let mut state = state("hello");
        state.set_selection(Selection::new(1, 3)).unwrap();
        assert!(apply_span_class(&mut state, None).unwrap());
        let marks = &state.doc().content[0].content[0].marks;
        assert_eq!(marks[0].attr_str("class"), Some("red"));
    }

    #[test]
    fn test_apply_replaces_existing_class() {
        let mut state = state("hello");
        state.set_selection(Selection::new(1, 6)).unwrap();
        apply_span_class(&mut state, Some("red-2")).unwrap();
        apply_span_class(&mut state, Some("teal-4")).unwrap();
        let inline = &state.doc().content[0].content;
        assert_eq!(inline.len(), 1);
        assert_eq!(inline[0].marks.len(), 1);
        assert_eq!(inline[0].marks[0].attr_str("class"), Some("teal-4"));
    }

    #[test]
    fn test_invalid_class_or_collapsed_selection_is_noop() {
        let mut state = state("hello");
        assert!(!apply_span_class(&mut state, Some("red")).unwrap());
        state.set_selection(Selection::new(1, 3)).unwrap();
        assert!(!apply_span_class(&mut state, Some("Red Big")).unwrap());
        assert!(!remove_span_class(&mut state, None).unwrap());
    }

    #[test]
    fn test_empty_span_stays_text() {
        let tree = SyntaxNode::with_children(
            NodeKind::Paragraph,
            vec![SyntaxNode::text("a []{.red} and [b]{.teal-1}")],
        );
        let tree = split_editable_spans(tree);
        assert_eq!(tree.children.len(), 2);
        assert_eq!(tree.children[0].as_text(), Some("a []{.red} and "));
        assert_eq!(
            tree.children[1].kind,
            NodeKind::Span {
                class: "teal-1".to_owned()
            }
        );
    }

    #[test]
    fn test_projection() {
        let mark = Mark::new("coloured-span").with_attr("class", "green-2");
        assert_eq!(
            ColouredSpanMark.project(&mark).to_html(),
            r#"<span class="green-2" data-span-class="green-2"></span>"#
        );
    }
}
