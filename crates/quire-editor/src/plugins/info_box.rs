//! Info boxes: `:::kind` container directives as an editable block.
//!
//! Unknown directive names are read as `info`, so every container a post
//! holds stays editable.

use std::rc::Rc;
use std::sync::{Arc, LazyLock};

use quire_markdown::{
    Directive, DirectiveHandler, DisplayNode, InfoBoxKind, NodeKind, SyntaxExtension, SyntaxNode,
};
use regex::Regex;
use serde_json::Value;

use crate::convert::{DocParser, DocSerializer, attrs};
use crate::error::EditorError;
use crate::extension::NodeExtension;
use crate::model::{Attrs, DocNode};
use crate::plugin::{
    Command, EditorContext, InputRule, Phase, Plugin, PluginFuture, SlashItem, Teardown,
};
use crate::position::Selection;
use crate::schema::{ContentModel, NodeSpec};
use crate::state::EditorState;

/// Command inserting an info box; the argument is the kind.
pub const INSERT_INFO_BOX: &str = "InsertInfoBox";

static INFO_RULE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^:::info\s*$").expect("invalid info-box input rule regex"));

/// The `info-box` node type.
#[derive(Debug, Default, Clone, Copy)]
pub struct InfoBoxNode;

impl NodeExtension for InfoBoxNode {
    fn name(&self) -> &'static str {
        "info-box"
    }

    fn spec(&self) -> NodeSpec {
        NodeSpec::block("info-box", ContentModel::Blocks { min: 1 })
            .with_attr("kind", InfoBoxKind::Info.as_str())
    }

    fn recognize(
        &self,
        node: &SyntaxNode,
        parser: &DocParser,
    ) -> Option<Result<DocNode, EditorError>> {
        let kind = match &node.kind {
            NodeKind::ContainerDirective(directive) => {
                InfoBoxKind::from_name(&directive.name).unwrap_or_default()
            }
            NodeKind::InfoBox { kind } => *kind,
            _ => return None,
        };
        Some(parser.blocks(&node.children).and_then(|mut content| {
            if content.is_empty() {
                content.push(parser.node("paragraph", Attrs::new(), Vec::new())?);
            }
            parser.node("info-box", kind_attrs(kind), content)
        }))
    }

    fn serialize(
        &self,
        node: &DocNode,
        serializer: &DocSerializer,
    ) -> Result<SyntaxNode, EditorError> {
        let kind = node_kind(node);
        Ok(SyntaxNode::with_children(
            NodeKind::ContainerDirective(Directive::new(kind.as_str())),
            serializer.blocks(&node.content)?,
        ))
    }

    fn project(&self, node: &DocNode, children: Vec<DisplayNode>) -> DisplayNode {
        let kind = node_kind(node);
        DisplayNode::element("div")
            .attr("class", format!("info-box info-box-{kind}"))
            .attr("data-info-box", "")
            .attr("data-kind", kind.as_str())
            .children(children)
    }

    fn keeps_containers(&self) -> bool {
        true
    }
}

fn node_kind(node: &DocNode) -> InfoBoxKind {
    node.attr_str("kind")
        .and_then(InfoBoxKind::from_name)
        .unwrap_or_default()
}

fn kind_attrs(kind: InfoBoxKind) -> Attrs {
    attrs([("kind", Value::from(kind.as_str()))])
}

/// Menu label for a kind.
#[must_use]
pub fn label(kind: InfoBoxKind) -> &'static str {
    match kind {
        InfoBoxKind::Info => "資訊框",
        InfoBoxKind::Warning => "警告框",
        InfoBoxKind::Success => "成功框",
        InfoBoxKind::Error => "錯誤框",
    }
}

/// An info box holding one empty paragraph.
fn empty_info_box(state: &EditorState, kind: InfoBoxKind) -> Result<DocNode, EditorError> {
    let schema = state.schema();
    let paragraph = schema.node("paragraph", Attrs::new(), Vec::new())?;
    Ok(schema.node("info-box", kind_attrs(kind), vec![paragraph])?)
}

fn move_into(state: &mut EditorState, path: &[usize]) -> Result<(), EditorError> {
    if let Some(cursor) = state.cursor_in(path) {
        state.set_selection(Selection::cursor(cursor))?;
    }
    Ok(())
}

/// Replace an empty paragraph at the cursor with an info box, or insert one
/// after the top-level block holding the cursor.
fn insert_info_box(state: &mut EditorState, kind: InfoBoxKind) -> Result<bool, EditorError> {
    let Some((path, _)) = state.textblock_at(state.selection().head) else {
        return Ok(false);
    };
    let info_box = empty_info_box(state, kind)?;
    let empty_paragraph = state
        .node_at(&path)
        .is_some_and(|block| block.node_type == "paragraph" && block.content.is_empty());
    let target = if empty_paragraph {
        state.replace_block(&path, info_box)?;
        path
    } else {
        state.insert_after(&path[..1], info_box)?
    };
    move_into(state, &target)?;
    Ok(true)
}

/// Turns a paragraph holding only `:::info` into an info box.
fn info_rule(state: &mut EditorState, path: &[usize]) -> Result<bool, EditorError> {
    let matches = state.node_at(path).is_some_and(|block| {
        block.node_type == "paragraph" && INFO_RULE.is_match(&block.text_content())
    });
    if !matches {
        return Ok(false);
    }
    let info_box = empty_info_box(state, InfoBoxKind::Info)?;
    state.replace_block(path, info_box)?;
    move_into(state, path)?;
    Ok(true)
}

/// Enables directive syntax in the markdown parser.
#[derive(Debug, Default, Clone, Copy)]
pub struct InfoBoxSyntax;

impl Plugin for InfoBoxSyntax {
    fn name(&self) -> &'static str {
        "info-box-syntax"
    }

    fn setup(&self, ctx: &EditorContext) -> Result<PluginFuture, EditorError> {
        let signal = ctx.gate(Phase::Parser, self.name())?;
        let ctx = ctx.clone();
        Ok(Box::pin(async move {
            ctx.wait_ready(Phase::Init).await?;
            let syntax = &ctx.registries().syntax;
            let id = syntax.push(SyntaxExtension::Directives);
            ctx.done(&signal)?;
            Ok(Teardown::new()
                .retract(syntax, id)
                .clear(ctx.scheduler(), signal))
        }))
    }
}

/// Writes info boxes back as container directives.
#[derive(Debug, Default, Clone, Copy)]
pub struct InfoBoxStringify;

impl Plugin for InfoBoxStringify {
    fn name(&self) -> &'static str {
        "info-box-stringify"
    }

    fn setup(&self, ctx: &EditorContext) -> Result<PluginFuture, EditorError> {
        let signal = ctx.gate(Phase::Serializer, self.name())?;
        let ctx = ctx.clone();
        Ok(Box::pin(async move {
            ctx.wait_ready(Phase::Schema).await?;
            let stringify = &ctx.registries().stringify;
            let id = stringify.push(Arc::new(DirectiveHandler));
            ctx.done(&signal)?;
            Ok(Teardown::new()
                .retract(stringify, id)
                .clear(ctx.scheduler(), signal))
        }))
    }
}

/// Adds the `info-box` node type to the schema.
#[derive(Debug, Default, Clone, Copy)]
pub struct InfoBoxSchema;

impl Plugin for InfoBoxSchema {
    fn name(&self) -> &'static str {
        "info-box-schema"
    }

    fn setup(&self, ctx: &EditorContext) -> Result<PluginFuture, EditorError> {
        let signal = ctx.gate(Phase::Schema, self.name())?;
        let ctx = ctx.clone();
        Ok(Box::pin(async move {
            ctx.wait_ready(Phase::Init).await?;
            let nodes = &ctx.registries().nodes;
            let id = nodes.push(Rc::new(InfoBoxNode));
            ctx.done(&signal)?;
            Ok(Teardown::new()
                .retract(nodes, id)
                .clear(ctx.scheduler(), signal))
        }))
    }
}

/// The `:::info` input rule, the insert command and the slash-menu items.
#[derive(Debug, Default, Clone, Copy)]
pub struct InfoBoxCommands;

impl Plugin for InfoBoxCommands {
    fn name(&self) -> &'static str {
        "info-box-commands"
    }

    fn setup(&self, ctx: &EditorContext) -> Result<PluginFuture, EditorError> {
        let signal = ctx.gate(Phase::Editor, self.name())?;
        let ctx = ctx.clone();
        Ok(Box::pin(async move {
            ctx.wait_ready(Phase::Schema).await?;
            let registries = ctx.registries();
            let mut teardown = Teardown::new();

            let rule = InputRule::new("info-box", INFO_RULE.clone(), info_rule);
            teardown = teardown.retract(&registries.input_rules, registries.input_rules.push(rule));

            let command = Command::new(INSERT_INFO_BOX, |state, arg| {
                let kind = InfoBoxKind::from_name(arg.unwrap_or_default()).unwrap_or_default();
                insert_info_box(state, kind)
            });
            teardown = teardown.retract(&registries.commands, registries.commands.push(command));

            for kind in InfoBoxKind::ALL {
                let item = SlashItem {
                    id: format!("infoBox-{kind}"),
                    label: label(kind).to_owned(),
                    command: INSERT_INFO_BOX,
                    arg: Some(kind.as_str().to_owned()),
                };
                teardown = teardown.retract(&registries.slash_items, registries.slash_items.push(item));
            }

            ctx.done(&signal)?;
            Ok(teardown.clear(ctx.scheduler(), signal))
        }))
    }
}

/// All info-box plugins.
#[must_use]
pub fn plugins() -> Vec<Box<dyn Plugin>> {
    vec![
        Box::new(InfoBoxSyntax),
        Box::new(InfoBoxSchema),
        Box::new(InfoBoxStringify),
        Box::new(InfoBoxCommands),
    ]
}
