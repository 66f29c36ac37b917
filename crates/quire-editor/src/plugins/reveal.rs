//! Markdown reveal: shows the markdown source of the block holding the cursor.

use std::rc::Rc;

use quire_markdown::DisplayNode;
use tracing::debug;

use crate::error::EditorError;
use crate::model::DocNode;
use crate::plugin::{EditorContext, Phase, Plugin, PluginFuture, Teardown, ViewContext, ViewPlugin};
use crate::view::Decoration;

/// Class of the overlay element.
pub const REVEAL_CLASS: &str = "markdown-reveal";

/// Computes the overlay; installed by [`MarkdownReveal`].
#[derive(Debug, Default, Clone, Copy)]
pub struct RevealView;

impl RevealView {
    /// Markdown for the block around the cursor and the path of that block.
    ///
    /// `None` when there is no block, the cursor is inside a table, or the
    /// block serializes to nothing.
    #[must_use]
    pub fn reveal(&self, view: &ViewContext<'_>) -> Option<(Vec<usize>, String)> {
        let state = view.state;
        let resolved = state.resolve(state.selection().head).ok()?;
        let ancestors = 1..=resolved.depth();
        // Table fragments do not serialize to valid markdown.
        if ancestors
            .clone()
            .any(|depth| resolved.node(depth).node_type == "table")
        {
            return None;
        }
        let depth = ancestors
            .rev()
            .find(|&depth| state.schema().is_block(&resolved.node(depth).node_type))?;

        let slice = DocNode::new("doc").with_content(vec![resolved.node(depth).clone()]);
        let markdown = match view.serializer.serialize(&slice) {
            Ok(markdown) => markdown,
            Err(err) => {
                debug!(error = %err, "Reveal serialization failed");
                return None;
            }
        };
        let markdown = markdown.trim();
        if markdown.is_empty() {
            return None;
        }
        Some((resolved.path(depth), markdown.to_owned()))
    }
}

impl ViewPlugin for RevealView {
    fn decorations(&self, view: &ViewContext<'_>) -> Vec<Decoration> {
        if !view.focused {
            return Vec::new();
        }
        self.reveal(view)
            .map(|(path, markdown)| Decoration {
                path,
                widget: DisplayNode::element("div")
                    .attr("class", REVEAL_CLASS)
                    .attr("contenteditable", "false")
                    .child(DisplayNode::text(markdown)),
            })
            .into_iter()
            .collect()
    }
}

/// Installs [`RevealView`] once the serializer is built.
#[derive(Debug, Default, Clone, Copy)]
pub struct MarkdownReveal;

impl Plugin for MarkdownReveal {
    fn name(&self) -> &'static str {
        "markdown-reveal"
    }

    fn setup(&self, ctx: &EditorContext) -> Result<PluginFuture, EditorError> {
        let signal = ctx.gate(Phase::Editor, self.name())?;
        let ctx = ctx.clone();
        Ok(Box::pin(async move {
            ctx.wait_ready(Phase::Serializer).await?;
            let views = &ctx.registries().views;
            let id = views.push(Rc::new(RevealView));
            ctx.done(&signal)?;
            Ok(Teardown::new()
                .retract(views, id)
                .clear(ctx.scheduler(), signal))
        }))
    }
}
