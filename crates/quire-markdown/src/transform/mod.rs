//! Tree-to-tree passes applied between parsing and projection.
//!
//! A pass owns the tree it receives and returns the rebuilt tree, so no pass
//! can hold on to nodes another pass replaced. Passes run in a fixed order;
//! later passes rely on the shapes earlier ones produce.
//!
//! # Example
//!
//! ```
//! use quire_markdown::{MarkdownParser, NodeKind, Pipeline};
//!
//! let parsed = MarkdownParser::new().with_directives().parse("See ^[a] and [cite:b] and [cite:a]\n");
//! let (_, ctx) = Pipeline::render().run(parsed.tree);
//! assert_eq!(ctx.citations.number("a"), Some(1));
//! assert_eq!(ctx.citations.number("b"), Some(2));
//! ```

mod citations;
mod directives;
mod figure;
mod heading_id;
mod span;

pub use citations::{CitationPass, CitationRegistry};
pub use directives::{ContainerPolicy, DirectiveFallback, DirectiveToDisplay};
pub use figure::FigureCaptionPass;
pub use heading_id::{HeadingIdPass, TocEntry};
pub use span::{ColouredSpanPass, split_spans};
pub(crate) use span::SPAN_CLOSE;

use tracing::debug;

use crate::ast::SyntaxNode;

/// State collected while a pipeline runs.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TransformContext {
    /// Citation keys in first-seen order.
    pub citations: CitationRegistry,
    /// Headings with explicit ids, in document order.
    pub toc: Vec<TocEntry>,
    /// Recoverable anomalies, worded for authors.
    pub warnings: Vec<String>,
}

/// A single tree pass.
///
/// Implementations rebuild and return the tree; anything worth reporting
/// goes into the context.
pub trait Transform: Send {
    /// Pass name, for logging.
    fn name(&self) -> &'static str;

    /// Apply the pass.
    fn apply(&mut self, tree: SyntaxNode, ctx: &mut TransformContext) -> SyntaxNode;
}

/// Ordered list of passes.
#[derive(Default)]
pub struct Pipeline {
    passes: Vec<Box<dyn Transform>>,
}

impl Pipeline {
    /// Empty pipeline.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Passes for published pages: citations, heading ids, coloured spans,
    /// figure captions, info boxes, then the directive fallback.
    #[must_use]
    pub fn render() -> Self {
        Self::new()
            .with_pass(CitationPass::new())
            .with_pass(HeadingIdPass::new())
            .with_pass(ColouredSpanPass::new())
            .with_pass(FigureCaptionPass::new())
            .with_pass(DirectiveToDisplay::new())
            .with_pass(DirectiveFallback::new(ContainerPolicy::KeepAll))
    }

    /// Passes applied before the editor's document model sees a tree.
    ///
    /// Container directives are kept for the info-box recognizer; leaf and
    /// text directives become text.
    #[must_use]
    pub fn editor() -> Self {
        Self::new()
            .with_pass(ColouredSpanPass::new())
            .with_pass(DirectiveFallback::new(ContainerPolicy::KeepAll))
    }

    /// Append a pass.
    #[must_use]
    pub fn with_pass(mut self, pass: impl Transform + 'static) -> Self {
        self.passes.push(Box::new(pass));
        self
    }

    /// Pass names, in order.
    pub fn pass_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.passes.iter().map(|pass| pass.name())
    }

    /// Run every pass over `tree`.
    pub fn run(&mut self, tree: SyntaxNode) -> (SyntaxNode, TransformContext) {
        let mut ctx = TransformContext::default();
        let tree = self.run_with(tree, &mut ctx);
        (tree, ctx)
    }

    /// Run every pass, accumulating into an existing context.
    pub fn run_with(&mut self, mut tree: SyntaxNode, ctx: &mut TransformContext) -> SyntaxNode {
        for pass in &mut self.passes {
            debug!(pass = pass.name(), "Applying transform");
            tree = pass.apply(tree, ctx);
        }
        tree
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.pass_names()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_render_order() {
        let names: Vec<_> = Pipeline::render().pass_names().collect();
        assert_eq!(
            names,
            vec![
                "citations",
                "heading-id",
                "coloured-span",
                "figure-caption",
                "directive-to-display",
                "directive-fallback",
            ]
        );
    }

    #[test]
    fn test_editor_skips_render_only_passes() {
        let names: Vec<_> = Pipeline::editor().pass_names().collect();
        assert_eq!(names, vec!["coloured-span", "directive-fallback"]);
    }
}
