//! One-call rendering of a post for published pages.

use tracing::debug;

use crate::ast::{NodeKind, SyntaxNode};
use crate::display::{DisplayNode, project, to_html};
use crate::error::ParseError;
use crate::front_matter::{PostMeta, split_front_matter};
use crate::parser::MarkdownParser;
use crate::transform::{CitationRegistry, Pipeline, TocEntry};

/// Result of rendering a post.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub struct RenderResult {
    /// Display tree for the page renderer.
    pub display: Vec<DisplayNode>,
    /// `display` serialized as HTML.
    pub html: String,
    /// Front matter title, else the first H1 (if title extraction is enabled).
    pub title: Option<String>,
    /// Headings with explicit ids.
    pub toc: Vec<TocEntry>,
    /// Citation keys in number order.
    pub citations: CitationRegistry,
    /// Recoverable anomalies (unclosed directives, reference list mismatches).
    pub warnings: Vec<String>,
    /// Parsed front matter, if the post has any.
    pub front_matter: Option<PostMeta>,
}

/// Renders posts through the parser and the render pipeline.
///
/// # Example
///
/// ```
/// use quire_markdown::MarkdownRenderer;
///
/// let result = MarkdownRenderer::new()
///     .with_title_extraction()
///     .render("# Hello\n\n:::info\nHi\n:::\n")
///     .unwrap();
/// assert_eq!(result.title.as_deref(), Some("Hello"));
/// assert!(result.html.contains(r#"<div class="info-box info-box-info">"#));
/// ```
#[derive(Debug, Default)]
pub struct MarkdownRenderer {
    extract_title: bool,
}

impl MarkdownRenderer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fall back to the first H1 when front matter has no title.
    #[must_use]
    pub fn with_title_extraction(mut self) -> Self {
        self.extract_title = true;
        self
    }

    /// Render a post (front matter optional).
    pub fn render(&self, src: &str) -> Result<RenderResult, ParseError> {
        let (yaml, body) = split_front_matter(src);
        let front_matter = yaml.map(PostMeta::from_yaml).transpose()?;

        let parsed = MarkdownParser::new().with_directives().parse(body);
        let (tree, ctx) = Pipeline::render().run(parsed.tree);

        let title = front_matter
            .as_ref()
            .and_then(|meta| meta.title.clone())
            .or_else(|| if self.extract_title { first_h1(&tree) } else { None });

        let display = project(&tree);
        let html = to_html(&display);
        let mut warnings = parsed.warnings;
        warnings.extend(ctx.warnings);
        debug!(
            bytes = src.len(),
            citations = ctx.citations.len(),
            warnings = warnings.len(),
            "Rendered post"
        );

        Ok(RenderResult {
            display,
            html,
            title,
            toc: ctx.toc,
            citations: ctx.citations,
            warnings,
            front_matter,
        })
    }
}

fn first_h1(tree: &SyntaxNode) -> Option<String> {
    tree.children
        .iter()
        .find(|node| matches!(node.kind, NodeKind::Heading { level: 1, .. }))
        .map(SyntaxNode::text_content)
}

/// Render a post with title extraction enabled.
pub fn render_markdown(src: &str) -> Result<RenderResult, ParseError> {
    MarkdownRenderer::new().with_title_extraction().render(src)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_front_matter_title_wins() {
        let result = render_markdown("---\ntitle: From Meta\n---\n# From Heading\n").unwrap();
        assert_eq!(result.title.as_deref(), Some("From Meta"));
        assert_eq!(result.html, "<h1>From Heading</h1>");
        assert!(result.front_matter.is_some());
    }

    #[test]
    fn test_without_title_extraction() {
        let result = MarkdownRenderer::new().render("# Heading\n").unwrap();
        assert_eq!(result.title, None);
    }

    #[test]
    fn test_warnings_are_collected() {
        let result = render_markdown(":::info\nnever closed\n").unwrap();
        assert_eq!(result.warnings, vec!["unclosed directive :::info at line 1"]);
        assert!(result.html.starts_with("<div class=\"info-box info-box-info\">"));
    }

    #[test]
    fn test_invalid_front_matter_is_an_error() {
        assert!(render_markdown("---\ntitle: [x\n---\nbody\n").is_err());
    }
}
