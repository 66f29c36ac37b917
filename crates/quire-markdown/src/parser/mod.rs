//! Markdown to [`SyntaxNode`] parsing.
//!
//! [`MarkdownParser`] wraps pulldown-cmark (tables, strikethrough) and adds the
//! syntax extensions registered on it: generic directives and tree passes
//! contributed by editor plugins.

mod directive;
mod events;
mod fence;

use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::ast::{NodeKind, SyntaxNode};

use directive::Block;

type PassFn = dyn Fn(SyntaxNode) -> SyntaxNode + Send + Sync;

/// Extension to the base markdown grammar.
#[derive(Clone)]
pub enum SyntaxExtension {
    /// `:::container`, `::leaf` and `:text` directives.
    Directives,
    /// Tree pass run after parsing.
    Pass {
        name: &'static str,
        run: Arc<PassFn>,
    },
}

impl SyntaxExtension {
    /// Wrap a closure as a named post-parse pass.
    pub fn pass<F>(name: &'static str, run: F) -> Self
    where
        F: Fn(SyntaxNode) -> SyntaxNode + Send + Sync + 'static,
    {
        Self::Pass {
            name,
            run: Arc::new(run),
        }
    }

    /// Name for logging.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Directives => "directives",
            Self::Pass { name, .. } => name,
        }
    }
}

impl fmt::Debug for SyntaxExtension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("SyntaxExtension").field(&self.name()).finish()
    }
}

/// Parse output: the tree plus recoverable anomalies.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Parsed {
    pub tree: SyntaxNode,
    pub warnings: Vec<String>,
}

/// Markdown parser with an ordered list of syntax extensions.
///
/// # Example
///
/// ```
/// use quire_markdown::{MarkdownParser, NodeKind};
///
/// let parsed = MarkdownParser::new().with_directives().parse(":::warning\nCareful\n:::\n");
/// let NodeKind::ContainerDirective(directive) = &parsed.tree.children[0].kind else {
///     panic!("expected a container directive");
/// };
/// assert_eq!(directive.name, "warning");
/// ```
#[derive(Clone, Debug, Default)]
pub struct MarkdownParser {
    extensions: Vec<SyntaxExtension>,
}

impl MarkdownParser {
    /// Plain CommonMark + GFM tables and strikethrough.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable directive syntax.
    #[must_use]
    pub fn with_directives(self) -> Self {
        self.with_extension(SyntaxExtension::Directives)
    }

    /// Append an extension.
    #[must_use]
    pub fn with_extension(mut self, extension: SyntaxExtension) -> Self {
        self.extensions.push(extension);
        self
    }

    /// Append several extensions in order.
    #[must_use]
    pub fn with_extensions(mut self, extensions: impl IntoIterator<Item = SyntaxExtension>) -> Self {
        self.extensions.extend(extensions);
        self
    }

    /// Registered extensions, in order.
    #[must_use]
    pub fn extensions(&self) -> &[SyntaxExtension] {
        &self.extensions
    }

    /// Parse a markdown document (without front matter).
    #[must_use]
    pub fn parse(&self, src: &str) -> Parsed {
        let directives = self
            .extensions
            .iter()
            .any(|ext| matches!(ext, SyntaxExtension::Directives));
        let mut warnings = Vec::new();

        let children = if directives {
            build_blocks(directive::split_containers(src, &mut warnings))
        } else {
            events::parse_blocks(src)
        };
        let mut tree = SyntaxNode::with_children(NodeKind::Root, children);

        if directives {
            tree = directive::recognize_inline(tree);
        }
        for extension in &self.extensions {
            if let SyntaxExtension::Pass { name, run } = extension {
                debug!(pass = *name, "Running syntax pass");
                tree = run(tree);
            }
        }

        Parsed { tree, warnings }
    }
}

fn build_blocks(blocks: Vec<Block>) -> Vec<SyntaxNode> {
    let mut out = Vec::new();
    for block in blocks {
        match block {
            Block::Markdown(src) => out.extend(events::parse_blocks(&src)),
            Block::Container { directive, body } => out.push(SyntaxNode::with_children(
                NodeKind::ContainerDirective(directive),
                build_blocks(body),
            )),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_without_directives_colons_are_text() {
        let parsed = MarkdownParser::new().parse(":::info\nhello\n:::\n");
        assert_eq!(parsed.tree.children.len(), 1);
        assert_eq!(parsed.tree.children[0].kind, NodeKind::Paragraph);
        assert_eq!(parsed.tree.text_content(), ":::info\nhello\n:::");
    }

    #[test]
    fn test_container_children_are_parsed() {
        let parsed = MarkdownParser::new()
            .with_directives()
            .parse(":::Info\n**bold** text\n\n- item\n:::\n");
        let container = &parsed.tree.children[0];
        assert!(matches!(&container.kind, NodeKind::ContainerDirective(d) if d.name == "Info"));
        assert_eq!(container.children.len(), 2);
        assert_eq!(container.children[0].children[0].kind, NodeKind::Strong);
        assert!(matches!(container.children[1].kind, NodeKind::List { .. }));
    }

    #[test]
    fn test_leaf_and_text_directives() {
        let parsed = MarkdownParser::new()
            .with_directives()
            .parse("::youtube[abc]\n\nPress :kbd[K] now\n");
        assert!(matches!(&parsed.tree.children[0].kind, NodeKind::LeafDirective(d) if d.label == "abc"));
        let para = &parsed.tree.children[1];
        assert!(matches!(&para.children[1].kind, NodeKind::TextDirective(d) if d.name == "kbd"));
    }

    #[test]
    fn test_passes_run_in_order() {
        let parser = MarkdownParser::new()
            .with_extension(SyntaxExtension::pass("first", |mut tree| {
                tree.children.push(SyntaxNode::paragraph("a"));
                tree
            }))
            .with_extension(SyntaxExtension::pass("second", |mut tree| {
                tree.children.push(SyntaxNode::paragraph("b"));
                tree
            }));
        let parsed = parser.parse("");
        assert_eq!(parsed.tree.text_content(), "ab");
        assert_eq!(format!("{:?}", parser.extensions()[0]), "SyntaxExtension(\"first\")");
    }
}
