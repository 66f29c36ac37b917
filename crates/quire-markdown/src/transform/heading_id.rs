//! Explicit heading ids: `### Title {#custom-id}`.

use std::sync::LazyLock;

use regex::Regex;

use crate::ast::{NodeKind, SyntaxNode};

use super::{Transform, TransformContext};

static TRAILING_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+\{#([^}]+)\}\s*$").expect("invalid heading id regex"));

/// Heading with an explicit id.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub struct TocEntry {
    pub level: u8,
    pub id: String,
    pub title: String,
}

/// Moves a trailing `{#id}` from heading text into the heading's id.
#[derive(Debug, Default)]
pub struct HeadingIdPass;

impl HeadingIdPass {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Transform for HeadingIdPass {
    fn name(&self) -> &'static str {
        "heading-id"
    }

    fn apply(&mut self, tree: SyntaxNode, ctx: &mut TransformContext) -> SyntaxNode {
        tree.map_nodes(&mut |node| {
            let SyntaxNode { kind, mut children } = node;
            let NodeKind::Heading { level, .. } = kind else {
                return SyntaxNode::with_children(kind, children);
            };
            let Some(id) = extract_id(&mut children) else {
                return SyntaxNode::with_children(kind, children);
            };
            let heading = SyntaxNode::with_children(
                NodeKind::Heading {
                    level,
                    id: Some(id.clone()),
                },
                children,
            );
            ctx.toc.push(TocEntry {
                level,
                id,
                title: heading.text_content(),
            });
            heading
        })
    }
}

fn extract_id(children: &mut Vec<SyntaxNode>) -> Option<String> {
    let last = children.last_mut()?;
    let NodeKind::Text { value } = &mut last.kind else {
        return None;
    };
    let caps = TRAILING_ID.captures(value)?;
    let id = caps.get(1)?.as_str().to_owned();
    let start = caps.get(0)?.start();
    value.truncate(start);
    let stripped_len = value.trim_end().len();
    value.truncate(stripped_len);

    if value.is_empty() {
        children.pop();
    }
    Some(id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::MarkdownParser;
    use pretty_assertions::assert_eq;

    fn run(src: &str) -> (SyntaxNode, TransformContext) {
        let parsed = MarkdownParser::new().parse(src);
        let mut ctx = TransformContext::default();
        let tree = HeadingIdPass::new().apply(parsed.tree, &mut ctx);
        (tree, ctx)
    }

    #[test]
    fn test_trailing_id_is_stripped() {
        let (tree, ctx) = run("### Title {#custom-id}\n");
        let heading = &tree.children[0];
        assert_eq!(
            heading.kind,
            NodeKind::Heading {
                level: 3,
                id: Some("custom-id".to_owned())
            }
        );
        assert_eq!(heading.text_content(), "Title");
        assert_eq!(
            ctx.toc,
            vec![TocEntry {
                level: 3,
                id: "custom-id".to_owned(),
                title: "Title".to_owned(),
            }]
        );
    }

    #[test]
    fn test_unicode_id_after_formatting() {
        let (tree, _) = run("## **計算機** Intro {#計算機}\n");
        let heading = &tree.children[0];
        assert!(matches!(&heading.kind, NodeKind::Heading { id: Some(id), .. } if id == "計算機"));
        assert_eq!(heading.text_content(), "計算機 Intro");
    }

    #[test]
    fn test_id_needs_leading_space() {
        let (tree, ctx) = run("# Title{#x}\n");
        assert!(matches!(tree.children[0].kind, NodeKind::Heading { id: None, .. }));
        assert!(ctx.toc.is_empty());
    }

    #[test]
    fn test_paragraph_is_ignored() {
        let (tree, _) = run("Text {#not-an-id}\n");
        assert_eq!(tree.children[0].text_content(), "Text {#not-an-id}");
    }
}
