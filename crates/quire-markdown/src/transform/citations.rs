//! Citation numbering.
//!
//! Two syntaxes cite a key: `[cite:key]` and `^[key]`. Keys are numbered by
//! first appearance; each occurrence becomes a [`NodeKind::Citation`] marker.
//! The ordered list following each "References" or "Bibliography" heading
//! gets a backlink per item, numbered by the item's position. Keys are taken
//! as written, so `[cite: a]` and `[cite:a]` are different keys.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, warn};

use crate::ast::{NodeKind, SyntaxNode};

use super::{Transform, TransformContext};

static CITATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[cite:([^\]]+)\]|\^\[([^\]]+)\]").expect("valid citation regex")
});

/// Citation keys with their numbers, in first-seen order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub struct CitationRegistry {
    keys: Vec<String>,
    #[cfg_attr(feature = "serialize", serde(skip))]
    numbers: HashMap<String, usize>,
}

impl CitationRegistry {
    /// Number for `key`, assigning the next one on first sight.
    pub fn resolve(&mut self, key: &str) -> usize {
        if let Some(&number) = self.numbers.get(key) {
            return number;
        }
        self.keys.push(key.to_owned());
        let number = self.keys.len();
        self.numbers.insert(key.to_owned(), number);
        number
    }

    /// Number already assigned to `key`.
    #[must_use]
    pub fn number(&self, key: &str) -> Option<usize> {
        self.numbers.get(key).copied()
    }

    /// Keys in number order (index 0 is number 1).
    #[must_use]
    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

/// Numbers citations and adds reference-list backlinks.
#[derive(Debug, Default)]
pub struct CitationPass {
    /// Occurrences seen so far, per number.
    occurrences: HashMap<usize, usize>,
}

impl CitationPass {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn number_node(&mut self, node: SyntaxNode, registry: &mut CitationRegistry) -> SyntaxNode {
        // Markers are links; never nest them inside another link.
        if matches!(node.kind, NodeKind::Link { .. }) {
            return node;
        }
        let SyntaxNode { kind, children } = node;
        let mut out = Vec::with_capacity(children.len());
        for child in children {
            match child.as_text() {
                Some(text) if CITATION.is_match(text) => {
                    out.extend(self.split_text(text, registry));
                }
                _ => out.push(self.number_node(child, registry)),
            }
        }
        SyntaxNode::with_children(kind, out)
    }

    fn split_text(&mut self, text: &str, registry: &mut CitationRegistry) -> Vec<SyntaxNode> {
        let mut out = Vec::new();
        let mut last = 0;
        for caps in CITATION.captures_iter(text) {
            let Some(whole) = caps.get(0) else {
                continue;
            };
            let Some(key) = caps.get(1).or_else(|| caps.get(2)) else {
                continue;
            };
            let key = key.as_str();
            if whole.start() > last {
                out.push(SyntaxNode::text(&text[last..whole.start()]));
            }
            let number = registry.resolve(key);
            let occurrence = self.occurrences.entry(number).or_insert(0);
            *occurrence += 1;
            out.push(SyntaxNode::new(NodeKind::Citation {
                key: key.to_owned(),
                number,
                occurrence: *occurrence,
            }));
            last = whole.end();
        }
        if last < text.len() {
            out.push(SyntaxNode::text(&text[last..]));
        }
        out
    }
}

impl Transform for CitationPass {
    fn name(&self) -> &'static str {
        "citations"
    }

    fn apply(&mut self, tree: SyntaxNode, ctx: &mut TransformContext) -> SyntaxNode {
        self.occurrences.clear();
        let tree = self.number_node(tree, &mut ctx.citations);
        debug!(keys = ctx.citations.len(), "Numbered citations");

        let distinct = ctx.citations.len();
        let warnings = &mut ctx.warnings;
        tree.map_siblings(&mut |_, children| add_backlinks(children, distinct, warnings))
    }
}

fn is_reference_heading(node: &SyntaxNode) -> bool {
    if !matches!(node.kind, NodeKind::Heading { .. }) {
        return false;
    }
    let title = node.text_content();
    let title = title.trim();
    title.eq_ignore_ascii_case("references") || title.eq_ignore_ascii_case("bibliography")
}

fn add_backlinks(
    mut children: Vec<SyntaxNode>,
    distinct: usize,
    warnings: &mut Vec<String>,
) -> Vec<SyntaxNode> {
    let mut lists = Vec::new();
    for (heading, _) in children.iter().enumerate().filter(|(_, n)| is_reference_heading(n)) {
        let next = children[heading + 1..]
            .iter()
            .position(|n| matches!(n.kind, NodeKind::List { ordered: true, .. }))
            .map(|offset| heading + 1 + offset);
        if let Some(list) = next
            && !lists.contains(&list)
        {
            lists.push(list);
        }
    }

    for list in lists {
        let items = &mut children[list].children;
        if items.len() != distinct {
            warn!(
                items = items.len(),
                cited = distinct,
                "Reference list length differs from cited keys"
            );
            warnings.push(format!(
                "reference list has {} items but {} distinct keys were cited",
                items.len(),
                distinct
            ));
        }
        for (idx, item) in items.iter_mut().enumerate() {
            // Items that do not open with a paragraph get no backlink.
            if let Some(first) = item.children.first_mut()
                && first.kind == NodeKind::Paragraph
            {
                let backlink = NodeKind::CitationBacklink { number: idx + 1 };
                first.children.insert(0, SyntaxNode::new(backlink));
            }
        }
    }
    children
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::MarkdownParser;
    use pretty_assertions::assert_eq;

    fn run(src: &str) -> (SyntaxNode, TransformContext) {
        let parsed = MarkdownParser::new().with_directives().parse(src);
        let mut ctx = TransformContext::default();
        let tree = CitationPass::new().apply(parsed.tree, &mut ctx);
        (tree, ctx)
    }

    fn markers(tree: &SyntaxNode) -> Vec<(String, usize, usize)> {
        let mut out = Vec::new();
        tree.walk(&mut |node| {
            if let NodeKind::Citation {
                key,
                number,
                occurrence,
            } = &node.kind
            {
                out.push((key.clone(), *number, *occurrence));
            }
        });
        out
    }

    #[test]
    fn test_numbering_follows_first_occurrence() {
        let (tree, ctx) = run("See ^[a] and [cite:b] and [cite:a]\n");
        assert_eq!(ctx.citations.number("a"), Some(1));
        assert_eq!(ctx.citations.number("b"), Some(2));
        assert_eq!(
            markers(&tree),
            vec![
                ("a".to_owned(), 1, 1),
                ("b".to_owned(), 2, 1),
                ("a".to_owned(), 1, 2),
            ]
        );
        let para = &tree.children[0];
        assert_eq!(para.children[0].as_text(), Some("See "));
        assert_eq!(para.children[2].as_text(), Some(" and "));
    }

    #[test]
    fn test_numbering_spans_blocks_in_document_order() {
        let (tree, _) = run("# Intro [cite:x]\n\n- item ^[y]\n\n> quote [cite:x]\n");
        let numbers: Vec<_> = markers(&tree).into_iter().map(|(_, n, _)| n).collect();
        assert_eq!(numbers, vec![1, 2, 1]);
    }

    #[test]
    fn test_no_citations_is_untouched() {
        let (tree, ctx) = run("Plain [link text] here\n");
        assert!(ctx.citations.is_empty());
        assert_eq!(tree.children[0].children.len(), 1);
    }

    #[test]
    fn test_backlinks_by_position() {
        let src = "A [cite:b] B [cite:a]\n\n## References\n\n1. Alpha\n2. Beta\n";
        let (tree, ctx) = run(src);
        assert!(ctx.warnings.is_empty());
        let list = &tree.children[2];
        for (idx, item) in list.children.iter().enumerate() {
            assert_eq!(
                item.children[0].children[0].kind,
                NodeKind::CitationBacklink { number: idx + 1 }
            );
        }
    }

    #[test]
    fn test_backlinks_warn_on_length_mismatch() {
        let (_, ctx) = run("Only [cite:a]\n\n# bibliography\n\n1. One\n2. Two\n");
        assert_eq!(
            ctx.warnings,
            vec!["reference list has 2 items but 1 distinct keys were cited"]
        );
    }

    fn backlink_numbers(list: &SyntaxNode) -> Vec<Option<usize>> {
        list.children
            .iter()
            .map(|item| {
                item.children
                    .first()
                    .and_then(|first| first.children.first())
                    .and_then(|node| match node.kind {
                        NodeKind::CitationBacklink { number } => Some(number),
                        _ => None,
                    })
            })
            .collect()
    }

    #[test]
    fn test_every_reference_heading_gets_backlinks() {
        let src = "A [cite:a]\n\n## References\n\n1. One\n\n## Bibliography\n\n1. Uno\n";
        let (tree, ctx) = run(src);
        assert!(ctx.warnings.is_empty());
        assert_eq!(backlink_numbers(&tree.children[2]), vec![Some(1)]);
        assert_eq!(backlink_numbers(&tree.children[4]), vec![Some(1)]);
    }

    #[test]
    fn test_item_without_leading_paragraph_gets_no_backlink() {
        let src = "[cite:a] [cite:b]\n\n## References\n\n1. ```\n   code\n   ```\n2. Two\n";
        let (tree, _) = run(src);
        let list = &tree.children[2];
        assert!(matches!(list.children[0].children[0].kind, NodeKind::CodeBlock { .. }));
        assert_eq!(backlink_numbers(list), vec![None, Some(2)]);
    }

    #[test]
    fn test_keys_are_not_trimmed() {
        let (tree, ctx) = run("[cite:a] and [cite: a]\n");
        assert_eq!(ctx.citations.keys(), ["a".to_owned(), " a".to_owned()]);
        assert_eq!(
            markers(&tree),
            vec![("a".to_owned(), 1, 1), (" a".to_owned(), 2, 1)]
        );
    }

    #[test]
    fn test_unordered_list_after_references_is_ignored() {
        let (tree, _) = run("## References\n\n- a\n");
        let mut backlinks = 0;
        tree.walk(&mut |node| {
            if matches!(node.kind, NodeKind::CitationBacklink { .. }) {
                backlinks += 1;
            }
        });
        assert_eq!(backlinks, 0);
    }
}
