//! Coloured inline spans: `[text]{.className}`.
//!
//! Adjacent text leaves are concatenated before matching, so a span that an
//! earlier pass split across leaves is still found. A span whose content holds
//! formatted nodes (`[**b**]{.red}`) is found by pairing an unmatched `[` at
//! the end of one text leaf with `]{.class}` at the start of a later sibling.

use std::collections::VecDeque;
use std::sync::LazyLock;

use regex::Regex;

use crate::ast::{NodeKind, SyntaxNode, merge_adjacent_text};

use super::{Transform, TransformContext};

static SPAN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[([^\]]*)\]\s*\{\.([a-z][a-z0-9-]*)\}").expect("invalid span regex")
});

pub(crate) static SPAN_CLOSE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\]\s*\{\.([a-z][a-z0-9-]*)\}").expect("invalid span regex"));

/// Splits `[text]{.class}` out of text into [`NodeKind::Span`] nodes.
#[derive(Debug, Default)]
pub struct ColouredSpanPass;

impl ColouredSpanPass {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Transform for ColouredSpanPass {
    fn name(&self) -> &'static str {
        "coloured-span"
    }

    fn apply(&mut self, tree: SyntaxNode, _ctx: &mut TransformContext) -> SyntaxNode {
        split_spans(tree)
    }
}

/// Apply span splitting to every sibling list of `tree`.
#[must_use]
pub fn split_spans(tree: SyntaxNode) -> SyntaxNode {
    tree.map_siblings(&mut |kind, children| {
        if matches!(kind, NodeKind::CodeBlock { .. }) {
            return children;
        }
        split_siblings(children)
    })
}

fn split_siblings(children: Vec<SyntaxNode>) -> Vec<SyntaxNode> {
    if !children.iter().any(SyntaxNode::is_text) {
        return children;
    }
    let mut queue: VecDeque<SyntaxNode> = merge_adjacent_text(children).into();
    let mut out = Vec::with_capacity(queue.len());

    while let Some(node) = queue.pop_front() {
        let value = match node.kind {
            NodeKind::Text { value } => value,
            kind => {
                out.push(SyntaxNode::with_children(kind, node.children));
                continue;
            }
        };
        let (mut pieces, tail) = split_text(&value);
        match open_bracket(&tail).and_then(|at| close_span(&queue).map(|close| (at, close))) {
            Some((at, close)) => {
                if at > 0 {
                    pieces.push(SyntaxNode::text(&tail[..at]));
                }
                let mut inner = Vec::new();
                if at + 1 < tail.len() {
                    inner.push(SyntaxNode::text(&tail[at + 1..]));
                }
                inner.extend(queue.drain(..close.index));
                let closing = queue.pop_front();
                let closing = closing.as_ref().and_then(SyntaxNode::as_text).unwrap_or_default();
                if close.bracket > 0 {
                    inner.push(SyntaxNode::text(&closing[..close.bracket]));
                }
                pieces.push(SyntaxNode::with_children(
                    NodeKind::Span { class: close.class },
                    merge_adjacent_text(inner),
                ));
                out.extend(pieces);
                if close.end < closing.len() {
                    queue.push_front(SyntaxNode::text(&closing[close.end..]));
                }
            }
            None => {
                if !tail.is_empty() {
                    pieces.push(SyntaxNode::text(tail));
                }
                out.extend(pieces);
            }
        }
    }
    out
}

/// Split one string around every complete span match.
///
/// Returns the produced nodes and the unmatched remainder after the last match.
fn split_text(value: &str) -> (Vec<SyntaxNode>, String) {
    let mut pieces = Vec::new();
    let mut last = 0;
    for caps in SPAN.captures_iter(value) {
        let (Some(whole), Some(content), Some(class)) = (caps.get(0), caps.get(1), caps.get(2))
        else {
            continue;
        };
        if whole.start() > last {
            pieces.push(SyntaxNode::text(&value[last..whole.start()]));
        }
        let children = if content.as_str().is_empty() {
            Vec::new()
        } else {
            vec![SyntaxNode::text(content.as_str())]
        };
        pieces.push(SyntaxNode::with_children(
            NodeKind::Span {
                class: class.as_str().to_owned(),
            },
            children,
        ));
        last = whole.end();
    }
    (pieces, value[last..].to_owned())
}

/// Byte offset of a trailing `[` with no `]` after it.
fn open_bracket(tail: &str) -> Option<usize> {
    let at = tail.rfind('[')?;
    (!tail[at..].contains(']')).then_some(at)
}

/// Locate the `]{.class}` that closes an open bracket among later siblings.
///
/// Text siblings are searched in order for the first `]`; a `[` seen before
/// it means the bracket does not close here.
fn close_span(queue: &VecDeque<SyntaxNode>) -> Option<SpanClose> {
    for (index, node) in queue.iter().enumerate() {
        let Some(text) = node.as_text() else {
            continue;
        };
        let Some(at) = text.find(']') else {
            if text.contains('[') {
                return None;
            }
            continue;
        };
        if text[..at].contains('[') {
            return None;
        }
        let caps = SPAN_CLOSE.captures(&text[at..])?;
        return Some(SpanClose {
            index,
            class: caps.get(1)?.as_str().to_owned(),
            bracket: at,
            end: at + caps.get(0)?.end(),
        });
    }
    None
}

struct SpanClose {
    /// Queue index of the closing text leaf.
    index: usize,
    class: String,
    /// Offset of `]` in that leaf.
    bracket: usize,
    /// Offset just past `}`.
    end: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::MarkdownParser;
    use pretty_assertions::assert_eq;

    fn paragraph(children: Vec<SyntaxNode>) -> SyntaxNode {
        SyntaxNode::with_children(
            NodeKind::Root,
            vec![SyntaxNode::with_children(NodeKind::Paragraph, children)],
        )
    }

    fn span(class: &str, children: Vec<SyntaxNode>) -> SyntaxNode {
        SyntaxNode::with_children(
            NodeKind::Span {
                class: class.to_owned(),
            },
            children,
        )
    }

    #[test]
    fn test_single_span() {
        let tree = split_spans(MarkdownParser::new().parse("a [hot]{.red} b\n").tree);
        assert_eq!(
            tree.children[0].children,
            vec![
                SyntaxNode::text("a "),
                span("red", vec![SyntaxNode::text("hot")]),
                SyntaxNode::text(" b"),
            ]
        );
    }

    #[test]
    fn test_span_across_adjacent_text_leaves() {
        let tree = split_spans(paragraph(vec![
            SyntaxNode::text("[ab"),
            SyntaxNode::text("c]{.red}"),
        ]));
        assert_eq!(
            tree.children[0].children,
            vec![span("red", vec![SyntaxNode::text("abc")])]
        );
    }

    #[test]
    fn test_span_around_formatted_content() {
        let tree = split_spans(MarkdownParser::new().parse("x [**b** c]{.blue-3} y\n").tree);
        let children = &tree.children[0].children;
        assert_eq!(children[0], SyntaxNode::text("x "));
        assert_eq!(
            children[1],
            span(
                "blue-3",
                vec![
                    SyntaxNode::with_children(NodeKind::Strong, vec![SyntaxNode::text("b")]),
                    SyntaxNode::text(" c"),
                ]
            )
        );
        assert_eq!(children[2], SyntaxNode::text(" y"));
    }

    #[test]
    fn test_invalid_class_is_untouched() {
        let tree = split_spans(MarkdownParser::new().parse("[a]{.Red} [b]{#id}\n").tree);
        assert_eq!(
            tree.children[0].children,
            vec![SyntaxNode::text("[a]{.Red} [b]{#id}")]
        );
    }

    #[test]
    fn test_multiple_spans_and_space_before_brace() {
        let tree = split_spans(paragraph(vec![SyntaxNode::text("[a]{.red}[b] {.green}")]));
        assert_eq!(
            tree.children[0].children,
            vec![
                span("red", vec![SyntaxNode::text("a")]),
                span("green", vec![SyntaxNode::text("b")]),
            ]
        );
    }

    #[test]
    fn test_code_is_not_scanned() {
        let tree = split_spans(MarkdownParser::new().parse("`[a]{.red}`\n").tree);
        assert!(matches!(
            tree.children[0].children[0].kind,
            NodeKind::InlineCode { .. }
        ));
    }
}
