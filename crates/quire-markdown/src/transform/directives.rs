//! Directive classification and the fallback guard.
//!
//! [`DirectiveToDisplay`] retags `:::info|warning|success|error` containers as
//! info boxes and leaves every other name alone. [`DirectiveFallback`] turns
//! the directive nodes nothing downstream can render back into the text they
//! were written as, so a stray `:30` never reaches a consumer as a node type it
//! does not know.

use tracing::debug;

use crate::ast::{InfoBoxKind, NodeKind, SyntaxNode, merge_adjacent_text};

use super::{Transform, TransformContext};

/// Retags known container directives as [`NodeKind::InfoBox`].
#[derive(Debug, Default)]
pub struct DirectiveToDisplay;

impl DirectiveToDisplay {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Transform for DirectiveToDisplay {
    fn name(&self) -> &'static str {
        "directive-to-display"
    }

    fn apply(&mut self, tree: SyntaxNode, _ctx: &mut TransformContext) -> SyntaxNode {
        tree.map_nodes(&mut |node| match &node.kind {
            NodeKind::ContainerDirective(directive) => {
                match InfoBoxKind::from_name(&directive.name) {
                    Some(kind) => SyntaxNode::with_children(NodeKind::InfoBox { kind }, node.children),
                    None => node,
                }
            }
            _ => node,
        })
    }
}

/// Which container directives survive the fallback guard.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum ContainerPolicy {
    /// Keep every container; a consumer classifies them.
    #[default]
    KeepAll,
    /// Keep containers with these names (case-insensitive), restore the rest as text.
    KeepNamed(Vec<String>),
}

impl ContainerPolicy {
    /// Keep only the info-box kinds.
    #[must_use]
    pub fn info_boxes() -> Self {
        Self::KeepNamed(
            InfoBoxKind::ALL
                .iter()
                .map(|kind| kind.as_str().to_owned())
                .collect(),
        )
    }

    fn keeps(&self, name: &str) -> bool {
        match self {
            Self::KeepAll => true,
            Self::KeepNamed(names) => names.iter().any(|n| n.eq_ignore_ascii_case(name)),
        }
    }
}

/// Restores unclassified directive nodes as plain text.
///
/// Text directives become text in place. Leaf directives become a paragraph
/// at block level and text inside phrasing content. Containers rejected by
/// the [`ContainerPolicy`] become a `:::name` paragraph, their children, and a
/// closing `:::` paragraph.
#[derive(Debug, Default)]
pub struct DirectiveFallback {
    containers: ContainerPolicy,
}

impl DirectiveFallback {
    #[must_use]
    pub fn new(containers: ContainerPolicy) -> Self {
        Self { containers }
    }
}

impl Transform for DirectiveFallback {
    fn name(&self) -> &'static str {
        "directive-fallback"
    }

    fn apply(&mut self, tree: SyntaxNode, _ctx: &mut TransformContext) -> SyntaxNode {
        let policy = &self.containers;
        tree.map_siblings(&mut |parent, children| {
            let inline = parent.accepts_phrasing();
            let mut out = Vec::with_capacity(children.len());
            let mut restored = false;
            for child in children {
                match child.kind {
                    NodeKind::TextDirective(directive) => {
                        restored = true;
                        debug!(name = %directive.name, "Restoring text directive");
                        let text = SyntaxNode::text(directive.as_written(1));
                        out.push(wrap_if_block(text, inline));
                    }
                    NodeKind::LeafDirective(directive) => {
                        restored = true;
                        debug!(name = %directive.name, "Restoring leaf directive");
                        let text = SyntaxNode::text(directive.as_written(2));
                        out.push(wrap_if_block(text, inline));
                    }
                    NodeKind::ContainerDirective(directive) if !policy.keeps(&directive.name) => {
                        debug!(name = %directive.name, "Restoring container directive");
                        let open = SyntaxNode::text(directive.as_written(3));
                        let close = SyntaxNode::text(":::");
                        if inline {
                            restored = true;
                            out.push(open);
                            out.extend(child.children);
                            out.push(close);
                        } else {
                            out.push(wrap_if_block(open, false));
                            out.extend(child.children);
                            out.push(wrap_if_block(close, false));
                        }
                    }
                    kind => out.push(SyntaxNode::with_children(kind, child.children)),
                }
            }
            if restored && inline {
                merge_adjacent_text(out)
            } else {
                out
            }
        })
    }
}

fn wrap_if_block(node: SyntaxNode, inline: bool) -> SyntaxNode {
    if inline {
        node
    } else {
        SyntaxNode::with_children(NodeKind::Paragraph, vec![node])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::MarkdownParser;
    use pretty_assertions::assert_eq;

    fn parse(src: &str) -> SyntaxNode {
        MarkdownParser::new().with_directives().parse(src).tree
    }

    #[test]
    fn test_known_kinds_are_retagged_case_insensitively() {
        let tree = parse(":::WARNING\nCareful\n:::\n\n:::success\nDone\n:::\n");
        let tree = DirectiveToDisplay::new().apply(tree, &mut TransformContext::default());
        assert_eq!(
            tree.children[0].kind,
            NodeKind::InfoBox {
                kind: InfoBoxKind::Warning
            }
        );
        assert_eq!(tree.children[0].text_content(), "Careful");
        assert_eq!(
            tree.children[1].kind,
            NodeKind::InfoBox {
                kind: InfoBoxKind::Success
            }
        );
    }

    #[test]
    fn test_unknown_kind_is_left_alone() {
        let tree = parse(":::note\nHi\n:::\n");
        let before = tree.clone();
        let tree = DirectiveToDisplay::new().apply(tree, &mut TransformContext::default());
        assert_eq!(tree, before);
    }

    #[test]
    fn test_text_directive_restored_inline() {
        let tree = parse("Meet at :30 sharp\n");
        let tree = DirectiveFallback::default().apply(tree, &mut TransformContext::default());
        assert_eq!(
            tree.children[0].children,
            vec![SyntaxNode::text("Meet at :30 sharp")]
        );
    }

    #[test]
    fn test_leaf_directive_restored_as_paragraph() {
        let tree = parse("::youtube[abc]\n");
        let tree = DirectiveFallback::default().apply(tree, &mut TransformContext::default());
        assert_eq!(tree.children, vec![SyntaxNode::paragraph("::youtube[abc]")]);
    }

    #[test]
    fn test_unclassified_container_restored() {
        let tree = parse(":::note{.wide}\nBody\n:::\n\n:::info\nKept\n:::\n");
        let mut pass = DirectiveFallback::new(ContainerPolicy::info_boxes());
        let tree = pass.apply(tree, &mut TransformContext::default());
        assert_eq!(tree.children[0], SyntaxNode::paragraph(":::note{.wide}"));
        assert_eq!(tree.children[1], SyntaxNode::paragraph("Body"));
        assert_eq!(tree.children[2], SyntaxNode::paragraph(":::"));
        assert!(matches!(tree.children[3].kind, NodeKind::ContainerDirective(_)));
    }

    #[test]
    fn test_nested_text_directive_inside_container() {
        let tree = parse(":::info\nAt :00 **now :x**\n:::\n");
        let tree = DirectiveFallback::default().apply(tree, &mut TransformContext::default());
        let para = &tree.children[0].children[0];
        assert_eq!(para.children[0].as_text(), Some("At :00 "));
        assert_eq!(para.children[1].children[0].as_text(), Some("now :x"));
    }
}
