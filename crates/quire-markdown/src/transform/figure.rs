//! Captioned figures from image titles.
//!
//! `![alt](url "caption")` becomes a figure holding the image (title cleared)
//! and a caption. An image that is the only content of its paragraph replaces
//! the paragraph.

use crate::ast::{NodeKind, SyntaxNode};

use super::{Transform, TransformContext};

#[derive(Debug, Default)]
pub struct FigureCaptionPass;

impl FigureCaptionPass {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Transform for FigureCaptionPass {
    fn name(&self) -> &'static str {
        "figure-caption"
    }

    fn apply(&mut self, tree: SyntaxNode, _ctx: &mut TransformContext) -> SyntaxNode {
        tree.map_siblings(&mut |_, children| children.into_iter().map(rewrite).collect())
    }
}

fn rewrite(node: SyntaxNode) -> SyntaxNode {
    match node.kind {
        NodeKind::Image {
            url,
            title: Some(title),
            alt,
        } if !title.trim().is_empty() => SyntaxNode::with_children(
            NodeKind::Figure,
            vec![
                SyntaxNode::new(NodeKind::Image {
                    url,
                    title: None,
                    alt,
                }),
                SyntaxNode::with_children(NodeKind::FigCaption, vec![SyntaxNode::text(title)]),
            ],
        ),
        // Children are rewritten first, so a lone figure here came from a lone image.
        NodeKind::Paragraph
            if node.children.len() == 1 && node.children[0].kind == NodeKind::Figure =>
        {
            node.children.into_iter().next().unwrap_or_else(|| SyntaxNode::new(NodeKind::Paragraph))
        }
        kind => SyntaxNode::with_children(kind, node.children),
    }
}
