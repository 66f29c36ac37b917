//! Integer positions into a document.
//!
//! Position 0 is the start of the document's content. Entering or leaving a
//! non-leaf node counts one position; each character and each leaf counts
//! one. In `doc[paragraph["ab"]]` position 1 is before `a` and 3 after `b`.

use crate::error::EditorError;
use crate::model::DocNode;

/// A position resolved against a document: the chain of ancestors around it.
#[derive(Clone, Debug)]
pub struct ResolvedPos<'a> {
    pos: usize,
    frames: Vec<Frame<'a>>,
}

#[derive(Clone, Debug)]
struct Frame<'a> {
    node: &'a DocNode,
    /// Index of the child at or after the position.
    index: usize,
    /// Position where the node's content starts.
    start: usize,
}

impl<'a> ResolvedPos<'a> {
    pub fn resolve(doc: &'a DocNode, pos: usize) -> Result<Self, EditorError> {
        let size = doc.content_size();
        if pos > size {
            return Err(EditorError::OutOfRange { pos, size });
        }
        let mut frames = Vec::new();
        let mut node = doc;
        let mut start = 0;
        let mut parent_offset = pos;
        loop {
            let (index, offset) = child_index(node, parent_offset);
            let rem = parent_offset - offset;
            frames.push(Frame { node, index, start });
            if rem == 0 {
                break;
            }
            let child = &node.content[index];
            if child.is_text() || child.is_leaf() {
                break;
            }
            node = child;
            parent_offset = rem - 1;
            start += offset + 1;
        }
        Ok(Self { pos, frames })
    }

    #[must_use]
    pub fn pos(&self) -> usize {
        self.pos
    }

    /// Depth of the innermost ancestor (0 is the document).
    #[must_use]
    pub fn depth(&self) -> usize {
        self.frames.len() - 1
    }

    /// Ancestor at `depth`.
    #[must_use]
    pub fn node(&self, depth: usize) -> &'a DocNode {
        self.frames[depth].node
    }

    /// Innermost ancestor.
    #[must_use]
    pub fn parent(&self) -> &'a DocNode {
        self.node(self.depth())
    }

    /// Index into the ancestor at `depth` of the child at or after the position.
    #[must_use]
    pub fn index(&self, depth: usize) -> usize {
        self.frames[depth].index
    }

    /// Start of the content of the ancestor at `depth`.
    #[must_use]
    pub fn start(&self, depth: usize) -> usize {
        self.frames[depth].start
    }

    #[must_use]
    pub fn end(&self, depth: usize) -> usize {
        self.start(depth) + self.node(depth).content_size()
    }

    /// Position before the ancestor at `depth` (`depth > 0`).
    #[must_use]
    pub fn before(&self, depth: usize) -> usize {
        self.start(depth) - 1
    }

    /// Position after the ancestor at `depth` (`depth > 0`).
    #[must_use]
    pub fn after(&self, depth: usize) -> usize {
        self.before(depth) + self.node(depth).node_size()
    }

    /// Offset of the position inside its parent's content.
    #[must_use]
    pub fn parent_offset(&self) -> usize {
        self.pos - self.start(self.depth())
    }

    /// Child indices leading from the document to the ancestor at `depth`.
    #[must_use]
    pub fn path(&self, depth: usize) -> Vec<usize> {
        self.frames[..depth].iter().map(|frame| frame.index).collect()
    }
}

/// Child containing `offset` and the offset where it starts.
fn child_index(node: &DocNode, offset: usize) -> (usize, usize) {
    let mut cur = 0;
    for (index, child) in node.content.iter().enumerate() {
        let end = cur + child.node_size();
        if end > offset {
            return (index, cur);
        }
        cur = end;
    }
    (node.content.len(), cur)
}

/// Anchor and head of a selection; equal for a cursor.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Selection {
    pub anchor: usize,
    pub head: usize,
}

impl Selection {
    #[must_use]
    pub fn new(anchor: usize, head: usize) -> Self {
        Self { anchor, head }
    }

    #[must_use]
    pub fn cursor(pos: usize) -> Self {
        Self::new(pos, pos)
    }

    #[must_use]
    pub fn from(&self) -> usize {
        self.anchor.min(self.head)
    }

    #[must_use]
    pub fn to(&self) -> usize {
        self.anchor.max(self.head)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.anchor == self.head
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    // doc[ blockquote[ paragraph["ab"] ], paragraph["c"] ]
    fn doc() -> DocNode {
        DocNode::new("doc").with_content(vec![
            DocNode::new("blockquote").with_content(vec![
                DocNode::new("paragraph").with_content(vec![DocNode::text("ab", vec![])]),
            ]),
            DocNode::new("paragraph").with_content(vec![DocNode::text("c", vec![])]),
        ])
    }

    #[test]
    fn test_resolve_inside_nested_text() {
        let doc = doc();
        let pos = ResolvedPos::resolve(&doc, 3).unwrap();
        assert_eq!(pos.depth(), 2);
        assert_eq!(pos.parent().node_type, "paragraph");
        assert_eq!(pos.parent_offset(), 1);
        assert_eq!(pos.start(2), 2);
        assert_eq!(pos.before(2), 1);
        assert_eq!(pos.after(2), 5);
        assert_eq!(pos.before(1), 0);
        assert_eq!(pos.after(1), 6);
        assert_eq!(pos.path(2), vec![0, 0]);
    }

    #[test]
    fn test_resolve_between_blocks() {
        let doc = doc();
        let pos = ResolvedPos::resolve(&doc, 6).unwrap();
        assert_eq!(pos.depth(), 0);
        assert_eq!(pos.index(0), 1);

        let pos = ResolvedPos::resolve(&doc, 7).unwrap();
        assert_eq!(pos.depth(), 1);
        assert_eq!(pos.parent_offset(), 0);
        assert_eq!(pos.path(1), vec![1]);
    }

    #[test]
    fn test_resolve_out_of_range() {
        let doc = doc();
        assert_eq!(doc.content_size(), 9);
        assert!(ResolvedPos::resolve(&doc, 9).is_ok());
        assert!(matches!(
            ResolvedPos::resolve(&doc, 10),
            Err(EditorError::OutOfRange { pos: 10, size: 9 })
        ));
    }

    #[test]
    fn test_selection_bounds() {
        let selection = Selection::new(7, 3);
        assert_eq!((selection.from(), selection.to()), (3, 7));
        assert!(!selection.is_empty());
        assert!(Selection::cursor(4).is_empty());
    }
}
