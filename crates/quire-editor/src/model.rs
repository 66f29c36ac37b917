//! Document nodes and marks.
//!
//! A [`DocNode`] is either a text node (`text` is set, `content` empty), a
//! leaf (`is_leaf()`, such as an image or horizontal rule) or a container
//! with child nodes. Node types are strings so extensions can add their own;
//! the [`Schema`](crate::Schema) decides which types and contents are valid.

use serde_json::{Map, Value};

/// Attribute map of a node or mark.
pub type Attrs = Map<String, Value>;

/// Type name of text nodes.
pub const TEXT: &str = "text";

/// Annotation over a run of inline content.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Mark {
    pub mark_type: String,
    pub attrs: Attrs,
}

impl Mark {
    #[must_use]
    pub fn new(mark_type: impl Into<String>) -> Self {
        Self {
            mark_type: mark_type.into(),
            attrs: Attrs::new(),
        }
    }

    #[must_use]
    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attrs.insert(name.into(), value.into());
        self
    }

    #[must_use]
    pub fn attr_str(&self, name: &str) -> Option<&str> {
        self.attrs.get(name).and_then(Value::as_str)
    }
}

/// Node of the editable document tree.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DocNode {
    pub node_type: String,
    pub attrs: Attrs,
    pub content: Vec<DocNode>,
    /// Marks on inline nodes, sorted by schema rank.
    pub marks: Vec<Mark>,
    pub text: Option<String>,
    pub(crate) leaf: bool,
}

impl DocNode {
    /// Container node without attributes or content.
    #[must_use]
    pub fn new(node_type: impl Into<String>) -> Self {
        Self {
            node_type: node_type.into(),
            attrs: Attrs::new(),
            content: Vec::new(),
            marks: Vec::new(),
            text: None,
            leaf: false,
        }
    }

    /// Leaf node (no content, size 1).
    #[must_use]
    pub fn leaf(node_type: impl Into<String>) -> Self {
        Self {
            leaf: true,
            ..Self::new(node_type)
        }
    }

    #[must_use]
    pub fn text(value: impl Into<String>, marks: Vec<Mark>) -> Self {
        Self {
            text: Some(value.into()),
            marks,
            ..Self::new(TEXT)
        }
    }

    #[must_use]
    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attrs.insert(name.into(), value.into());
        self
    }

    #[must_use]
    pub fn with_content(mut self, content: Vec<DocNode>) -> Self {
        self.content = content;
        self
    }

    #[must_use]
    pub fn is_text(&self) -> bool {
        self.text.is_some()
    }

    #[must_use]
    pub fn is_leaf(&self) -> bool {
        self.leaf
    }

    #[must_use]
    pub fn attr_str(&self, name: &str) -> Option<&str> {
        self.attrs.get(name).and_then(Value::as_str)
    }

    #[must_use]
    pub fn attr_u64(&self, name: &str) -> Option<u64> {
        self.attrs.get(name).and_then(Value::as_u64)
    }

    #[must_use]
    pub fn attr_bool(&self, name: &str) -> Option<bool> {
        self.attrs.get(name).and_then(Value::as_bool)
    }

    #[must_use]
    pub fn has_mark(&self, mark_type: &str) -> bool {
        self.marks.iter().any(|mark| mark.mark_type == mark_type)
    }

    /// Size in positions: characters for text, 1 for leaves, content plus
    /// the open and close tokens otherwise.
    #[must_use]
    pub fn node_size(&self) -> usize {
        match &self.text {
            Some(text) => text.chars().count(),
            None if self.leaf => 1,
            None => self.content_size() + 2,
        }
    }

    #[must_use]
    pub fn content_size(&self) -> usize {
        self.content.iter().map(DocNode::node_size).sum()
    }

    /// Concatenated text of all descendants.
    #[must_use]
    pub fn text_content(&self) -> String {
        match &self.text {
            Some(text) => text.clone(),
            None => self.content.iter().map(DocNode::text_content).collect(),
        }
    }

    /// Descendant at `path` (child indices from this node).
    #[must_use]
    pub fn node_at(&self, path: &[usize]) -> Option<&DocNode> {
        path.iter().try_fold(self, |node, &index| node.content.get(index))
    }

    pub fn node_at_mut(&mut self, path: &[usize]) -> Option<&mut DocNode> {
        path.iter()
            .try_fold(self, |node, &index| node.content.get_mut(index))
    }

    /// Position just before the descendant at `path`.
    #[must_use]
    pub fn position_of(&self, path: &[usize]) -> Option<usize> {
        let mut node = self;
        let mut pos = 0;
        for (depth, &index) in path.iter().enumerate() {
            if depth > 0 {
                pos += 1;
            }
            pos += node.content.get(..index)?.iter().map(DocNode::node_size).sum::<usize>();
            node = node.content.get(index)?;
        }
        Some(pos)
    }
}

/// Merge adjacent text nodes with equal marks and drop empty ones.
#[must_use]
pub fn normalize_inline(content: Vec<DocNode>) -> Vec<DocNode> {
    let mut out: Vec<DocNode> = Vec::with_capacity(content.len());
    for node in content {
        if node.text.as_deref() == Some("") {
            continue;
        }
        if let (Some(prev), Some(text)) = (out.last_mut(), node.text.as_deref())
            && prev.marks == node.marks
            && let Some(prev_text) = prev.text.as_mut()
        {
            prev_text.push_str(text);
            continue;
        }
        out.push(node);
    }
    out
}

/// Split inline content at character offset `offset`.
#[must_use]
pub fn split_inline(content: Vec<DocNode>, offset: usize) -> (Vec<DocNode>, Vec<DocNode>) {
    let mut before = Vec::new();
    let mut after = Vec::new();
    let mut cur = 0;
    for node in content {
        let size = node.node_size();
        if cur + size <= offset {
            before.push(node);
        } else if cur >= offset {
            after.push(node);
        } else {
            let (head, tail) = split_text(node, offset - cur);
            before.push(head);
            after.push(tail);
        }
        cur += size;
    }
    (before, after)
}

/// Split a text node after `chars` characters.
fn split_text(node: DocNode, chars: usize) -> (DocNode, DocNode) {
    let text = node.text.clone().unwrap_or_default();
    let at = text
        .char_indices()
        .nth(chars)
        .map_or(text.len(), |(index, _)| index);
    let head = DocNode::text(&text[..at], node.marks.clone());
    let tail = DocNode::text(&text[at..], node.marks);
    (head, tail)
}
