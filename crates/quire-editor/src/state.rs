//! Editor state: the document, the selection and the edits applied to them.

use std::mem;
use std::rc::Rc;

use crate::error::{EditorError, SchemaError};
use crate::model::{DocNode, Mark, normalize_inline, split_inline};
use crate::position::{ResolvedPos, Selection};
use crate::schema::{ContentModel, Schema};

/// Document plus selection, always valid against the schema it was built with.
#[derive(Clone, Debug)]
pub struct EditorState {
    doc: DocNode,
    selection: Selection,
    schema: Rc<Schema>,
}

impl EditorState {
    /// State with the cursor at the start of the first text block.
    #[must_use]
    pub fn new(schema: Rc<Schema>, doc: DocNode) -> Self {
        let selection = Selection::cursor(first_cursor(&schema, &doc, &[]).unwrap_or(0));
        Self {
            doc,
            selection,
            schema,
        }
    }

    #[must_use]
    pub fn doc(&self) -> &DocNode {
        &self.doc
    }

    #[must_use]
    pub fn selection(&self) -> Selection {
        self.selection
    }

    #[must_use]
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn resolve(&self, pos: usize) -> Result<ResolvedPos<'_>, EditorError> {
        ResolvedPos::resolve(&self.doc, pos)
    }

    pub fn set_selection(&mut self, selection: Selection) -> Result<(), EditorError> {
        let size = self.doc.content_size();
        for pos in [selection.anchor, selection.head] {
            if pos > size {
                return Err(EditorError::OutOfRange { pos, size });
            }
        }
        self.selection = selection;
        Ok(())
    }

    /// Path of the text block around `pos` and the offset inside it.
    #[must_use]
    pub fn textblock_at(&self, pos: usize) -> Option<(Vec<usize>, usize)> {
        let resolved = self.resolve(pos).ok()?;
        let depth = resolved.depth();
        self.schema
            .is_textblock(&resolved.parent().node_type)
            .then(|| (resolved.path(depth), resolved.parent_offset()))
    }

    #[must_use]
    pub fn node_at(&self, path: &[usize]) -> Option<&DocNode> {
        self.doc.node_at(path)
    }

    /// Position at the start of the first text block inside the node at `path`.
    #[must_use]
    pub fn cursor_in(&self, path: &[usize]) -> Option<usize> {
        first_cursor(&self.schema, &self.doc, path)
    }

    /// Replace the node at `path` (not the document itself).
    pub fn replace_block(&mut self, path: &[usize], node: DocNode) -> Result<(), EditorError> {
        let (&index, parent_path) = path.split_last().ok_or_else(|| root_edit("replace"))?;
        let parent = self
            .doc
            .node_at_mut(parent_path)
            .filter(|parent| index < parent.content.len())
            .ok_or_else(|| root_edit("replace"))?;
        parent.content[index] = node;
        self.clamp_selection();
        Ok(())
    }

    /// Insert `node` as the next sibling of the node at `path`.
    pub fn insert_after(&mut self, path: &[usize], node: DocNode) -> Result<Vec<usize>, EditorError> {
        let (&index, parent_path) = path.split_last().ok_or_else(|| root_edit("insert"))?;
        let parent = self
            .doc
            .node_at_mut(parent_path)
            .filter(|parent| index < parent.content.len())
            .ok_or_else(|| root_edit("insert"))?;
        parent.content.insert(index + 1, node);
        let mut inserted = parent_path.to_vec();
        inserted.push(index + 1);
        Ok(inserted)
    }

    /// Replace the selection with `text` and put the cursor after it.
    ///
    /// The inserted text takes the marks of the text before it. The selection
    /// must lie inside a single text block.
    pub fn insert_text(&mut self, text: &str) -> Result<(), EditorError> {
        let (from, to) = (self.selection.from(), self.selection.to());
        let (path, start) = self.textblock_at(from).ok_or_else(|| not_text(&self.doc, from))?;
        let end = match self.textblock_at(to) {
            Some((to_path, end)) if to_path == path => end,
            _ => return Err(not_text(&self.doc, to)),
        };
        let schema = Rc::clone(&self.schema);
        let block = self
            .doc
            .node_at_mut(&path)
            .ok_or(EditorError::OutOfRange { pos: from, size: 0 })?;
        let (before, rest) = split_inline(mem::take(&mut block.content), start);
        let (_, after) = split_inline(rest, end - start);
        let marks = before.last().map(|node| node.marks.clone()).unwrap_or_default();
        let inserted = schema.text(text, marks)?;
        let mut content = before;
        content.push(inserted);
        content.extend(after);
        block.content = normalize_inline(content);
        self.selection = Selection::cursor(from + text.chars().count());
        Ok(())
    }

    /// Add `mark` to every inline node between `from` and `to`.
    ///
    /// A mark of the same type is replaced. Returns whether anything changed.
    pub fn add_mark(&mut self, from: usize, to: usize, mark: &Mark) -> Result<bool, EditorError> {
        let schema = Rc::clone(&self.schema);
        schema.mark_spec(&mark.mark_type)?;
        self.map_marks(from, to, &mut |marks| schema.add_mark(marks, mark.clone()))
    }

    /// Remove marks of `mark_type` between `from` and `to`.
    pub fn remove_mark(&mut self, from: usize, to: usize, mark_type: &str) -> Result<bool, EditorError> {
        self.map_marks(from, to, &mut |marks| {
            marks
                .iter()
                .filter(|mark| mark.mark_type != mark_type)
                .cloned()
                .collect()
        })
    }

    fn map_marks(
        &mut self,
        from: usize,
        to: usize,
        f: &mut dyn FnMut(&[Mark]) -> Vec<Mark>,
    ) -> Result<bool, EditorError> {
        let size = self.doc.content_size();
        if to > size {
            return Err(EditorError::OutOfRange { pos: to, size });
        }
        if from >= to {
            return Ok(false);
        }
        let schema = Rc::clone(&self.schema);
        Ok(map_marks_in(&schema, &mut self.doc, 0, from, to, f))
    }

    fn clamp_selection(&mut self) {
        let size = self.doc.content_size();
        self.selection = Selection::new(self.selection.anchor.min(size), self.selection.head.min(size));
    }
}

/// Rewrite the marks of inline nodes inside `from..to`. `start` is where
/// `node`'s content starts.
fn map_marks_in(
    schema: &Schema,
    node: &mut DocNode,
    start: usize,
    from: usize,
    to: usize,
    f: &mut dyn FnMut(&[Mark]) -> Vec<Mark>,
) -> bool {
    if node.is_text() || node.is_leaf() {
        return false;
    }
    let inline = schema
        .node_spec(&node.node_type)
        .is_ok_and(|spec| spec.content == ContentModel::Inline);
    if !inline {
        let mut changed = false;
        let mut pos = start;
        for child in &mut node.content {
            let size = child.node_size();
            if pos < to && pos + size > from {
                changed |= map_marks_in(schema, child, pos + 1, from, to, f);
            }
            pos += size;
        }
        return changed;
    }

    let mut changed = false;
    let mut out = Vec::with_capacity(node.content.len());
    let mut pos = start;
    for child in mem::take(&mut node.content) {
        let (child_start, child_end) = (pos, pos + child.node_size());
        pos = child_end;
        let (lo, hi) = (from.max(child_start), to.min(child_end));
        if lo >= hi {
            out.push(child);
            continue;
        }
        let (head, rest) = split_inline(vec![child], lo - child_start);
        let (middle, tail) = split_inline(rest, hi - lo);
        out.extend(head);
        for mut inner in middle {
            let marks = f(&inner.marks);
            if marks != inner.marks {
                inner.marks = marks;
                changed = true;
            }
            out.push(inner);
        }
        out.extend(tail);
    }
    node.content = normalize_inline(out);
    changed
}

/// Start of the first text block at or below `path`.
fn first_cursor(schema: &Schema, doc: &DocNode, path: &[usize]) -> Option<usize> {
    let mut node = doc.node_at(path)?;
    let mut pos = if path.is_empty() {
        0
    } else {
        doc.position_of(path)? + 1
    };
    loop {
        if schema.is_textblock(&node.node_type) {
            return Some(pos);
        }
        node = node.content.first().filter(|child| !child.is_text() && !child.is_leaf())?;
        pos += 1;
    }
}

fn root_edit(action: &str) -> EditorError {
    EditorError::Schema(SchemaError::InvalidContent {
        node: "doc".to_owned(),
        reason: format!("cannot {action} at this path"),
    })
}

fn not_text(doc: &DocNode, pos: usize) -> EditorError {
    let node = ResolvedPos::resolve(doc, pos)
        .map_or_else(|_| "doc".to_owned(), |resolved| resolved.parent().node_type.clone());
    EditorError::Schema(SchemaError::InvalidContent {
        node,
        reason: format!("position {pos} is not inside a single text block"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn state(markdown_blocks: Vec<DocNode>) -> EditorState {
        EditorState::new(
            Rc::new(Schema::core()),
            DocNode::new("doc").with_content(markdown_blocks),
        )
    }

    fn paragraph(content: Vec<DocNode>) -> DocNode {
        DocNode::new("paragraph").with_content(content)
    }

    #[test]
    fn test_cursor_starts_in_first_textblock() {
        let state = state(vec![
            DocNode::new("blockquote").with_content(vec![paragraph(vec![DocNode::text("a", vec![])])]),
        ]);
        assert_eq!(state.selection(), Selection::cursor(2));
        assert_eq!(state.textblock_at(2), Some((vec![0, 0], 0)));
        assert_eq!(state.textblock_at(0), None);
    }

    #[test]
    fn test_insert_text_inherits_marks() {
        let bold = Mark::new("strong");
        let mut state = state(vec![paragraph(vec![
            DocNode::text("ab", vec![bold.clone()]),
            DocNode::text("cd", vec![]),
        ])]);
        state.set_selection(Selection::cursor(3)).unwrap();
        state.insert_text("X").unwrap();
        assert_eq!(
            state.doc().content[0].content,
            vec![
                DocNode::text("abX", vec![bold]),
                DocNode::text("cd", vec![]),
            ]
        );
        assert_eq!(state.selection(), Selection::cursor(4));
    }

    #[test]
    fn test_insert_text_replaces_selection() {
        let mut state = state(vec![paragraph(vec![DocNode::text("hello", vec![])])]);
        state.set_selection(Selection::new(2, 5)).unwrap();
        state.insert_text("ipp").unwrap();
        assert_eq!(state.doc().content[0].text_content(), "hippo");
    }

    #[test]
    fn test_insert_text_across_blocks_fails() {
        let mut state = state(vec![
            paragraph(vec![DocNode::text("a", vec![])]),
            paragraph(vec![DocNode::text("b", vec![])]),
        ]);
        state.set_selection(Selection::new(1, 5)).unwrap();
        assert!(matches!(state.insert_text("x"), Err(EditorError::Schema(_))));
    }

    #[test]
    fn test_add_and_remove_mark_over_range() {
        let mut state = state(vec![
            paragraph(vec![DocNode::text("hello", vec![])]),
            paragraph(vec![DocNode::text("world", vec![])]),
        ]);
        let strong = Mark::new("strong");
        assert!(state.add_mark(3, 10, &strong).unwrap());
        assert_eq!(
            state.doc().content[0].content,
            vec![
                DocNode::text("he", vec![]),
                DocNode::text("llo", vec![strong.clone()]),
            ]
        );
        assert_eq!(
            state.doc().content[1].content,
            vec![
                DocNode::text("wo", vec![strong.clone()]),
                DocNode::text("rld", vec![]),
            ]
        );
        assert!(!state.add_mark(3, 6, &strong).unwrap());
        assert!(state.remove_mark(0, 14, "strong").unwrap());
        assert_eq!(
            state.doc().content[0].content,
            vec![DocNode::text("hello", vec![])]
        );
    }

    #[test]
    fn test_empty_range_changes_nothing() {
        let mut state = state(vec![paragraph(vec![DocNode::text("a", vec![])])]);
        assert!(!state.add_mark(2, 2, &Mark::new("strong")).unwrap());
        assert!(state.add_mark(0, 99, &Mark::new("strong")).is_err());
    }

    #[test]
    fn test_insert_after_and_cursor_in() {
        let mut state = state(vec![paragraph(vec![DocNode::text("a", vec![])])]);
        let path = state
            .insert_after(
                &[0],
                DocNode::new("blockquote").with_content(vec![paragraph(vec![])]),
            )
            .unwrap();
        assert_eq!(path, vec![1]);
        assert_eq!(state.cursor_in(&path), Some(5));
        assert!(state.replace_block(&[], paragraph(vec![])).is_err());
    }
}
