//! Projection of the document into the editing surface.
//!
//! The editing surface is a [`DisplayNode`] tree: the document's nodes with
//! their marks as wrapping elements, plus widget [`Decoration`]s that view
//! plugins place between blocks.

use std::rc::Rc;

use quire_markdown::DisplayNode;

use crate::extension::{MarkExtension, NodeExtension};
use crate::model::{DocNode, Mark};

/// Widget shown just before the node at `path`. It is not part of the document.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Decoration {
    pub path: Vec<usize>,
    pub widget: DisplayNode,
}

/// Renders documents with the registered node and mark extensions.
#[derive(Clone, Default)]
pub struct DocView {
    nodes: Vec<Rc<dyn NodeExtension>>,
    marks: Vec<Rc<dyn MarkExtension>>,
}

impl DocView {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_nodes(mut self, nodes: impl IntoIterator<Item = Rc<dyn NodeExtension>>) -> Self {
        self.nodes.extend(nodes);
        self
    }

    #[must_use]
    pub fn with_marks(mut self, marks: impl IntoIterator<Item = Rc<dyn MarkExtension>>) -> Self {
        self.marks.extend(marks);
        self
    }

    /// Display nodes for the document's blocks, with `decorations` inserted.
    #[must_use]
    pub fn render(&self, doc: &DocNode, decorations: &[Decoration]) -> Vec<DisplayNode> {
        self.children(doc, &mut Vec::new(), decorations)
    }

    fn children(
        &self,
        node: &DocNode,
        path: &mut Vec<usize>,
        decorations: &[Decoration],
    ) -> Vec<DisplayNode> {
        let mut out = Vec::with_capacity(node.content.len());
        for (index, child) in node.content.iter().enumerate() {
            path.push(index);
            out.extend(
                decorations
                    .iter()
                    .filter(|decoration| decoration.path == *path)
                    .map(|decoration| decoration.widget.clone()),
            );
            out.push(self.node(child, path, decorations));
            path.pop();
        }
        out
    }

    fn node(&self, node: &DocNode, path: &mut Vec<usize>, decorations: &[Decoration]) -> DisplayNode {
        if let Some(text) = &node.text {
            return self.wrap_marks(&node.marks, DisplayNode::text(text));
        }
        if let Some(ext) = self.nodes.iter().find(|ext| ext.name() == node.node_type) {
            let children = self.children(node, path, decorations);
            return ext.project(node, children);
        }
        let element = |tag: &str, path: &mut Vec<usize>| {
            DisplayNode::element(tag).children(self.children(node, path, decorations))
        };
        match node.node_type.as_str() {
            "paragraph" => element("p", path),
            "heading" => {
                let level = node.attr_u64("level").unwrap_or(1);
                let heading = DisplayNode::element(format!("h{level}"));
                let heading = match node.attr_str("id") {
                    Some(id) => heading.attr("id", id),
                    None => heading,
                };
                heading.children(self.children(node, path, decorations))
            }
            "blockquote" => element("blockquote", path),
            "bullet-list" => element("ul", path),
            "ordered-list" => {
                let list = DisplayNode::element("ol");
                let list = match node.attr_u64("start") {
                    Some(start) if start != 1 => list.attr("start", start.to_string()),
                    _ => list,
                };
                list.children(self.children(node, path, decorations))
            }
            "list-item" => element("li", path),
            "code-block" => {
                let code = DisplayNode::element("code");
                let code = match node.attr_str("language") {
                    Some(language) => code.attr("class", format!("language-{language}")),
                    None => code,
                };
                DisplayNode::element("pre").child(code.child(DisplayNode::text(node.text_content())))
            }
            "horizontal-rule" => DisplayNode::element("hr"),
            // Raw HTML is edited as source, never rendered live.
            "html" => DisplayNode::element("div")
                .attr("class", "html-block")
                .child(DisplayNode::text(node.attr_str("value").unwrap_or_default())),
            "table" => element("table", path),
            "table-row" => {
                let cell = if node.attr_bool("header").unwrap_or(false) {
                    "th"
                } else {
                    "td"
                };
                let mut row = DisplayNode::element("tr");
                for (index, child) in node.content.iter().enumerate() {
                    path.push(index);
                    row = row.child(
                        DisplayNode::element(cell).children(self.children(child, path, decorations)),
                    );
                    path.pop();
                }
                row
            }
            "table-cell" => element("td", path),
            "image" => {
                let image = DisplayNode::element("img").attr("src", node.attr_str("src").unwrap_or_default());
                let image = match node.attr_str("title") {
                    Some(title) => image.attr("title", title),
                    None => image,
                };
                let image = image.attr("alt", node.attr_str("alt").unwrap_or_default());
                self.wrap_marks(&node.marks, image)
            }
            "html-inline" => {
                let html = DisplayNode::element("code")
                    .attr("class", "html-inline")
                    .child(DisplayNode::text(node.attr_str("value").unwrap_or_default()));
                self.wrap_marks(&node.marks, html)
            }
            "hard-break" => self.wrap_marks(&node.marks, DisplayNode::element("br")),
            other => DisplayNode::element("div")
                .attr("data-node-type", other)
                .children(self.children(node, path, decorations)),
        }
    }

    /// Wrap `inner` in one element per mark, the first mark outermost.
    fn wrap_marks(&self, marks: &[Mark], inner: DisplayNode) -> DisplayNode {
        marks
            .iter()
            .rev()
            .fold(inner, |inner, mark| self.mark(mark).child(inner))
    }

    fn mark(&self, mark: &Mark) -> DisplayNode {
        if let Some(ext) = self.marks.iter().find(|ext| ext.name() == mark.mark_type) {
            return ext.project(mark);
        }
        match mark.mark_type.as_str() {
            "strong" => DisplayNode::element("strong"),
            "emphasis" => DisplayNode::element("em"),
            "strike" => DisplayNode::element("del"),
            "inline-code" => DisplayNode::element("code"),
            "link" => {
                let link = DisplayNode::element("a").attr("href", mark.attr_str("href").unwrap_or_default());
                match mark.attr_str("title") {
                    Some(title) => link.attr("title", title),
                    None => link,
                }
            }
            other => DisplayNode::element("span").attr("data-mark", other),
        }
    }
}
