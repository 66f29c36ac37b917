//! Conversion between the syntax tree and the document model.
//!
//! [`DocParser`] recognizes a [`SyntaxNode`] tree as a [`DocNode`] document;
//! [`DocSerializer`] writes a document back to syntax and markdown. Core
//! CommonMark/GFM kinds are handled here; everything else goes through the
//! registered [`NodeExtension`]s and [`MarkExtension`]s.

use std::rc::Rc;

use quire_markdown::transform::{ContainerPolicy, DirectiveFallback};
use quire_markdown::{Alignment, MarkdownParser, NodeKind, Pipeline, Stringifier, SyntaxNode};
use serde_json::Value;

use crate::error::EditorError;
use crate::extension::{MarkExtension, NodeExtension};
use crate::model::{Attrs, DocNode, Mark, normalize_inline};
use crate::schema::Schema;

/// Build an attribute map from pairs.
pub(crate) fn attrs<const N: usize>(pairs: [(&str, Value); N]) -> Attrs {
    pairs
        .into_iter()
        .map(|(name, value)| (name.to_owned(), value))
        .collect()
}

/// Markdown to document.
pub struct DocParser {
    schema: Rc<Schema>,
    markdown: MarkdownParser,
    nodes: Vec<Rc<dyn NodeExtension>>,
    marks: Vec<Rc<dyn MarkExtension>>,
}

impl DocParser {
    #[must_use]
    pub fn new(schema: Rc<Schema>, markdown: MarkdownParser) -> Self {
        Self {
            schema,
            markdown,
            nodes: Vec::new(),
            marks: Vec::new(),
        }
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

    #[must_use]
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub(crate) fn shared_schema(&self) -> Rc<Schema> {
        Rc::clone(&self.schema)
    }

    /// Parse markdown into a document.
    ///
    /// Directive nodes no extension claims are restored as text first, so
    /// the document never holds a node type it cannot display.
    pub fn parse(&self, src: &str) -> Result<DocNode, EditorError> {
        let parsed = self.markdown.parse(src);
        let containers = if self.nodes.iter().any(|node| node.keeps_containers()) {
            ContainerPolicy::KeepAll
        } else {
            ContainerPolicy::KeepNamed(Vec::new())
        };
        let (tree, _) = Pipeline::new()
            .with_pass(DirectiveFallback::new(containers))
            .run(parsed.tree);
        self.doc(&tree)
    }

    /// Recognize a root syntax node. An empty tree yields one empty paragraph.
    pub fn doc(&self, tree: &SyntaxNode) -> Result<DocNode, EditorError> {
        let mut blocks = self.blocks(&tree.children)?;
        if blocks.is_empty() {
            blocks.push(self.node("paragraph", Attrs::new(), Vec::new())?);
        }
        self.node("doc", Attrs::new(), blocks)
    }

    /// Build a node through the schema.
    pub fn node(
        &self,
        node_type: &str,
        attrs: Attrs,
        content: Vec<DocNode>,
    ) -> Result<DocNode, EditorError> {
        Ok(self.schema.node(node_type, attrs, content)?)
    }

    pub fn blocks(&self, nodes: &[SyntaxNode]) -> Result<Vec<DocNode>, EditorError> {
        nodes.iter().map(|node| self.block(node)).collect()
    }

    pub fn block(&self, node: &SyntaxNode) -> Result<DocNode, EditorError> {
        if let Some(result) = self.nodes.iter().find_map(|ext| ext.recognize(node, self)) {
            return result;
        }
        match &node.kind {
            NodeKind::Paragraph => self.node("paragraph", Attrs::new(), self.inline(&node.children)?),
            NodeKind::Heading { level, id } => self.node(
                "heading",
                attrs([("level", (*level).into()), ("id", id.clone().into())]),
                self.inline(&node.children)?,
            ),
            NodeKind::BlockQuote => self.node("blockquote", Attrs::new(), self.blocks(&node.children)?),
            NodeKind::List {
                ordered: true,
                start,
                tight,
            } => self.node(
                "ordered-list",
                attrs([("start", start.unwrap_or(1).into()), ("tight", (*tight).into())]),
                self.blocks(&node.children)?,
            ),
            NodeKind::List { tight, .. } => self.node(
                "bullet-list",
                attrs([("tight", (*tight).into())]),
                self.blocks(&node.children)?,
            ),
            NodeKind::ListItem => {
                let mut blocks = self.blocks(&node.children)?;
                if blocks.is_empty() {
                    blocks.push(self.node("paragraph", Attrs::new(), Vec::new())?);
                }
                self.node("list-item", Attrs::new(), blocks)
            }
            NodeKind::CodeBlock { lang, value } => {
                let content = if value.is_empty() {
                    Vec::new()
                } else {
                    vec![self.schema.text(value.clone(), Vec::new())?]
                };
                self.node("code-block", attrs([("language", lang.clone().into())]), content)
            }
            NodeKind::ThematicBreak => self.node("horizontal-rule", Attrs::new(), Vec::new()),
            NodeKind::Html { value } => {
                self.node("html", attrs([("value", value.clone().into())]), Vec::new())
            }
            NodeKind::Table { alignments } => {
                let names = alignments.iter().map(|a| alignment_name(*a).into()).collect();
                self.node(
                    "table",
                    attrs([("alignments", Value::Array(names))]),
                    self.blocks(&node.children)?,
                )
            }
            NodeKind::TableRow { header } => self.node(
                "table-row",
                attrs([("header", (*header).into())]),
                self.blocks(&node.children)?,
            ),
            NodeKind::TableCell => self.node("table-cell", Attrs::new(), self.inline(&node.children)?),
            kind => Err(EditorError::Unrecognized(kind.tag().to_owned())),
        }
    }

    /// Recognize phrasing content as marked inline nodes.
    pub fn inline(&self, nodes: &[SyntaxNode]) -> Result<Vec<DocNode>, EditorError> {
        let mut out = Vec::new();
        self.collect_inline(nodes, &[], &mut out)?;
        Ok(normalize_inline(out))
    }

    fn collect_inline(
        &self,
        nodes: &[SyntaxNode],
        marks: &[Mark],
        out: &mut Vec<DocNode>,
    ) -> Result<(), EditorError> {
        for node in nodes {
            if let Some(mark) = self.marks.iter().find_map(|ext| ext.recognize(node)) {
                self.collect_inline(&node.children, &self.schema.add_mark(marks, mark), out)?;
                continue;
            }
            let with = |name: &str| -> Result<Vec<Mark>, EditorError> {
                Ok(self.schema.add_mark(marks, self.schema.mark(name, Attrs::new())?))
            };
            match &node.kind {
                // Escapes are edited as text; the stringifier escapes
                // whatever would read as markup again.
                NodeKind::Text { value } | NodeKind::Escaped { value } => {
                    out.push(self.schema.text(value.clone(), marks.to_vec())?);
                }
                NodeKind::InlineHtml { value } => {
                    let mut html =
                        self.node("html-inline", attrs([("value", value.clone().into())]), Vec::new())?;
                    html.marks = marks.to_vec();
                    out.push(html);
                }
                NodeKind::InlineCode { value } => {
                    out.push(self.schema.text(value.clone(), with("inline-code")?)?);
                }
                NodeKind::Emphasis => self.collect_inline(&node.children, &with("emphasis")?, out)?,
                NodeKind::Strong => self.collect_inline(&node.children, &with("strong")?, out)?,
                NodeKind::Strikethrough => {
                    self.collect_inline(&node.children, &with("strike")?, out)?;
                }
                NodeKind::Link { url, title } => {
                    let link = self.schema.mark(
                        "link",
                        attrs([("href", url.clone().into()), ("title", title.clone().into())]),
                    )?;
                    self.collect_inline(&node.children, &self.schema.add_mark(marks, link), out)?;
                }
                NodeKind::Image { url, title, alt } => {
                    let mut image = self.node(
                        "image",
                        attrs([
                            ("src", url.clone().into()),
                            ("alt", alt.clone().into()),
                            ("title", title.clone().into()),
                        ]),
                        Vec::new(),
                    )?;
                    image.marks = marks.to_vec();
                    out.push(image);
                }
                NodeKind::Break => {
                    let mut hard_break = self.node("hard-break", Attrs::new(), Vec::new())?;
                    hard_break.marks = marks.to_vec();
                    out.push(hard_break);
                }
                kind => return Err(EditorError::Unrecognized(kind.tag().to_owned())),
            }
        }
        Ok(())
    }
}

/// Document to markdown.
pub struct DocSerializer {
    stringifier: Stringifier,
    nodes: Vec<Rc<dyn NodeExtension>>,
    marks: Vec<Rc<dyn MarkExtension>>,
}

impl DocSerializer {
    #[must_use]
    pub fn new(stringifier: Stringifier) -> Self {
        Self {
            stringifier,
            nodes: Vec::new(),
            marks: Vec::new(),
        }
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

    /// Write a document as markdown.
    pub fn serialize(&self, doc: &DocNode) -> Result<String, EditorError> {
        let tree = self.to_syntax(doc)?;
        Ok(self.stringifier.stringify(&tree)?)
    }

    /// Write a document as a root syntax node.
    pub fn to_syntax(&self, doc: &DocNode) -> Result<SyntaxNode, EditorError> {
        Ok(SyntaxNode::with_children(
            NodeKind::Root,
            self.blocks(&doc.content)?,
        ))
    }

    pub fn blocks(&self, nodes: &[DocNode]) -> Result<Vec<SyntaxNode>, EditorError> {
        nodes.iter().map(|node| self.block(node)).collect()
    }

    pub fn block(&self, node: &DocNode) -> Result<SyntaxNode, EditorError> {
        if let Some(ext) = self.nodes.iter().find(|ext| ext.name() == node.node_type) {
            return ext.serialize(node, self);
        }
        let tight = node.attr_bool("tight").unwrap_or(true);
        let (kind, children) = match node.node_type.as_str() {
            "paragraph" => (NodeKind::Paragraph, self.inline(&node.content)?),
            "heading" => {
                let level = node
                    .attr_u64("level")
                    .and_then(|level| u8::try_from(level).ok())
                    .unwrap_or(1);
                let id = node.attr_str("id").map(str::to_owned);
                (NodeKind::Heading { level, id }, self.inline(&node.content)?)
            }
            "blockquote" => (NodeKind::BlockQuote, self.blocks(&node.content)?),
            "bullet-list" => (
                NodeKind::List {
                    ordered: false,
                    start: None,
                    tight,
                },
                self.blocks(&node.content)?,
            ),
            "ordered-list" => (
                NodeKind::List {
                    ordered: true,
                    start: Some(node.attr_u64("start").unwrap_or(1)),
                    tight,
                },
                self.blocks(&node.content)?,
            ),
            "list-item" => (NodeKind::ListItem, self.blocks(&node.content)?),
            "code-block" => (
                NodeKind::CodeBlock {
                    lang: node.attr_str("language").map(str::to_owned),
                    value: node.text_content(),
                },
                Vec::new(),
            ),
            "horizontal-rule" => (NodeKind::ThematicBreak, Vec::new()),
            "html" => (
                NodeKind::Html {
                    value: node.attr_str("value").unwrap_or_default().to_owned(),
                },
                Vec::new(),
            ),
            "table" => {
                let alignments = node
                    .attrs
                    .get("alignments")
                    .and_then(Value::as_array)
                    .map(|names| {
                        names
                            .iter()
                            .map(|name| parse_alignment(name.as_str().unwrap_or_default()))
                            .collect()
                    })
                    .unwrap_or_default();
                (NodeKind::Table { alignments }, self.blocks(&node.content)?)
            }
            "table-row" => (
                NodeKind::TableRow {
                    header: node.attr_bool("header").unwrap_or(false),
                },
                self.blocks(&node.content)?,
            ),
            "table-cell" => (NodeKind::TableCell, self.inline(&node.content)?),
            other => return Err(EditorError::Unserializable(other.to_owned())),
        };
        Ok(SyntaxNode::with_children(kind, children))
    }

    /// Write marked inline nodes as nested phrasing content.
    ///
    /// Marks already open are kept open while following nodes carry them,
    /// so `*a **b***` stays one emphasis around a strong run.
    pub fn inline(&self, nodes: &[DocNode]) -> Result<Vec<SyntaxNode>, EditorError> {
        let mut root = Vec::new();
        let mut open: Vec<(&Mark, Vec<SyntaxNode>)> = Vec::new();
        for node in nodes {
            let marks: Vec<&Mark> = node
                .marks
                .iter()
                .filter(|mark| mark.mark_type != "inline-code")
                .collect();
            let keep = open
                .iter()
                .take_while(|(mark, _)| marks.contains(mark))
                .count();
            while open.len() > keep {
                self.close(&mut open, &mut root)?;
            }
            for mark in marks {
                if !open.iter().any(|(opened, _)| *opened == mark) {
                    open.push((mark, Vec::new()));
                }
            }
            let leaf = self.inline_leaf(node)?;
            match open.last_mut() {
                Some((_, children)) => children.push(leaf),
                None => root.push(leaf),
            }
        }
        while !open.is_empty() {
            self.close(&mut open, &mut root)?;
        }
        Ok(root)
    }

    fn close(
        &self,
        open: &mut Vec<(&Mark, Vec<SyntaxNode>)>,
        root: &mut Vec<SyntaxNode>,
    ) -> Result<(), EditorError> {
        let Some((mark, children)) = open.pop() else {
            return Ok(());
        };
        let wrapped = SyntaxNode::with_children(self.mark_kind(mark)?, children);
        match open.last_mut() {
            Some((_, parent)) => parent.push(wrapped),
            None => root.push(wrapped),
        }
        Ok(())
    }

    fn mark_kind(&self, mark: &Mark) -> Result<NodeKind, EditorError> {
        if let Some(ext) = self.marks.iter().find(|ext| ext.name() == mark.mark_type) {
            return Ok(ext.serialize(mark));
        }
        match mark.mark_type.as_str() {
            "strong" => Ok(NodeKind::Strong),
            "emphasis" => Ok(NodeKind::Emphasis),
            "strike" => Ok(NodeKind::Strikethrough),
            "link" => Ok(NodeKind::Link {
                url: mark.attr_str("href").unwrap_or_default().to_owned(),
                title: mark.attr_str("title").map(str::to_owned),
            }),
            other => Err(EditorError::Unserializable(other.to_owned())),
        }
    }

    fn inline_leaf(&self, node: &DocNode) -> Result<SyntaxNode, EditorError> {
        if let Some(value) = &node.text {
            let kind = if node.has_mark("inline-code") {
                NodeKind::InlineCode {
                    value: value.clone(),
                }
            } else {
                NodeKind::Text {
                    value: value.clone(),
                }
            };
            return Ok(SyntaxNode::new(kind));
        }
        match node.node_type.as_str() {
            "image" => Ok(SyntaxNode::new(NodeKind::Image {
                url: node.attr_str("src").unwrap_or_default().to_owned(),
                title: node.attr_str("title").map(str::to_owned),
                alt: node.attr_str("alt").unwrap_or_default().to_owned(),
            })),
            "html-inline" => Ok(SyntaxNode::new(NodeKind::InlineHtml {
                value: node.attr_str("value").unwrap_or_default().to_owned(),
            })),
            "hard-break" => Ok(SyntaxNode::new(NodeKind::Break)),
            _ => self.block(node),
        }
    }
}

fn alignment_name(alignment: Alignment) -> &'static str {
    match alignment {
        Alignment::None => "none",
        Alignment::Left => "left",
        Alignment::Center => "center",
        Alignment::Right => "right",
    }
}

fn parse_alignment(name: &str) -> Alignment {
    match name {
        "left" => Alignment::Left,
        "center" => Alignment::Center,
        "right" => Alignment::Right,
        _ => Alignment::None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn parser() -> DocParser {
        DocParser::new(Rc::new(Schema::core()), MarkdownParser::new().with_directives())
    }

    fn serializer() -> DocSerializer {
        DocSerializer::new(Stringifier::new())
    }

    #[test]
    fn test_marks_from_nested_syntax() {
        let doc = parser().parse("a *b **c*** [d](u \"t\")\n").unwrap();
        let inline = &doc.content[0].content;
        let marks = |i: usize| -> Vec<&str> {
            inline[i].marks.iter().map(|mark| mark.mark_type.as_str()).collect()
        };
        assert_eq!(inline[0].text.as_deref(), Some("a "));
        assert_eq!(marks(1), vec!["emphasis"]);
        assert_eq!(marks(2), vec!["strong", "emphasis"]);
        assert_eq!(marks(4), vec!["link"]);
        assert_eq!(inline[4].marks[0].attr_str("title"), Some("t"));
    }

    #[test]
    fn test_empty_markdown_is_one_paragraph() {
        let doc = parser().parse("").unwrap();
        assert_eq!(doc.content.len(), 1);
        assert_eq!(doc.content[0].node_type, "paragraph");
    }

    #[test]
    fn test_unclaimed_directives_become_text() {
        let doc = parser().parse("Meet at 19:00 or :30\n\n:::details\nbody\n:::\n").unwrap();
        let types: Vec<_> = doc.content.iter().map(|node| node.node_type.as_str()).collect();
        assert_eq!(types, vec!["paragraph", "paragraph", "paragraph", "paragraph"]);
        assert_eq!(doc.content[0].text_content(), "Meet at 19:00 or :30");
        assert_eq!(doc.content[1].text_content(), ":::details");
    }

    #[test]
    fn test_roundtrip_core_structure() {
        let src = "# Title\n\n> quote *em*\n\n1. one\n2. two `code`\n\n- [x](y)\n- ![alt](img.png)\n\n```rust\nfn main() {}\n```\n\n---\n\n| a | b |\n| :- | -: |\n| 1 | 2 |\n";
        let first = parser().parse(src).unwrap();
        let markdown = serializer().serialize(&first).unwrap();
        let second = parser().parse(&markdown).unwrap();
        assert_eq!(first, second);
        Schema::core().validate(&first).unwrap();
    }

    #[test]
    fn test_inline_html_is_an_atom() {
        let src = "Press <kbd>K</kbd> to \\<b>bold\\</b>\n";
        let doc = parser().parse(src).unwrap();
        let inline = &doc.content[0].content;
        assert_eq!(inline[1].node_type, "html-inline");
        assert_eq!(inline[1].attr_str("value"), Some("<kbd>"));
        assert_eq!(inline[4].text.as_deref(), Some(" to <b>bold</b>"));
        assert_eq!(serializer().serialize(&doc).unwrap(), src);
    }

    #[test]
    fn test_overlapping_marks_keep_outer_open() {
        let schema = Schema::core();
        let em = schema.mark("emphasis", Attrs::new()).unwrap();
        let strong = schema.mark("strong", Attrs::new()).unwrap();
        let nodes = vec![
            schema.text("a", vec![em.clone()]).unwrap(),
            schema.text("b", vec![em, strong]).unwrap(),
        ];
        let syntax = serializer().inline(&nodes).unwrap();
        assert_eq!(syntax.len(), 1);
        assert_eq!(syntax[0].kind, NodeKind::Emphasis);
        assert_eq!(syntax[0].children[1].kind, NodeKind::Strong);
    }

    #[test]
    fn test_unknown_node_is_unserializable() {
        let doc = DocNode::new("doc").with_content(vec![DocNode::new("mystery")]);
        assert!(matches!(
            serializer().serialize(&doc),
            Err(EditorError::Unserializable(name)) if name == "mystery"
        ));
    }
}
