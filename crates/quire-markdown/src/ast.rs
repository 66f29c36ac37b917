//! Syntax tree for parsed markdown.
//!
//! Every node is a [`SyntaxNode`]: a [`NodeKind`] tag (with the attributes of
//! that kind) and an ordered list of children. Transform passes take a tree by
//! value and return the rebuilt tree, so a pass always owns what it rewrites.

use std::fmt;

use crate::attributes::Attributes;

/// Info-box flavours accepted by `:::kind` container directives.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
#[cfg_attr(feature = "serialize", serde(rename_all = "lowercase"))]
pub enum InfoBoxKind {
    #[default]
    Info,
    Warning,
    Success,
    Error,
}

impl InfoBoxKind {
    /// All kinds, in menu order.
    pub const ALL: [Self; 4] = [Self::Info, Self::Warning, Self::Success, Self::Error];

    /// Match a directive name case-insensitively.
    ///
    /// ```
    /// use quire_markdown::InfoBoxKind;
    ///
    /// assert_eq!(InfoBoxKind::from_name("WARNING"), Some(InfoBoxKind::Warning));
    /// assert_eq!(InfoBoxKind::from_name("note"), None);
    /// ```
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "info" => Some(Self::Info),
            "warning" => Some(Self::Warning),
            "success" => Some(Self::Success),
            "error" => Some(Self::Error),
            _ => None,
        }
    }

    /// Lower-case name used in markdown and CSS classes.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Success => "success",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for InfoBoxKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Table column alignment.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub enum Alignment {
    #[default]
    None,
    Left,
    Center,
    Right,
}

/// Name, label and attributes shared by the three directive forms.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub struct Directive {
    /// Directive name as written (case preserved).
    pub name: String,
    /// Bracketed label: `[label]`.
    pub label: String,
    /// Braced attributes: `{#id .class key="value"}`.
    pub attributes: Attributes,
    /// Text after the leading colons exactly as parsed; `None` when built in
    /// code. Clear it after changing the other fields.
    #[cfg_attr(feature = "serialize", serde(skip))]
    pub source: Option<String>,
}

impl Directive {
    /// Create a directive with no label or attributes.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Source syntax with the given number of leading colons.
    ///
    /// ```
    /// use quire_markdown::{Attributes, Directive};
    ///
    /// let directive = Directive {
    ///     name: "kbd".to_owned(),
    ///     label: "Ctrl".to_owned(),
    ///     attributes: Attributes::parse(".key"),
    ///     source: None,
    /// };
    /// assert_eq!(directive.to_syntax(1), ":kbd[Ctrl]{.key}");
    /// ```
    #[must_use]
    pub fn to_syntax(&self, colons: usize) -> String {
        let mut out = ":".repeat(colons);
        out.push_str(&self.name);
        if !self.label.is_empty() {
            out.push('[');
            out.push_str(&self.label);
            out.push(']');
        }
        out.push_str(&self.attributes.to_syntax());
        out
    }

    /// Syntax as it was written, so `:x[]{}` stays `:x[]{}`. Falls back to
    /// [`Directive::to_syntax`] for directives built in code.
    #[must_use]
    pub fn as_written(&self, colons: usize) -> String {
        match &self.source {
            Some(source) => format!("{}{source}", ":".repeat(colons)),
            None => self.to_syntax(colons),
        }
    }
}

/// Node type with the attributes that belong to it.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
#[cfg_attr(feature = "serialize", serde(tag = "type", rename_all = "camelCase"))]
pub enum NodeKind {
    Root,
    Paragraph,
    Heading {
        level: u8,
        id: Option<String>,
    },
    BlockQuote,
    List {
        ordered: bool,
        start: Option<u64>,
        tight: bool,
    },
    ListItem,
    CodeBlock {
        lang: Option<String>,
        value: String,
    },
    ThematicBreak,
    Html {
        value: String,
    },
    Table {
        alignments: Vec<Alignment>,
    },
    TableRow {
        header: bool,
    },
    TableCell,
    Text {
        value: String,
    },
    /// Characters written with a backslash escape (`\[`). Never scanned for
    /// extension syntax.
    Escaped {
        value: String,
    },
    Emphasis,
    Strong,
    Strikethrough,
    InlineCode {
        value: String,
    },
    InlineHtml {
        value: String,
    },
    Link {
        url: String,
        title: Option<String>,
    },
    Image {
        url: String,
        title: Option<String>,
        alt: String,
    },
    Break,
    /// `:::name` ... `:::`
    ContainerDirective(Directive),
    /// `::name[label]{attrs}` on its own line.
    LeafDirective(Directive),
    /// `:name[label]{attrs}` inside text.
    TextDirective(Directive),
    /// `[content]{.class}`
    Span {
        class: String,
    },
    /// Inline reference marker produced by the citation pass.
    Citation {
        key: String,
        number: usize,
        occurrence: usize,
    },
    /// Backlink prepended to a reference list item.
    CitationBacklink {
        number: usize,
    },
    Figure,
    FigCaption,
    /// Container directive classified for display.
    InfoBox {
        kind: InfoBoxKind,
    },
}

impl NodeKind {
    /// Stable type tag, used to key stringify handlers.
    #[must_use]
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Root => "root",
            Self::Paragraph => "paragraph",
            Self::Heading { .. } => "heading",
            Self::BlockQuote => "blockquote",
            Self::List { .. } => "list",
            Self::ListItem => "listItem",
            Self::CodeBlock { .. } => "code",
            Self::ThematicBreak => "thematicBreak",
            Self::Html { .. } => "html",
            Self::Table { .. } => "table",
            Self::TableRow { .. } => "tableRow",
            Self::TableCell => "tableCell",
            Self::Text { .. } => "text",
            Self::Escaped { .. } => "escaped",
            Self::Emphasis => "emphasis",
            Self::Strong => "strong",
            Self::Strikethrough => "delete",
            Self::InlineCode { .. } => "inlineCode",
            Self::InlineHtml { .. } => "inlineHtml",
            Self::Link { .. } => "link",
            Self::Image { .. } => "image",
            Self::Break => "break",
            Self::ContainerDirective(_) => "containerDirective",
            Self::LeafDirective(_) => "leafDirective",
            Self::TextDirective(_) => "textDirective",
            Self::Span { .. } => "spanClass",
            Self::Citation { .. } => "citation",
            Self::CitationBacklink { .. } => "citationBacklink",
            Self::Figure => "figure",
            Self::FigCaption => "figcaption",
            Self::InfoBox { .. } => "infoBox",
        }
    }

    /// True for kinds that plain CommonMark/GFM produces.
    #[must_use]
    pub fn is_core(&self) -> bool {
        !matches!(
            self,
            Self::ContainerDirective(_)
                | Self::LeafDirective(_)
                | Self::TextDirective(_)
                | Self::Span { .. }
                | Self::Citation { .. }
                | Self::CitationBacklink { .. }
                | Self::Figure
                | Self::FigCaption
                | Self::InfoBox { .. }
        )
    }

    /// True for flow (block-level) kinds.
    #[must_use]
    pub fn is_block(&self) -> bool {
        matches!(
            self,
            Self::Root
                | Self::Paragraph
                | Self::Heading { .. }
                | Self::BlockQuote
                | Self::List { .. }
                | Self::ListItem
                | Self::CodeBlock { .. }
                | Self::ThematicBreak
                | Self::Html { .. }
                | Self::Table { .. }
                | Self::TableRow { .. }
                | Self::TableCell
                | Self::ContainerDirective(_)
                | Self::LeafDirective(_)
                | Self::Figure
                | Self::InfoBox { .. }
        )
    }

    /// True when children of this kind are phrasing (inline) content.
    #[must_use]
    pub fn accepts_phrasing(&self) -> bool {
        matches!(
            self,
            Self::Paragraph
                | Self::Heading { .. }
                | Self::Emphasis
                | Self::Strong
                | Self::Strikethrough
                | Self::Link { .. }
                | Self::ListItem
                | Self::TableCell
                | Self::Span { .. }
                | Self::FigCaption
        )
    }
}

/// A node in the syntax tree.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub struct SyntaxNode {
    #[cfg_attr(feature = "serialize", serde(flatten))]
    pub kind: NodeKind,
    #[cfg_attr(
        feature = "serialize",
        serde(skip_serializing_if = "Vec::is_empty")
    )]
    pub children: Vec<SyntaxNode>,
}

impl SyntaxNode {
    /// Create a node without children.
    #[must_use]
    pub fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            children: Vec::new(),
        }
    }

    /// Create a node with children.
    #[must_use]
    pub fn with_children(kind: NodeKind, children: Vec<SyntaxNode>) -> Self {
        Self { kind, children }
    }

    /// Create a text leaf.
    #[must_use]
    pub fn text(value: impl Into<String>) -> Self {
        Self::new(NodeKind::Text {
            value: value.into(),
        })
    }

    /// Create a paragraph holding a single text leaf.
    #[must_use]
    pub fn paragraph(value: impl Into<String>) -> Self {
        Self::with_children(NodeKind::Paragraph, vec![Self::text(value)])
    }

    /// Text of a text leaf.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match &self.kind {
            NodeKind::Text { value } => Some(value),
            _ => None,
        }
    }

    /// True for text leaves.
    #[must_use]
    pub fn is_text(&self) -> bool {
        matches!(self.kind, NodeKind::Text { .. })
    }

    /// Concatenated visible text of this node and its descendants.
    #[must_use]
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        self.collect_text(&mut out);
        out
    }

    fn collect_text(&self, out: &mut String) {
        match &self.kind {
            NodeKind::Text { value }
            | NodeKind::Escaped { value }
            | NodeKind::InlineCode { value } => out.push_str(value),
            NodeKind::Image { alt, .. } => out.push_str(alt),
            _ => {
                for child in &self.children {
                    child.collect_text(out);
                }
            }
        }
    }

    /// Rebuild every sibling list bottom-up.
    ///
    /// `f` receives the parent kind and its (already rebuilt) children.
    #[must_use]
    pub fn map_siblings<F>(self, f: &mut F) -> Self
    where
        F: FnMut(&NodeKind, Vec<SyntaxNode>) -> Vec<SyntaxNode>,
    {
        let Self { kind, children } = self;
        let children = children
            .into_iter()
            .map(|child| child.map_siblings(f))
            .collect();
        let children = f(&kind, children);
        Self { kind, children }
    }

    /// Rebuild every node bottom-up.
    #[must_use]
    pub fn map_nodes<F>(self, f: &mut F) -> Self
    where
        F: FnMut(SyntaxNode) -> SyntaxNode,
    {
        let Self { kind, children } = self;
        let children = children
            .into_iter()
            .map(|child| child.map_nodes(f))
            .collect();
        f(Self { kind, children })
    }

    /// Visit every node in document order.
    pub fn walk<'a, F>(&'a self, f: &mut F)
    where
        F: FnMut(&'a SyntaxNode),
    {
        f(self);
        for child in &self.children {
            child.walk(f);
        }
    }
}

/// Merge runs of adjacent text leaves into single leaves.
#[must_use]
pub fn merge_adjacent_text(children: Vec<SyntaxNode>) -> Vec<SyntaxNode> {
    let mut out: Vec<SyntaxNode> = Vec::with_capacity(children.len());
    for child in children {
        if let NodeKind::Text { value } = &child.kind
            && let Some(NodeKind::Text { value: prev }) = out.last_mut().map(|n| &mut n.kind)
        {
            prev.push_str(value);
            continue;
        }
        out.push(child);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_info_box_kind_case_insensitive() {
        assert_eq!(InfoBoxKind::from_name("Info"), Some(InfoBoxKind::Info));
        assert_eq!(InfoBoxKind::from_name("SUCCESS"), Some(InfoBoxKind::Success));
        assert_eq!(InfoBoxKind::from_name("tip"), None);
        assert_eq!(InfoBoxKind::default(), InfoBoxKind::Info);
    }

    #[test]
    fn test_text_content_skips_markup() {
        let node = SyntaxNode::with_children(
            NodeKind::Paragraph,
            vec![
                SyntaxNode::text("a "),
                SyntaxNode::with_children(NodeKind::Strong, vec![SyntaxNode::text("b")]),
                SyntaxNode::new(NodeKind::InlineCode {
                    value: "c".to_owned(),
                }),
            ],
        );
        assert_eq!(node.text_content(), "a bc");
    }

    #[test]
    fn test_merge_adjacent_text() {
        let merged = merge_adjacent_text(vec![
            SyntaxNode::text("[ab"),
            SyntaxNode::text("c]{.red}"),
            SyntaxNode::new(NodeKind::Break),
            SyntaxNode::text("x"),
        ]);
        assert_eq!(merged.len(), 3);
        assert_eq!(merged[0].as_text(), Some("[abc]{.red}"));
        assert_eq!(merged[2].as_text(), Some("x"));
    }

    #[test]
    fn test_map_siblings_sees_parent_kind() {
        let tree = SyntaxNode::with_children(
            NodeKind::Root,
            vec![SyntaxNode::paragraph("hello")],
        );
        let mut seen = Vec::new();
        let _ = tree.map_siblings(&mut |kind, children| {
            seen.push(kind.tag());
            children
        });
        assert_eq!(seen, vec!["text", "paragraph", "root"]);
    }

    #[test]
    fn test_directive_syntax() {
        let directive = Directive::new("warning");
        assert_eq!(directive.to_syntax(3), ":::warning");
        assert_eq!(directive.as_written(3), ":::warning");
    }

    #[test]
    fn test_directive_as_written_keeps_empty_parts() {
        let directive = Directive {
            source: Some("x[]{}".to_owned()),
            ..Directive::new("x")
        };
        assert_eq!(directive.to_syntax(1), ":x");
        assert_eq!(directive.as_written(1), ":x[]{}");
    }
}
