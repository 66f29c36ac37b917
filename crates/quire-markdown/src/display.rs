//! Rendering projection: syntax tree to display tree.
//!
//! The display tree is what the page renderer consumes: elements with
//! attributes, text, and raw HTML passed through from the source. The
//! projection is read-only and one-way.

use crate::ast::{Alignment, NodeKind, SyntaxNode};

/// Element tags that never have children or a closing tag.
const VOID_TAGS: &[&str] = &["img", "br", "hr"];

/// A node of the display tree.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
#[cfg_attr(feature = "serialize", serde(tag = "type", rename_all = "lowercase"))]
pub enum DisplayNode {
    Element {
        tag: String,
        /// Attributes in emission order.
        attrs: Vec<(String, String)>,
        children: Vec<DisplayNode>,
    },
    Text {
        value: String,
    },
    /// Trusted HTML emitted verbatim.
    Raw {
        value: String,
    },
}

impl DisplayNode {
    /// Element without attributes or children.
    #[must_use]
    pub fn element(tag: impl Into<String>) -> Self {
        Self::Element {
            tag: tag.into(),
            attrs: Vec::new(),
            children: Vec::new(),
        }
    }

    #[must_use]
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text {
            value: value.into(),
        }
    }

    #[must_use]
    pub fn raw(value: impl Into<String>) -> Self {
        Self::Raw {
            value: value.into(),
        }
    }

    /// Add an attribute (no-op on text and raw nodes).
    #[must_use]
    pub fn attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        if let Self::Element { attrs, .. } = &mut self {
            attrs.push((name.into(), value.into()));
        }
        self
    }

    /// Append a child (no-op on text and raw nodes).
    #[must_use]
    pub fn child(mut self, child: DisplayNode) -> Self {
        if let Self::Element { children, .. } = &mut self {
            children.push(child);
        }
        self
    }

    /// Append children (no-op on text and raw nodes).
    #[must_use]
    pub fn children(mut self, more: impl IntoIterator<Item = DisplayNode>) -> Self {
        if let Self::Element { children, .. } = &mut self {
            children.extend(more);
        }
        self
    }

    /// Tag name of an element.
    #[must_use]
    pub fn tag(&self) -> Option<&str> {
        match self {
            Self::Element { tag, .. } => Some(tag),
            _ => None,
        }
    }

    /// Attribute value of an element.
    #[must_use]
    pub fn get_attr(&self, name: &str) -> Option<&str> {
        match self {
            Self::Element { attrs, .. } => attrs
                .iter()
                .find(|(key, _)| key == name)
                .map(|(_, value)| value.as_str()),
            _ => None,
        }
    }

    /// Children of an element; empty for text and raw nodes.
    #[must_use]
    pub fn child_nodes(&self) -> &[DisplayNode] {
        match self {
            Self::Element { children, .. } => children,
            _ => &[],
        }
    }

    /// Serialize to HTML.
    #[must_use]
    pub fn to_html(&self) -> String {
        let mut out = String::new();
        self.write_html(&mut out);
        out
    }

    fn write_html(&self, out: &mut String) {
        match self {
            Self::Element {
                tag,
                attrs,
                children,
            } => {
                out.push('<');
                out.push_str(tag);
                for (name, value) in attrs {
                    out.push(' ');
                    out.push_str(name);
                    out.push_str("=\"");
                    out.push_str(&escape_html(value));
                    out.push('"');
                }
                out.push('>');
                if VOID_TAGS.contains(&tag.as_str()) {
                    return;
                }
                for child in children {
                    child.write_html(out);
                }
                out.push_str("</");
                out.push_str(tag);
                out.push('>');
            }
            Self::Text { value } => out.push_str(&escape_html(value)),
            Self::Raw { value } => out.push_str(value),
        }
    }
}

/// Serialize a sequence of display nodes to HTML.
#[must_use]
pub fn to_html(nodes: &[DisplayNode]) -> String {
    let mut out = String::new();
    for node in nodes {
        node.write_html(&mut out);
    }
    out
}

/// Escape text for HTML content and attribute values.
#[must_use]
pub fn escape_html(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => result.push_str("&amp;"),
            '<' => result.push_str("&lt;"),
            '>' => result.push_str("&gt;"),
            '"' => result.push_str("&quot;"),
            '\'' => result.push_str("&#x27;"),
            _ => result.push(c),
        }
    }
    result
}

/// Anchor id of a citation marker: `cite-N`, then `cite-N-2`, `cite-N-3`, ...
#[must_use]
pub fn citation_anchor(number: usize, occurrence: usize) -> String {
    if occurrence <= 1 {
        format!("cite-{number}")
    } else {
        format!("cite-{number}-{occurrence}")
    }
}

/// Project a syntax tree to display nodes.
///
/// The root itself produces no element; its children are returned.
#[must_use]
pub fn project(tree: &SyntaxNode) -> Vec<DisplayNode> {
    let mut out = Vec::new();
    if tree.kind == NodeKind::Root {
        project_children(&tree.children, false, &mut out);
    } else {
        project_node(tree, false, &mut out);
    }
    out
}

fn project_children(children: &[SyntaxNode], tight: bool, out: &mut Vec<DisplayNode>) {
    for child in children {
        project_node(child, tight, out);
    }
}

fn collect(children: &[SyntaxNode], tight: bool) -> Vec<DisplayNode> {
    let mut out = Vec::new();
    project_children(children, tight, &mut out);
    out
}

fn project_node(node: &SyntaxNode, tight: bool, out: &mut Vec<DisplayNode>) {
    let inner = || collect(&node.children, false);
    let el = |tag: &str| DisplayNode::element(tag).children(inner());

    let projected = match &node.kind {
        NodeKind::Root => DisplayNode::element("div").children(inner()),
        // Tight list items show their paragraphs' content directly.
        NodeKind::Paragraph if tight => {
            out.extend(inner());
            return;
        }
        NodeKind::Paragraph => el("p"),
        NodeKind::Heading { level, id } => {
            let heading = DisplayNode::element(format!("h{level}"));
            let heading = match id {
                Some(id) => heading.attr("id", id),
                None => heading,
            };
            heading.children(inner())
        }
        NodeKind::BlockQuote => el("blockquote"),
        NodeKind::List {
            ordered: true,
            start,
            tight,
        } => {
            let list = DisplayNode::element("ol");
            let list = match start {
                Some(start) if *start != 1 => list.attr("start", start.to_string()),
                _ => list,
            };
            list.children(list_items(&node.children, *tight))
        }
        NodeKind::List { tight, .. } => {
            DisplayNode::element("ul").children(list_items(&node.children, *tight))
        }
        NodeKind::ListItem => el("li"),
        NodeKind::CodeBlock { lang, value } => {
            let code = DisplayNode::element("code");
            let code = match lang {
                Some(lang) => code.attr("class", format!("language-{lang}")),
                None => code,
            };
            DisplayNode::element("pre").child(code.child(DisplayNode::text(value)))
        }
        NodeKind::ThematicBreak => DisplayNode::element("hr"),
        NodeKind::Html { value } | NodeKind::InlineHtml { value } => DisplayNode::raw(value),
        NodeKind::Table { alignments } => table(node, alignments),
        // Rows and cells outside a table only occur in hand-built trees.
        NodeKind::TableRow { .. } => el("tr"),
        NodeKind::TableCell => el("td"),
        NodeKind::Text { value } | NodeKind::Escaped { value } => DisplayNode::text(value),
        NodeKind::Emphasis => el("em"),
        NodeKind::Strong => el("strong"),
        NodeKind::Strikethrough => el("del"),
        NodeKind::InlineCode { value } => {
            DisplayNode::element("code").child(DisplayNode::text(value))
        }
        NodeKind::Link { url, title } => {
            let link = DisplayNode::element("a").attr("href", url);
            let link = match title {
                Some(title) => link.attr("title", title),
                None => link,
            };
            link.children(inner())
        }
        NodeKind::Image { url, title, alt } => {
            let image = DisplayNode::element("img").attr("src", url);
            let image = match title {
                Some(title) => image.attr("title", title),
                None => image,
            };
            image.attr("alt", alt)
        }
        NodeKind::Break => DisplayNode::element("br"),
        NodeKind::ContainerDirective(directive) => {
            let mut div = DisplayNode::element("div").attr("data-directive", &directive.name);
            if let Some(id) = &directive.attributes.id {
                div = div.attr("id", id);
            }
            if !directive.attributes.classes.is_empty() {
                div = div.attr("class", directive.attributes.classes.join(" "));
            }
            div.children(inner())
        }
        NodeKind::LeafDirective(directive) => {
            DisplayNode::element("p").child(DisplayNode::text(directive.as_written(2)))
        }
        NodeKind::TextDirective(directive) => DisplayNode::text(directive.as_written(1)),
        NodeKind::Span { class } => DisplayNode::element("span")
            .attr("class", class)
            .children(inner()),
        NodeKind::Citation {
            number, occurrence, ..
        } => DisplayNode::element("sup").attr("class", "citation").child(
            DisplayNode::element("a")
                .attr("href", format!("#ref-{number}"))
                .attr("id", citation_anchor(*number, *occurrence))
                .child(DisplayNode::text(number.to_string())),
        ),
        NodeKind::CitationBacklink { number } => {
            out.push(
                DisplayNode::element("span")
                    .attr("id", format!("ref-{number}"))
                    .attr("class", "reference-number"),
            );
            out.push(
                DisplayNode::element("a")
                    .attr("href", format!("#cite-{number}"))
                    .attr("class", "backlink")
                    .attr("aria-label", format!("Back to citation {number}"))
                    .child(DisplayNode::text("↩")),
            );
            DisplayNode::text(" ")
        }
        NodeKind::Figure => el("figure"),
        NodeKind::FigCaption => el("figcaption"),
        NodeKind::InfoBox { kind } => DisplayNode::element("div")
            .attr("class", format!("info-box info-box-{kind}"))
            .children(inner()),
    };
    out.push(projected);
}

fn list_items(items: &[SyntaxNode], tight: bool) -> Vec<DisplayNode> {
    items
        .iter()
        .map(|item| DisplayNode::element("li").children(collect(&item.children, tight)))
        .collect()
}

fn table(node: &SyntaxNode, alignments: &[Alignment]) -> DisplayNode {
    let row = |row: &SyntaxNode, header: bool| {
        let cell_tag = if header { "th" } else { "td" };
        let cells = row.children.iter().enumerate().map(|(idx, cell)| {
            let el = DisplayNode::element(cell_tag);
            let el = match alignments.get(idx) {
                Some(Alignment::Left) => el.attr("style", "text-align: left"),
                Some(Alignment::Center) => el.attr("style", "text-align: center"),
                Some(Alignment::Right) => el.attr("style", "text-align: right"),
                _ => el,
            };
            el.children(collect(&cell.children, false))
        });
        DisplayNode::element("tr").children(cells)
    };

    let mut head = Vec::new();
    let mut body = Vec::new();
    for child in &node.children {
        match child.kind {
            NodeKind::TableRow { header: true } => head.push(row(child, true)),
            _ => body.push(row(child, false)),
        }
    }

    let mut table = DisplayNode::element("table");
    if !head.is_empty() {
        table = table.child(DisplayNode::element("thead").children(head));
    }
    if !body.is_empty() {
        table = table.child(DisplayNode::element("tbody").children(body));
    }
    table
}
