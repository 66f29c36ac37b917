//! pulldown-cmark event stream to [`SyntaxNode`] tree.

use pulldown_cmark::{CodeBlockKind, CowStr, Event, HeadingLevel, Options, Parser, Tag, TagEnd};

use crate::ast::{Alignment, NodeKind, SyntaxNode};

/// Markdown options shared by every parse.
pub(crate) fn options() -> Options {
    Options::ENABLE_TABLES | Options::ENABLE_STRIKETHROUGH
}

/// Parse markdown into block-level nodes.
pub(crate) fn parse_blocks(src: &str) -> Vec<SyntaxNode> {
    let mut builder = TreeBuilder::new();
    for (event, range) in Parser::new_ext(src, options()).into_offset_iter() {
        match event {
            Event::Text(text) if is_escaped(src, range.start) => builder.escaped_text(&text),
            event => builder.push(event),
        }
    }
    builder.finish()
}

/// Whether the character at `start` follows an unescaped backslash.
fn is_escaped(src: &str, start: usize) -> bool {
    let Some(before) = src.as_bytes().get(..start) else {
        return false;
    };
    let slashes = before.iter().rev().take_while(|&&b| b == b'\\').count();
    slashes % 2 == 1
}

struct Frame {
    /// `None` for containers we flatten into the parent.
    kind: Option<NodeKind>,
    children: Vec<SyntaxNode>,
    /// Raw text for code blocks, HTML blocks and image alt text.
    raw: String,
    /// Set on a list when any of its items held a paragraph.
    loose: bool,
}

impl Frame {
    fn new(kind: Option<NodeKind>) -> Self {
        Self {
            kind,
            children: Vec::new(),
            raw: String::new(),
            loose: false,
        }
    }

    fn collects_raw(&self) -> bool {
        matches!(
            self.kind,
            Some(NodeKind::CodeBlock { .. } | NodeKind::Html { .. } | NodeKind::Image { .. })
        )
    }
}

struct TreeBuilder {
    stack: Vec<Frame>,
}

impl TreeBuilder {
    fn new() -> Self {
        Self {
            stack: vec![Frame::new(Some(NodeKind::Root))],
        }
    }

    fn top(&mut self) -> &mut Frame {
        let last = self.stack.len() - 1;
        &mut self.stack[last]
    }

    fn push(&mut self, event: Event<'_>) {
        match event {
            Event::Start(tag) => self.open(tag),
            Event::End(end) => self.close(end),
            Event::Text(text) => self.text(&text),
            Event::Code(code) => match self.raw_sink() {
                Some(raw) => raw.push_str(&code),
                None => self.leaf(NodeKind::InlineCode {
                    value: code.into_string(),
                }),
            },
            Event::InlineMath(math) => self.text(&format!("${math}$")),
            Event::DisplayMath(math) => self.text(&format!("$${math}$$")),
            Event::Html(html) => match self.raw_sink() {
                Some(raw) => raw.push_str(&html),
                None => self.leaf(NodeKind::Html {
                    value: html.into_string(),
                }),
            },
            Event::InlineHtml(html) => self.leaf(NodeKind::InlineHtml {
                value: html.into_string(),
            }),
            Event::FootnoteReference(label) => self.text(&format!("[^{label}]")),
            Event::SoftBreak => self.text("\n"),
            Event::HardBreak => self.leaf(NodeKind::Break),
            Event::Rule => self.leaf(NodeKind::ThematicBreak),
            Event::TaskListMarker(checked) => self.text(if checked { "[x] " } else { "[ ] " }),
        }
    }

    /// Raw text buffer of the innermost code block, HTML block or image.
    fn raw_sink(&mut self) -> Option<&mut String> {
        self.stack
            .iter_mut()
            .rev()
            .find(|frame| frame.collects_raw())
            .map(|frame| &mut frame.raw)
    }

    fn text(&mut self, text: &str) {
        if let Some(raw) = self.raw_sink() {
            raw.push_str(text);
            return;
        }
        let top = self.top();
        if let Some(NodeKind::Text { value }) = top.children.last_mut().map(|n| &mut n.kind) {
            value.push_str(text);
        } else {
            top.children.push(SyntaxNode::text(text));
        }
    }

    /// Text whose first character was backslash-escaped in the source.
    ///
    /// Escaped brackets and braces become [`NodeKind::Escaped`] so extension
    /// passes never read them as syntax.
    fn escaped_text(&mut self, text: &str) {
        let mut chars = text.chars();
        let first = match chars.next() {
            Some(c @ ('[' | ']' | '{' | '}')) if self.raw_sink().is_none() => c,
            _ => return self.text(text),
        };
        let top = self.top();
        if let Some(NodeKind::Escaped { value }) = top.children.last_mut().map(|n| &mut n.kind) {
            value.push(first);
        } else {
            top.children.push(SyntaxNode::new(NodeKind::Escaped {
                value: first.to_string(),
            }));
        }
        let rest = chars.as_str();
        if !rest.is_empty() {
            self.text(rest);
        }
    }

    fn leaf(&mut self, kind: NodeKind) {
        if let Some(raw) = self.raw_sink() {
            if kind == NodeKind::Break {
                raw.push(' ');
            }
            return;
        }
        self.top().children.push(SyntaxNode::new(kind));
    }

    fn open(&mut self, tag: Tag<'_>) {
        // Markup inside image alt text only contributes its text.
        if self.raw_sink().is_some() {
            self.stack.push(Frame::new(None));
            return;
        }
        let kind = match tag {
            Tag::Paragraph => Some(NodeKind::Paragraph),
            Tag::Heading { level, .. } => Some(NodeKind::Heading {
                level: heading_level_to_num(level),
                id: None,
            }),
            Tag::BlockQuote(_) => Some(NodeKind::BlockQuote),
            Tag::CodeBlock(kind) => Some(NodeKind::CodeBlock {
                lang: match kind {
                    CodeBlockKind::Fenced(info) => info
                        .split_whitespace()
                        .next()
                        .map(ToOwned::to_owned),
                    CodeBlockKind::Indented => None,
                },
                value: String::new(),
            }),
            Tag::HtmlBlock => Some(NodeKind::Html {
                value: String::new(),
            }),
            Tag::List(start) => Some(NodeKind::List {
                ordered: start.is_some(),
                start,
                tight: true,
            }),
            Tag::Item => Some(NodeKind::ListItem),
            Tag::Table(alignments) => Some(NodeKind::Table {
                alignments: alignments.into_iter().map(convert_alignment).collect(),
            }),
            Tag::TableHead => Some(NodeKind::TableRow { header: true }),
            Tag::TableRow => Some(NodeKind::TableRow { header: false }),
            Tag::TableCell => Some(NodeKind::TableCell),
            Tag::Emphasis => Some(NodeKind::Emphasis),
            Tag::Strong => Some(NodeKind::Strong),
            Tag::Strikethrough => Some(NodeKind::Strikethrough),
            Tag::Link {
                dest_url, title, ..
            } => Some(NodeKind::Link {
                url: dest_url.into_string(),
                title: non_empty(title),
            }),
            Tag::Image {
                dest_url, title, ..
            } => Some(NodeKind::Image {
                url: dest_url.into_string(),
                title: non_empty(title),
                alt: String::new(),
            }),
            _ => None,
        };
        self.stack.push(Frame::new(kind));
    }

    fn close(&mut self, _end: TagEnd) {
        if self.stack.len() < 2 {
            return;
        }
        let Some(frame) = self.stack.pop() else {
            return;
        };
        let Frame {
            kind,
            children,
            raw,
            loose,
        } = frame;

        let Some(kind) = kind else {
            self.top().children.extend(children);
            return;
        };

        let node = match kind {
            NodeKind::CodeBlock { lang, .. } => SyntaxNode::new(NodeKind::CodeBlock { lang, value: raw }),
            NodeKind::Html { .. } => SyntaxNode::new(NodeKind::Html { value: raw }),
            NodeKind::Image { url, title, .. } => {
                SyntaxNode::new(NodeKind::Image { url, title, alt: raw })
            }
            NodeKind::List { ordered, start, .. } => SyntaxNode::with_children(
                NodeKind::List {
                    ordered,
                    start,
                    tight: !loose,
                },
                children,
            ),
            NodeKind::ListItem => {
                if children.iter().any(|c| c.kind == NodeKind::Paragraph) {
                    self.top().loose = true;
                }
                SyntaxNode::with_children(NodeKind::ListItem, wrap_inline_runs(children))
            }
            kind => SyntaxNode::with_children(kind, children),
        };
        self.top().children.push(node);
    }

    fn finish(mut self) -> Vec<SyntaxNode> {
        while self.stack.len() > 1 {
            self.close(TagEnd::Paragraph);
        }
        self.stack.pop().map(|root| root.children).unwrap_or_default()
    }
}

/// Group inline runs of a tight list item into paragraphs.
fn wrap_inline_runs(children: Vec<SyntaxNode>) -> Vec<SyntaxNode> {
    let mut out = Vec::with_capacity(children.len());
    let mut run: Vec<SyntaxNode> = Vec::new();
    for child in children {
        if child.kind.is_block() {
            if !run.is_empty() {
                out.push(SyntaxNode::with_children(
                    NodeKind::Paragraph,
                    std::mem::take(&mut run),
                ));
            }
            out.push(child);
        } else {
            run.push(child);
        }
    }
    if !run.is_empty() {
        out.push(SyntaxNode::with_children(NodeKind::Paragraph, run));
    }
    out
}

fn non_empty(s: CowStr<'_>) -> Option<String> {
    (!s.is_empty()).then(|| s.into_string())
}

fn convert_alignment(alignment: pulldown_cmark::Alignment) -> Alignment {
    match alignment {
        pulldown_cmark::Alignment::None => Alignment::None,
        pulldown_cmark::Alignment::Left => Alignment::Left,
        pulldown_cmark::Alignment::Center => Alignment::Center,
        pulldown_cmark::Alignment::Right => Alignment::Right,
    }
}

fn heading_level_to_num(level: HeadingLevel) -> u8 {
    match level {
        HeadingLevel::H1 => 1,
        HeadingLevel::H2 => 2,
        HeadingLevel::H3 => 3,
        HeadingLevel::H4 => 4,
        HeadingLevel::H5 => 5,
        HeadingLevel::H6 => 6,
    }
}
