//! Syntax tree back to markdown text.
//!
//! Core CommonMark/GFM kinds are written by [`Stringifier`] itself. Every other
//! kind is written by a [`StringifyHandler`] registered under the kind's type
//! tag; a tree containing an extension kind with no handler fails with
//! [`StringifyError::Unhandled`].
//!
//! Output is normalized markdown, not the original bytes: parsing it again
//! yields the same tree shape.

mod handlers;

pub use handlers::{DirectiveHandler, SpanHandler};

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, LazyLock};

use regex::Regex;

use crate::ast::{Alignment, NodeKind, SyntaxNode};
use crate::transform::SPAN_CLOSE;

static ENTITY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^&(?:#[0-9]{1,7}|#[xX][0-9a-fA-F]{1,6}|[A-Za-z][A-Za-z0-9]{1,31});")
        .expect("invalid entity regex")
});

/// Line openings that would start a block: ATX headings, bullets, quotes,
/// thematic breaks and setext underlines.
static BLOCK_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^ {0,3}(?:#{1,6}(?:[ \t]|$)|[-+](?:[ \t]|$)|>|-+[ \t]*$|=+[ \t]*$)")
        .expect("invalid block marker regex")
});

static ORDERED_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^ {0,3}[0-9]{1,9}([.)])(?:[ \t]|$)").expect("invalid ordered marker regex")
});

static LINK_DEFINITION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^ {0,3}\[[^\]]*\](:)").expect("invalid link definition regex"));

/// Stringification failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StringifyError {
    /// No handler is registered for this type tag.
    #[error("no stringify handler registered for node type '{0}'")]
    Unhandled(String),
    /// A node cannot be written in the position it occupies.
    #[error("cannot stringify '{tag}': {reason}")]
    Invalid { tag: String, reason: String },
}

/// Writes markdown for one or more extension node types.
pub trait StringifyHandler: Send + Sync {
    /// Type tags this handler writes (see [`NodeKind::tag`]).
    fn tags(&self) -> &[&'static str];

    /// Write `node`. Use `out` to stringify children.
    fn stringify(&self, node: &SyntaxNode, out: &Stringifier) -> Result<String, StringifyError>;
}

/// Markdown writer with registered extension handlers.
///
/// # Example
///
/// ```
/// use quire_markdown::{MarkdownParser, Stringifier};
///
/// let tree = MarkdownParser::new().with_directives().parse(":::info\nHello *world*\n:::\n").tree;
/// let markdown = Stringifier::standard().stringify(&tree).unwrap();
/// assert_eq!(markdown, ":::info\nHello *world*\n:::\n");
/// ```
#[derive(Clone, Default)]
pub struct Stringifier {
    handlers: HashMap<&'static str, Arc<dyn StringifyHandler>>,
}

impl fmt::Debug for Stringifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut tags: Vec<_> = self.handlers.keys().collect();
        tags.sort();
        f.debug_struct("Stringifier").field("handlers", &tags).finish()
    }
}

impl Stringifier {
    /// Writer for core kinds only.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Writer with directive and span handlers.
    #[must_use]
    pub fn standard() -> Self {
        Self::new()
            .with_handler(Arc::new(DirectiveHandler))
            .with_handler(Arc::new(SpanHandler))
    }

    /// Register a handler for every tag it reports. Later registrations win.
    #[must_use]
    pub fn with_handler(mut self, handler: Arc<dyn StringifyHandler>) -> Self {
        self.register(handler);
        self
    }

    /// Register a handler for every tag it reports. Later registrations win.
    pub fn register(&mut self, handler: Arc<dyn StringifyHandler>) {
        for &tag in handler.tags() {
            self.handlers.insert(tag, Arc::clone(&handler));
        }
    }

    /// True when `tag` can be written.
    #[must_use]
    pub fn handles(&self, tag: &str) -> bool {
        self.handlers.contains_key(tag)
    }

    /// Stringify a whole tree. Non-empty output ends with one newline.
    pub fn stringify(&self, tree: &SyntaxNode) -> Result<String, StringifyError> {
        let body = match tree.kind {
            NodeKind::Root => self.blocks(&tree.children, false)?,
            _ if tree.kind.is_block() => self.block(tree)?,
            _ => self.inline(std::slice::from_ref(tree))?,
        };
        let body = body.trim_end();
        if body.is_empty() {
            Ok(String::new())
        } else {
            Ok(format!("{body}\n"))
        }
    }

    /// Block nodes separated by blank lines (single newlines when `tight`).
    pub fn blocks(&self, nodes: &[SyntaxNode], tight: bool) -> Result<String, StringifyError> {
        let separator = if tight { "\n" } else { "\n\n" };
        let mut parts = Vec::with_capacity(nodes.len());
        for node in nodes {
            parts.push(self.block(node)?);
        }
        Ok(parts.join(separator))
    }

    /// Phrasing content concatenated.
    pub fn inline(&self, nodes: &[SyntaxNode]) -> Result<String, StringifyError> {
        let mut out = String::new();
        for node in nodes {
            out.push_str(&self.inline_node(node)?);
        }
        Ok(out)
    }

    fn extension(&self, node: &SyntaxNode) -> Result<String, StringifyError> {
        let tag = node.kind.tag();
        let handler = self
            .handlers
            .get(tag)
            .ok_or_else(|| StringifyError::Unhandled(tag.to_owned()))?;
        handler.stringify(node, self)
    }

    /// Write one block node.
    pub fn block(&self, node: &SyntaxNode) -> Result<String, StringifyError> {
        if self.handlers.contains_key(node.kind.tag()) || !node.kind.is_core() {
            return self.extension(node);
        }
        match &node.kind {
            NodeKind::Root => self.blocks(&node.children, false),
            NodeKind::Paragraph => Ok(escape_line_starts(&self.inline(&node.children)?)),
            NodeKind::Heading { level, id } => {
                let mut line = "#".repeat(usize::from(*level));
                line.push(' ');
                line.push_str(&escape_closing_hashes(&self.inline(&node.children)?));
                if let Some(id) = id {
                    line.push_str(" {#");
                    line.push_str(id);
                    line.push('}');
                }
                Ok(line)
            }
            NodeKind::BlockQuote => {
                let inner = self.blocks(&node.children, false)?;
                Ok(prefix_lines(&inner, "> ", "> "))
            }
            NodeKind::List {
                ordered,
                start,
                tight,
            } => self.list(node, *ordered, start.unwrap_or(1), *tight),
            NodeKind::ListItem => self.blocks(&node.children, true),
            NodeKind::CodeBlock { lang, value } => {
                let fence = "`".repeat(longest_run(value, '`').max(2) + 1);
                let mut out = format!("{fence}{}\n{value}", lang.as_deref().unwrap_or(""));
                if !value.is_empty() && !value.ends_with('\n') {
                    out.push('\n');
                }
                out.push_str(&fence);
                Ok(out)
            }
            NodeKind::ThematicBreak => Ok("---".to_owned()),
            NodeKind::Html { value } => Ok(value.trim_end().to_owned()),
            NodeKind::Table { alignments } => self.table(node, alignments),
            // Phrasing content at block level (hand-built trees) becomes a paragraph.
            _ => self.inline(std::slice::from_ref(node)),
        }
    }

    fn inline_node(&self, node: &SyntaxNode) -> Result<String, StringifyError> {
        if self.handlers.contains_key(node.kind.tag()) || !node.kind.is_core() {
            return self.extension(node);
        }
        let out = match &node.kind {
            NodeKind::Text { value } => escape_text(value, self.handles("spanClass")),
            NodeKind::Escaped { value } => value.chars().flat_map(|c| ['\\', c]).collect(),
            NodeKind::Emphasis => format!("*{}*", self.inline(&node.children)?),
            NodeKind::Strong => format!("**{}**", self.inline(&node.children)?),
            NodeKind::Strikethrough => format!("~~{}~~", self.inline(&node.children)?),
            NodeKind::InlineCode { value } => inline_code(value),
            NodeKind::InlineHtml { value } => value.clone(),
            NodeKind::Link { url, title } => format!(
                "[{}]({}{})",
                self.inline(&node.children)?,
                destination(url),
                title_suffix(title.as_deref())
            ),
            NodeKind::Image { url, title, alt } => format!(
                "![{}]({}{})",
                escape_text(alt, false),
                destination(url),
                title_suffix(title.as_deref())
            ),
            NodeKind::Break => "\\\n".to_owned(),
            kind => {
                return Err(StringifyError::Invalid {
                    tag: kind.tag().to_owned(),
                    reason: "block node inside phrasing content".to_owned(),
                });
            }
        };
        Ok(out)
    }

    fn list(
        &self,
        node: &SyntaxNode,
        ordered: bool,
        start: u64,
        tight: bool,
    ) -> Result<String, StringifyError> {
        let mut items = Vec::with_capacity(node.children.len());
        for (offset, item) in (0u64..).zip(&node.children) {
            let marker = if ordered {
                format!("{}. ", start + offset)
            } else {
                "- ".to_owned()
            };
            let body = self.blocks(&item.children, tight)?;
            let indent = " ".repeat(marker.len());
            items.push(prefix_lines(&body, &marker, &indent));
        }
        Ok(items.join(if tight { "\n" } else { "\n\n" }))
    }

    fn table(&self, node: &SyntaxNode, alignments: &[Alignment]) -> Result<String, StringifyError> {
        let mut rows = Vec::with_capacity(node.children.len() + 1);
        for (idx, row) in node.children.iter().enumerate() {
            let mut cells = Vec::with_capacity(row.children.len());
            for cell in &row.children {
                cells.push(self.inline(&cell.children)?.replace('|', "\\|"));
            }
            rows.push(format!("| {} |", cells.join(" | ")));
            if idx == 0 {
                let columns = alignments.len().max(row.children.len());
                let separator: Vec<_> = (0..columns)
                    .map(|col| match alignments.get(col) {
                        Some(Alignment::Left) => ":---",
                        Some(Alignment::Center) => ":---:",
                        Some(Alignment::Right) => "---:",
                        _ => "---",
                    })
                    .collect();
                rows.push(format!("| {} |", separator.join(" | ")));
            }
        }
        Ok(rows.join("\n"))
    }
}

/// Prefix the first line with `first` and every later non-empty line with `rest`.
fn prefix_lines(text: &str, first: &str, rest: &str) -> String {
    let mut out = String::with_capacity(text.len() + first.len());
    for (idx, line) in text.split('\n').enumerate() {
        if idx > 0 {
            out.push('\n');
        }
        let prefix = if idx == 0 { first } else { rest };
        if line.is_empty() && idx > 0 {
            out.push_str(prefix.trim_end());
        } else {
            out.push_str(prefix);
            out.push_str(line);
        }
    }
    out
}

fn longest_run(text: &str, ch: char) -> usize {
    let mut longest = 0;
    let mut current = 0;
    for c in text.chars() {
        if c == ch {
            current += 1;
            longest = longest.max(current);
        } else {
            current = 0;
        }
    }
    longest
}

fn inline_code(value: &str) -> String {
    let fence = "`".repeat(longest_run(value, '`') + 1);
    if value.starts_with('`') || value.ends_with('`') {
        format!("{fence} {value} {fence}")
    } else {
        format!("{fence}{value}{fence}")
    }
}

fn destination(url: &str) -> String {
    if url.contains([' ', '(', ')']) {
        format!("<{url}>")
    } else {
        url.to_owned()
    }
}

fn title_suffix(title: Option<&str>) -> String {
    match title {
        Some(title) => format!(" \"{}\"", title.replace('"', "\\\"")),
        None => String::new(),
    }
}

/// Escape characters that would otherwise start inline markup.
///
/// Brackets stay bare so citation and directive syntax written as text
/// survives a round trip. With `spans`, a `]` that would close a coloured
/// span is escaped; an empty `[]{.class}` is left alone.
fn escape_text(text: &str, spans: bool) -> String {
    let mut out = String::with_capacity(text.len());
    let mut prev = None;
    for (at, c) in text.char_indices() {
        let escape = match c {
            '\\' | '*' | '_' | '`' | '~' | '<' => true,
            '&' => ENTITY.is_match(&text[at..]),
            '(' => prev == Some(']'),
            ']' => spans && prev != Some('[') && SPAN_CLOSE.is_match(&text[at..]),
            _ => false,
        };
        if escape {
            out.push('\\');
        }
        out.push(c);
        prev = Some(c);
    }
    out
}

/// Escape paragraph lines that would otherwise open a block.
///
/// A link definition can only start a paragraph, so only the first line is
/// checked for one.
fn escape_line_starts(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for (idx, line) in text.split('\n').enumerate() {
        if idx > 0 {
            out.push('\n');
        }
        let at = if BLOCK_MARKER.is_match(line) {
            Some(line.len() - line.trim_start_matches(' ').len())
        } else {
            ORDERED_MARKER
                .captures(line)
                .or_else(|| LINK_DEFINITION.captures(line).filter(|_| idx == 0))
                .and_then(|caps| caps.get(1))
                .map(|m| m.start())
        };
        match at {
            Some(at) => {
                out.push_str(&line[..at]);
                out.push('\\');
                out.push_str(&line[at..]);
            }
            None => out.push_str(line),
        }
    }
    out
}

/// Keep a trailing `#` run from being read as a closing sequence.
fn escape_closing_hashes(text: &str) -> String {
    let kept = text.trim_end_matches('#');
    if kept.len() < text.len() && (kept.is_empty() || kept.ends_with([' ', '\t'])) {
        format!("{kept}\\{}", &text[kept.len()..])
    } else {
        text.to_owned()
    }
}
