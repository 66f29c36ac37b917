//! Generic directive syntax: `:name`, `::name`, `:::name`.
//!
//! Container directives are split out of the source line by line before
//! pulldown-cmark sees it. Leaf and text directives are recognized afterwards
//! in the text leaves of the parsed tree.

use tracing::warn;

use crate::ast::{Directive, NodeKind, SyntaxNode};
use crate::attributes::Attributes;

use super::fence::FenceTracker;

/// A source chunk: plain markdown, or a directive container with its body.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Block {
    Markdown(String),
    Container {
        directive: Directive,
        body: Vec<Block>,
    },
}

/// A `:::` line.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum ContainerLine {
    Open { directive: Directive, colons: usize },
    Close { colons: usize },
}

struct Frame {
    directive: Directive,
    colons: usize,
    line: usize,
    body: Vec<Block>,
}

/// Split source into markdown chunks and (nested) directive containers.
///
/// A closing `:::` needs at least as many colons as the container it closes.
/// Unclosed containers run to the end of input and are reported in `warnings`.
pub(crate) fn split_containers(src: &str, warnings: &mut Vec<String>) -> Vec<Block> {
    let mut fence = FenceTracker::new();
    let mut stack: Vec<Frame> = Vec::new();
    let mut root: Vec<Block> = Vec::new();
    let mut buf = String::new();

    for (idx, line) in src.split_inclusive('\n').enumerate() {
        if fence.update(line) || fence.in_fence() {
            buf.push_str(line);
            continue;
        }

        match parse_container_line(line) {
            Some(ContainerLine::Open { directive, colons }) => {
                flush(&mut buf, target(&mut stack, &mut root));
                stack.push(Frame {
                    directive,
                    colons,
                    line: idx + 1,
                    body: Vec::new(),
                });
            }
            Some(ContainerLine::Close { colons })
                if stack.last().is_some_and(|frame| colons >= frame.colons) =>
            {
                flush(&mut buf, target(&mut stack, &mut root));
                if let Some(frame) = stack.pop() {
                    target(&mut stack, &mut root).push(Block::Container {
                        directive: frame.directive,
                        body: frame.body,
                    });
                }
            }
            _ => buf.push_str(line),
        }
    }

    flush(&mut buf, target(&mut stack, &mut root));
    while let Some(frame) = stack.pop() {
        warn!(name = %frame.directive.name, line = frame.line, "Unclosed container directive");
        warnings.push(format!(
            "unclosed directive :::{} at line {}",
            frame.directive.name, frame.line
        ));
        target(&mut stack, &mut root).push(Block::Container {
            directive: frame.directive,
            body: frame.body,
        });
    }

    root
}

fn target<'a>(stack: &'a mut [Frame], root: &'a mut Vec<Block>) -> &'a mut Vec<Block> {
    match stack.last_mut() {
        Some(frame) => &mut frame.body,
        None => root,
    }
}

fn flush(buf: &mut String, into: &mut Vec<Block>) {
    if !buf.trim().is_empty() {
        into.push(Block::Markdown(std::mem::take(buf)));
    }
    buf.clear();
}

/// Parse a whole line as a container opening or closing marker.
///
/// Up to three spaces of indentation are allowed, as for other block markers.
/// Text after the attribute block is ignored.
pub(crate) fn parse_container_line(line: &str) -> Option<ContainerLine> {
    let indent = line.len() - line.trim_start_matches(' ').len();
    if indent > 3 {
        return None;
    }
    let trimmed = line.trim();
    if !trimmed.starts_with(":::") {
        return None;
    }

    let colons = trimmed.chars().take_while(|&c| c == ':').count();
    let after_colons = trimmed[colons..].trim_start();
    if after_colons.is_empty() {
        return Some(ContainerLine::Close { colons });
    }

    let (directive, _) = parse_directive_body(after_colons)?;
    Some(ContainerLine::Open { directive, colons })
}

/// Parse a paragraph's text as a leaf directive: `::name[label]{attrs}`.
pub(crate) fn parse_leaf(text: &str) -> Option<Directive> {
    let trimmed = text.trim();
    let rest = trimmed.strip_prefix("::")?;
    if rest.starts_with(':') {
        return None;
    }
    let (directive, consumed) = parse_directive_body(rest)?;
    rest[consumed..].trim().is_empty().then_some(directive)
}

/// Split a text leaf around `:name[label]{attrs}` occurrences.
///
/// A colon preceded by a letter, digit or another colon never opens a text
/// directive, so `19:00` and `[cite:key]` stay plain text.
/// Returns `None` when the text holds no directive.
pub(crate) fn split_text_directives(text: &str) -> Option<Vec<SyntaxNode>> {
    let mut out = Vec::new();
    let mut last = 0;
    let mut search = 0;

    while let Some(rel) = text[search..].find(':') {
        let at = search + rel;
        match text_directive_at(text, at) {
            Some((directive, end)) => {
                if at > last {
                    out.push(SyntaxNode::text(&text[last..at]));
                }
                out.push(SyntaxNode::new(NodeKind::TextDirective(directive)));
                last = end;
                search = end;
            }
            None => search = at + 1,
        }
    }

    if out.is_empty() {
        return None;
    }
    if last < text.len() {
        out.push(SyntaxNode::text(&text[last..]));
    }
    Some(out)
}

fn text_directive_at(text: &str, at: usize) -> Option<(Directive, usize)> {
    let prev = text[..at].chars().next_back();
    if prev.is_some_and(|c| c == ':' || c.is_alphanumeric()) {
        return None;
    }
    let (directive, consumed) = parse_directive_body(&text[at + 1..])?;
    Some((directive, at + 1 + consumed))
}

/// Parse `name[label]{attrs}` (colons already stripped).
///
/// Returns the directive and the number of bytes consumed.
fn parse_directive_body(s: &str) -> Option<(Directive, usize)> {
    let name_len = s.find(|c: char| !is_name_char(c)).unwrap_or(s.len());
    if name_len == 0 {
        return None;
    }
    let mut pos = name_len;

    let (label, used) = parse_delimited(&s[pos..], '[', ']').unwrap_or(("", 0));
    pos += used;
    let (attrs, used) = parse_delimited(&s[pos..], '{', '}').unwrap_or(("", 0));
    pos += used;

    let directive = Directive {
        name: s[..name_len].to_owned(),
        label: label.to_owned(),
        attributes: Attributes::parse(attrs),
        source: Some(s[..pos].to_owned()),
    };
    Some((directive, pos))
}

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-' || c == '_'
}

/// Content between balanced `open`/`close` at the start of `s`.
///
/// Returns the inner text and the bytes consumed, including delimiters.
fn parse_delimited(s: &str, open: char, close: char) -> Option<(&str, usize)> {
    if !s.starts_with(open) {
        return None;
    }
    let mut depth = 0usize;
    for (i, c) in s.char_indices() {
        if c == open {
            depth += 1;
        } else if c == close {
            depth -= 1;
            if depth == 0 {
                return Some((&s[1..i], i + 1));
            }
        }
    }
    None
}

/// Recognize leaf and text directives in a parsed tree.
pub(crate) fn recognize_inline(tree: SyntaxNode) -> SyntaxNode {
    let tree = tree.map_nodes(&mut |node| {
        if node.kind != NodeKind::Paragraph {
            return node;
        }
        let leaf = match node.children.as_slice() {
            [only] => only.as_text().and_then(parse_leaf),
            _ => None,
        };
        match leaf {
            Some(directive) => SyntaxNode::new(NodeKind::LeafDirective(directive)),
            None => node,
        }
    });

    tree.map_siblings(&mut |_, children| {
        let mut out = Vec::with_capacity(children.len());
        for child in children {
            match child.as_text().and_then(split_text_directives) {
                Some(pieces) => out.extend(pieces),
                None => out.push(child),
            }
        }
        out
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_container_line_open_with_label_and_attrs() {
        let Some(ContainerLine::Open { directive, colons }) =
            parse_container_line(":::warning[Heads up]{#w .wide}\n")
        else {
            panic!("expected container opening");
        };
        assert_eq!(colons, 3);
        assert_eq!(directive.name, "warning");
        assert_eq!(directive.label, "Heads up");
        assert_eq!(directive.attributes.id.as_deref(), Some("w"));
        assert_eq!(directive.attributes.classes, vec!["wide"]);
    }

    #[test]
    fn test_container_line_close() {
        assert_eq!(
            parse_container_line("::::  \n"),
            Some(ContainerLine::Close { colons: 4 })
        );
        assert_eq!(parse_container_line("    :::info"), None);
        assert_eq!(parse_container_line("::: !bad"), None);
    }

    #[test]
    fn test_split_nested_containers() {
        let mut warnings = Vec::new();
        let blocks = split_containers(
            "intro\n\n::::info\nouter\n:::warning\ninner\n:::\n::::\ntail\n",
            &mut warnings,
        );
        assert!(warnings.is_empty());
        assert_eq!(blocks.len(), 3);
        let Block::Container { directive, body } = &blocks[1] else {
            panic!("expected container");
        };
        assert_eq!(directive.name, "info");
        assert_eq!(body.len(), 2);
        assert!(matches!(&body[1], Block::Container { directive, .. } if directive.name == "warning"));
    }

    #[test]
    fn test_split_skips_fenced_code() {
        let mut warnings = Vec::new();
        let blocks = split_containers("```\n:::info\n```\n", &mut warnings);
        assert_eq!(blocks, vec![Block::Markdown("```\n:::info\n```\n".to_owned())]);
    }

    #[test]
    fn test_unclosed_container_warns() {
        let mut warnings = Vec::new();
        let blocks = split_containers(":::info\nbody\n", &mut warnings);
        assert_eq!(blocks.len(), 1);
        assert_eq!(warnings, vec!["unclosed directive :::info at line 1"]);
    }

    #[test]
    fn test_leaf() {
        let directive = parse_leaf("::youtube[dQw4w9WgXcQ]{width=560}").unwrap();
        assert_eq!(directive.name, "youtube");
        assert_eq!(directive.label, "dQw4w9WgXcQ");
        assert_eq!(directive.attributes.get("width"), Some("560"));
        assert!(parse_leaf("::youtube[x] trailing").is_none());
        assert!(parse_leaf(":::info").is_none());
    }

    #[test]
    fn test_text_directive_split() {
        let pieces = split_text_directives("Press :kbd[Ctrl+C] now").unwrap();
        assert_eq!(pieces.len(), 3);
        assert_eq!(pieces[0].as_text(), Some("Press "));
        let NodeKind::TextDirective(directive) = &pieces[1].kind else {
            panic!("expected text directive");
        };
        assert_eq!(directive.name, "kbd");
        assert_eq!(directive.label, "Ctrl+C");
        assert_eq!(pieces[2].as_text(), Some(" now"));
    }

    #[test]
    fn test_colon_after_word_is_text() {
        assert!(split_text_directives("Meet at 19:00 sharp").is_none());
        assert!(split_text_directives("see [cite:smith2020]").is_none());
        assert!(split_text_directives("Note: spaced").is_none());
    }

    #[test]
    fn test_text_directive_keeps_written_form() {
        let pieces = split_text_directives("a :x[]{} b").unwrap();
        let NodeKind::TextDirective(directive) = &pieces[1].kind else {
            panic!("expected text directive");
        };
        assert_eq!(directive.label, "");
        assert!(directive.attributes.is_empty());
        assert_eq!(directive.as_written(1), ":x[]{}");
    }

    #[test]
    fn test_time_after_space_is_directive() {
        let pieces = split_text_directives("at :30 past").unwrap();
        assert!(matches!(&pieces[1].kind, NodeKind::TextDirective(d) if d.name == "30"));
    }
}
