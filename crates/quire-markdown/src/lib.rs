//! Markdown authoring pipeline for quire.
//!
//! A post flows through three stages:
//!
//! 1. [`MarkdownParser`] turns source text into a [`SyntaxNode`] tree
//!    (pulldown-cmark plus directive syntax).
//! 2. A [`Pipeline`] of [`Transform`] passes rewrites the tree: citations,
//!    heading ids, coloured spans, figure captions, info boxes, and the
//!    directive fallback guard.
//! 3. [`project`] maps the result to a [`DisplayNode`] tree for the page
//!    renderer, or [`Stringifier`] writes it back to markdown.
//!
//! # Example
//!
//! ```
//! use quire_markdown::render_markdown;
//!
//! let result = render_markdown("### Title {#custom-id}\n\nSee ^[a] and [cite:b] and [cite:a]\n").unwrap();
//! assert_eq!(result.toc[0].id, "custom-id");
//! assert_eq!(result.citations.keys(), ["a", "b"]);
//! assert!(result.html.starts_with(r#"<h3 id="custom-id">Title</h3>"#));
//! ```

mod ast;
mod attributes;
mod display;
mod error;
mod front_matter;
mod parser;
mod render;
mod stringify;
pub mod transform;

pub use ast::{Alignment, Directive, InfoBoxKind, NodeKind, SyntaxNode, merge_adjacent_text};
pub use attributes::Attributes;
pub use display::{DisplayNode, citation_anchor, escape_html, project, to_html};
pub use error::ParseError;
pub use front_matter::{PostMeta, split_front_matter};
pub use parser::{MarkdownParser, Parsed, SyntaxExtension};
pub use render::{MarkdownRenderer, RenderResult, render_markdown};
pub use stringify::{DirectiveHandler, SpanHandler, StringifyError, StringifyHandler, Stringifier};
pub use transform::{CitationRegistry, Pipeline, TocEntry, Transform, TransformContext};
