//! Custom node and mark types.
//!
//! An extension describes one type end to end: its schema entry, how it is
//! recognized in the syntax tree, how it is written back, and how it is
//! displayed in the editing surface.

use quire_markdown::{DisplayNode, NodeKind, SyntaxNode};

use crate::convert::{DocParser, DocSerializer};
use crate::error::EditorError;
use crate::model::{DocNode, Mark};
use crate::schema::{MarkSpec, NodeSpec};

/// A custom document node type.
pub trait NodeExtension {
    /// Node type name; must match [`spec`](Self::spec).
    fn name(&self) -> &'static str;

    /// Schema entry, including default attributes.
    fn spec(&self) -> NodeSpec;

    /// Convert a syntax node, or return `None` if it is not this type.
    fn recognize(
        &self,
        node: &SyntaxNode,
        parser: &DocParser,
    ) -> Option<Result<DocNode, EditorError>>;

    /// Write a document node of this type back to syntax.
    fn serialize(
        &self,
        node: &DocNode,
        serializer: &DocSerializer,
    ) -> Result<SyntaxNode, EditorError>;

    /// Display element for a node whose children are already projected.
    fn project(&self, node: &DocNode, children: Vec<DisplayNode>) -> DisplayNode;

    /// Whether container directives must reach [`recognize`](Self::recognize)
    /// instead of being restored as text.
    fn keeps_containers(&self) -> bool {
        false
    }
}

/// A custom mark type.
pub trait MarkExtension {
    /// Mark type name; must match [`spec`](Self::spec).
    fn name(&self) -> &'static str;

    fn spec(&self) -> MarkSpec;

    /// Mark for a wrapping syntax node, or `None` if it is not this type.
    /// The node's children become the marked content.
    fn recognize(&self, node: &SyntaxNode) -> Option<Mark>;

    /// Wrapper kind that writes the mark back.
    fn serialize(&self, mark: &Mark) -> NodeKind;

    /// Empty element wrapped around marked content.
    fn project(&self, mark: &Mark) -> DisplayNode;
}
