//! Editor errors.

use quire_lifecycle::LifecycleError;
use quire_markdown::StringifyError;

/// A document or mark that violates the schema.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchemaError {
    #[error("unknown node type '{0}'")]
    UnknownNode(String),
    #[error("unknown mark type '{0}'")]
    UnknownMark(String),
    #[error("node type '{node}' has no attribute '{attr}'")]
    UnknownAttr { node: String, attr: String },
    #[error("invalid content for '{node}': {reason}")]
    InvalidContent { node: String, reason: String },
}

/// Editor failure.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum EditorError {
    #[error(transparent)]
    Schema(#[from] SchemaError),
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
    #[error(transparent)]
    Stringify(#[from] StringifyError),
    /// A syntax node no core rule or extension recognizes.
    #[error("no document node recognizes syntax node '{0}'")]
    Unrecognized(String),
    /// A document node the serializer cannot write.
    #[error("no serializer for document node '{0}'")]
    Unserializable(String),
    #[error("position {pos} is outside the document (size {size})")]
    OutOfRange { pos: usize, size: usize },
    #[error("command '{0}' is not registered")]
    UnknownCommand(String),
    #[error("plugin '{0}' failed: {1}")]
    Plugin(&'static str, String),
    #[error("editor has been destroyed")]
    Destroyed,
}
