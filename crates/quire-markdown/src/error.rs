//! Error types for markdown parsing.

/// Error while reading a post.
///
/// Markdown itself always parses; only structured parts can fail.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ParseError {
    /// Front matter is not valid YAML for a post.
    #[error("invalid front matter")]
    FrontMatter(#[from] serde_yaml::Error),
}
