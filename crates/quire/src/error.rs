//! CLI error types.

use quire_config::ConfigError;
use quire_editor::EditorError;
use quire_markdown::ParseError;
use quire_repo::RepoError;

/// CLI error type.
#[derive(Debug, thiserror::Error)]
pub(crate) enum CliError {
    #[error("{0}")]
    Config(#[from] ConfigError),

    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Parse(#[from] ParseError),

    #[error("{0}")]
    Editor(#[from] EditorError),

    #[error("{0}")]
    Repo(#[from] RepoError),

    #[error("{0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Validation(String),
}
