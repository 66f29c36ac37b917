//! Content repository access for the quire admin editor.
//!
//! The editor shell reads and writes posts, author profiles and uploaded
//! images through the [`ContentRepository`] trait. Paths are repository
//! paths such as `content/blog/hello.md`.
//!
//! The crate provides:
//! - [`ContentRepository`] trait with file, listing and upload operations
//! - [`GitHubRepository`] backed by the GitHub contents API
//! - [`MemoryRepository`] for testing (behind `mock` feature flag)
//!
//! # Example
//!
//! ```ignore
//! use quire_repo::{ContentRepository, GitHubRepository};
//!
//! let repo = GitHubRepository::new("https://api.github.com", "acme", "blog", "main", token);
//! let file = repo.read_file("content/blog/hello.md")?;
//! let revision = repo.write_file("content/blog/hello.md", &edited, Some(&file.revision), None)?;
//! ```

mod github;
#[cfg(feature = "mock")]
mod mock;
mod repository;

pub use github::GitHubRepository;
#[cfg(feature = "mock")]
pub use mock::MemoryRepository;
pub use repository::{
    ContentRepository, Entry, EntryType, ErrorStatus, FileContent, RepoError, RepoErrorKind,
    asset_name, normalize_path, web_path,
};
