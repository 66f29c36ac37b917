//! Repository trait, entry types and errors.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;

/// Image extensions picked up by [`ContentRepository::list_images`].
const IMAGE_EXTENSIONS: [&str; 6] = ["png", "jpg", "jpeg", "gif", "webp", "svg"];

/// Directory served at the site root.
pub(crate) const DEFAULT_PUBLIC_DIR: &str = "public";

/// A file read from the repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileContent {
    /// UTF-8 file content.
    pub content: String,
    /// Revision token to pass back when writing.
    pub revision: String,
    /// Date of the last commit touching the file, if known.
    pub last_modified: Option<String>,
}

/// Kind of a directory entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryType {
    File,
    Dir,
}

/// One entry of a directory listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Entry {
    /// File or directory name.
    pub name: String,
    /// Repository path, or web path for image listings.
    pub path: String,
    #[serde(rename = "type")]
    pub entry_type: EntryType,
}

impl Entry {
    pub(crate) fn new(name: impl Into<String>, path: impl Into<String>, entry_type: EntryType) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            entry_type,
        }
    }

    /// File name without the `.md` extension.
    #[must_use]
    pub fn stem(&self) -> &str {
        self.name.strip_suffix(".md").unwrap_or(&self.name)
    }
}

/// Semantic error categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum RepoErrorKind {
    /// File or directory does not exist.
    NotFound,
    /// Revision token does not match the current file.
    Conflict,
    /// Token missing, invalid or lacking access.
    PermissionDenied,
    /// Path is empty, absolute or escapes the repository.
    InvalidPath,
    /// File content is not UTF-8 or the response is malformed.
    InvalidContent,
    /// Backend is temporarily unavailable.
    Unavailable,
    /// Too many requests.
    RateLimited,
    /// Operation timed out.
    Timeout,
    /// Other/unknown error category.
    Other,
}

/// Retry guidance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ErrorStatus {
    /// Don't retry (not found, conflict, invalid path).
    #[default]
    Permanent,
    /// Retry immediately (timeout, connection reset).
    Temporary,
    /// Retry with backoff (rate limited, service unavailable).
    Persistent,
}

/// Repository error with semantic kind and backend-specific source.
#[derive(Debug)]
pub struct RepoError {
    /// Semantic error category.
    pub kind: RepoErrorKind,
    /// Retry guidance.
    pub status: ErrorStatus,
    /// Repository path (if applicable).
    pub path: Option<String>,
    /// Backend identifier (e.g., "GitHub", "Memory").
    pub backend: Option<&'static str>,
    message: Option<String>,
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl RepoError {
    /// Create a new repository error.
    #[must_use]
    pub fn new(kind: RepoErrorKind) -> Self {
        Self {
            kind,
            status: ErrorStatus::Permanent,
            path: None,
            backend: None,
            message: None,
            source: None,
        }
    }

    /// Attach path context.
    #[must_use]
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Attach backend identifier.
    #[must_use]
    pub fn with_backend(mut self, backend: &'static str) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Set retry status.
    #[must_use]
    pub fn with_status(mut self, status: ErrorStatus) -> Self {
        self.status = status;
        self
    }

    /// Attach a human-readable detail.
    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Attach the underlying error source.
    #[must_use]
    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Downcast the source error to a concrete type.
    #[must_use]
    pub fn downcast_source<E: std::error::Error + 'static>(&self) -> Option<&E> {
        self.source.as_ref()?.downcast_ref()
    }

    /// Create a not found error with path.
    #[must_use]
    pub fn not_found(path: impl Into<String>) -> Self {
        Self::new(RepoErrorKind::NotFound).with_path(path)
    }

    /// Create a conflict error with path.
    #[must_use]
    pub fn conflict(path: impl Into<String>) -> Self {
        Self::new(RepoErrorKind::Conflict).with_path(path)
    }

    /// Map an HTTP status code to an error.
    #[must_use]
    pub fn from_http_status(code: u16) -> Self {
        let (kind, status) = match code {
            401 | 403 => (RepoErrorKind::PermissionDenied, ErrorStatus::Permanent),
            404 => (RepoErrorKind::NotFound, ErrorStatus::Permanent),
            409 | 412 | 422 => (RepoErrorKind::Conflict, ErrorStatus::Permanent),
            408 => (RepoErrorKind::Timeout, ErrorStatus::Temporary),
            429 => (RepoErrorKind::RateLimited, ErrorStatus::Persistent),
            500..=599 => (RepoErrorKind::Unavailable, ErrorStatus::Persistent),
            _ => (RepoErrorKind::Other, ErrorStatus::Permanent),
        };
        Self::new(kind).with_status(status)
    }
}

impl std::fmt::Display for RepoError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Format: "[Backend] Kind: message (path: content/blog/a.md)"
        if let Some(backend) = self.backend {
            write!(f, "[{backend}] ")?;
        }

        let kind_str = match self.kind {
            RepoErrorKind::NotFound => "Not found",
            RepoErrorKind::Conflict => "Conflict",
            RepoErrorKind::PermissionDenied => "Permission denied",
            RepoErrorKind::InvalidPath => "Invalid path",
            RepoErrorKind::InvalidContent => "Invalid content",
            RepoErrorKind::Unavailable => "Unavailable",
            RepoErrorKind::RateLimited => "Rate limited",
            RepoErrorKind::Timeout => "Timeout",
            RepoErrorKind::Other => "Error",
        };

        write!(f, "{kind_str}")?;

        if let Some(message) = &self.message {
            write!(f, ": {message}")?;
        } else if let Some(source) = &self.source {
            write!(f, ": {source}")?;
        }

        if let Some(path) = &self.path {
            write!(f, " (path: {path})")?;
        }

        Ok(())
    }
}

impl std::error::Error for RepoError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|s| s.as_ref() as &(dyn std::error::Error + 'static))
    }
}

/// Validate a repository path and strip surrounding slashes.
///
/// `""` names the repository root.
///
/// # Errors
///
/// Returns [`RepoErrorKind::InvalidPath`] for `.`/`..` segments or empty
/// segments inside the path.
pub fn normalize_path(path: &str) -> Result<&str, RepoError> {
    let trimmed = path.trim_matches('/');
    if trimmed.is_empty() {
        return Ok(trimmed);
    }
    if trimmed
        .split('/')
        .any(|segment| segment.is_empty() || segment == "." || segment == "..")
    {
        return Err(RepoError::new(RepoErrorKind::InvalidPath).with_path(path));
    }
    Ok(trimmed)
}

/// Require a path naming a file rather than the root.
pub(crate) fn file_path(path: &str) -> Result<&str, RepoError> {
    let normalized = normalize_path(path)?;
    if normalized.is_empty() {
        return Err(RepoError::new(RepoErrorKind::InvalidPath)
            .with_path(path)
            .with_message("a file path is required"));
    }
    Ok(normalized)
}

/// Upload file name: `{millis}-{name}` with every character outside
/// `[A-Za-z0-9.-]` replaced by `_`.
#[must_use]
pub fn asset_name(filename: &str, millis: u128) -> String {
    let filename = if filename.is_empty() { "image.png" } else { filename };
    let safe: String = filename
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect();
    format!("{millis}-{safe}")
}

/// Web path of a repository file: the public directory is served at `/`.
#[must_use]
pub fn web_path(repo_path: &str, public_dir: &str) -> String {
    let path = repo_path.trim_start_matches('/');
    let public_dir = public_dir.trim_matches('/');
    let stripped = path
        .strip_prefix(public_dir)
        .filter(|rest| rest.is_empty() || rest.starts_with('/'))
        .map_or(path, |rest| rest.trim_start_matches('/'));
    format!("/{stripped}")
}

fn is_image(name: &str) -> bool {
    name.rsplit_once('.').is_some_and(|(_, ext)| {
        IMAGE_EXTENSIONS
            .iter()
            .any(|image| ext.eq_ignore_ascii_case(image))
    })
}

fn now_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis()
}

/// Content repository used by the editor shell.
///
/// Writes are optimistic: a write carrying a revision token fails with
/// [`RepoErrorKind::Conflict`] when the file changed since it was read, and
/// a write without one fails the same way when the file already exists.
pub trait ContentRepository: Send + Sync {
    /// Read a UTF-8 file with its revision token.
    ///
    /// # Errors
    ///
    /// Returns [`RepoError`] if the file doesn't exist or isn't UTF-8.
    fn read_file(&self, path: &str) -> Result<FileContent, RepoError>;

    /// Create or update a file, returning the new revision token.
    ///
    /// `message` defaults to `Update {path}` or `Create {path}`.
    ///
    /// # Errors
    ///
    /// Returns [`RepoErrorKind::Conflict`] on a stale or missing revision.
    fn write_file(
        &self,
        path: &str,
        content: &str,
        revision: Option<&str>,
        message: Option<&str>,
    ) -> Result<String, RepoError>;

    /// Write binary content to a new file, returning its revision token.
    ///
    /// # Errors
    ///
    /// Returns [`RepoErrorKind::Conflict`] if the file already exists.
    fn create_binary(&self, path: &str, data: &[u8], message: &str) -> Result<String, RepoError>;

    /// List a directory. `""` lists the repository root.
    ///
    /// # Errors
    ///
    /// Returns [`RepoErrorKind::NotFound`] if the directory doesn't exist.
    fn list_entries(&self, path: &str) -> Result<Vec<Entry>, RepoError>;

    /// Delete a file at the given revision.
    ///
    /// # Errors
    ///
    /// Returns [`RepoErrorKind::Conflict`] on a stale revision.
    fn delete_file(&self, path: &str, revision: &str, message: Option<&str>)
    -> Result<(), RepoError>;

    /// Directory served at the site root, stripped from web paths.
    fn public_dir(&self) -> &str {
        DEFAULT_PUBLIC_DIR
    }

    /// Store an uploaded asset under `prefix` and return its web path.
    ///
    /// The stored name is [`asset_name`] of `filename` at the current time.
    ///
    /// # Errors
    ///
    /// Returns [`RepoError`] if the prefix is invalid or the write fails.
    fn upload_asset(&self, data: &[u8], filename: &str, prefix: &str) -> Result<String, RepoError> {
        let prefix = normalize_path(prefix)?;
        let name = asset_name(filename, now_millis());
        let path = if prefix.is_empty() {
            name.clone()
        } else {
            format!("{prefix}/{name}")
        };
        self.create_binary(&path, data, &format!("Upload image: {name}"))?;
        Ok(web_path(&path, self.public_dir()))
    }

    /// Move a file by writing it to `to` and deleting `from`.
    ///
    /// An existing file at `to` is overwritten. Returns the revision token of
    /// the new file.
    ///
    /// # Errors
    ///
    /// Returns [`RepoErrorKind::NotFound`] if `from` doesn't exist.
    fn move_file(&self, from: &str, to: &str, message: Option<&str>) -> Result<String, RepoError> {
        let source = self.read_file(from)?;
        let existing = match self.read_file(to) {
            Ok(file) => Some(file.revision),
            Err(err) if err.kind == RepoErrorKind::NotFound => None,
            Err(err) => return Err(err),
        };
        let message = message.map_or_else(|| format!("Move {from} to {to}"), str::to_owned);
        let revision = self.write_file(to, &source.content, existing.as_deref(), Some(&message))?;
        self.delete_file(
            from,
            &source.revision,
            Some(&format!("Remove {from} (moved to {to})")),
        )?;
        Ok(revision)
    }

    /// Markdown files directly inside `path`; a missing directory is empty.
    ///
    /// # Errors
    ///
    /// Returns [`RepoError`] for failures other than a missing directory.
    fn list_markdown(&self, path: &str) -> Result<Vec<Entry>, RepoError> {
        match self.list_entries(path) {
            Ok(entries) => Ok(entries
                .into_iter()
                .filter(|e| e.entry_type == EntryType::File && e.name.ends_with(".md"))
                .collect()),
            Err(err) if err.kind == RepoErrorKind::NotFound => Ok(Vec::new()),
            Err(err) => Err(err),
        }
    }

    /// Images under `path`, recursively, with web paths.
    ///
    /// # Errors
    ///
    /// Returns [`RepoError`] for failures other than a missing directory.
    fn list_images(&self, path: &str) -> Result<Vec<Entry>, RepoError> {
        let mut images = Vec::new();
        let mut pending = vec![normalize_path(path)?.to_owned()];
        while let Some(dir) = pending.pop() {
            let entries = match self.list_entries(&dir) {
                Ok(entries) => entries,
                Err(err) if err.kind == RepoErrorKind::NotFound => continue,
                Err(err) => return Err(err),
            };
            // Reverse so subdirectories are visited in listing order.
            for entry in entries.into_iter().rev() {
                match entry.entry_type {
                    EntryType::Dir => pending.push(entry.path),
                    EntryType::File if is_image(&entry.name) => images.push(Entry::new(
                        entry.name,
                        web_path(&entry.path, self.public_dir()),
                        EntryType::File,
                    )),
                    EntryType::File => {}
                }
            }
        }
        images.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(images)
    }
}
