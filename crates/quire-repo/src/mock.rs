//! In-memory repository for testing.
//!
//! Provides [`MemoryRepository`] for unit testing without network access.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::repository::{
    ContentRepository, DEFAULT_PUBLIC_DIR, Entry, EntryType, FileContent, RepoError, RepoErrorKind,
    file_path, normalize_path,
};

const BACKEND: &str = "Memory";
const POISONED: &str = "memory repository lock poisoned";

#[derive(Debug, Clone)]
struct StoredFile {
    data: Vec<u8>,
    revision: String,
}

/// Repository held in memory.
///
/// Revision tokens are `r1`, `r2`, … in write order. Every write, upload and
/// delete appends its commit message to [`MemoryRepository::commits`].
///
/// # Example
///
/// ```ignore
/// use quire_repo::{ContentRepository, MemoryRepository};
///
/// let repo = MemoryRepository::new().with_file("content/blog/a.md", "# A\n");
/// let file = repo.read_file("content/blog/a.md").unwrap();
/// repo.write_file("content/blog/a.md", "# A!\n", Some(&file.revision), None).unwrap();
/// ```
#[derive(Debug)]
pub struct MemoryRepository {
    files: RwLock<BTreeMap<String, StoredFile>>,
    commits: RwLock<Vec<String>>,
    next_revision: AtomicU64,
    public_dir: String,
}

impl Default for MemoryRepository {
    fn default() -> Self {
        Self {
            files: RwLock::new(BTreeMap::new()),
            commits: RwLock::new(Vec::new()),
            next_revision: AtomicU64::new(1),
            public_dir: DEFAULT_PUBLIC_DIR.to_owned(),
        }
    }
}

impl MemoryRepository {
    /// Create a new empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a file without recording a commit.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    #[must_use]
    pub fn with_file(self, path: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        let revision = self.revision();
        let file = StoredFile {
            data: content.into(),
            revision,
        };
        self.files.write().expect(POISONED).insert(path.into(), file);
        self
    }

    /// Use a different public directory for web paths.
    #[must_use]
    pub fn with_public_dir(mut self, dir: impl Into<String>) -> Self {
        self.public_dir = dir.into();
        self
    }

    /// Raw bytes stored at `path`.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    #[must_use]
    pub fn bytes(&self, path: &str) -> Option<Vec<u8>> {
        let files = self.files.read().expect(POISONED);
        files.get(path).map(|file| file.data.clone())
    }

    /// Every stored path, sorted.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    #[must_use]
    pub fn paths(&self) -> Vec<String> {
        self.files.read().expect(POISONED).keys().cloned().collect()
    }

    /// Commit messages in order.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    #[must_use]
    pub fn commits(&self) -> Vec<String> {
        self.commits.read().expect(POISONED).clone()
    }

    fn revision(&self) -> String {
        format!("r{}", self.next_revision.fetch_add(1, Ordering::Relaxed))
    }

    fn commit(&self, message: String) {
        self.commits.write().expect(POISONED).push(message);
    }

    fn store(
        &self,
        path: &str,
        data: Vec<u8>,
        revision: Option<&str>,
        message: String,
    ) -> Result<String, RepoError> {
        let mut files = self.files.write().expect(POISONED);
        let current = files.get(path).map(|file| file.revision.as_str());
        if current != revision {
            return Err(RepoError::conflict(path).with_backend(BACKEND));
        }
        let revision = self.revision();
        files.insert(
            path.to_owned(),
            StoredFile {
                data,
                revision: revision.clone(),
            },
        );
        drop(files);
        self.commit(message);
        Ok(revision)
    }
}

impl ContentRepository for MemoryRepository {
    fn read_file(&self, path: &str) -> Result<FileContent, RepoError> {
        let path = file_path(path)?;
        let files = self.files.read().expect(POISONED);
        let file = files
            .get(path)
            .ok_or_else(|| RepoError::not_found(path).with_backend(BACKEND))?;
        let content = String::from_utf8(file.data.clone()).map_err(|err| {
            RepoError::new(RepoErrorKind::InvalidContent)
                .with_path(path)
                .with_backend(BACKEND)
                .with_source(err)
        })?;
        Ok(FileContent {
            content,
            revision: file.revision.clone(),
            last_modified: None,
        })
    }

    fn write_file(
        &self,
        path: &str,
        content: &str,
        revision: Option<&str>,
        message: Option<&str>,
    ) -> Result<String, RepoError> {
        let path = file_path(path)?;
        let message = message.map_or_else(
            || {
                if revision.is_some() {
                    format!("Update {path}")
                } else {
                    format!("Create {path}")
                }
            },
            str::to_owned,
        );
        self.store(path, content.as_bytes().to_vec(), revision, message)
    }

    fn create_binary(&self, path: &str, data: &[u8], message: &str) -> Result<String, RepoError> {
        let path = file_path(path)?;
        self.store(path, data.to_vec(), None, message.to_owned())
    }

    fn list_entries(&self, path: &str) -> Result<Vec<Entry>, RepoError> {
        let dir = normalize_path(path)?;
        let prefix = if dir.is_empty() {
            String::new()
        } else {
            format!("{dir}/")
        };
        let files = self.files.read().expect(POISONED);
        let mut dirs = BTreeSet::new();
        let mut entries = Vec::new();
        for key in files.keys() {
            let Some(rest) = key.strip_prefix(&prefix) else {
                continue;
            };
            match rest.split_once('/') {
                Some((sub, _)) => {
                    dirs.insert(sub.to_owned());
                }
                None => entries.push(Entry::new(rest, key.as_str(), EntryType::File)),
            }
        }
        if entries.is_empty() && dirs.is_empty() {
            return Err(RepoError::not_found(dir).with_backend(BACKEND));
        }
        let mut listing: Vec<Entry> = dirs
            .into_iter()
            .map(|name| {
                let path = format!("{prefix}{name}");
                Entry::new(name, path, EntryType::Dir)
            })
            .chain(entries)
            .collect();
        listing.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(listing)
    }

    fn delete_file(
        &self,
        path: &str,
        revision: &str,
        message: Option<&str>,
    ) -> Result<(), RepoError> {
        let path = file_path(path)?;
        let mut files = self.files.write().expect(POISONED);
        match files.get(path) {
            None => return Err(RepoError::not_found(path).with_backend(BACKEND)),
            Some(file) if file.revision != revision => {
                return Err(RepoError::conflict(path).with_backend(BACKEND));
            }
            Some(_) => {}
        }
        files.remove(path);
        drop(files);
        self.commit(message.map_or_else(|| format!("Delete {path}"), str::to_owned));
        Ok(())
    }

    fn public_dir(&self) -> &str {
        &self.public_dir
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    static_assertions::assert_impl_all!(MemoryRepository: Send, Sync);

    fn repo() -> MemoryRepository {
        MemoryRepository::new()
            .with_file("content/blog/hello.md", "# Hello\n")
            .with_file("content/blog/notes.txt", "x")
            .with_file("content/authors/chin.md", "name: Chin\n")
            .with_file("public/images/a.png", vec![0x89, b'P'])
            .with_file("public/images/2024/b.JPG", vec![1])
    }

    #[test]
    fn test_read_file() {
        let file = repo().read_file("/content/blog/hello.md").unwrap();
        assert_eq!(file.content, "# Hello\n");
        assert_eq!(file.revision, "r1");
    }

    #[test]
    fn test_read_missing_and_binary() {
        let repo = repo();
        let err = repo.read_file("content/blog/missing.md").unwrap_err();
        assert_eq!(err.kind, RepoErrorKind::NotFound);
        assert_eq!(err.backend, Some("Memory"));

        let err = repo.read_file("public/images/a.png").unwrap_err();
        assert_eq!(err.kind, RepoErrorKind::InvalidContent);
    }

    #[test]
    fn test_write_with_revision() {
        let repo = repo();
        let file = repo.read_file("content/blog/hello.md").unwrap();
        let revision = repo
            .write_file("content/blog/hello.md", "# Hi\n", Some(&file.revision), None)
            .unwrap();
        assert_ne!(revision, file.revision);
        assert_eq!(repo.read_file("content/blog/hello.md").unwrap().content, "# Hi\n");
        assert_eq!(repo.commits(), vec!["Update content/blog/hello.md"]);
    }

    #[test]
    fn test_stale_revision_conflicts() {
        let repo = repo();
        let file = repo.read_file("content/blog/hello.md").unwrap();
        repo.write_file("content/blog/hello.md", "one", Some(&file.revision), None)
            .unwrap();
        let err = repo
            .write_file("content/blog/hello.md", "two", Some(&file.revision), None)
            .unwrap_err();
        assert_eq!(err.kind, RepoErrorKind::Conflict);

        let err = repo
            .write_file("content/blog/hello.md", "three", None, None)
            .unwrap_err();
        assert_eq!(err.kind, RepoErrorKind::Conflict);
        assert_eq!(repo.read_file("content/blog/hello.md").unwrap().content, "one");
    }

    #[test]
    fn test_create_new_file() {
        let repo = repo();
        repo.write_file("content/blog/new.md", "new", None, Some("Add post"))
            .unwrap();
        assert_eq!(repo.commits(), vec!["Add post"]);
    }

    #[test]
    fn test_list_entries() {
        let entries = repo().list_entries("content").unwrap();
        assert_eq!(
            entries,
            vec![
                Entry::new("authors", "content/authors", EntryType::Dir),
                Entry::new("blog", "content/blog", EntryType::Dir),
            ]
        );
        let root = repo().list_entries("").unwrap();
        let names: Vec<_> = root.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["content", "public"]);
        assert_eq!(
            repo().list_entries("drafts").unwrap_err().kind,
            RepoErrorKind::NotFound
        );
    }

    #[test]
    fn test_list_markdown() {
        let posts = repo().list_markdown("content/blog").unwrap();
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].stem(), "hello");
        assert!(repo().list_markdown("content/drafts").unwrap().is_empty());
    }

    #[test]
    fn test_list_images_recursive() {
        let images = repo().list_images("/public/images").unwrap();
        assert_eq!(
            images,
            vec![
                Entry::new("b.JPG", "/images/2024/b.JPG", EntryType::File),
                Entry::new("a.png", "/images/a.png", EntryType::File),
            ]
        );
    }

    #[test]
    fn test_upload_asset() {
        let repo = MemoryRepository::new();
        let web = repo
            .upload_asset(b"png", "my cat.png", "public/images/uploads")
            .unwrap();
        assert!(web.starts_with("/images/uploads/"), "{web}");
        assert!(web.ends_with("-my_cat.png"), "{web}");

        let stored = format!("public{web}");
        assert_eq!(repo.bytes(&stored), Some(b"png".to_vec()));
        assert!(repo.commits()[0].starts_with("Upload image: "));
    }

    #[test]
    fn test_upload_with_custom_public_dir() {
        let repo = MemoryRepository::new().with_public_dir("static");
        let web = repo.upload_asset(b"x", "a.gif", "static/uploads").unwrap();
        assert!(web.starts_with("/uploads/"), "{web}");
    }

    #[test]
    fn test_move_file() {
        let repo = repo();
        repo.move_file("content/blog/hello.md", "content/blog/2024/hello.md", None)
            .unwrap();
        assert!(repo.bytes("content/blog/hello.md").is_none());
        assert_eq!(
            repo.read_file("content/blog/2024/hello.md").unwrap().content,
            "# Hello\n"
        );
        assert_eq!(
            repo.commits(),
            vec![
                "Move content/blog/hello.md to content/blog/2024/hello.md",
                "Remove content/blog/hello.md (moved to content/blog/2024/hello.md)",
            ]
        );
    }

    #[test]
    fn test_move_overwrites_existing_target() {
        let repo = repo().with_file("content/blog/target.md", "old");
        repo.move_file("content/blog/hello.md", "content/blog/target.md", None)
            .unwrap();
        assert_eq!(
            repo.read_file("content/blog/target.md").unwrap().content,
            "# Hello\n"
        );
    }

    #[test]
    fn test_move_missing_source() {
        let err = repo()
            .move_file("content/blog/nope.md", "content/blog/x.md", None)
            .unwrap_err();
        assert_eq!(err.kind, RepoErrorKind::NotFound);
    }

    #[test]
    fn test_delete_file() {
        let repo = repo();
        let file = repo.read_file("content/authors/chin.md").unwrap();
        let err = repo
            .delete_file("content/authors/chin.md", "r999", None)
            .unwrap_err();
        assert_eq!(err.kind, RepoErrorKind::Conflict);
        repo.delete_file("content/authors/chin.md", &file.revision, None)
            .unwrap();
        assert!(!repo.paths().contains(&"content/authors/chin.md".to_owned()));
        assert_eq!(repo.commits(), vec!["Delete content/authors/chin.md"]);
    }
}
