//! GitHub contents API client.
//!
//! Files are read and written through `/repos/{owner}/{repo}/contents/{path}`
//! on a single branch. Revision tokens are blob SHAs.

use std::time::Duration;

use base64::Engine;
use base64::prelude::BASE64_STANDARD;
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use ureq::Agent;
use ureq::http::Response;

use crate::repository::{
    ContentRepository, DEFAULT_PUBLIC_DIR, Entry, EntryType, ErrorStatus, FileContent, RepoError,
    RepoErrorKind, file_path, normalize_path,
};

const BACKEND: &str = "GitHub";

/// Default HTTP timeout in seconds.
const DEFAULT_TIMEOUT: u64 = 30;

const API_VERSION: &str = "2022-11-28";

/// Unreserved characters stay as they are in path segments.
const SEGMENT_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// Repository backed by the GitHub contents API.
pub struct GitHubRepository {
    agent: Agent,
    api_url: String,
    owner: String,
    repo: String,
    branch: String,
    token: String,
    public_dir: String,
}

impl std::fmt::Debug for GitHubRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitHubRepository")
            .field("api_url", &self.api_url)
            .field("owner", &self.owner)
            .field("repo", &self.repo)
            .field("branch", &self.branch)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ContentsResponse {
    Listing(Vec<ContentsItem>),
    Item(ContentsItem),
}

#[derive(Debug, Deserialize)]
struct ContentsItem {
    name: String,
    path: String,
    #[serde(rename = "type")]
    item_type: String,
    sha: String,
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WriteResponse {
    content: WrittenContent,
}

#[derive(Debug, Deserialize)]
struct WrittenContent {
    sha: String,
}

#[derive(Debug, Deserialize)]
struct CommitItem {
    commit: CommitDetail,
}

#[derive(Debug, Deserialize)]
struct CommitDetail {
    #[serde(default)]
    author: Option<CommitAuthor>,
}

#[derive(Debug, Deserialize)]
struct CommitAuthor {
    #[serde(default)]
    date: Option<String>,
}

#[derive(Debug, Serialize)]
struct WriteRequest<'a> {
    message: &'a str,
    content: String,
    branch: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    sha: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct DeleteRequest<'a> {
    message: &'a str,
    sha: &'a str,
    branch: &'a str,
}

impl GitHubRepository {
    /// Create a client for `owner/repo` on `branch`.
    #[must_use]
    pub fn new(api_url: &str, owner: &str, repo: &str, branch: &str, token: &str) -> Self {
        let agent = Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(DEFAULT_TIMEOUT)))
            .http_status_as_error(false)
            .build()
            .into();

        Self {
            agent,
            api_url: api_url.trim_end_matches('/').to_owned(),
            owner: owner.to_owned(),
            repo: repo.to_owned(),
            branch: branch.to_owned(),
            token: token.to_owned(),
            public_dir: DEFAULT_PUBLIC_DIR.to_owned(),
        }
    }

    /// Use a different public directory for web paths.
    #[must_use]
    pub fn with_public_dir(mut self, dir: impl Into<String>) -> Self {
        self.public_dir = dir.into();
        self
    }

    fn repo_url(&self) -> String {
        format!(
            "{}/repos/{}/{}",
            self.api_url,
            encode_segment(&self.owner),
            encode_segment(&self.repo)
        )
    }

    fn contents_url(&self, path: &str) -> String {
        let encoded: Vec<String> = path
            .split('/')
            .filter(|segment| !segment.is_empty())
            .map(encode_segment)
            .collect();
        format!("{}/contents/{}", self.repo_url(), encoded.join("/"))
    }

    fn authorization(&self) -> String {
        format!("Bearer {}", self.token)
    }

    fn get_contents(&self, path: &str) -> Result<ContentsResponse, RepoError> {
        let url = self.contents_url(path);
        debug!(path, "GET contents");
        let response = self
            .agent
            .get(&url)
            .header("Authorization", &self.authorization())
            .header("Accept", "application/vnd.github+json")
            .header("X-GitHub-Api-Version", API_VERSION)
            .header("User-Agent", "quire")
            .query("ref", &self.branch)
            .call()
            .map_err(|err| transport_error(err, path))?;
        read_json(response, path)
    }

    /// Date of the last commit touching `path`; failures are logged and ignored.
    fn last_modified(&self, path: &str) -> Option<String> {
        let url = format!("{}/commits", self.repo_url());
        let result = self
            .agent
            .get(&url)
            .header("Authorization", &self.authorization())
            .header("Accept", "application/vnd.github+json")
            .header("X-GitHub-Api-Version", API_VERSION)
            .header("User-Agent", "quire")
            .query("path", path)
            .query("sha", &self.branch)
            .query("per_page", "1")
            .call()
            .map_err(|err| transport_error(err, path))
            .and_then(|response| read_json::<Vec<CommitItem>>(response, path));
        match result {
            Ok(commits) => commits
                .into_iter()
                .next()
                .and_then(|item| item.commit.author)
                .and_then(|author| author.date),
            Err(err) => {
                debug!(path, error = %err, "Commit history unavailable");
                None
            }
        }
    }

    fn put_contents(
        &self,
        path: &str,
        data: &[u8],
        sha: Option<&str>,
        message: &str,
    ) -> Result<String, RepoError> {
        let url = self.contents_url(path);
        let body = WriteRequest {
            message,
            content: BASE64_STANDARD.encode(data),
            branch: &self.branch,
            sha,
        };
        info!(path, bytes = data.len(), "Writing file");
        let response = self
            .agent
            .put(&url)
            .header("Authorization", &self.authorization())
            .header("Accept", "application/vnd.github+json")
            .header("X-GitHub-Api-Version", API_VERSION)
            .header("User-Agent", "quire")
            .send_json(&body)
            .map_err(|err| transport_error(err, path))?;
        let written: WriteResponse = read_json(response, path)?;
        Ok(written.content.sha)
    }
}

impl ContentRepository for GitHubRepository {
    fn read_file(&self, path: &str) -> Result<FileContent, RepoError> {
        let path = file_path(path)?;
        let ContentsResponse::Item(item) = self.get_contents(path)? else {
            return Err(invalid_content(path, "path is a directory"));
        };
        let Some(encoded) = item.content else {
            return Err(invalid_content(path, "response has no content"));
        };
        let bytes = decode_content(&encoded).map_err(|err| {
            RepoError::new(RepoErrorKind::InvalidContent)
                .with_path(path)
                .with_backend(BACKEND)
                .with_source(err)
        })?;
        let content = String::from_utf8(bytes).map_err(|err| {
            RepoError::new(RepoErrorKind::InvalidContent)
                .with_path(path)
                .with_backend(BACKEND)
                .with_source(err)
        })?;
        Ok(FileContent {
            content,
            revision: item.sha,
            last_modified: self.last_modified(path),
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
        self.put_contents(path, content.as_bytes(), revision, &message)
    }

    fn create_binary(&self, path: &str, data: &[u8], message: &str) -> Result<String, RepoError> {
        let path = file_path(path)?;
        self.put_contents(path, data, None, message)
    }

    fn list_entries(&self, path: &str) -> Result<Vec<Entry>, RepoError> {
        let path = normalize_path(path)?;
        match self.get_contents(path)? {
            ContentsResponse::Listing(items) => Ok(items.into_iter().map(entry).collect()),
            ContentsResponse::Item(_) => Err(RepoError::new(RepoErrorKind::InvalidPath)
                .with_path(path)
                .with_backend(BACKEND)
                .with_message("path is a file")),
        }
    }

    fn delete_file(
        &self,
        path: &str,
        revision: &str,
        message: Option<&str>,
    ) -> Result<(), RepoError> {
        let path = file_path(path)?;
        let message = message.map_or_else(|| format!("Delete {path}"), str::to_owned);
        let url = self.contents_url(path);
        let body = DeleteRequest {
            message: &message,
            sha: revision,
            branch: &self.branch,
        };
        info!(path, "Deleting file");
        let response = self
            .agent
            .delete(&url)
            .header("Authorization", &self.authorization())
            .header("Accept", "application/vnd.github+json")
            .header("X-GitHub-Api-Version", API_VERSION)
            .header("User-Agent", "quire")
            .force_send_body()
            .send_json(&body)
            .map_err(|err| transport_error(err, path))?;
        check_status(response, path).map(drop)
    }

    fn public_dir(&self) -> &str {
        &self.public_dir
    }
}

fn encode_segment(segment: &str) -> String {
    utf8_percent_encode(segment, SEGMENT_ENCODE_SET).to_string()
}

/// Decode a contents payload; GitHub wraps the base64 text at 60 columns.
fn decode_content(encoded: &str) -> Result<Vec<u8>, base64::DecodeError> {
    let compact: String = encoded.chars().filter(|c| !c.is_whitespace()).collect();
    BASE64_STANDARD.decode(compact)
}

fn entry(item: ContentsItem) -> Entry {
    let entry_type = if item.item_type == "dir" {
        EntryType::Dir
    } else {
        EntryType::File
    };
    Entry::new(item.name, item.path, entry_type)
}

fn invalid_content(path: &str, message: &str) -> RepoError {
    RepoError::new(RepoErrorKind::InvalidContent)
        .with_path(path)
        .with_backend(BACKEND)
        .with_message(message)
}

fn transport_error(err: ureq::Error, path: &str) -> RepoError {
    let (kind, status) = match &err {
        ureq::Error::Timeout(_) => (RepoErrorKind::Timeout, ErrorStatus::Temporary),
        ureq::Error::Io(_) | ureq::Error::ConnectionFailed | ureq::Error::HostNotFound => {
            (RepoErrorKind::Unavailable, ErrorStatus::Temporary)
        }
        _ => (RepoErrorKind::Other, ErrorStatus::Permanent),
    };
    RepoError::new(kind)
        .with_status(status)
        .with_path(path)
        .with_backend(BACKEND)
        .with_source(err)
}

/// Turn an error status into a [`RepoError`], passing successful responses through.
fn check_status(
    response: Response<ureq::Body>,
    path: &str,
) -> Result<Response<ureq::Body>, RepoError> {
    let code = response.status().as_u16();
    if code < 400 {
        return Ok(response);
    }
    let rate_limited = code == 403
        && response
            .headers()
            .get("x-ratelimit-remaining")
            .is_some_and(|remaining| remaining == "0");
    let body = response
        .into_body()
        .read_to_string()
        .unwrap_or_else(|_| "(unable to read error body)".to_owned());
    let mut error = if rate_limited {
        RepoError::new(RepoErrorKind::RateLimited).with_status(ErrorStatus::Persistent)
    } else {
        RepoError::from_http_status(code)
    };
    error = error
        .with_path(path)
        .with_backend(BACKEND)
        .with_message(format!("HTTP {code}: {}", api_message(&body)));
    Err(error)
}

fn read_json<T: serde::de::DeserializeOwned>(
    response: Response<ureq::Body>,
    path: &str,
) -> Result<T, RepoError> {
    check_status(response, path)?
        .into_body()
        .read_json()
        .map_err(|err| {
            RepoError::new(RepoErrorKind::InvalidContent)
                .with_path(path)
                .with_backend(BACKEND)
                .with_source(err)
        })
}

/// The `message` field of a GitHub error body, or the body itself.
fn api_message(body: &str) -> String {
    #[derive(Deserialize)]
    struct ApiError {
        message: String,
    }
    serde_json::from_str::<ApiError>(body).map_or_else(|_| body.trim().to_owned(), |e| e.message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    static_assertions::assert_impl_all!(GitHubRepository: Send, Sync);

    fn client() -> GitHubRepository {
        GitHubRepository::new("https://api.github.com/", "acme", "my blog", "main", "t0ken")
    }

    #[test]
    fn test_contents_url_encodes_segments() {
        assert_eq!(
            client().contents_url("content/blog/你好 world.md"),
            "https://api.github.com/repos/acme/my%20blog/contents/content/blog/%E4%BD%A0%E5%A5%BD%20world.md"
        );
        assert_eq!(
            client().contents_url(""),
            "https://api.github.com/repos/acme/my%20blog/contents/"
        );
    }

    #[test]
    fn test_debug_hides_token() {
        let debug = format!("{:?}", client());
        assert!(debug.contains("acme"));
        assert!(!debug.contains("t0ken"));
    }

    #[test]
    fn test_decode_wrapped_content() {
        let encoded = "IyBIZWxs\nbyB3b3Js\nZAo=\n";
        assert_eq!(decode_content(encoded).unwrap(), b"# Hello world\n");
        assert!(decode_content("@@@").is_err());
    }

    #[test]
    fn test_parse_listing_and_item() {
        let listing: ContentsResponse = serde_json::from_str(
            r#"[
                {"name": "a.md", "path": "content/blog/a.md", "type": "file", "sha": "1"},
                {"name": "2024", "path": "content/blog/2024", "type": "dir", "sha": "2"}
            ]"#,
        )
        .unwrap();
        let ContentsResponse::Listing(items) = listing else {
            panic!("expected listing");
        };
        let entries: Vec<Entry> = items.into_iter().map(entry).collect();
        assert_eq!(
            entries,
            vec![
                Entry::new("a.md", "content/blog/a.md", EntryType::File),
                Entry::new("2024", "content/blog/2024", EntryType::Dir),
            ]
        );

        let item: ContentsResponse = serde_json::from_str(
            r#"{"name": "a.md", "path": "content/blog/a.md", "type": "file", "sha": "abc", "content": "YQ==\n", "encoding": "base64"}"#,
        )
        .unwrap();
        let ContentsResponse::Item(item) = item else {
            panic!("expected item");
        };
        assert_eq!(item.sha, "abc");
        assert_eq!(item.content.as_deref(), Some("YQ==\n"));
    }

    #[test]
    fn test_write_request_body() {
        let body = WriteRequest {
            message: "Create a.md",
            content: BASE64_STANDARD.encode("hi"),
            branch: "main",
            sha: None,
        };
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            serde_json::json!({"message": "Create a.md", "content": "aGk=", "branch": "main"})
        );
        let body = WriteRequest {
            sha: Some("abc"),
            ..body
        };
        assert_eq!(serde_json::to_value(&body).unwrap()["sha"], "abc");
    }

    #[test]
    fn test_api_message() {
        assert_eq!(
            api_message(r#"{"message": "Not Found", "documentation_url": "x"}"#),
            "Not Found"
        );
        assert_eq!(api_message(" plain text \n"), "plain text");
    }

    #[test]
    fn test_invalid_paths_fail_before_network() {
        let repo = client();
        assert_eq!(
            repo.read_file("../secrets").unwrap_err().kind,
            RepoErrorKind::InvalidPath
        );
        assert_eq!(
            repo.write_file("", "x", None, None).unwrap_err().kind,
            RepoErrorKind::InvalidPath
        );
    }
}
