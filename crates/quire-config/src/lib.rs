//! Configuration management for quire.
//!
//! Parses `quire.toml` configuration files with serde and provides
//! auto-discovery of config files in parent directories.
//!
//! CLI settings can be applied during load via [`CliSettings`].
//!
//! ## Environment Variable Expansion
//!
//! String configuration values support environment variable expansion:
//!
//! - `${VAR}` - expands to the value of VAR, errors if unset
//! - `${VAR:-default}` - expands to VAR if set, otherwise uses default
//!
//! Expanded fields:
//! - `site.base_url`
//! - `repository.repo`
//! - `repository.branch`
//! - `repository.token`
//! - `repository.api_url`

mod expand;

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// CLI settings that override configuration file values.
///
/// All fields are optional. Only non-None values override the loaded config.
#[derive(Debug, Default)]
pub struct CliSettings {
    /// Override the local content root.
    pub content_root: Option<PathBuf>,
    /// Override repository branch.
    pub branch: Option<String>,
    /// Override repository token.
    pub token: Option<String>,
    /// Override the markdown reveal overlay flag.
    pub reveal: Option<bool>,
    /// Override the editor stage timeout, in milliseconds.
    pub stage_timeout_ms: Option<u64>,
}

/// Configuration filename to search for.
const CONFIG_FILENAME: &str = "quire.toml";

/// Application configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Site metadata.
    pub site: SiteConfig,
    /// Content repository (optional section, required by `repo` commands).
    pub repository: Option<RepositoryConfig>,
    /// Content layout (paths are relative strings from TOML).
    content: ContentConfigRaw,
    /// Editor configuration.
    pub editor: EditorSettings,

    /// Resolved content configuration (set after loading).
    #[serde(skip)]
    pub content_resolved: ContentConfig,
    /// Path to the config file (set after loading).
    #[serde(skip)]
    pub config_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self::default_with_base(Path::new("."))
    }
}

/// Site metadata.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    /// Site title.
    pub title: String,
    /// Public URL of the site, used to build absolute links.
    pub base_url: Option<String>,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            title: "quire".to_owned(),
            base_url: None,
        }
    }
}

/// Raw content configuration as parsed from TOML.
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct ContentConfigRaw {
    root: Option<String>,
    blog_dir: Option<String>,
    authors_dir: Option<String>,
    images_dir: Option<String>,
    upload_prefix: Option<String>,
    public_dir: Option<String>,
}

/// Resolved content layout.
///
/// `root` is an absolute local path; the other fields are paths inside the
/// content repository, without leading or trailing slashes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentConfig {
    /// Local checkout of the content repository.
    pub root: PathBuf,
    /// Directory of blog posts.
    pub blog_dir: String,
    /// Directory of author profiles.
    pub authors_dir: String,
    /// Directory listed by the image picker.
    pub images_dir: String,
    /// Directory uploads are written to.
    pub upload_prefix: String,
    /// Directory served at the site root.
    pub public_dir: String,
}

impl Default for ContentConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            blog_dir: "content/blog".to_owned(),
            authors_dir: "content/authors".to_owned(),
            images_dir: "public/images".to_owned(),
            upload_prefix: "public/images/uploads".to_owned(),
            public_dir: "public".to_owned(),
        }
    }
}

impl ContentConfig {
    /// Repository path of the post with the given stem.
    ///
    /// A leading `blog/` on the stem is dropped so that `blog/hello` and
    /// `hello` name the same file.
    #[must_use]
    pub fn post_path(&self, stem: &str) -> String {
        let stem = stem.trim_matches('/');
        let stem = stem.strip_prefix("blog/").unwrap_or(stem);
        let stem = stem.strip_suffix(".md").unwrap_or(stem);
        format!("{}/{stem}.md", self.blog_dir)
    }

    /// Repository path of the author profile with the given id.
    #[must_use]
    pub fn author_path(&self, id: &str) -> String {
        format!("{}/{id}.md", self.authors_dir)
    }
}

/// Content repository configuration.
#[derive(Debug, Deserialize)]
pub struct RepositoryConfig {
    /// Repository as `owner/name`.
    pub repo: String,
    /// Branch commits are written to.
    #[serde(default = "default_branch")]
    pub branch: String,
    /// API token.
    #[serde(default)]
    pub token: String,
    /// API base URL.
    #[serde(default = "default_api_url")]
    pub api_url: String,
}

impl RepositoryConfig {
    /// Validate that all required fields are properly set.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Validation` if any field is empty or has invalid format.
    pub fn validate(&self) -> Result<(), ConfigError> {
        require_non_empty(&self.repo, "repository.repo")?;
        if self.owner_and_name().is_none() {
            return Err(ConfigError::Validation(
                "repository.repo must have the form owner/name".to_owned(),
            ));
        }
        require_non_empty(&self.branch, "repository.branch")?;
        require_non_empty(&self.token, "repository.token")?;
        require_non_empty(&self.api_url, "repository.api_url")?;
        require_http_url(&self.api_url, "repository.api_url")?;
        Ok(())
    }

    /// Split `repo` into owner and name.
    #[must_use]
    pub fn owner_and_name(&self) -> Option<(&str, &str)> {
        let (owner, name) = self.repo.split_once('/')?;
        if owner.is_empty() || name.is_empty() || name.contains('/') {
            return None;
        }
        Some((owner, name))
    }
}

fn default_branch() -> String {
    "main".to_owned()
}

fn default_api_url() -> String {
    "https://api.github.com".to_owned()
}

/// Editor configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct EditorSettings {
    /// Upper bound on each bootstrap stage, in milliseconds. 0 waits forever.
    pub stage_timeout_ms: u64,
    /// Whether the markdown reveal overlay is installed.
    pub reveal: bool,
}

impl Default for EditorSettings {
    fn default() -> Self {
        Self {
            stage_timeout_ms: 10_000,
            reveal: true,
        }
    }
}

impl EditorSettings {
    /// Stage timeout as a duration, `None` when disabled.
    #[must_use]
    pub fn stage_timeout(&self) -> Option<Duration> {
        (self.stage_timeout_ms > 0).then(|| Duration::from_millis(self.stage_timeout_ms))
    }
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File not found.
    #[error("Configuration file not found: {}", .0.display())]
    NotFound(PathBuf),
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// TOML parsing error.
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),
    /// Validation error.
    #[error("Configuration error: {0}")]
    Validation(String),
    /// Environment variable error during expansion.
    #[error("Environment variable error in {field}: {message}")]
    EnvVar {
        /// Config field path (e.g., "`repository.token`").
        field: String,
        /// Error message (e.g., "${`GITHUB_TOKEN`} not set").
        message: String,
    },
}

/// Require a string field to be non-empty.
fn require_non_empty(value: &str, field: &str) -> Result<(), ConfigError> {
    if value.is_empty() {
        return Err(ConfigError::Validation(format!("{field} cannot be empty")));
    }
    Ok(())
}

/// Require a URL field to use http:// or https:// scheme.
fn require_http_url(url: &str, field: &str) -> Result<(), ConfigError> {
    if !url.starts_with("http://") && !url.starts_with("https://") {
        return Err(ConfigError::Validation(format!(
            "{field} must start with http:// or https://"
        )));
    }
    Ok(())
}

/// Require a repository path to be relative and free of `..` segments.
fn require_repo_path(path: &str, field: &str) -> Result<(), ConfigError> {
    require_non_empty(path, field)?;
    if path.starts_with('/') || path.split('/').any(|segment| segment == "..") {
        return Err(ConfigError::Validation(format!(
            "{field} must be a relative path inside the repository"
        )));
    }
    Ok(())
}

impl Config {
    /// Load configuration from file with optional CLI settings.
    ///
    /// If `config_path` is provided, loads from that file.
    /// Otherwise, searches for `quire.toml` in current directory and parents.
    ///
    /// CLI settings are applied after loading and path resolution, allowing CLI
    /// arguments to take precedence over config file values.
    ///
    /// # Errors
    ///
    /// Returns error if explicit `config_path` doesn't exist or parsing fails.
    pub fn load(
        config_path: Option<&Path>,
        cli_settings: Option<&CliSettings>,
    ) -> Result<Self, ConfigError> {
        let mut config = if let Some(path) = config_path {
            if !path.exists() {
                return Err(ConfigError::NotFound(path.to_path_buf()));
            }
            Self::load_from_file(path)?
        } else if let Some(discovered) = std::env::current_dir()
            .ok()
            .and_then(|cwd| Self::discover_from(&cwd))
        {
            Self::load_from_file(&discovered)?
        } else {
            Self::default_with_cwd()
        };

        if let Some(settings) = cli_settings {
            config.apply_cli_settings(settings);
        }

        Ok(config)
    }

    /// Apply CLI settings to the configuration.
    fn apply_cli_settings(&mut self, settings: &CliSettings) {
        if let Some(root) = &settings.content_root {
            self.content_resolved.root.clone_from(root);
        }
        if let Some(repository) = &mut self.repository {
            if let Some(branch) = &settings.branch {
                repository.branch.clone_from(branch);
            }
            if let Some(token) = &settings.token {
                repository.token.clone_from(token);
            }
        }
        if let Some(reveal) = settings.reveal {
            self.editor.reveal = reveal;
        }
        if let Some(timeout) = settings.stage_timeout_ms {
            self.editor.stage_timeout_ms = timeout;
        }
    }

    /// Get validated repository configuration.
    ///
    /// Use this instead of accessing the `repository` field directly when the
    /// command needs the content repository.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Validation` if the section is missing or invalid.
    pub fn require_repository(&self) -> Result<&RepositoryConfig, ConfigError> {
        let repository = self.repository.as_ref().ok_or_else(|| {
            ConfigError::Validation("[repository] section required in config".into())
        })?;
        repository.validate()?;
        Ok(repository)
    }

    /// Search for the config file in `start` and its parents.
    fn discover_from(start: &Path) -> Option<PathBuf> {
        let mut current = start.to_path_buf();
        loop {
            let candidate = current.join(CONFIG_FILENAME);
            if candidate.exists() {
                return Some(candidate);
            }
            if !current.pop() {
                return None;
            }
        }
    }

    /// Create default config with paths relative to current working directory.
    fn default_with_cwd() -> Self {
        let cwd = std::env::current_dir().unwrap_or_default();
        Self::default_with_base(&cwd)
    }

    /// Create default config with paths relative to given base directory.
    fn default_with_base(base: &Path) -> Self {
        Self {
            site: SiteConfig::default(),
            repository: None,
            content: ContentConfigRaw::default(),
            editor: EditorSettings::default(),
            content_resolved: ContentConfig {
                root: base.to_path_buf(),
                ..ContentConfig::default()
            },
            config_path: None,
        }
    }

    /// Load configuration from a specific file.
    fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let mut config: Self = toml::from_str(&content)?;

        config.expand_env_vars()?;

        let config_dir = path.parent().unwrap_or(Path::new("."));
        config.resolve_paths(config_dir);
        config.config_path = Some(path.to_path_buf());

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values.
    ///
    /// Called automatically after loading from file. The `[repository]`
    /// section is only checked by [`Config::require_repository`].
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Validation` if any validation fails.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.validate_site()?;
        self.validate_content()?;
        Ok(())
    }

    fn validate_site(&self) -> Result<(), ConfigError> {
        require_non_empty(&self.site.title, "site.title")?;
        if let Some(ref base_url) = self.site.base_url {
            require_http_url(base_url, "site.base_url")?;
        }
        Ok(())
    }

    fn validate_content(&self) -> Result<(), ConfigError> {
        let content = &self.content_resolved;
        require_repo_path(&content.blog_dir, "content.blog_dir")?;
        require_repo_path(&content.authors_dir, "content.authors_dir")?;
        require_repo_path(&content.images_dir, "content.images_dir")?;
        require_repo_path(&content.upload_prefix, "content.upload_prefix")?;
        require_repo_path(&content.public_dir, "content.public_dir")?;
        Ok(())
    }

    /// Expand environment variable references in configuration strings.
    fn expand_env_vars(&mut self) -> Result<(), ConfigError> {
        if let Some(ref url) = self.site.base_url {
            self.site.base_url = Some(expand::expand_env(url, "site.base_url")?);
        }

        if let Some(ref mut repository) = self.repository {
            repository.repo = expand::expand_env(&repository.repo, "repository.repo")?;
            repository.branch = expand::expand_env(&repository.branch, "repository.branch")?;
            repository.token = expand::expand_env(&repository.token, "repository.token")?;
            repository.api_url = expand::expand_env(&repository.api_url, "repository.api_url")?;
        }

        Ok(())
    }

    /// Resolve the local root against the config directory and normalize
    /// repository paths.
    fn resolve_paths(&mut self, config_dir: &Path) {
        let defaults = ContentConfig::default();
        let repo_path = |path: Option<&str>, default: String| {
            path.map_or(default, |p| p.trim_matches('/').to_owned())
        };
        let raw = &self.content;

        self.content_resolved = ContentConfig {
            root: config_dir.join(raw.root.as_deref().unwrap_or(".")),
            blog_dir: repo_path(raw.blog_dir.as_deref(), defaults.blog_dir),
            authors_dir: repo_path(raw.authors_dir.as_deref(), defaults.authors_dir),
            images_dir: repo_path(raw.images_dir.as_deref(), defaults.images_dir),
            upload_prefix: repo_path(raw.upload_prefix.as_deref(), defaults.upload_prefix),
            public_dir: repo_path(raw.public_dir.as_deref(), defaults.public_dir),
        };
    }
}
