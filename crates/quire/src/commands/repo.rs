//! `quire repo` subcommand group.

use std::path::{Path, PathBuf};

use clap::{Args, Subcommand};
use quire_config::{CliSettings, Config};
use quire_repo::{ContentRepository, EntryType, GitHubRepository};

use super::load_config;
use crate::error::CliError;
use crate::output::{Output, Tone};

/// Arguments shared by the repository commands.
#[derive(Args)]
pub(crate) struct RepoArgs {
    /// Branch to read and write (overrides config).
    #[arg(long, global = true)]
    branch: Option<String>,

    /// API token (overrides config).
    #[arg(long, global = true, env = "QUIRE_TOKEN", hide_env_values = true)]
    token: Option<String>,

    #[command(subcommand)]
    command: RepoCommand,
}

/// Repository commands.
#[derive(Subcommand)]
enum RepoCommand {
    /// List a directory (default: the blog directory).
    List {
        path: Option<String>,
        /// Only markdown files, shown by stem.
        #[arg(long)]
        posts: bool,
    },
    /// List images recursively with their web paths (default: the images directory).
    Images { path: Option<String> },
    /// Print a file.
    Get {
        path: String,
        /// Print content, revision and last-modified date as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Create or update a file from a local file.
    Put {
        path: String,
        file: PathBuf,
        /// Revision token of the version being replaced.
        #[arg(long)]
        revision: Option<String>,
        /// Commit message.
        #[arg(short, long)]
        message: Option<String>,
    },
    /// Upload an image and print its web path.
    Upload {
        file: PathBuf,
        /// Directory to upload into (default: the upload prefix).
        #[arg(long)]
        prefix: Option<String>,
    },
    /// Move a file.
    Move {
        from: String,
        to: String,
        /// Commit message.
        #[arg(short, long)]
        message: Option<String>,
    },
    /// Delete a file at a revision.
    Delete {
        path: String,
        /// Revision token of the version being deleted.
        #[arg(long)]
        revision: String,
        /// Commit message.
        #[arg(short, long)]
        message: Option<String>,
    },
}

impl RepoArgs {
    /// Execute the repo subcommand.
    pub(crate) fn execute(self, config_path: Option<&Path>) -> Result<(), CliError> {
        let settings = CliSettings {
            branch: self.branch,
            token: self.token,
            ..Default::default()
        };
        let config = load_config(config_path, &settings)?;
        let repo = open_repository(&config)?;
        run(&self.command, &repo, &config, &Output::new())
    }
}

fn open_repository(config: &Config) -> Result<GitHubRepository, CliError> {
    let repository = config.require_repository()?;
    let (owner, name) = repository
        .owner_and_name()
        .ok_or_else(|| CliError::Validation("repository.repo must be owner/name".to_owned()))?;
    Ok(GitHubRepository::new(
        &repository.api_url,
        owner,
        name,
        &repository.branch,
        &repository.token,
    )
    .with_public_dir(config.content_resolved.public_dir.as_str()))
}

fn run(
    command: &RepoCommand,
    repo: &dyn ContentRepository,
    config: &Config,
    output: &Output,
) -> Result<(), CliError> {
    let content = &config.content_resolved;
    match command {
        RepoCommand::List { path, posts } => {
            let path = path.as_deref().unwrap_or(&content.blog_dir);
            if *posts {
                for entry in repo.list_markdown(path)? {
                    output.result(entry.stem());
                }
            } else {
                for entry in repo.list_entries(path)? {
                    match entry.entry_type {
                        EntryType::Dir => output.result(&format!("{}/", entry.path)),
                        EntryType::File => output.result(&entry.path),
                    }
                }
            }
        }
        RepoCommand::Images { path } => {
            let path = path.as_deref().unwrap_or(&content.images_dir);
            for image in repo.list_images(path)? {
                output.result(&image.path);
            }
        }
        RepoCommand::Get { path, json } => {
            let file = repo.read_file(path)?;
            if *json {
                output.json(&file)?;
            } else {
                output.note(
                    Tone::Plain,
                    format_args!("revision: {}", file.revision),
                );
                output.result(&file.content);
            }
        }
        RepoCommand::Put {
            path,
            file,
            revision,
            message,
        } => {
            let text = std::fs::read_to_string(file)?;
            let revision = repo.write_file(path, &text, revision.as_deref(), message.as_deref())?;
            output.note(Tone::Done, format_args!("Saved {path}"));
            output.result(&revision);
        }
        RepoCommand::Upload { file, prefix } => {
            let data = std::fs::read(file)?;
            let filename = file
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default();
            let prefix = prefix.as_deref().unwrap_or(&content.upload_prefix);
            let web_path = repo.upload_asset(&data, &filename, prefix)?;
            output.note(Tone::Done, format_args!("Uploaded {}", file.display()));
            output.result(&web_path);
        }
        RepoCommand::Move { from, to, message } => {
            let revision = repo.move_file(from, to, message.as_deref())?;
            output.note(Tone::Done, format_args!("Moved {from} to {to}"));
            output.result(&revision);
        }
        RepoCommand::Delete {
            path,
            revision,
            message,
        } => {
            repo.delete_file(path, revision, message.as_deref())?;
            output.note(Tone::Done, format_args!("Deleted {path}"));
        }
    }
    Ok(())
}
