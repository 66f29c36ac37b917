//! quire CLI - Markdown authoring toolkit.
//!
//! Provides commands for:
//! - `render`: Render a post to HTML or a JSON display tree
//! - `format`: Normalize a post by round-tripping it through the editor
//! - `reveal`: Show the markdown behind a document position
//! - `repo`: Read and write files in the content repository

mod commands;
mod error;
mod output;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use commands::{FormatArgs, RenderArgs, RepoArgs, RevealArgs};
use output::{Output, Tone};

/// quire - Markdown authoring toolkit.
#[derive(Parser)]
#[command(name = "quire", version, about)]
struct Cli {
    /// Path to configuration file (default: auto-discover quire.toml).
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable info-level logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render a post to HTML.
    Render(RenderArgs),
    /// Rewrite a post the way the editor saves it.
    Format(FormatArgs),
    /// Show the markdown of the block at a document position.
    Reveal(RevealArgs),
    /// Content repository commands.
    Repo(RepoArgs),
}

fn main() {
    let cli = Cli::parse();
    let output = Output::new();

    // --verbose enables INFO level, otherwise use RUST_LOG or default to WARN
    let filter = if cli.verbose {
        EnvFilter::new("info")
    } else {
        EnvFilter::from_default_env()
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let config = cli.config.as_deref();
    let result = match cli.command {
        Commands::Render(args) => args.execute(),
        Commands::Format(args) => args.execute(config),
        Commands::Reveal(args) => args.execute(config),
        Commands::Repo(args) => args.execute(config),
    };

    if let Err(err) = result {
        output.note(Tone::Failure, format_args!("Error: {err}"));
        std::process::exit(1);
    }
}
