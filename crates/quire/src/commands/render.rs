//! `quire render` command implementation.

use std::path::PathBuf;

use clap::Args;
use quire_markdown::MarkdownRenderer;

use crate::error::CliError;
use crate::output::{Output, Tone};

/// Arguments for the render command.
#[derive(Args)]
pub(crate) struct RenderArgs {
    /// Path to the markdown file.
    file: PathBuf,

    /// Print the full render result (display tree, toc, citations) as JSON.
    #[arg(long)]
    json: bool,

    /// Do not fall back to the first H1 when front matter has no title.
    #[arg(long)]
    no_extract_title: bool,
}

impl RenderArgs {
    /// Execute the render command.
    ///
    /// # Errors
    ///
    /// Returns an error if the file can't be read or parsed.
    pub(crate) fn execute(self) -> Result<(), CliError> {
        let output = Output::new();
        let src = std::fs::read_to_string(&self.file)?;

        let mut renderer = MarkdownRenderer::new();
        if !self.no_extract_title {
            renderer = renderer.with_title_extraction();
        }
        let result = renderer.render(&src)?;

        output.warnings(&result.warnings);

        if self.json {
            output.json(&result)?;
        } else {
            if let Some(title) = &result.title {
                output.note(Tone::Title, title);
            }
            output.result(&result.html);
        }

        Ok(())
    }
}
