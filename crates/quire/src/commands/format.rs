//! `quire format` command implementation.

use std::path::PathBuf;

use clap::Args;
use quire_config::CliSettings;
use quire_editor::EditorConfig;
use quire_markdown::split_front_matter;

use super::{editor_config, load_config, with_editor};
use crate::error::CliError;
use crate::output::{Output, Tone};

/// Arguments for the format command.
#[derive(Args)]
pub(crate) struct FormatArgs {
    /// Path to the markdown file.
    file: PathBuf,

    /// Write the result back to the file instead of printing it.
    #[arg(short, long)]
    write: bool,

    /// Exit with an error if the file would change.
    #[arg(long, conflicts_with = "write")]
    check: bool,
}

impl FormatArgs {
    /// Execute the format command.
    ///
    /// # Errors
    ///
    /// Returns an error if the file can't be read, the editor fails to load
    /// the post, or `--check` finds a difference.
    pub(crate) fn execute(self, config_path: Option<&std::path::Path>) -> Result<(), CliError> {
        let output = Output::new();
        let settings = CliSettings {
            reveal: Some(false),
            ..Default::default()
        };
        let config = load_config(config_path, &settings)?;

        let src = std::fs::read_to_string(&self.file)?;
        let formatted = format_source(&src, editor_config(&config))?;

        if self.check {
            if formatted != src {
                return Err(CliError::Validation(format!(
                    "{} is not formatted",
                    self.file.display()
                )));
            }
            output.note(
                Tone::Done,
                format_args!("{} is formatted", self.file.display()),
            );
        } else if self.write {
            if formatted == src {
                output.note(Tone::Plain, format_args!("{} unchanged", self.file.display()));
            } else {
                std::fs::write(&self.file, &formatted)?;
                output.note(
                    Tone::Done,
                    format_args!("Formatted {}", self.file.display()),
                );
            }
        } else {
            output.result(&formatted);
        }

        Ok(())
    }
}

/// Round-trip the body through the editor, keeping front matter verbatim.
fn format_source(src: &str, config: EditorConfig) -> Result<String, CliError> {
    let (_, body) = split_front_matter(src);
    let front_matter = &src[..src.len() - body.len()];
    let markdown = with_editor(config, body, |editor| Ok(editor.markdown()?))?;
    Ok(format!("{front_matter}{markdown}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn format(src: &str) -> String {
        format_source(
            src,
            EditorConfig {
                reveal: false,
                ..EditorConfig::default()
            },
        )
        .unwrap()
    }

    #[test]
    fn test_front_matter_is_kept_verbatim() {
        let src = "---\ntitle:   Spaced   \ntags: [a]\n---\nHello *world*\n";
        assert_eq!(format(src), src);
    }

    #[test]
    fn test_extensions_survive() {
        let src = ":::warning\nCareful [here]{.red-2}\n:::\n";
        assert_eq!(format(src), src);
    }

    #[test]
    fn test_escapes_and_inline_html_survive() {
        let formatted = format("\\- dash <kbd>K</kbd> &amp;copy; \\[x\\]{.red}\n");
        assert_eq!(formatted, "\\- dash <kbd>K</kbd> \\&copy; [x\\]{.red}\n");
        assert_eq!(format(&formatted), formatted);
    }

    #[test]
    fn test_unknown_container_is_saved_as_info() {
        assert_eq!(format(":::aside\nx\n:::\n"), ":::info\nx\n:::\n");
    }
}
