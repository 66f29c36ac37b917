//! `quire reveal` command implementation.

use std::path::PathBuf;

use clap::Args;
use quire_config::CliSettings;
use quire_editor::plugins::reveal::REVEAL_CLASS;
use quire_editor::{EditorConfig, Selection};
use quire_markdown::{DisplayNode, split_front_matter, to_html};

use super::{editor_config, load_config, with_editor};
use crate::error::CliError;
use crate::output::{Output, Tone};

/// Arguments for the reveal command.
#[derive(Args)]
pub(crate) struct RevealArgs {
    /// Path to the markdown file.
    file: PathBuf,

    /// Document position of the cursor.
    #[arg(long)]
    offset: usize,

    /// Print the whole editing surface as HTML.
    #[arg(long)]
    html: bool,
}

impl RevealArgs {
    /// Execute the reveal command.
    ///
    /// # Errors
    ///
    /// Returns an error if the file can't be read, the editor fails to load
    /// the post, or the offset is outside the document.
    pub(crate) fn execute(self, config_path: Option<&std::path::Path>) -> Result<(), CliError> {
        let output = Output::new();
        let settings = CliSettings {
            reveal: Some(true),
            ..Default::default()
        };
        let config = load_config(config_path, &settings)?;

        let src = std::fs::read_to_string(&self.file)?;
        let view = reveal_view(&src, self.offset, editor_config(&config))?;

        if self.html {
            output.result(&to_html(&view));
            return Ok(());
        }
        match find_reveal(&view) {
            Some(markdown) => output.result(&markdown),
            None => output.note(
                Tone::Caution,
                format_args!("No markdown to reveal at {}", self.offset),
            ),
        }
        Ok(())
    }
}

/// Editing surface of the post body, focused with the cursor at `offset`.
fn reveal_view(src: &str, offset: usize, config: EditorConfig) -> Result<Vec<DisplayNode>, CliError> {
    let (_, body) = split_front_matter(src);
    with_editor(config, body, |editor| {
        editor.set_selection(Selection::cursor(offset))?;
        editor.focus();
        Ok(editor.view()?)
    })
}

/// Text of the first reveal overlay in the tree.
fn find_reveal(nodes: &[DisplayNode]) -> Option<String> {
    nodes.iter().find_map(|node| match node {
        DisplayNode::Element {
            attrs, children, ..
        } => {
            if attrs
                .iter()
                .any(|(name, value)| name == "class" && value == REVEAL_CLASS)
            {
                Some(text_content(children))
            } else {
                find_reveal(children)
            }
        }
        _ => None,
    })
}

fn text_content(nodes: &[DisplayNode]) -> String {
    nodes
        .iter()
        .map(|node| match node {
            DisplayNode::Text { value } => value.clone(),
            DisplayNode::Element { children, .. } => text_content(children),
            DisplayNode::Raw { .. } => String::new(),
        })
        .collect()
}
