//! CLI command implementations.

mod format;
mod render;
mod repo;
mod reveal;

use quire_config::{CliSettings, Config};
use quire_editor::{Editor, EditorBuilder, EditorConfig};
use tokio::task::LocalSet;

use crate::error::CliError;

pub(crate) use format::FormatArgs;
pub(crate) use render::RenderArgs;
pub(crate) use repo::RepoArgs;
pub(crate) use reveal::RevealArgs;

/// Editor settings from the loaded configuration.
fn editor_config(config: &Config) -> EditorConfig {
    EditorConfig {
        stage_timeout: config.editor.stage_timeout(),
        reveal: config.editor.reveal,
    }
}

/// Load configuration, applying `settings` on top of the file.
fn load_config(
    path: Option<&std::path::Path>,
    settings: &CliSettings,
) -> Result<Config, CliError> {
    Ok(Config::load(path, Some(settings))?)
}

/// Build an editor for `markdown` on a single-threaded runtime and hand it to `f`.
///
/// The editor is destroyed before returning.
fn with_editor<T>(
    config: EditorConfig,
    markdown: &str,
    f: impl FnOnce(&mut Editor) -> Result<T, CliError>,
) -> Result<T, CliError> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()?;
    let mut editor = LocalSet::new().block_on(
        &runtime,
        EditorBuilder::standard(config).build(markdown),
    )?;
    let result = f(&mut editor);
    editor.destroy();
    result
}
