//! Editable document model for the quire admin editor.
//!
//! A post's markdown is parsed into a [`DocNode`] tree checked against a
//! [`Schema`], edited through an [`Editor`], and written back as markdown.
//! Custom node and mark types (info boxes, coloured spans) are
//! [`NodeExtension`]s and [`MarkExtension`]s contributed by [`Plugin`]s, which
//! register on the lifecycle scheduler before each build stage runs.
//!
//! # Example
//!
//! ```
//! use quire_editor::{EditorBuilder, EditorConfig, Selection};
//! use tokio::task::LocalSet;
//!
//! let runtime = tokio::runtime::Builder::new_current_thread()
//!     .enable_time()
//!     .build()
//!     .unwrap();
//! let mut editor = LocalSet::new()
//!     .block_on(&runtime, EditorBuilder::standard(EditorConfig::default()).build("Hello world\n"))
//!     .unwrap();
//!
//! editor.set_selection(Selection::new(1, 6)).unwrap();
//! editor.apply_mark("blue-3").unwrap();
//! assert_eq!(editor.markdown().unwrap(), "[Hello]{.blue-3} world\n");
//! ```

mod convert;
mod editor;
mod error;
mod extension;
mod model;
mod plugin;
pub mod plugins;
mod position;
mod schema;
mod state;
mod view;

pub use convert::{DocParser, DocSerializer};
pub use editor::{DEFAULT_STAGE_TIMEOUT, Editor, EditorBuilder, EditorConfig};
pub use error::{EditorError, SchemaError};
pub use extension::{MarkExtension, NodeExtension};
pub use model::{Attrs, DocNode, Mark, TEXT, normalize_inline, split_inline};
pub use plugin::{
    Command, CommandFn, EditorContext, InputRule, InputRuleFn, Phase, Plugin, PluginFuture,
    Registries, SlashItem, Teardown, ViewContext, ViewPlugin,
};
pub use position::{ResolvedPos, Selection};
pub use schema::{ContentModel, MarkSpec, NodeGroup, NodeSpec, Schema};
pub use state::EditorState;
pub use view::{Decoration, DocView};
