//! Built-in plugins.

pub mod info_box;
pub mod reveal;
pub mod span;

use crate::plugin::Plugin;

/// Info-box and coloured-span plugins, plus the reveal overlay if `reveal`.
#[must_use]
pub fn standard(reveal: bool) -> Vec<Box<dyn Plugin>> {
    let mut plugins = span::plugins();
    plugins.extend(info_box::plugins());
    if reveal {
        plugins.push(Box::new(reveal::MarkdownReveal));
    }
    plugins
}
