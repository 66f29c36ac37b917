//! Command output.
//!
//! Results (HTML, markdown, JSON, paths, revisions) go to stdout unstyled so
//! they can be piped. Status notes go to stderr, coloured by [`Tone`].

use std::fmt::Display;

use console::{Style, Term};
use serde::Serialize;

/// How a status note is coloured.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Tone {
    Plain,
    Done,
    Caution,
    Failure,
    Title,
}

impl Tone {
    fn style(self) -> Style {
        match self {
            Self::Plain => Style::new(),
            Self::Done => Style::new().green(),
            Self::Caution => Style::new().yellow(),
            Self::Failure => Style::new().red(),
            Self::Title => Style::new().cyan().bold(),
        }
    }
}

/// Writer for one command run.
pub(crate) struct Output {
    notes: Term,
    results: Term,
}

impl Output {
    #[must_use]
    pub(crate) fn new() -> Self {
        Self {
            notes: Term::stderr(),
            results: Term::stdout(),
        }
    }

    /// Status line on stderr.
    pub(crate) fn note(&self, tone: Tone, msg: impl Display) {
        let _ = self.notes.write_line(&tone.style().apply_to(msg).to_string());
    }

    /// Parse and transform warnings, one per line.
    pub(crate) fn warnings(&self, warnings: &[String]) {
        for warning in warnings {
            self.note(Tone::Caution, format_args!("Warning: {warning}"));
        }
    }

    /// Command result on stdout, always ending in a newline.
    pub(crate) fn result(&self, text: &str) {
        let _ = self.results.write_str(text);
        if !text.ends_with('\n') {
            let _ = self.results.write_line("");
        }
    }

    /// Command result as pretty-printed JSON.
    pub(crate) fn json<T: Serialize + ?Sized>(&self, value: &T) -> Result<(), serde_json::Error> {
        self.result(&serde_json::to_string_pretty(value)?);
        Ok(())
    }
}
