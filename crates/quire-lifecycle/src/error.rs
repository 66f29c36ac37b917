//! Scheduler errors.

use crate::scheduler::Stage;

/// Errors reported by the [`Scheduler`](crate::Scheduler).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum LifecycleError {
    /// A wait was started on a signal with no recorded producer.
    #[error("signal `{0}` was never recorded")]
    Unrecorded(String),
    /// `done` was called more times than `record`.
    #[error("signal `{0}` has no outstanding producer")]
    NoProducer(String),
    /// The signal was cleared before the operation.
    #[error("signal `{0}` has been cleared")]
    Cleared(String),
    /// A stage wait timed out.
    #[error("stage `{stage}` stalled waiting on: {}", .pending.join(", "))]
    Stalled { stage: Stage, pending: Vec<String> },
}
