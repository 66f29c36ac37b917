//! Readiness signals gating build stages.
//!
//! A [`Signal`] is a one-shot barrier with one or more producers. Each
//! producer is announced with [`Scheduler::record`] and finishes with
//! [`Scheduler::done`]; the signal is done once every recorded producer has
//! finished. A [`Stage`] waits on the signals gated on it with
//! [`Scheduler::wait_stage`].
//!
//! The scheduler is single-threaded: share it with `clone()` between tasks
//! spawned on a [`tokio::task::LocalSet`]. Waits are cooperative yields.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, warn};

use crate::error::LifecycleError;

/// A named build stage (`parser`, `serializer`, ...).
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Stage(String);

impl Stage {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Handle to a readiness signal created by [`Scheduler::signal`].
///
/// Two handles are equal only if they refer to the same signal; names are
/// labels and need not be unique.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Signal {
    id: u64,
    name: String,
}

impl Signal {
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Observable state of a signal.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SignalState {
    Pending,
    Done,
    /// Retracted with [`Scheduler::clear`].
    Cleared,
}

struct Entry {
    name: String,
    recorded: usize,
    completed: usize,
    state: watch::Sender<SignalState>,
}

impl Entry {
    fn state(&self) -> SignalState {
        if self.recorded > 0 && self.completed == self.recorded {
            SignalState::Done
        } else {
            SignalState::Pending
        }
    }
}

#[derive(Default)]
struct Inner {
    next_id: u64,
    signals: HashMap<u64, Entry>,
    gates: HashMap<Stage, Vec<Signal>>,
}

/// Dependency graph of readiness signals and the stages they gate.
#[derive(Clone, Default)]
pub struct Scheduler {
    inner: Rc<RefCell<Inner>>,
    stage_timeout: Option<Duration>,
}

impl Scheduler {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Bound every [`wait_stage`](Self::wait_stage) by `timeout`.
    #[must_use]
    pub fn with_stage_timeout(mut self, timeout: Duration) -> Self {
        self.stage_timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn stage_timeout(&self) -> Option<Duration> {
        self.stage_timeout
    }

    /// Create a pending signal with no producers.
    pub fn signal(&self, name: impl Into<String>) -> Signal {
        let mut inner = self.inner.borrow_mut();
        inner.next_id += 1;
        let id = inner.next_id;
        let name = name.into();
        let (state, _) = watch::channel(SignalState::Pending);
        inner.signals.insert(
            id,
            Entry {
                name: name.clone(),
                recorded: 0,
                completed: 0,
                state,
            },
        );
        debug!(signal = %name, "Created signal");
        Signal { id, name }
    }

    /// Announce one more producer of `signal`.
    ///
    /// Recording on a done signal makes it pending again; stages that already
    /// proceeded are unaffected.
    pub fn record(&self, signal: &Signal) -> Result<(), LifecycleError> {
        let mut inner = self.inner.borrow_mut();
        let entry = inner
            .signals
            .get_mut(&signal.id)
            .ok_or_else(|| LifecycleError::Cleared(signal.name.clone()))?;
        entry.recorded += 1;
        entry.state.send_replace(SignalState::Pending);
        Ok(())
    }

    /// Finish one producer of `signal`.
    pub fn done(&self, signal: &Signal) -> Result<(), LifecycleError> {
        let mut inner = self.inner.borrow_mut();
        let entry = inner
            .signals
            .get_mut(&signal.id)
            .ok_or_else(|| LifecycleError::Cleared(signal.name.clone()))?;
        if entry.completed >= entry.recorded {
            return Err(LifecycleError::NoProducer(signal.name.clone()));
        }
        entry.completed += 1;
        if entry.completed == entry.recorded {
            entry.state.send_replace(SignalState::Done);
            debug!(signal = %entry.name, producers = entry.recorded, "Signal done");
        }
        Ok(())
    }

    #[must_use]
    pub fn state(&self, signal: &Signal) -> SignalState {
        self.inner
            .borrow()
            .signals
            .get(&signal.id)
            .map_or(SignalState::Cleared, Entry::state)
    }

    /// Make `stage` wait for `signal`.
    pub fn gate(&self, stage: &Stage, signal: &Signal) {
        let mut inner = self.inner.borrow_mut();
        let gates = inner.gates.entry(stage.clone()).or_default();
        if !gates.contains(signal) {
            gates.push(signal.clone());
        }
    }

    /// Signals currently gating `stage`.
    #[must_use]
    pub fn gated(&self, stage: &Stage) -> Vec<Signal> {
        self.inner
            .borrow()
            .gates
            .get(stage)
            .cloned()
            .unwrap_or_default()
    }

    /// Names of the signals `stage` is still waiting for.
    #[must_use]
    pub fn pending(&self, stage: &Stage) -> Vec<String> {
        self.gated(stage)
            .into_iter()
            .filter(|signal| self.state(signal) == SignalState::Pending)
            .map(|signal| signal.name)
            .collect()
    }

    /// Wait until `signal` is done or cleared.
    ///
    /// Fails with [`LifecycleError::Unrecorded`] if no producer was recorded,
    /// since nothing could ever complete the signal.
    pub async fn wait(&self, signal: &Signal) -> Result<(), LifecycleError> {
        let mut rx = {
            let inner = self.inner.borrow();
            let Some(entry) = inner.signals.get(&signal.id) else {
                return Ok(());
            };
            if entry.recorded == 0 {
                return Err(LifecycleError::Unrecorded(signal.name.clone()));
            }
            entry.state.subscribe()
        };
        // A closed channel means the signal was cleared and dropped.
        let _ = rx.wait_for(|state| *state != SignalState::Pending).await;
        Ok(())
    }

    /// Wait until every signal gated on `stage` is done.
    ///
    /// Uses the configured stage timeout, if any.
    pub async fn wait_stage(&self, stage: &Stage) -> Result<(), LifecycleError> {
        match self.stage_timeout {
            Some(timeout) => self.wait_stage_within(stage, timeout).await,
            None => self.wait_gates(stage).await,
        }
    }

    /// Wait for `stage`, failing with [`LifecycleError::Stalled`] after `timeout`.
    pub async fn wait_stage_within(
        &self,
        stage: &Stage,
        timeout: Duration,
    ) -> Result<(), LifecycleError> {
        if let Ok(result) = tokio::time::timeout(timeout, self.wait_gates(stage)).await {
            return result;
        }
        let pending = self.pending(stage);
        warn!(
            stage = %stage,
            ?pending,
            timeout_ms = timeout.as_millis(),
            "Stage stalled"
        );
        Err(LifecycleError::Stalled {
            stage: stage.clone(),
            pending,
        })
    }

    async fn wait_gates(&self, stage: &Stage) -> Result<(), LifecycleError> {
        // Gates may be added while we wait, so re-check until nothing is pending.
        loop {
            let pending: Vec<Signal> = self
                .gated(stage)
                .into_iter()
                .filter(|signal| self.state(signal) == SignalState::Pending)
                .collect();
            if pending.is_empty() {
                break;
            }
            for signal in &pending {
                self.wait(signal).await?;
            }
        }
        debug!(stage = %stage, "Stage ready");
        Ok(())
    }

    /// Retract `signal`: waiters are released and every gate drops it.
    ///
    /// Clearing twice is a no-op.
    pub fn clear(&self, signal: &Signal) {
        let mut inner = self.inner.borrow_mut();
        let Some(entry) = inner.signals.remove(&signal.id) else {
            return;
        };
        entry.state.send_replace(SignalState::Cleared);
        for gates in inner.gates.values_mut() {
            gates.retain(|gated| gated.id != signal.id);
        }
        debug!(signal = %entry.name, "Cleared signal");
    }
}

impl fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("Scheduler")
            .field("signals", &inner.signals.len())
            .field("stages", &inner.gates.keys().collect::<Vec<_>>())
            .field("stage_timeout", &self.stage_timeout)
            .finish()
    }
}
