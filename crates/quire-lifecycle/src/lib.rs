//! Plugin lifecycle for the quire editor.
//!
//! Plugins initialize independently and register into shared [`Registry`]
//! lists. A [`Scheduler`] orders those registrations against the build
//! stages that read the lists:
//!
//! 1. the plugin creates a [`Signal`], records itself as its producer and
//!    gates the consuming [`Stage`] on it;
//! 2. it waits until shared state may be mutated;
//! 3. it registers, then marks its signal done.
//!
//! # Example
//!
//! ```
//! use quire_lifecycle::{Registry, Scheduler, Stage};
//! use tokio::task::LocalSet;
//!
//! let runtime = tokio::runtime::Builder::new_current_thread()
//!     .enable_time()
//!     .build()
//!     .unwrap();
//! LocalSet::new().block_on(&runtime, async {
//!     let scheduler = Scheduler::new();
//!     let parsers: Registry<&str> = Registry::new();
//!     let stage = Stage::new("parser");
//!
//!     let signal = scheduler.signal("directive-syntax");
//!     scheduler.record(&signal).unwrap();
//!     scheduler.gate(&stage, &signal);
//!
//!     tokio::task::spawn_local({
//!         let scheduler = scheduler.clone();
//!         let parsers = parsers.clone();
//!         async move {
//!             parsers.push("directives");
//!             scheduler.done(&signal).unwrap();
//!         }
//!     });
//!
//!     scheduler.wait_stage(&stage).await.unwrap();
//!     assert_eq!(parsers.snapshot(), ["directives"]);
//! });
//! ```

mod error;
mod registry;
mod scheduler;

pub use error::LifecycleError;
pub use registry::{EntryId, Registry};
pub use scheduler::{Scheduler, Signal, SignalState, Stage};
