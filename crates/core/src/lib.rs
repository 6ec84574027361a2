//! Trace-driven state machine reconstruction.
//!
//! The activity execution host emits an ordered stream of [`TraceRecord`]s
//! for every instance it runs. This crate provides the pieces that turn that
//! stream into something a caller can reason about:
//!
//! - [`RecordStore`]: append-only, sequence-ordered storage with
//!   [`RecordQuery`] filters and `first`/`last`/`single` selection
//! - [`StateMachineDefinition`]: which activity names are states and which
//!   are transitions
//! - [`StateTracker`]: current state, bounded history, and the bookmark
//!   snapshot, rebuilt record by record

pub mod bookmark;
pub mod definition;
mod error;
pub mod record;
pub mod store;
pub mod tracker;

pub use bookmark::{BookmarkSet, BookmarkSource};
pub use definition::{ActivityKind, StateMachineDefinition, TransitionDefinition};
pub use error::{QueryError, TrackingError};
pub use record::{InstanceState, TraceRecord, TraceRecordBuilder};
pub use store::{RecordQuery, RecordStore, SharedRecordStore};
pub use tracker::{SharedStateTracker, StateTracker, TrackerSnapshot, DEFAULT_MAX_HISTORY};
