//! Feeding host trace records into record stores and state trackers.
//!
//! [`TrackingParticipant`] receives records from a host and forwards them to
//! its [`TrackingSink`]s. [`StateMachineTrackingBehavior`] wires a participant,
//! a record store, and a state tracker into every instance a
//! [`TrackingHost`] starts.

pub mod behavior;
pub mod config;
mod participant;
pub mod sink;

pub use behavior::{
    ExtensionProvider, InstanceContext, InstanceTracking, StateMachineTrackingBehavior,
    TrackingHost,
};
pub use config::{read_config, ConfigError, StoreSettings, TrackingConfig, TrackingSettings};
pub use participant::TrackingParticipant;
pub use sink::{DiagnosticsSink, RecordStoreSink, StateTrackerSink, TrackingSink};
