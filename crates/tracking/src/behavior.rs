//! Attaching state reconstruction to a hosted service.
//!
//! A host that implements [`TrackingHost`] accepts extension providers at
//! configuration time and asks each of them for a fresh set of extensions
//! whenever it starts (or reloads) an instance. [`StateMachineTrackingBehavior`]
//! registers such a provider, so every instance of the hosted service gets a
//! record store, a state tracker, and the participant feeding them without
//! the workflow definition wiring any of it up.

use std::sync::{Arc, PoisonError};

use statetrack_core::{
    BookmarkSource, RecordStore, SharedRecordStore, SharedStateTracker, StateMachineDefinition,
    StateTracker, TraceRecord, TrackingError, DEFAULT_MAX_HISTORY,
};
use uuid::Uuid;

use crate::config::TrackingConfig;
use crate::participant::TrackingParticipant;
use crate::sink::{DiagnosticsSink, RecordStoreSink, StateTrackerSink};

/// What a host knows about an instance when it creates its extensions.
#[derive(Clone)]
pub struct InstanceContext {
    pub instance_id: Uuid,
    pub definition: Arc<StateMachineDefinition>,
    pub bookmarks: Arc<dyn BookmarkSource>,
}

/// The per-instance extensions created by a provider.
#[derive(Debug, Clone)]
pub struct InstanceTracking {
    participant: Arc<TrackingParticipant>,
    records: SharedRecordStore,
    tracker: SharedStateTracker,
}

impl InstanceTracking {
    pub fn new(
        participant: Arc<TrackingParticipant>,
        records: SharedRecordStore,
        tracker: SharedStateTracker,
    ) -> Self {
        InstanceTracking {
            participant,
            records,
            tracker,
        }
    }

    /// Forward one host record to the participant.
    pub fn track(&self, record: &TraceRecord) {
        self.participant.track(record);
    }

    pub fn participant(&self) -> &Arc<TrackingParticipant> {
        &self.participant
    }

    pub fn records(&self) -> SharedRecordStore {
        self.records.clone()
    }

    pub fn tracker(&self) -> SharedStateTracker {
        self.tracker.clone()
    }

    /// Copy of the records accumulated so far.
    pub fn record_snapshot(&self) -> RecordStore {
        self.records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Copy of the tracker in its current state.
    pub fn tracker_snapshot(&self) -> StateTracker {
        self.tracker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Replace the tracker, e.g. with one loaded from the instance store.
    pub fn restore_tracker(&self, tracker: StateTracker) {
        *self.tracker.lock().unwrap_or_else(PoisonError::into_inner) = tracker;
    }
}

/// Creates extensions for each instance a host starts.
pub trait ExtensionProvider: Send + Sync {
    fn create(&self, context: &InstanceContext) -> Result<InstanceTracking, TrackingError>;
}

/// The host's configuration-time extension point.
pub trait TrackingHost {
    fn add_extension_provider(&mut self, provider: Arc<dyn ExtensionProvider>);
}

/// Attaches a tracking participant and a fresh state tracker to every
/// instance of a hosted service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateMachineTrackingBehavior {
    max_history: usize,
    trace_to_diagnostics: bool,
}

impl Default for StateMachineTrackingBehavior {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_HISTORY)
    }
}

impl StateMachineTrackingBehavior {
    pub fn new(max_history: usize) -> Self {
        StateMachineTrackingBehavior {
            max_history,
            trace_to_diagnostics: false,
        }
    }

    pub fn from_config(config: &TrackingConfig) -> Self {
        Self::new(config.tracking.max_history)
            .with_diagnostics(config.tracking.trace_to_diagnostics)
    }

    /// Also write every record to the diagnostics log.
    pub fn with_diagnostics(mut self, enabled: bool) -> Self {
        self.trace_to_diagnostics = enabled;
        self
    }

    pub fn max_history(&self) -> usize {
        self.max_history
    }

    /// Register with `host`. Must be called before the host starts instances.
    pub fn apply<H>(&self, host: &mut H) -> Result<(), TrackingError>
    where
        H: TrackingHost + ?Sized,
    {
        if self.max_history == 0 {
            return Err(TrackingError::InvalidHistoryLength(0));
        }
        host.add_extension_provider(Arc::new(*self));
        tracing::debug!(
            max_history = self.max_history,
            diagnostics = self.trace_to_diagnostics,
            "state machine tracking attached"
        );
        Ok(())
    }
}

impl ExtensionProvider for StateMachineTrackingBehavior {
    fn create(&self, context: &InstanceContext) -> Result<InstanceTracking, TrackingError> {
        let records = RecordStore::shared();
        let tracker = StateTracker::new(
            context.definition.clone(),
            context.instance_id,
            self.max_history,
        )?
        .into_shared();

        let mut participant = TrackingParticipant::new()
            .with_sink(RecordStoreSink::new(records.clone()))
            .with_sink(StateTrackerSink::new(
                tracker.clone(),
                context.bookmarks.clone(),
            ));
        if self.trace_to_diagnostics {
            participant = participant.with_sink(DiagnosticsSink::new());
        }

        Ok(InstanceTracking::new(Arc::new(participant), records, tracker))
    }
}
