//! Destinations a tracking participant forwards records to.

use std::sync::Arc;

use statetrack_core::{
    BookmarkSource, SharedRecordStore, SharedStateTracker, TraceRecord, TrackingError,
};

/// A destination for trace records.
///
/// Sinks may fail; the [`TrackingParticipant`](crate::TrackingParticipant)
/// that owns them isolates those failures from the host.
pub trait TrackingSink: Send + Sync {
    /// Short name used in diagnostics.
    fn name(&self) -> &str;

    fn accept(&self, record: &TraceRecord) -> Result<(), TrackingError>;
}

fn poisoned(sink: &str) -> TrackingError {
    TrackingError::SinkFailure {
        sink: sink.to_string(),
        message: "lock poisoned by an earlier panic".to_string(),
    }
}

/// Appends every record to a shared [`RecordStore`](statetrack_core::RecordStore).
#[derive(Debug, Clone)]
pub struct RecordStoreSink {
    store: SharedRecordStore,
}

impl RecordStoreSink {
    pub fn new(store: SharedRecordStore) -> Self {
        RecordStoreSink { store }
    }
}

impl TrackingSink for RecordStoreSink {
    fn name(&self) -> &str {
        "record-store"
    }

    fn accept(&self, record: &TraceRecord) -> Result<(), TrackingError> {
        let mut store = self.store.write().map_err(|_| poisoned(self.name()))?;
        store.append(record.clone())
    }
}

/// Feeds every record into a shared [`StateTracker`](statetrack_core::StateTracker),
/// reading the host's bookmarks at the moment each record is applied.
#[derive(Clone)]
pub struct StateTrackerSink {
    tracker: SharedStateTracker,
    bookmarks: Arc<dyn BookmarkSource>,
}

impl StateTrackerSink {
    pub fn new(tracker: SharedStateTracker, bookmarks: Arc<dyn BookmarkSource>) -> Self {
        StateTrackerSink { tracker, bookmarks }
    }
}

impl TrackingSink for StateTrackerSink {
    fn name(&self) -> &str {
        "state-tracker"
    }

    fn accept(&self, record: &TraceRecord) -> Result<(), TrackingError> {
        let mut tracker = self.tracker.lock().map_err(|_| poisoned(self.name()))?;
        tracker.update(record, self.bookmarks.as_ref())?;
        Ok(())
    }
}

/// Writes every record to the diagnostics log as a structured `tracing` event.
#[derive(Debug, Clone, Default)]
pub struct DiagnosticsSink;

impl DiagnosticsSink {
    pub fn new() -> Self {
        DiagnosticsSink
    }
}

impl TrackingSink for DiagnosticsSink {
    fn name(&self) -> &str {
        "diagnostics"
    }

    fn accept(&self, record: &TraceRecord) -> Result<(), TrackingError> {
        let arguments = serde_json::to_string(&record.arguments).map_err(|e| {
            TrackingError::SinkFailure {
                sink: self.name().to_string(),
                message: e.to_string(),
            }
        })?;
        tracing::info!(
            target: "statetrack::diagnostics",
            instance_id = %record.instance_id,
            sequence = record.sequence_number,
            activity = %record.activity_name,
            activity_id = record.activity_id.as_deref().unwrap_or(""),
            state = %record.state,
            arguments = %arguments,
            "{}",
            record
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use statetrack_core::{InstanceState, RecordStore, StateMachineDefinition, StateTracker};
    use std::collections::BTreeSet;
    use uuid::Uuid;

    fn closed(seq: u64, name: &str) -> TraceRecord {
        TraceRecord::builder(Uuid::nil(), seq, name, InstanceState::Closed).build()
    }

    #[test]
    fn record_store_sink_appends_and_rejects_out_of_order() {
        let store = RecordStore::shared();
        let sink = RecordStoreSink::new(store.clone());
        sink.accept(&closed(1, "A")).unwrap();
        sink.accept(&closed(2, "B")).unwrap();
        assert!(matches!(
            sink.accept(&closed(2, "C")),
            Err(TrackingError::OutOfOrderUpdate { .. })
        ));
        assert_eq!(store.read().unwrap().len(), 2);
    }

    #[test]
    fn state_tracker_sink_snapshots_bookmarks() {
        let def = Arc::new(
            StateMachineDefinition::builder("Turnstile", "Locked")
                .build()
                .unwrap(),
        );
        let tracker = StateTracker::new(def, Uuid::nil(), 3).unwrap().into_shared();
        let bookmarks: Arc<dyn BookmarkSource> =
            Arc::new(BTreeSet::from(["Coin".to_string()]));
        let sink = StateTrackerSink::new(tracker.clone(), bookmarks);
        sink.accept(&closed(1, "Locked")).unwrap();
        let t = tracker.lock().unwrap();
        assert_eq!(t.current_state(), Some("Locked"));
        assert!(t.transitions().contains("Coin"));
    }

    #[test]
    fn diagnostics_sink_accepts_records() {
        let record = TraceRecord::builder(Uuid::nil(), 1, "Open", InstanceState::Closed)
            .argument("IsOpen", true)
            .build();
        assert!(DiagnosticsSink::new().accept(&record).is_ok());
    }
}
