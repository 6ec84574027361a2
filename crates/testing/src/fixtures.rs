//! Hand-built traces for tests.

use serde_json::Value;
use statetrack_core::{InstanceState, RecordStore, TraceRecord, TrackingError};
use uuid::Uuid;

/// Builds a [`RecordStore`] the way a host would fill it: one instance,
/// sequence numbers assigned from 0 in emission order unless a record is
/// placed explicitly with [`TraceBuilder::record_at`].
#[derive(Debug, Clone)]
pub struct TraceBuilder {
    instance_id: Uuid,
    records: Vec<TraceRecord>,
}

impl Default for TraceBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TraceBuilder {
    pub fn new() -> Self {
        Self::for_instance(Uuid::nil())
    }

    pub fn for_instance(instance_id: Uuid) -> Self {
        TraceBuilder {
            instance_id,
            records: Vec::new(),
        }
    }

    fn next_sequence(&self) -> u64 {
        self.records
            .last()
            .map_or(0, |r| r.sequence_number.saturating_add(1))
    }

    /// A record with an explicit sequence number. Later records continue
    /// numbering from it.
    pub fn record_at(mut self, sequence_number: u64, name: &str, state: InstanceState) -> Self {
        let record = TraceRecord::builder(self.instance_id, sequence_number, name, state).build();
        self.records.push(record);
        self
    }

    /// A single record in the given state.
    pub fn record(mut self, name: &str, state: InstanceState) -> Self {
        let record = TraceRecord::builder(self.instance_id, self.next_sequence(), name, state)
            .build();
        self.records.push(record);
        self
    }

    pub fn executing(self, name: &str) -> Self {
        self.record(name, InstanceState::Executing)
    }

    pub fn closed(self, name: &str) -> Self {
        self.record(name, InstanceState::Closed)
    }

    /// An activity that ran to completion: `Executing` then `Closed`.
    pub fn activity(self, name: &str) -> Self {
        self.executing(name).closed(name)
    }

    /// A completed activity whose closed record carries `arguments`.
    pub fn activity_with(mut self, name: &str, arguments: &[(&str, Value)]) -> Self {
        self = self.executing(name);
        let mut builder = TraceRecord::builder(
            self.instance_id,
            self.next_sequence(),
            name,
            InstanceState::Closed,
        );
        for (key, value) in arguments {
            builder = builder.argument(*key, value.clone());
        }
        self.records.push(builder.build());
        self
    }

    pub fn records(&self) -> &[TraceRecord] {
        &self.records
    }

    /// Fails if explicitly placed records left the trace out of sequence.
    pub fn build(self) -> Result<RecordStore, TrackingError> {
        RecordStore::try_from(self.records)
    }
}
