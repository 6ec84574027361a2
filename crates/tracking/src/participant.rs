//! The production-side bridge between the host and the tracking sinks.
//!
//! The host calls [`TrackingParticipant::track`] synchronously for every
//! record it emits. A sink failure must never fault the tracked instance, so
//! `track` has no error channel: sink errors and sink panics are caught,
//! logged, and counted, and the remaining sinks still see the record.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use statetrack_core::TraceRecord;

use crate::sink::TrackingSink;

/// Fans each record out to its sinks, in registration order.
#[derive(Default)]
pub struct TrackingParticipant {
    sinks: Vec<Arc<dyn TrackingSink>>,
    faults: AtomicU64,
}

impl TrackingParticipant {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sink(mut self, sink: impl TrackingSink + 'static) -> Self {
        self.sinks.push(Arc::new(sink));
        self
    }

    pub fn add_sink(&mut self, sink: Arc<dyn TrackingSink>) {
        self.sinks.push(sink);
    }

    pub fn sink_names(&self) -> impl Iterator<Item = &str> {
        self.sinks.iter().map(|s| s.name())
    }

    /// Number of sink failures caught so far.
    pub fn faults(&self) -> u64 {
        self.faults.load(Ordering::Relaxed)
    }

    /// Forward `record` to every sink. Never panics and never fails.
    pub fn track(&self, record: &TraceRecord) {
        for sink in &self.sinks {
            match panic::catch_unwind(AssertUnwindSafe(|| sink.accept(record))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    self.faults.fetch_add(1, Ordering::Relaxed);
                    tracing::warn!(
                        sink = sink.name(),
                        instance_id = %record.instance_id,
                        sequence = record.sequence_number,
                        activity = %record.activity_name,
                        error = %e,
                        "tracking sink rejected record"
                    );
                }
                Err(payload) => {
                    self.faults.fetch_add(1, Ordering::Relaxed);
                    tracing::error!(
                        sink = sink.name(),
                        instance_id = %record.instance_id,
                        sequence = record.sequence_number,
                        activity = %record.activity_name,
                        panic = panic_message(payload.as_ref()),
                        "tracking sink panicked"
                    );
                }
            }
        }
    }
}

impl std::fmt::Debug for TrackingParticipant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrackingParticipant")
            .field("sinks", &self.sink_names().collect::<Vec<_>>())
            .field("faults", &self.faults())
            .finish()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        *s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "non-string panic payload"
    }
}
