use uuid::Uuid;

/// Errors from single-record selection against a [`RecordStore`](crate::RecordStore).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueryError {
    /// No record matched a `first`, `last`, or `single` query.
    #[error("no record matches {query}")]
    NotFound { query: String },

    /// A `single` query matched more than one record.
    #[error("{count} records match {query}, expected exactly one")]
    MultipleMatches { query: String, count: usize },
}

/// Errors raised while reconstructing or restoring state machine state.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TrackingError {
    /// A record's sequence number did not strictly increase past the last
    /// applied record. The record was not applied.
    #[error("out-of-order record: sequence {received} after {last}")]
    OutOfOrderUpdate { last: u64, received: u64 },

    /// A record belongs to a different host instance than the tracker.
    #[error("record for instance {received} applied to tracker of instance {expected}")]
    InstanceMismatch { expected: Uuid, received: Uuid },

    /// A state name is not declared by the state machine definition.
    #[error("state '{state}' is not declared by state machine '{state_machine}'")]
    UnknownState {
        state_machine: String,
        state: String,
    },

    /// A persisted tracker was taken for a different state machine.
    #[error("tracker belongs to state machine '{found}', expected '{expected}'")]
    DefinitionMismatch { expected: String, found: String },

    /// A persisted tracker whose current state is not the newest history entry.
    #[error(
        "inconsistent tracker snapshot: current state {}, newest history entry {}",
        .current.as_deref().unwrap_or("(none)"),
        .newest.as_deref().unwrap_or("(none)")
    )]
    InconsistentSnapshot {
        current: Option<String>,
        newest: Option<String>,
    },

    /// The state machine definition is malformed.
    #[error("invalid state machine definition: {0}")]
    InvalidDefinition(String),

    /// `max_history` must hold at least the current state.
    #[error("history length must be at least 1, got {0}")]
    InvalidHistoryLength(usize),

    /// A sink failed while accepting a record. Never propagated into the host.
    #[error("tracking sink '{sink}' failed: {message}")]
    SinkFailure { sink: String, message: String },

    /// An argument or variable snapshot could not be read as the requested type.
    #[error("'{name}' has an unexpected shape: {message}")]
    ArgumentType { name: String, message: String },
}
