use statetrack_core::TrackingError;
use uuid::Uuid;

/// All errors that can be returned by an InstanceStore implementation.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Nothing is stored for the given instance.
    #[error("instance not found: {instance_id}")]
    InstanceNotFound { instance_id: Uuid },

    /// The connection string names no known backend or is malformed.
    #[error("invalid connection string '{value}': {reason}")]
    InvalidConnectionString { value: String, reason: String },

    /// A stored document could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// A persisted tracker no longer fits its state machine definition.
    #[error("persisted tracker rejected: {0}")]
    Tracking(#[from] TrackingError),

    /// A backend-specific storage error (I/O, locking, etc.).
    #[error("storage backend error: {0}")]
    Backend(String),
}

impl From<std::io::Error> for StorageError {
    fn from(e: std::io::Error) -> Self {
        StorageError::Backend(e.to_string())
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(e: serde_json::Error) -> Self {
        StorageError::Serialization(e.to_string())
    }
}
