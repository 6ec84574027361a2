use statetrack_core::TrackingError;
use statetrack_storage::StorageError;
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum DoorError {
    /// The instance is not waiting for this operation in its current state.
    #[error("door {door} in state {state} is not waiting for {operation}")]
    NoBookmark {
        door: Uuid,
        state: String,
        operation: String,
    },

    /// No instance has been created for this door.
    #[error("unknown door {0}")]
    UnknownDoor(Uuid),

    /// The door's instance is unloaded; call `load` first.
    #[error("door {0} is unloaded")]
    Unloaded(Uuid),

    #[error(transparent)]
    Tracking(#[from] TrackingError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}
