//! Tracker load, save, and promotion against an [`InstanceStore`].

use std::sync::Arc;

use statetrack_core::{StateMachineDefinition, StateTracker};
use uuid::Uuid;

use crate::connection::open_store;
use crate::error::StorageError;
use crate::record::PromotedProperties;
use crate::traits::InstanceStore;

/// Load the tracker persisted for `instance_id`.
///
/// Returns `Ok(None)` when nothing was saved; callers treat that as a fresh
/// instance and create a new tracker.
pub async fn load_tracker<S>(
    store: &S,
    instance_id: Uuid,
    definition: Arc<StateMachineDefinition>,
) -> Result<Option<StateTracker>, StorageError>
where
    S: InstanceStore + ?Sized,
{
    let Some(snapshot) = store.load_tracker(instance_id, &definition.name).await? else {
        tracing::debug!(%instance_id, state_machine = %definition.name, "no persisted tracker");
        return Ok(None);
    };
    let tracker = StateTracker::restore(definition, snapshot)?;
    tracing::debug!(
        %instance_id,
        state_machine = %tracker.state_machine(),
        current_state = tracker.current_state().unwrap_or("-"),
        "loaded tracker"
    );
    Ok(Some(tracker))
}

/// Open the store named by `connection_string` and load the tracker from it.
pub async fn load_tracker_from(
    connection_string: &str,
    instance_id: Uuid,
    definition: Arc<StateMachineDefinition>,
) -> Result<Option<StateTracker>, StorageError> {
    let store = open_store(connection_string).await?;
    load_tracker(store.as_ref(), instance_id, definition).await
}

/// Persist the tracker's current snapshot.
pub async fn save_tracker<S>(store: &S, tracker: &StateTracker) -> Result<(), StorageError>
where
    S: InstanceStore + ?Sized,
{
    store.save_tracker(&tracker.snapshot()).await?;
    tracing::debug!(
        instance_id = %tracker.instance_id(),
        state_machine = %tracker.state_machine(),
        "saved tracker"
    );
    Ok(())
}

/// Register the tracker's fields as promoted properties.
pub async fn promote_tracker<S>(store: &S, tracker: &StateTracker) -> Result<(), StorageError>
where
    S: InstanceStore + ?Sized,
{
    store
        .promote(&PromotedProperties::from_tracker(tracker))
        .await
}
