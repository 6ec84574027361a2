use async_trait::async_trait;
use statetrack_core::TrackerSnapshot;
use uuid::Uuid;

use crate::error::StorageError;
use crate::record::PromotedProperties;

/// The durable instance store boundary.
///
/// The host owns the real instance state; an `InstanceStore` keeps the
/// tracker snapshots and promoted properties that ride alongside it. Entries
/// are keyed by `(instance_id, state_machine)` because one workflow instance
/// may embed more than one state machine.
///
/// ## Lifecycle
///
/// 1. `save_tracker` when the host unloads an instance
/// 2. `load_tracker` when it loads the instance again (`None` = fresh instance)
/// 3. `delete_instance` when the instance completes and is purged
///
/// `promote` may be called at any point to refresh the queryable columns.
///
/// ## Thread Safety
///
/// Implementations must be `Send + Sync + 'static` so one store can be
/// shared across every instance a host runs.
#[async_trait]
pub trait InstanceStore: Send + Sync + 'static {
    /// Insert or replace the tracker snapshot for its instance and state machine.
    async fn save_tracker(&self, snapshot: &TrackerSnapshot) -> Result<(), StorageError>;

    /// Read a tracker snapshot. Returns `Ok(None)` if none was ever saved.
    async fn load_tracker(
        &self,
        instance_id: Uuid,
        state_machine: &str,
    ) -> Result<Option<TrackerSnapshot>, StorageError>;

    /// Remove everything stored for an instance, across all state machines.
    ///
    /// Returns `Err(StorageError::InstanceNotFound)` if nothing was stored.
    async fn delete_instance(&self, instance_id: Uuid) -> Result<(), StorageError>;

    /// Insert or replace promoted properties.
    async fn promote(&self, properties: &PromotedProperties) -> Result<(), StorageError>;

    /// Read promoted properties without touching the tracker snapshot.
    async fn promoted_properties(
        &self,
        instance_id: Uuid,
        state_machine: &str,
    ) -> Result<Option<PromotedProperties>, StorageError>;

    /// Instances whose promoted `current_state` equals `state`, ordered by id.
    async fn find_by_state(
        &self,
        state_machine: &str,
        state: &str,
    ) -> Result<Vec<Uuid>, StorageError>;

    /// Every instance with anything stored, ordered by id.
    async fn list_instances(&self) -> Result<Vec<Uuid>, StorageError>;
}
