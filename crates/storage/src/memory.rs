//! Process-local instance store.

use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use statetrack_core::TrackerSnapshot;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::StorageError;
use crate::record::{PromotedProperties, StoredStateMachine};
use crate::traits::InstanceStore;

type Key = (Uuid, String);

/// An [`InstanceStore`] held entirely in memory. Contents are lost when the
/// store is dropped.
#[derive(Debug, Default)]
pub struct MemoryInstanceStore {
    entries: RwLock<BTreeMap<Key, StoredStateMachine>>,
}

impl MemoryInstanceStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl InstanceStore for MemoryInstanceStore {
    async fn save_tracker(&self, snapshot: &TrackerSnapshot) -> Result<(), StorageError> {
        let mut entries = self.entries.write().await;
        entries
            .entry((snapshot.instance_id, snapshot.state_machine.clone()))
            .or_default()
            .tracker = Some(snapshot.clone());
        Ok(())
    }

    async fn load_tracker(
        &self,
        instance_id: Uuid,
        state_machine: &str,
    ) -> Result<Option<TrackerSnapshot>, StorageError> {
        let entries = self.entries.read().await;
        Ok(entries
            .get(&(instance_id, state_machine.to_string()))
            .and_then(|e| e.tracker.clone()))
    }

    async fn delete_instance(&self, instance_id: Uuid) -> Result<(), StorageError> {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|(id, _), _| *id != instance_id);
        if entries.len() == before {
            return Err(StorageError::InstanceNotFound { instance_id });
        }
        Ok(())
    }

    async fn promote(&self, properties: &PromotedProperties) -> Result<(), StorageError> {
        let mut entries = self.entries.write().await;
        entries
            .entry((properties.instance_id, properties.state_machine.clone()))
            .or_default()
            .promoted = Some(properties.clone());
        Ok(())
    }

    async fn promoted_properties(
        &self,
        instance_id: Uuid,
        state_machine: &str,
    ) -> Result<Option<PromotedProperties>, StorageError> {
        let entries = self.entries.read().await;
        Ok(entries
            .get(&(instance_id, state_machine.to_string()))
            .and_then(|e| e.promoted.clone()))
    }

    async fn find_by_state(
        &self,
        state_machine: &str,
        state: &str,
    ) -> Result<Vec<Uuid>, StorageError> {
        let entries = self.entries.read().await;
        Ok(entries
            .iter()
            .filter(|((_, sm), _)| sm == state_machine)
            .filter_map(|((id, _), e)| {
                e.promoted
                    .as_ref()
                    .filter(|p| p.current_state.as_deref() == Some(state))
                    .map(|_| *id)
            })
            .collect())
    }

    async fn list_instances(&self) -> Result<Vec<Uuid>, StorageError> {
        let entries = self.entries.read().await;
        let ids: BTreeSet<Uuid> = entries.keys().map(|(id, _)| *id).collect();
        Ok(ids.into_iter().collect())
    }
}
