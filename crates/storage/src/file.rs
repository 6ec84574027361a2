//! Directory-backed instance store.
//!
//! Each instance is one JSON document, `<instance_id>.json`, holding every
//! state machine stored for it. Writes go to a temporary sibling and are
//! renamed into place, so a reader never sees a half-written document.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use statetrack_core::TrackerSnapshot;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::error::StorageError;
use crate::record::{PromotedProperties, StoredStateMachine};
use crate::traits::InstanceStore;

#[derive(Debug, Default, Serialize, Deserialize)]
struct InstanceDocument {
    #[serde(default)]
    state_machines: BTreeMap<String, StoredStateMachine>,
}

/// An [`InstanceStore`] persisting to a directory of JSON documents.
#[derive(Debug)]
pub struct FileInstanceStore {
    root: PathBuf,
    // Serializes read-modify-write cycles within this process.
    write_lock: Mutex<()>,
}

impl FileInstanceStore {
    /// Open (creating if needed) a store rooted at `root`.
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let root = root.into();
        tokio::fs::create_dir_all(&root).await.map_err(|e| {
            StorageError::Backend(format!("could not create '{}': {}", root.display(), e))
        })?;
        tracing::debug!(root = %root.display(), "opened file instance store");
        Ok(FileInstanceStore {
            root,
            write_lock: Mutex::new(()),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, instance_id: Uuid) -> PathBuf {
        self.root.join(format!("{}.json", instance_id))
    }

    async fn read_document(
        &self,
        instance_id: Uuid,
    ) -> Result<Option<InstanceDocument>, StorageError> {
        read_document_at(&self.path_for(instance_id)).await
    }

    async fn write_document(
        &self,
        instance_id: Uuid,
        document: &InstanceDocument,
    ) -> Result<(), StorageError> {
        let path = self.path_for(instance_id);
        let tmp = path.with_extension("json.tmp");
        let bytes = serde_json::to_vec_pretty(document)?;
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }

    async fn update<F>(
        &self,
        instance_id: Uuid,
        state_machine: &str,
        f: F,
    ) -> Result<(), StorageError>
    where
        F: FnOnce(&mut StoredStateMachine) + Send,
    {
        let _guard = self.write_lock.lock().await;
        let mut document = self.read_document(instance_id).await?.unwrap_or_default();
        f(document
            .state_machines
            .entry(state_machine.to_string())
            .or_default());
        self.write_document(instance_id, &document).await
    }

    async fn documents(&self) -> Result<Vec<(Uuid, InstanceDocument)>, StorageError> {
        let mut out = Vec::new();
        let mut dir = tokio::fs::read_dir(&self.root).await?;
        while let Some(entry) = dir.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let Some(id) = path
                .file_stem()
                .and_then(|s| s.to_str())
                .and_then(|s| Uuid::parse_str(s).ok())
            else {
                tracing::warn!(path = %path.display(), "skipping file with non-instance name");
                continue;
            };
            if let Some(doc) = read_document_at(&path).await? {
                out.push((id, doc));
            }
        }
        out.sort_by_key(|(id, _)| *id);
        Ok(out)
    }
}

async fn read_document_at(path: &Path) -> Result<Option<InstanceDocument>, StorageError> {
    match tokio::fs::read(path).await {
        Ok(bytes) => {
            let doc = serde_json::from_slice(&bytes).map_err(|e| {
                StorageError::Serialization(format!("'{}': {}", path.display(), e))
            })?;
            Ok(Some(doc))
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(StorageError::Backend(format!(
            "could not read '{}': {}",
            path.display(),
            e
        ))),
    }
}

#[async_trait]
impl InstanceStore for FileInstanceStore {
    async fn save_tracker(&self, snapshot: &TrackerSnapshot) -> Result<(), StorageError> {
        let stored = snapshot.clone();
        self.update(snapshot.instance_id, &snapshot.state_machine, move |e| {
            e.tracker = Some(stored)
        })
        .await
    }

    async fn load_tracker(
        &self,
        instance_id: Uuid,
        state_machine: &str,
    ) -> Result<Option<TrackerSnapshot>, StorageError> {
        Ok(self
            .read_document(instance_id)
            .await?
            .and_then(|mut d| d.state_machines.remove(state_machine))
            .and_then(|e| e.tracker))
    }

    async fn delete_instance(&self, instance_id: Uuid) -> Result<(), StorageError> {
        let _guard = self.write_lock.lock().await;
        match tokio::fs::remove_file(self.path_for(instance_id)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::InstanceNotFound { instance_id })
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn promote(&self, properties: &PromotedProperties) -> Result<(), StorageError> {
        let stored = properties.clone();
        self.update(properties.instance_id, &properties.state_machine, move |e| {
            e.promoted = Some(stored)
        })
        .await
    }

    async fn promoted_properties(
        &self,
        instance_id: Uuid,
        state_machine: &str,
    ) -> Result<Option<PromotedProperties>, StorageError> {
        Ok(self
            .read_document(instance_id)
            .await?
            .and_then(|mut d| d.state_machines.remove(state_machine))
            .and_then(|e| e.promoted))
    }

    async fn find_by_state(
        &self,
        state_machine: &str,
        state: &str,
    ) -> Result<Vec<Uuid>, StorageError> {
        Ok(self
            .documents()
            .await?
            .into_iter()
            .filter(|(_, doc)| {
                doc.state_machines
                    .get(state_machine)
                    .and_then(|e| e.promoted.as_ref())
                    .is_some_and(|p| p.current_state.as_deref() == Some(state))
            })
            .map(|(id, _)| id)
            .collect())
    }

    async fn list_instances(&self) -> Result<Vec<Uuid>, StorageError> {
        Ok(self
            .documents()
            .await?
            .into_iter()
            .filter(|(_, doc)| doc.state_machines.values().any(|e| !e.is_empty()))
            .map(|(id, _)| id)
            .collect())
    }
}
