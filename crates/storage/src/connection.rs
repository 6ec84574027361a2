use std::sync::Arc;

use crate::error::StorageError;
use crate::file::FileInstanceStore;
use crate::memory::MemoryInstanceStore;
use crate::traits::InstanceStore;

/// Connection string for a fresh in-memory store.
pub const MEMORY_CONNECTION: &str = "memory:";

/// Open the instance store a connection string names.
///
/// Supported forms:
/// - `memory:` (or `memory://`): a new, empty [`MemoryInstanceStore`]
/// - `file:<dir>` (or `file://<dir>`): a [`FileInstanceStore`] rooted at `<dir>`
pub async fn open_store(connection_string: &str) -> Result<Arc<dyn InstanceStore>, StorageError> {
    let trimmed = connection_string.trim();
    let (scheme, rest) = trimmed
        .split_once(':')
        .ok_or_else(|| StorageError::InvalidConnectionString {
            value: connection_string.to_string(),
            reason: "expected '<scheme>:<location>'".to_string(),
        })?;
    let location = rest.strip_prefix("//").unwrap_or(rest);

    match scheme.to_ascii_lowercase().as_str() {
        "memory" => {
            if !location.is_empty() {
                return Err(StorageError::InvalidConnectionString {
                    value: connection_string.to_string(),
                    reason: "memory stores take no location".to_string(),
                });
            }
            Ok(Arc::new(MemoryInstanceStore::new()))
        }
        "file" => {
            if location.is_empty() {
                return Err(StorageError::InvalidConnectionString {
                    value: connection_string.to_string(),
                    reason: "file stores need a directory".to_string(),
                });
            }
            Ok(Arc::new(FileInstanceStore::open(location).await?))
        }
        other => Err(StorageError::InvalidConnectionString {
            value: connection_string.to_string(),
            reason: format!("unknown scheme '{}'", other),
        }),
    }
}
