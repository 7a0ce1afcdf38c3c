//! Persisted sync metadata.

use crate::codec;
use crate::error::{CoreError, CoreResult};
use crate::types::Timestamp;
use ebbtide_storage::BlobStore;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use uuid::Uuid;

/// Process-wide sync bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncMeta {
    /// When the last pull cycle finished attempting every table.
    pub last_pull: Timestamp,
    /// When a push last delivered at least one entry.
    pub last_push: Option<Timestamp>,
    /// Stable identity of this device.
    pub device_id: String,
    /// Per-table pull watermarks; a table only advances when its fetch succeeded.
    #[serde(default)]
    pub table_pulls: BTreeMap<String, Timestamp>,
}

impl SyncMeta {
    /// Creates fresh metadata with a new device id.
    #[must_use]
    pub fn fresh() -> Self {
        Self {
            last_pull: Timestamp::EPOCH,
            last_push: None,
            device_id: Uuid::new_v4().to_string(),
            table_pulls: BTreeMap::new(),
        }
    }

    /// Returns the `updated_at` lower bound for the next pull of `table`.
    #[must_use]
    pub fn pull_watermark(&self, table: &str) -> Timestamp {
        self.table_pulls
            .get(table)
            .copied()
            .unwrap_or(Timestamp::EPOCH)
    }
}

/// Durable holder of the [`SyncMeta`] singleton.
pub struct SyncMetaStore {
    blobs: Arc<dyn BlobStore>,
    blob_name: String,
    meta: RwLock<Option<SyncMeta>>,
}

impl SyncMetaStore {
    /// Creates an unloaded metadata store persisted under `blob_name`.
    pub fn new(blobs: Arc<dyn BlobStore>, blob_name: impl Into<String>) -> Self {
        Self {
            blobs,
            blob_name: blob_name.into(),
            meta: RwLock::new(None),
        }
    }

    /// Loads metadata, creating and persisting it on first run.
    ///
    /// # Errors
    ///
    /// Returns an error if the blob cannot be read or the fresh metadata
    /// cannot be written.
    pub fn load(&self) -> CoreResult<()> {
        let loaded = match self.blobs.read(&self.blob_name)? {
            Some(bytes) => match codec::decode::<SyncMeta>(&bytes) {
                Ok(meta) => Some(meta),
                Err(e) => {
                    tracing::warn!(blob = %self.blob_name, error = %e, "sync metadata unreadable, resetting");
                    None
                }
            },
            None => None,
        };

        let meta = match loaded {
            Some(meta) => meta,
            None => {
                let meta = SyncMeta::fresh();
                self.persist(&meta)?;
                tracing::info!(device_id = %meta.device_id, "initialized sync metadata");
                meta
            }
        };

        *self.meta.write() = Some(meta);
        Ok(())
    }

    /// Returns a copy of the current metadata.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NotInitialized`] before `load`.
    pub fn get(&self) -> CoreResult<SyncMeta> {
        self.meta.read().clone().ok_or(CoreError::NotInitialized)
    }

    /// Applies `f` to the metadata and persists the result.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NotInitialized`] before `load`, or a storage error.
    pub fn update(&self, f: impl FnOnce(&mut SyncMeta)) -> CoreResult<SyncMeta> {
        let mut guard = self.meta.write();
        let meta = guard.as_mut().ok_or(CoreError::NotInitialized)?;
        f(meta);
        self.persist(meta)?;
        Ok(meta.clone())
    }

    fn persist(&self, meta: &SyncMeta) -> CoreResult<()> {
        let bytes = codec::encode(meta)?;
        self.blobs.write(&self.blob_name, &bytes)?;
        Ok(())
    }
}
