//! Read-only view of a data directory.
//!
//! Unlike [`crate::LocalStore::open`], reading a snapshot never writes:
//! interrupted pushes stay SYNCING, missing metadata stays missing, and an
//! unreadable blob is reported instead of being replaced.

use crate::codec;
use crate::error::{CoreError, CoreResult};
use crate::meta::SyncMeta;
use crate::queue::SyncQueueItem;
use crate::row::Row;
use crate::store::{META_BLOB, QUEUE_BLOB, TABLE_BLOB_PREFIX};
use ebbtide_storage::{BlobStore, StorageError};
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;

/// Decoded contents of every ebbtide blob in a [`BlobStore`].
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    tables: BTreeMap<String, Vec<Row>>,
    queue: Vec<SyncQueueItem>,
    meta: Option<SyncMeta>,
}

impl Snapshot {
    /// Reads every table, the outbox and the sync metadata.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Corrupted`] (wrapped in [`CoreError::Storage`])
    /// if a blob does not decode, or any I/O error from the backend.
    pub fn read(blobs: &dyn BlobStore) -> CoreResult<Self> {
        let mut tables = BTreeMap::new();
        for name in blobs.names()? {
            let Some(table) = name.strip_prefix(TABLE_BLOB_PREFIX) else {
                continue;
            };
            let mut rows: Vec<Row> = read_blob(blobs, &name)?.unwrap_or_default();
            rows.sort_by(|a, b| a.id.cmp(&b.id));
            tables.insert(table.to_string(), rows);
        }

        let queue = read_blob(blobs, QUEUE_BLOB)?.unwrap_or_default();
        let meta = read_blob(blobs, META_BLOB)?;
        tracing::debug!(tables = tables.len(), "snapshot read");

        Ok(Self {
            tables,
            queue,
            meta,
        })
    }

    /// Returns the names of all tables with a blob, sorted.
    pub fn table_names(&self) -> impl Iterator<Item = &str> {
        self.tables.keys().map(String::as_str)
    }

    /// Returns the rows of a table, sorted by id.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::UnknownTable`] if the table has no blob.
    pub fn rows(&self, table: &str) -> CoreResult<&[Row]> {
        self.tables
            .get(table)
            .map(Vec::as_slice)
            .ok_or_else(|| CoreError::unknown_table(table))
    }

    /// Returns every outbox entry as stored, in queue order.
    pub fn queue(&self) -> &[SyncQueueItem] {
        &self.queue
    }

    /// Returns the sync metadata, if the directory has any.
    pub fn meta(&self) -> Option<&SyncMeta> {
        self.meta.as_ref()
    }
}

fn read_blob<T: DeserializeOwned>(blobs: &dyn BlobStore, name: &str) -> CoreResult<Option<T>> {
    let Some(bytes) = blobs.read(name)? else {
        return Ok(None);
    };
    codec::decode(&bytes)
        .map(Some)
        .map_err(|e| StorageError::corrupted(name, e.to_string()).into())
}
