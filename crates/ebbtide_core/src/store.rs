//! The local table store.

use crate::codec;
use crate::config::{StoreConfig, TableDef};
use crate::error::{CoreError, CoreResult};
use crate::meta::SyncMetaStore;
use crate::queue::{MutationType, SyncQueue};
use crate::row::{Fields, Row};
use crate::types::Timestamp;
use ebbtide_storage::BlobStore;
use parking_lot::{Mutex, RwLock};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

/// Blob holding the sync queue.
pub const QUEUE_BLOB: &str = "sync_queue";

/// Blob holding sync metadata.
pub const META_BLOB: &str = "sync_meta";

/// Prefix of per-table blobs.
pub const TABLE_BLOB_PREFIX: &str = "table.";

/// Returns the blob name that mirrors `table`.
#[must_use]
pub fn table_blob_name(table: &str) -> String {
    format!("{TABLE_BLOB_PREFIX}{table}")
}

type Table = HashMap<String, Row>;

/// Outcome of [`LocalStore::apply_remote`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RemoteApply {
    /// Rows written.
    pub applied: usize,
    /// Rows skipped because the local copy is newer.
    pub discarded: usize,
}

/// Network-independent CRUD over named tables.
///
/// `LocalStore` holds every registered table in memory and mirrors each
/// one to its own blob. It owns the [`SyncQueue`] and the
/// [`SyncMetaStore`], both persisted through the same [`BlobStore`].
///
/// # Lifecycle
///
/// A store must be initialized once with [`LocalStore::init`], which
/// loads every table, the queue and the metadata. Any operation before
/// that fails with [`CoreError::NotInitialized`].
///
/// # Example
///
/// ```rust
/// use ebbtide_core::{LocalStore, Row, StoreConfig};
/// use ebbtide_storage::InMemoryBlobStore;
/// use std::sync::Arc;
///
/// let store = LocalStore::new(
///     Arc::new(InMemoryBlobStore::new()),
///     StoreConfig::new().with_tables(["inventory"]),
/// );
/// store.init().unwrap();
///
/// let row = store.insert("inventory", Row::new("rope").with("qty", 3)).unwrap();
/// assert_eq!(store.get_by_id("inventory", "rope").unwrap(), Some(row));
/// assert_eq!(store.queue().pending_count().unwrap(), 1);
/// ```
pub struct LocalStore {
    config: StoreConfig,
    blobs: Arc<dyn BlobStore>,
    tables: RwLock<Option<HashMap<String, Table>>>,
    /// Held across a table write and its outbox entry so both happen in
    /// the same order for concurrent writers.
    mutation_lock: Mutex<()>,
    queue: SyncQueue,
    meta: SyncMetaStore,
}

impl LocalStore {
    /// Creates an uninitialized store.
    pub fn new(blobs: Arc<dyn BlobStore>, config: StoreConfig) -> Self {
        let queue = SyncQueue::new(Arc::clone(&blobs), QUEUE_BLOB, config.max_retries);
        let meta = SyncMetaStore::new(Arc::clone(&blobs), META_BLOB);
        Self {
            config,
            blobs,
            tables: RwLock::new(None),
            mutation_lock: Mutex::new(()),
            queue,
            meta,
        }
    }

    /// Creates and initializes a store in one step.
    ///
    /// # Errors
    ///
    /// Returns an error if [`LocalStore::init`] fails.
    pub fn open(blobs: Arc<dyn BlobStore>, config: StoreConfig) -> CoreResult<Self> {
        let store = Self::new(blobs, config);
        store.init()?;
        Ok(store)
    }

    /// Loads every table blob, the sync queue and sync metadata.
    ///
    /// An unreadable table blob is logged and the table starts empty.
    /// Calling `init` on an initialized store is a no-op.
    ///
    /// # Errors
    ///
    /// Returns an error if a blob cannot be read from storage.
    pub fn init(&self) -> CoreResult<()> {
        if self.is_initialized() {
            tracing::debug!("local store already initialized");
            return Ok(());
        }

        let mut tables = HashMap::with_capacity(self.config.tables.len());
        for def in &self.config.tables {
            let table = self.load_table(&def.name)?;
            tracing::debug!(table = %def.name, rows = table.len(), "table loaded");
            tables.insert(def.name.clone(), table);
        }

        self.queue.load()?;
        self.meta.load()?;
        *self.tables.write() = Some(tables);

        tracing::info!(tables = self.config.tables.len(), "local store initialized");
        Ok(())
    }

    /// Returns true once [`LocalStore::init`] has completed.
    pub fn is_initialized(&self) -> bool {
        self.tables.read().is_some()
    }

    /// Returns the store configuration.
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Returns the definition of a registered table.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::UnknownTable`] if the table is not registered.
    pub fn table_def(&self, table: &str) -> CoreResult<&TableDef> {
        self.config
            .table(table)
            .ok_or_else(|| CoreError::unknown_table(table))
    }

    /// Returns the sync queue.
    pub fn queue(&self) -> &SyncQueue {
        &self.queue
    }

    /// Returns the sync metadata store.
    pub fn meta(&self) -> &SyncMetaStore {
        &self.meta
    }

    /// Returns every row of a table, in no particular order.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NotInitialized`] or [`CoreError::UnknownTable`].
    pub fn get_all(&self, table: &str) -> CoreResult<Vec<Row>> {
        self.read_table(table, |rows| rows.values().cloned().collect())
    }

    /// Returns a row by id.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NotInitialized`] or [`CoreError::UnknownTable`].
    pub fn get_by_id(&self, table: &str, id: &str) -> CoreResult<Option<Row>> {
        self.read_table(table, |rows| rows.get(id).cloned())
    }

    /// Returns the rows matching `predicate`.
    ///
    /// **Warning**: This is a linear scan of the table.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NotInitialized`] or [`CoreError::UnknownTable`].
    pub fn query(&self, table: &str, predicate: impl Fn(&Row) -> bool) -> CoreResult<Vec<Row>> {
        self.read_table(table, |rows| {
            rows.values().filter(|r| predicate(r)).cloned().collect()
        })
    }

    /// Returns the number of rows in a table.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NotInitialized`] or [`CoreError::UnknownTable`].
    pub fn count(&self, table: &str) -> CoreResult<usize> {
        self.read_table(table, HashMap::len)
    }

    /// Inserts a row and records an INSERT in the outbox.
    ///
    /// An empty id is replaced with a fresh UUID. `updated_at` is always
    /// stamped with the current time. Inserting over an existing id
    /// replaces the row and is queued as an UPDATE. Returns the stored row.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NotInitialized`], [`CoreError::UnknownTable`],
    /// or a storage error.
    pub fn insert(&self, table: &str, mut row: Row) -> CoreResult<Row> {
        if row.id.is_empty() {
            row.id = Uuid::new_v4().to_string();
        }
        row.updated_at = Timestamp::now();

        let _ordered = self.mutation_lock.lock();
        let replaced = self.write_table(table, |rows| {
            (rows.insert(row.id.clone(), row.clone()).is_some(), true)
        })?;
        let mutation = if replaced {
            MutationType::Update
        } else {
            MutationType::Insert
        };
        self.queue
            .enqueue(table, &row.id, mutation, row.to_value())?;

        tracing::debug!(table, id = %row.id, "row inserted");
        Ok(row)
    }

    /// Merges `partial` into an existing row and records an UPDATE.
    ///
    /// Returns `None`, without creating a row or an outbox entry, if the
    /// id does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NotInitialized`], [`CoreError::UnknownTable`],
    /// or a storage error.
    pub fn update(&self, table: &str, id: &str, partial: &Fields) -> CoreResult<Option<Row>> {
        let _ordered = self.mutation_lock.lock();
        let updated = self.write_table(table, |rows| {
            let updated = rows.get_mut(id).map(|row| {
                row.merge(partial);
                row.updated_at = Timestamp::now();
                row.clone()
            });
            let changed = updated.is_some();
            (updated, changed)
        })?;

        let Some(row) = updated else {
            tracing::debug!(table, id, "update of missing row ignored");
            return Ok(None);
        };

        self.queue
            .enqueue(table, id, MutationType::Update, row.to_value())?;
        tracing::debug!(table, id, "row updated");
        Ok(Some(row))
    }

    /// Removes a row and records a DELETE.
    ///
    /// Deleting a missing id is a no-op and returns `false`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NotInitialized`], [`CoreError::UnknownTable`],
    /// or a storage error.
    pub fn delete(&self, table: &str, id: &str) -> CoreResult<bool> {
        let _ordered = self.mutation_lock.lock();
        let removed = self.write_table(table, |rows| {
            let removed = rows.remove(id).is_some();
            (removed, removed)
        })?;
        if !removed {
            return Ok(false);
        }

        self.queue
            .enqueue(table, id, MutationType::Delete, json!({ "id": id }))?;
        tracing::debug!(table, id, "row deleted");
        Ok(true)
    }

    /// Inserts or replaces rows as received from the remote.
    ///
    /// Rows are stored as given (no stamping) and nothing is queued.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NotInitialized`], [`CoreError::UnknownTable`],
    /// or a storage error.
    pub fn bulk_upsert(&self, table: &str, rows: Vec<Row>) -> CoreResult<usize> {
        let count = rows.len();
        self.write_table(table, |existing| {
            for row in rows {
                existing.insert(row.id.clone(), row);
            }
            ((), count > 0)
        })?;
        tracing::debug!(table, count, "bulk upsert applied");
        Ok(count)
    }

    /// Merges rows received from the remote with last-write-wins.
    ///
    /// A row is written unless the local copy has a strictly newer
    /// `updated_at`; ties go to the remote. Local-only fields of the
    /// replaced row are carried over. The comparison and the write happen
    /// under one table lock, so a concurrent local write is never
    /// overwritten by an older remote row. Nothing is queued.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NotInitialized`], [`CoreError::UnknownTable`],
    /// or a storage error.
    pub fn apply_remote(&self, table: &str, rows: Vec<Row>) -> CoreResult<RemoteApply> {
        let local_only = &self.table_def(table)?.local_only_fields;
        let outcome = self.write_table(table, |existing| {
            let mut outcome = RemoteApply::default();
            for mut row in rows {
                if let Some(local) = existing.get(&row.id) {
                    if row.updated_at < local.updated_at {
                        tracing::debug!(table, id = %row.id, "local copy is newer, remote row discarded");
                        outcome.discarded += 1;
                        continue;
                    }
                    for field in local_only {
                        if let Some(value) = local.get(field) {
                            row.set(field, value.clone());
                        }
                    }
                }
                existing.insert(row.id.clone(), row);
                outcome.applied += 1;
            }
            (outcome, outcome.applied > 0)
        })?;
        tracing::debug!(table, applied = outcome.applied, discarded = outcome.discarded, "remote rows merged");
        Ok(outcome)
    }

    /// Removes rows by id as directed by the remote. Nothing is queued.
    ///
    /// Returns how many rows were actually removed.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NotInitialized`], [`CoreError::UnknownTable`],
    /// or a storage error.
    pub fn bulk_delete(&self, table: &str, ids: &[String]) -> CoreResult<usize> {
        let removed = self.write_table(table, |rows| {
            let removed = ids
                .iter()
                .filter(|id| rows.remove(id.as_str()).is_some())
                .count();
            (removed, removed > 0)
        })?;
        tracing::debug!(table, removed, "bulk delete applied");
        Ok(removed)
    }

    fn load_table(&self, table: &str) -> CoreResult<Table> {
        let name = table_blob_name(table);
        let Some(bytes) = self.blobs.read(&name)? else {
            return Ok(Table::new());
        };

        match codec::decode::<Vec<Row>>(&bytes) {
            Ok(rows) => Ok(rows.into_iter().map(|r| (r.id.clone(), r)).collect()),
            Err(e) => {
                tracing::warn!(table, error = %e, "table blob unreadable, starting empty");
                Ok(Table::new())
            }
        }
    }

    fn read_table<R>(&self, table: &str, f: impl FnOnce(&Table) -> R) -> CoreResult<R> {
        let guard = self.tables.read();
        let tables = guard.as_ref().ok_or(CoreError::NotInitialized)?;
        let rows = tables
            .get(table)
            .ok_or_else(|| CoreError::unknown_table(table))?;
        Ok(f(rows))
    }

    /// Mutates a table and, if `f` reports a change, rewrites its blob
    /// before releasing the lock.
    fn write_table<R>(
        &self,
        table: &str,
        f: impl FnOnce(&mut Table) -> (R, bool),
    ) -> CoreResult<R> {
        let mut guard = self.tables.write();
        let tables = guard.as_mut().ok_or(CoreError::NotInitialized)?;
        let rows = tables
            .get_mut(table)
            .ok_or_else(|| CoreError::unknown_table(table))?;

        let (result, changed) = f(rows);
        if !changed {
            return Ok(result);
        }

        let mut snapshot: Vec<&Row> = rows.values().collect();
        snapshot.sort_by(|a, b| a.id.cmp(&b.id));
        let bytes = codec::encode(&snapshot)?;
        self.blobs.write(&table_blob_name(table), &bytes)?;

        Ok(result)
    }
}
