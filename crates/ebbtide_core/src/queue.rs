//! The sync queue (outbox) of pending local mutations.

use crate::codec;
use crate::error::{CoreError, CoreResult};
use crate::types::Timestamp;
use ebbtide_storage::BlobStore;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Identity of an outbox entry (distinct from the record id).
pub type QueueItemId = Uuid;

/// Kind of local mutation recorded in the outbox.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MutationType {
    /// Row created locally.
    Insert,
    /// Row changed locally.
    Update,
    /// Row removed locally.
    Delete,
}

impl fmt::Display for MutationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            MutationType::Insert => "INSERT",
            MutationType::Update => "UPDATE",
            MutationType::Delete => "DELETE",
        })
    }
}

/// Lifecycle status of an outbox entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum QueueStatus {
    /// Waiting to be pushed.
    Pending,
    /// Claimed by a push in progress.
    Syncing,
    /// Last push attempt failed.
    Failed,
}

impl fmt::Display for QueueStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            QueueStatus::Pending => "PENDING",
            QueueStatus::Syncing => "SYNCING",
            QueueStatus::Failed => "FAILED",
        })
    }
}

/// One outbox entry.
///
/// The payload is a detached snapshot: the full row for INSERT/UPDATE,
/// `{"id": ...}` for DELETE.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncQueueItem {
    /// Entry identity.
    pub id: QueueItemId,
    /// Table the record belongs to.
    pub table_name: String,
    /// Id of the mutated record.
    pub record_id: String,
    /// Kind of mutation.
    pub mutation_type: MutationType,
    /// Row snapshot, or just the id for DELETE.
    pub payload: Value,
    /// When the (latest collapsed) mutation was recorded.
    pub created_at: Timestamp,
    /// Lifecycle status.
    pub status: QueueStatus,
    /// Number of failed push attempts.
    pub retry_count: u32,
    /// Error from the last failed attempt.
    #[serde(default)]
    pub error_message: Option<String>,
}

impl SyncQueueItem {
    fn new(table: &str, record_id: &str, mutation_type: MutationType, payload: Value) -> Self {
        Self {
            id: Uuid::new_v4(),
            table_name: table.to_string(),
            record_id: record_id.to_string(),
            mutation_type,
            payload,
            created_at: Timestamp::now(),
            status: QueueStatus::Pending,
            retry_count: 0,
            error_message: None,
        }
    }

    fn is_for(&self, table: &str, record_id: &str) -> bool {
        self.table_name == table && self.record_id == record_id
    }

    /// Takes over the mutation of a later entry for the same record.
    ///
    /// Only an entry that started as INSERT may stay one: the remote has
    /// never seen that row. A re-insert after UPDATE or DELETE describes a
    /// row the remote already holds and becomes an UPDATE.
    fn absorb_later(&mut self, mutation_type: MutationType, payload: Value, at: Timestamp) {
        self.mutation_type = combine(self.mutation_type, mutation_type);
        self.payload = payload;
        self.created_at = at;
    }
}

/// Net mutation type of two consecutive mutations on one record.
fn combine(earlier: MutationType, later: MutationType) -> MutationType {
    match (earlier, later) {
        (MutationType::Insert, MutationType::Update | MutationType::Insert) => MutationType::Insert,
        (_, MutationType::Insert) => MutationType::Update,
        (_, later) => later,
    }
}

/// Ordered, deduplicated, durable outbox.
///
/// The whole queue is held in memory and rewritten to one blob after
/// every change.
///
/// # Invariants
///
/// - At most one PENDING entry per `(table_name, record_id)`
/// - `pending()` returns entries in insertion order
/// - SYNCING entries are never handed out by `pending()`
pub struct SyncQueue {
    blobs: Arc<dyn BlobStore>,
    blob_name: String,
    max_retries: u32,
    items: RwLock<Option<Vec<SyncQueueItem>>>,
}

impl SyncQueue {
    /// Creates an unloaded queue persisted under `blob_name`.
    pub fn new(blobs: Arc<dyn BlobStore>, blob_name: impl Into<String>, max_retries: u32) -> Self {
        Self {
            blobs,
            blob_name: blob_name.into(),
            max_retries,
            items: RwLock::new(None),
        }
    }

    /// Loads the queue from its blob.
    ///
    /// An unreadable blob is logged and treated as an empty queue. Entries
    /// left in SYNCING by an interrupted push are returned to PENDING.
    ///
    /// # Errors
    ///
    /// Returns an error if the blob cannot be read or the recovered queue
    /// cannot be persisted.
    pub fn load(&self) -> CoreResult<()> {
        let mut items: Vec<SyncQueueItem> = match self.blobs.read(&self.blob_name)? {
            None => Vec::new(),
            Some(bytes) => codec::decode(&bytes).unwrap_or_else(|e| {
                tracing::warn!(blob = %self.blob_name, error = %e, "sync queue unreadable, starting empty");
                Vec::new()
            }),
        };

        let recovered = revive(&mut items, |item| item.status == QueueStatus::Syncing);
        if recovered > 0 {
            tracing::info!(recovered, "returned interrupted outbox entries to pending");
            self.persist(&items)?;
        }

        tracing::debug!(entries = items.len(), "sync queue loaded");
        *self.items.write() = Some(items);
        Ok(())
    }

    /// Returns true once [`SyncQueue::load`] has run.
    pub fn is_loaded(&self) -> bool {
        self.items.read().is_some()
    }

    /// Records a local mutation, collapsing it with any PENDING entry for
    /// the same record.
    ///
    /// - PENDING INSERT + DELETE: the entry is removed entirely
    /// - PENDING INSERT + UPDATE: stays INSERT with the new payload
    /// - PENDING UPDATE/DELETE + INSERT: becomes UPDATE
    /// - anything else: the entry takes the new type, payload and time
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NotInitialized`] before `load`, or a storage
    /// error if the queue cannot be persisted.
    pub fn enqueue(
        &self,
        table: &str,
        record_id: &str,
        mutation_type: MutationType,
        payload: Value,
    ) -> CoreResult<()> {
        self.mutate(|items| {
            let existing = items
                .iter()
                .position(|i| i.status == QueueStatus::Pending && i.is_for(table, record_id));

            match existing {
                Some(idx)
                    if items[idx].mutation_type == MutationType::Insert
                        && mutation_type == MutationType::Delete =>
                {
                    items.remove(idx);
                    tracing::debug!(table, record_id, "insert+delete collapsed, outbox entry dropped");
                }
                Some(idx) => {
                    items[idx].absorb_later(mutation_type, payload, Timestamp::now());
                    tracing::debug!(table, record_id, mutation = %items[idx].mutation_type, "outbox entry collapsed");
                }
                None => {
                    items.push(SyncQueueItem::new(table, record_id, mutation_type, payload));
                    tracing::debug!(table, record_id, mutation = %mutation_type, "outbox entry added");
                }
            }
            true
        })
    }

    /// Returns PENDING entries in insertion order.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NotInitialized`] before `load`.
    pub fn pending(&self) -> CoreResult<Vec<SyncQueueItem>> {
        self.select(|i| i.status == QueueStatus::Pending)
    }

    /// Returns FAILED entries in insertion order.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NotInitialized`] before `load`.
    pub fn failed(&self) -> CoreResult<Vec<SyncQueueItem>> {
        self.select(|i| i.status == QueueStatus::Failed)
    }

    /// Returns a copy of every entry regardless of status.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NotInitialized`] before `load`.
    pub fn all(&self) -> CoreResult<Vec<SyncQueueItem>> {
        self.select(|_| true)
    }

    /// Returns the number of PENDING entries.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NotInitialized`] before `load`.
    pub fn pending_count(&self) -> CoreResult<usize> {
        let guard = self.items.read();
        let items = guard.as_ref().ok_or(CoreError::NotInitialized)?;
        Ok(items
            .iter()
            .filter(|i| i.status == QueueStatus::Pending)
            .count())
    }

    /// Returns the total number of entries.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NotInitialized`] before `load`.
    pub fn len(&self) -> CoreResult<usize> {
        let guard = self.items.read();
        Ok(guard.as_ref().ok_or(CoreError::NotInitialized)?.len())
    }

    /// Returns true if any entry, in any status, references the record.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NotInitialized`] before `load`.
    pub fn has_entry(&self, table: &str, record_id: &str) -> CoreResult<bool> {
        let guard = self.items.read();
        let items = guard.as_ref().ok_or(CoreError::NotInitialized)?;
        Ok(items.iter().any(|i| i.is_for(table, record_id)))
    }

    /// Claims PENDING entries for a push (PENDING → SYNCING).
    ///
    /// Returns how many entries changed state.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NotInitialized`] before `load`, or a storage error.
    pub fn mark_syncing(&self, ids: &[QueueItemId]) -> CoreResult<usize> {
        let mut changed = 0;
        self.mutate(|items| {
            for item in items.iter_mut() {
                if item.status == QueueStatus::Pending && ids.contains(&item.id) {
                    item.status = QueueStatus::Syncing;
                    changed += 1;
                }
            }
            changed > 0
        })?;
        Ok(changed)
    }

    /// Atomically claims every PENDING entry for a push and returns the
    /// claimed snapshots.
    ///
    /// Equivalent to `pending` followed by `mark_syncing`, except that no
    /// `enqueue` can collapse into an entry between the two steps.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NotInitialized`] before `load`, or a storage error.
    pub fn claim_pending(&self) -> CoreResult<Vec<SyncQueueItem>> {
        let mut claimed = Vec::new();
        self.mutate(|items| {
            for item in items.iter_mut().filter(|i| i.status == QueueStatus::Pending) {
                item.status = QueueStatus::Syncing;
                claimed.push(item.clone());
            }
            !claimed.is_empty()
        })?;
        Ok(claimed)
    }

    /// Deletes entries after confirmed remote success. Unknown ids are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NotInitialized`] before `load`, or a storage error.
    pub fn remove_synced(&self, ids: &[QueueItemId]) -> CoreResult<usize> {
        let mut removed = 0;
        self.mutate(|items| {
            let before = items.len();
            items.retain(|i| !ids.contains(&i.id));
            removed = before - items.len();
            removed > 0
        })?;
        Ok(removed)
    }

    /// Marks entries FAILED, bumps their retry count and records the error.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NotInitialized`] before `load`, or a storage error.
    pub fn mark_failed(&self, ids: &[QueueItemId], message: &str) -> CoreResult<usize> {
        let mut changed = 0;
        self.mutate(|items| {
            for item in items.iter_mut().filter(|i| ids.contains(&i.id)) {
                item.status = QueueStatus::Failed;
                item.retry_count += 1;
                item.error_message = Some(message.to_string());
                changed += 1;
            }
            changed > 0
        })?;
        Ok(changed)
    }

    /// Returns claimed entries to PENDING after a transient failure,
    /// recording the error without counting it against the retry cap.
    ///
    /// An entry whose record gained a newer PENDING entry meanwhile is
    /// folded into it, as in [`SyncQueue::retry_failed`].
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NotInitialized`] before `load`, or a storage error.
    pub fn release(&self, ids: &[QueueItemId], message: &str) -> CoreResult<usize> {
        let mut released = 0;
        self.mutate(|items| {
            for item in items
                .iter_mut()
                .filter(|i| i.status == QueueStatus::Syncing && ids.contains(&i.id))
            {
                item.error_message = Some(message.to_string());
            }
            released = revive(items, |i| {
                i.status == QueueStatus::Syncing && ids.contains(&i.id)
            });
            released > 0
        })?;
        Ok(released)
    }

    /// Returns FAILED entries under the retry cap to PENDING.
    ///
    /// If the record already has a newer PENDING entry, the failed one is
    /// folded into it instead so the one-pending-per-record rule holds.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NotInitialized`] before `load`, or a storage error.
    pub fn retry_failed(&self) -> CoreResult<usize> {
        let max = self.max_retries;
        let mut revived = 0;
        self.mutate(|items| {
            revived = revive(items, |i| i.status == QueueStatus::Failed && i.retry_count < max);
            revived > 0
        })?;
        if revived > 0 {
            tracing::info!(revived, "failed outbox entries queued for retry");
        }
        Ok(revived)
    }

    fn select(&self, filter: impl Fn(&SyncQueueItem) -> bool) -> CoreResult<Vec<SyncQueueItem>> {
        let guard = self.items.read();
        let items = guard.as_ref().ok_or(CoreError::NotInitialized)?;
        Ok(items.iter().filter(|i| filter(i)).cloned().collect())
    }

    /// Applies `f` under the write lock and persists if it reports a change.
    fn mutate(&self, f: impl FnOnce(&mut Vec<SyncQueueItem>) -> bool) -> CoreResult<()> {
        let mut guard = self.items.write();
        let items = guard.as_mut().ok_or(CoreError::NotInitialized)?;
        if f(items) {
            self.persist(items)?;
        }
        Ok(())
    }

    fn persist(&self, items: &[SyncQueueItem]) -> CoreResult<()> {
        let bytes = codec::encode(items)?;
        self.blobs.write(&self.blob_name, &bytes)?;
        Ok(())
    }
}

/// Returns matching entries to PENDING, folding each into an existing
/// PENDING entry for the same record when there is one.
///
/// Unlike `enqueue`, an INSERT followed by DELETE keeps the DELETE: the
/// INSERT may already have reached the remote.
fn revive(items: &mut Vec<SyncQueueItem>, should_revive: impl Fn(&SyncQueueItem) -> bool) -> usize {
    let mut revived = 0;
    let mut idx = 0;
    while idx < items.len() {
        if !should_revive(&items[idx]) {
            idx += 1;
            continue;
        }
        revived += 1;

        let target = items.iter().position(|other| {
            other.status == QueueStatus::Pending
                && other.is_for(&items[idx].table_name, &items[idx].record_id)
        });

        match target {
            Some(target) => {
                let stale = items.remove(idx);
                let pending_is_later = target > idx;
                let target = if pending_is_later { target - 1 } else { target };
                let pending = &mut items[target];
                if pending_is_later {
                    pending.mutation_type = combine(stale.mutation_type, pending.mutation_type);
                } else {
                    pending.absorb_later(stale.mutation_type, stale.payload, stale.created_at);
                }
            }
            None => {
                items[idx].status = QueueStatus::Pending;
                idx += 1;
            }
        }
    }
    revived
}

#[cfg(test)]
mod tests {
    use super::*;
    use ebbtide_storage::InMemoryBlobStore;
    use serde_json::json;

    fn queue() -> SyncQueue {
        let q = SyncQueue::new(Arc::new(InMemoryBlobStore::new()), "sync_queue", 5);
        q.load().unwrap();
        q
    }

    fn ids(items: &[SyncQueueItem]) -> Vec<QueueItemId> {
        items.iter().map(|i| i.id).collect()
    }

    #[test]
    fn not_loaded_fails() {
        let q = SyncQueue::new(Arc::new(InMemoryBlobStore::new()), "sync_queue", 5);
        assert!(!q.is_loaded());
        assert!(matches!(q.pending(), Err(CoreError::NotInitialized)));
        assert!(matches!(
            q.enqueue("t", "a", MutationType::Insert, json!({})),
            Err(CoreError::NotInitialized)
        ));
    }

    #[test]
    fn insert_then_update_stays_insert() {
        let q = queue();
        q.enqueue("items", "a", MutationType::Insert, json!({"id": "a", "qty": 1}))
            .unwrap();
        q.enqueue("items", "a", MutationType::Update, json!({"id": "a", "qty": 5}))
            .unwrap();

        let pending = q.pending().unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].mutation_type, MutationType::Insert);
        assert_eq!(pending[0].payload, json!({"id": "a", "qty": 5}));
    }

    #[test]
    fn insert_then_delete_collapses_to_nothing() {
        let q = queue();
        q.enqueue("items", "a", MutationType::Insert, json!({"id": "a"}))
            .unwrap();
        q.enqueue("items", "a", MutationType::Update, json!({"id": "a", "qty": 5}))
            .unwrap();
        q.enqueue("items", "a", MutationType::Delete, json!({"id": "a"}))
            .unwrap();

        assert_eq!(q.len().unwrap(), 0);
    }

    #[test]
    fn update_then_delete_becomes_delete() {
        let q = queue();
        q.enqueue("items", "a", MutationType::Update, json!({"id": "a", "qty": 5}))
            .unwrap();
        q.enqueue("items", "a", MutationType::Delete, json!({"id": "a"}))
            .unwrap();

        let pending = q.pending().unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].mutation_type, MutationType::Delete);
        assert_eq!(pending[0].payload, json!({"id": "a"}));
    }

    #[test]
    fn delete_then_reinsert_becomes_update() {
        let q = queue();
        q.enqueue("items", "a", MutationType::Delete, json!({"id": "a"}))
            .unwrap();
        q.enqueue("items", "a", MutationType::Insert, json!({"id": "a", "qty": 1}))
            .unwrap();
        q.enqueue("items", "a", MutationType::Insert, json!({"id": "a", "qty": 2}))
            .unwrap();

        let pending = q.pending().unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].mutation_type, MutationType::Update);
        assert_eq!(pending[0].payload, json!({"id": "a", "qty": 2}));

        // The remote still holds the row, so a later delete must be kept.
        q.enqueue("items", "a", MutationType::Delete, json!({"id": "a"}))
            .unwrap();
        assert_eq!(q.pending().unwrap()[0].mutation_type, MutationType::Delete);
    }

    #[test]
    fn pending_is_fifo() {
        let q = queue();
        for id in ["c", "a", "b"] {
            q.enqueue("items", id, MutationType::Insert, json!({"id": id}))
                .unwrap();
        }
        // Collapsing keeps the original position.
        q.enqueue("items", "c", MutationType::Update, json!({"id": "c"}))
            .unwrap();

        let order: Vec<_> = q
            .pending()
            .unwrap()
            .into_iter()
            .map(|i| i.record_id)
            .collect();
        assert_eq!(order, vec!["c", "a", "b"]);
    }

    #[test]
    fn same_record_in_other_table_is_separate() {
        let q = queue();
        q.enqueue("items", "a", MutationType::Insert, json!({})).unwrap();
        q.enqueue("logs", "a", MutationType::Insert, json!({})).unwrap();
        assert_eq!(q.pending_count().unwrap(), 2);
    }

    #[test]
    fn syncing_entries_are_not_collapsed_into() {
        let q = queue();
        q.enqueue("items", "a", MutationType::Insert, json!({"v": 1}))
            .unwrap();
        let claimed = q.pending().unwrap();
        assert_eq!(q.mark_syncing(&ids(&claimed)).unwrap(), 1);

        q.enqueue("items", "a", MutationType::Update, json!({"v": 2}))
            .unwrap();

        assert_eq!(q.len().unwrap(), 2);
        let pending = q.pending().unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].mutation_type, MutationType::Update);
    }

    #[test]
    fn claim_pending_takes_only_pending() {
        let q = queue();
        q.enqueue("items", "a", MutationType::Insert, json!({})).unwrap();
        q.enqueue("items", "b", MutationType::Insert, json!({})).unwrap();

        let claimed = q.claim_pending().unwrap();
        assert_eq!(claimed.len(), 2);
        assert!(claimed.iter().all(|i| i.status == QueueStatus::Syncing));
        assert_eq!(q.pending_count().unwrap(), 0);
        assert!(q.claim_pending().unwrap().is_empty());
    }

    #[test]
    fn remove_synced_is_idempotent() {
        let q = queue();
        q.enqueue("items", "a", MutationType::Insert, json!({})).unwrap();
        let batch = ids(&q.pending().unwrap());

        assert_eq!(q.remove_synced(&batch).unwrap(), 1);
        assert_eq!(q.remove_synced(&batch).unwrap(), 0);
        assert_eq!(q.len().unwrap(), 0);
    }

    #[test]
    fn mark_failed_and_retry() {
        let q = queue();
        q.enqueue("items", "a", MutationType::Insert, json!({})).unwrap();
        let batch = ids(&q.pending().unwrap());
        q.mark_syncing(&batch).unwrap();
        q.mark_failed(&batch, "constraint violation").unwrap();

        let failed = q.failed().unwrap();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].retry_count, 1);
        assert_eq!(failed[0].error_message.as_deref(), Some("constraint violation"));
        assert_eq!(q.pending_count().unwrap(), 0);

        assert_eq!(q.retry_failed().unwrap(), 1);
        assert_eq!(q.pending_count().unwrap(), 1);
    }

    #[test]
    fn retry_stops_at_cap() {
        let q = queue();
        q.enqueue("items", "a", MutationType::Insert, json!({})).unwrap();
        let batch = ids(&q.pending().unwrap());

        for _ in 0..5 {
            q.mark_syncing(&batch).unwrap();
            q.mark_failed(&batch, "rejected").unwrap();
            q.retry_failed().unwrap();
        }

        let all = q.all().unwrap();
        assert_eq!(all[0].retry_count, 5);
        assert_eq!(all[0].status, QueueStatus::Failed);
        assert_eq!(q.retry_failed().unwrap(), 0);
    }

    #[test]
    fn release_returns_to_pending_without_counting() {
        let q = queue();
        q.enqueue("items", "a", MutationType::Insert, json!({})).unwrap();
        let batch = ids(&q.claim_pending().unwrap());

        assert_eq!(q.release(&batch, "connection reset").unwrap(), 1);

        let pending = q.pending().unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].retry_count, 0);
        assert_eq!(pending[0].error_message.as_deref(), Some("connection reset"));
        // Only claimed entries are released.
        assert_eq!(q.release(&batch, "again").unwrap(), 0);
    }

    #[test]
    fn release_folds_into_newer_pending() {
        let q = queue();
        q.enqueue("items", "a", MutationType::Insert, json!({"v": 1}))
            .unwrap();
        let batch = ids(&q.claim_pending().unwrap());
        q.enqueue("items", "a", MutationType::Delete, json!({"id": "a"}))
            .unwrap();

        assert_eq!(q.release(&batch, "timeout").unwrap(), 1);

        // The INSERT may have landed remotely; the DELETE must survive.
        let all = q.all().unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].status, QueueStatus::Pending);
        assert_eq!(all[0].mutation_type, MutationType::Delete);
    }

    #[test]
    fn retry_folds_into_newer_pending() {
        let q = queue();
        q.enqueue("items", "a", MutationType::Insert, json!({"v": 1}))
            .unwrap();
        let batch = ids(&q.pending().unwrap());
        q.mark_syncing(&batch).unwrap();
        q.enqueue("items", "a", MutationType::Update, json!({"v": 2}))
            .unwrap();
        q.mark_failed(&batch, "offline").unwrap();

        assert_eq!(q.retry_failed().unwrap(), 1);

        let all = q.all().unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].status, QueueStatus::Pending);
        assert_eq!(all[0].mutation_type, MutationType::Insert);
        assert_eq!(all[0].payload, json!({"v": 2}));
    }

    #[test]
    fn retry_keeps_delete_after_failed_insert() {
        let q = queue();
        q.enqueue("items", "a", MutationType::Insert, json!({"v": 1}))
            .unwrap();
        let batch = ids(&q.pending().unwrap());
        q.mark_syncing(&batch).unwrap();
        q.enqueue("items", "a", MutationType::Delete, json!({"id": "a"}))
            .unwrap();
        q.mark_failed(&batch, "timeout").unwrap();

        q.retry_failed().unwrap();

        let all = q.all().unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].mutation_type, MutationType::Delete);
    }

    #[test]
    fn load_recovers_interrupted_push() {
        let blobs: Arc<dyn BlobStore> = Arc::new(InMemoryBlobStore::new());
        {
            let q = SyncQueue::new(Arc::clone(&blobs), "sync_queue", 5);
            q.load().unwrap();
            q.enqueue("items", "a", MutationType::Insert, json!({})).unwrap();
            let batch = ids(&q.pending().unwrap());
            q.mark_syncing(&batch).unwrap();
        }

        let q = SyncQueue::new(blobs, "sync_queue", 5);
        q.load().unwrap();
        assert_eq!(q.pending_count().unwrap(), 1);
    }

    #[test]
    fn corrupt_blob_loads_empty() {
        let blobs = Arc::new(InMemoryBlobStore::new());
        blobs.write("sync_queue", b"\xff\xfenot cbor").unwrap();

        let q = SyncQueue::new(blobs, "sync_queue", 5);
        q.load().unwrap();
        assert_eq!(q.len().unwrap(), 0);
    }

    #[test]
    fn queue_persists_across_reload() {
        let blobs: Arc<dyn BlobStore> = Arc::new(InMemoryBlobStore::new());
        let q = SyncQueue::new(Arc::clone(&blobs), "sync_queue", 5);
        q.load().unwrap();
        q.enqueue("items", "a", MutationType::Insert, json!({"id": "a", "qty": 1}))
            .unwrap();
        q.enqueue("items", "b", MutationType::Delete, json!({"id": "b"}))
            .unwrap();

        let reloaded = SyncQueue::new(blobs, "sync_queue", 5);
        reloaded.load().unwrap();
        assert_eq!(reloaded.all().unwrap(), q.all().unwrap());
    }
}
