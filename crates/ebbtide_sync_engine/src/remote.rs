//! Remote store abstraction.

use crate::error::{SyncError, SyncResult};
use async_trait::async_trait;
use ebbtide_core::{Row, Timestamp};
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

/// The remote backend a [`SyncEngine`](crate::SyncEngine) reconciles with.
///
/// Every call is independent; the engine never batches outbox entries into
/// one request.
///
/// # Invariants
///
/// - `fetch_since` returns rows with `updated_at` strictly greater than
///   `since`, in ascending `updated_at` order
/// - `upsert` replaces the whole row with the same id
/// - `update` merges columns into an existing row and is a no-op when the
///   row is absent
/// - `delete` of an absent row succeeds
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Inserts or replaces a full row.
    async fn upsert(&self, table: &str, row: Row) -> SyncResult<()>;

    /// Applies a partial update by id.
    async fn update(&self, table: &str, row: Row) -> SyncResult<()>;

    /// Deletes a row by id.
    async fn delete(&self, table: &str, id: &str) -> SyncResult<()>;

    /// Fetches rows changed after `since`.
    async fn fetch_since(&self, table: &str, since: Timestamp) -> SyncResult<Vec<Row>>;

    /// Returns the authenticated user id, if any.
    fn authenticated_user(&self) -> Option<String>;
}

/// Counts of calls served by a [`MemoryRemote`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RemoteCalls {
    /// `upsert` calls.
    pub upserts: u64,
    /// `update` calls.
    pub updates: u64,
    /// `delete` calls.
    pub deletes: u64,
    /// `fetch_since` calls.
    pub fetches: u64,
}

/// An in-memory remote for tests and demos.
///
/// Supports failure injection: going offline, rejecting specific record
/// ids, failing fetches for specific tables, and per-call latency.
#[derive(Debug)]
pub struct MemoryRemote {
    tables: RwLock<HashMap<String, BTreeMap<String, Row>>>,
    user: RwLock<Option<String>>,
    online: AtomicBool,
    rejected: RwLock<HashSet<String>>,
    failing_tables: RwLock<HashSet<String>>,
    latency: RwLock<Option<Duration>>,
    upserts: AtomicU64,
    updates: AtomicU64,
    deletes: AtomicU64,
    fetches: AtomicU64,
}

impl MemoryRemote {
    /// Creates an empty, reachable remote with no authenticated user.
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(HashMap::new()),
            user: RwLock::new(None),
            online: AtomicBool::new(true),
            rejected: RwLock::new(HashSet::new()),
            failing_tables: RwLock::new(HashSet::new()),
            latency: RwLock::new(None),
            upserts: AtomicU64::new(0),
            updates: AtomicU64::new(0),
            deletes: AtomicU64::new(0),
            fetches: AtomicU64::new(0),
        }
    }

    /// Creates a remote with an authenticated user.
    pub fn with_user(user_id: impl Into<String>) -> Self {
        let remote = Self::new();
        remote.set_user(Some(user_id.into()));
        remote
    }

    /// Sets or clears the authenticated user.
    pub fn set_user(&self, user_id: Option<String>) {
        *self.user.write() = user_id;
    }

    /// Makes every call fail with a retryable network error while `false`.
    pub fn set_reachable(&self, reachable: bool) {
        self.online.store(reachable, Ordering::SeqCst);
    }

    /// Rejects every write touching the given record id.
    pub fn reject_record(&self, id: impl Into<String>) {
        self.rejected.write().insert(id.into());
    }

    /// Stops rejecting writes for the given record id.
    pub fn accept_record(&self, id: &str) {
        self.rejected.write().remove(id);
    }

    /// Makes `fetch_since` fail for the given table.
    pub fn fail_fetch(&self, table: impl Into<String>) {
        self.failing_tables.write().insert(table.into());
    }

    /// Delays every call by `latency`.
    pub fn set_latency(&self, latency: Option<Duration>) {
        *self.latency.write() = latency;
    }

    /// Writes a row directly, as another device would.
    pub fn put_row(&self, table: &str, row: Row) {
        self.tables
            .write()
            .entry(table.to_string())
            .or_default()
            .insert(row.id.clone(), row);
    }

    /// Removes a row directly, as another device would.
    pub fn remove_row(&self, table: &str, id: &str) -> bool {
        self.tables
            .write()
            .get_mut(table)
            .is_some_and(|rows| rows.remove(id).is_some())
    }

    /// Returns a row.
    pub fn row(&self, table: &str, id: &str) -> Option<Row> {
        self.tables.read().get(table)?.get(id).cloned()
    }

    /// Returns every row of a table, ordered by id.
    pub fn rows(&self, table: &str) -> Vec<Row> {
        self.tables
            .read()
            .get(table)
            .map(|rows| rows.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Returns call counters.
    pub fn calls(&self) -> RemoteCalls {
        RemoteCalls {
            upserts: self.upserts.load(Ordering::SeqCst),
            updates: self.updates.load(Ordering::SeqCst),
            deletes: self.deletes.load(Ordering::SeqCst),
            fetches: self.fetches.load(Ordering::SeqCst),
        }
    }

    async fn enter(&self, counter: &AtomicU64) -> SyncResult<()> {
        counter.fetch_add(1, Ordering::SeqCst);
        let latency = *self.latency.read();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        if !self.online.load(Ordering::SeqCst) {
            return Err(SyncError::network_retryable("connection refused"));
        }
        Ok(())
    }

    fn check_accepted(&self, id: &str) -> SyncResult<()> {
        if self.rejected.read().contains(id) {
            return Err(SyncError::Rejected(format!("constraint violation on {id}")));
        }
        Ok(())
    }
}

impl Default for MemoryRemote {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RemoteStore for MemoryRemote {
    async fn upsert(&self, table: &str, row: Row) -> SyncResult<()> {
        self.enter(&self.upserts).await?;
        self.check_accepted(&row.id)?;
        self.put_row(table, row);
        Ok(())
    }

    async fn update(&self, table: &str, row: Row) -> SyncResult<()> {
        self.enter(&self.updates).await?;
        self.check_accepted(&row.id)?;
        let mut tables = self.tables.write();
        if let Some(existing) = tables.get_mut(table).and_then(|rows| rows.get_mut(&row.id)) {
            existing.merge(&row.fields);
            existing.updated_at = row.updated_at;
        }
        Ok(())
    }

    async fn delete(&self, table: &str, id: &str) -> SyncResult<()> {
        self.enter(&self.deletes).await?;
        self.check_accepted(id)?;
        self.remove_row(table, id);
        Ok(())
    }

    async fn fetch_since(&self, table: &str, since: Timestamp) -> SyncResult<Vec<Row>> {
        self.enter(&self.fetches).await?;
        if self.failing_tables.read().contains(table) {
            return Err(SyncError::network_fatal(format!("relation {table} unavailable")));
        }
        let mut rows: Vec<Row> = self
            .rows(table)
            .into_iter()
            .filter(|row| row.updated_at > since)
            .collect();
        rows.sort_by_key(|row| row.updated_at);
        Ok(rows)
    }

    fn authenticated_user(&self) -> Option<String> {
        self.user.read().clone()
    }
}
