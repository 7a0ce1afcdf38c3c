//! The sync engine: push/pull cycles over a local store and a remote.

use crate::background::BackgroundTasks;
use crate::config::SyncConfig;
use crate::connectivity::ConnectivityMonitor;
use crate::error::{SyncError, SyncResult};
use crate::listeners::{ListenerId, Listeners};
use crate::remote::RemoteStore;
use crate::status::{SyncCycleResult, SyncStats, SyncStatus};
use ebbtide_core::{LocalStore, MutationType, Row, SyncQueueItem, Timestamp};
use parking_lot::{Mutex, RwLock};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Fate of one outbox entry in a push.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pushed {
    Done,
    Deferred,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PullMode {
    Incremental,
    Full,
}

/// Status tracking. `phase` never holds `Offline`; connectivity overlays it.
#[derive(Debug)]
struct StatusCell {
    phase: SyncStatus,
    emitted: SyncStatus,
}

/// Resets the single-flight flag when the cycle ends, however it ends.
struct CycleGuard<'a>(&'a AtomicBool);

impl<'a> CycleGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for CycleGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Reconciles a [`LocalStore`] with a [`RemoteStore`].
///
/// The engine:
/// - Runs push-then-pull cycles, at most one at a time
/// - Tracks an observable [`SyncStatus`] and notifies listeners
/// - Optionally schedules cycles in the background (see [`start`](Self::start))
pub struct SyncEngine<R> {
    config: SyncConfig,
    store: Arc<LocalStore>,
    remote: Arc<R>,
    connectivity: ConnectivityMonitor,
    status: RwLock<StatusCell>,
    in_flight: AtomicBool,
    stats: RwLock<SyncStats>,
    listeners: Listeners,
    tasks: Mutex<Option<BackgroundTasks>>,
}

impl<R: RemoteStore + 'static> SyncEngine<R> {
    /// Creates a new sync engine. The store must be initialized before the
    /// first cycle.
    pub fn new(
        config: SyncConfig,
        store: Arc<LocalStore>,
        remote: Arc<R>,
        connectivity: ConnectivityMonitor,
    ) -> Self {
        let initial = if connectivity.is_online() {
            SyncStatus::Idle
        } else {
            SyncStatus::Offline
        };
        Self {
            config,
            store,
            remote,
            connectivity,
            status: RwLock::new(StatusCell {
                phase: SyncStatus::Idle,
                emitted: initial,
            }),
            in_flight: AtomicBool::new(false),
            stats: RwLock::new(SyncStats::default()),
            listeners: Listeners::default(),
            tasks: Mutex::new(None),
        }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Returns the local store.
    pub fn store(&self) -> &Arc<LocalStore> {
        &self.store
    }

    /// Returns the remote.
    pub fn remote(&self) -> &Arc<R> {
        &self.remote
    }

    /// Returns the connectivity monitor.
    pub fn connectivity(&self) -> &ConnectivityMonitor {
        &self.connectivity
    }

    /// Returns the current status. `Offline` whenever connectivity is absent.
    pub fn sync_status(&self) -> SyncStatus {
        let phase = self.status.read().phase;
        self.overlay(phase)
    }

    /// Returns true while a cycle is running.
    pub fn is_syncing(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Returns the number of PENDING outbox entries.
    ///
    /// # Errors
    ///
    /// Returns an error if the store is not initialized.
    pub fn pending_count(&self) -> SyncResult<usize> {
        Ok(self.store.queue().pending_count()?)
    }

    /// Returns every outbox entry in every status.
    ///
    /// # Errors
    ///
    /// Returns an error if the store is not initialized.
    pub fn full_queue(&self) -> SyncResult<Vec<SyncQueueItem>> {
        Ok(self.store.queue().all()?)
    }

    /// Returns FAILED entries under the retry cap to PENDING.
    ///
    /// # Errors
    ///
    /// Returns an error if the store is not initialized or the queue
    /// cannot be persisted.
    pub fn retry_failed(&self) -> SyncResult<usize> {
        Ok(self.store.queue().retry_failed()?)
    }

    /// Returns cumulative statistics.
    pub fn stats(&self) -> SyncStats {
        self.stats.read().clone()
    }

    /// Registers a callback for status transitions.
    pub fn on_status_change(&self, f: impl Fn(SyncStatus) + Send + Sync + 'static) -> ListenerId {
        self.listeners.on_status(f)
    }

    /// Registers a callback invoked after every executed cycle.
    pub fn on_sync_complete(
        &self,
        f: impl Fn(&SyncCycleResult) + Send + Sync + 'static,
    ) -> ListenerId {
        self.listeners.on_complete(f)
    }

    /// Removes a listener. Returns false if it was not registered.
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        self.listeners.remove(id)
    }

    /// Runs one push-then-pull cycle.
    ///
    /// Returns immediately with a no-op result if another cycle is in
    /// flight or connectivity is absent.
    pub async fn sync_now(&self) -> SyncCycleResult {
        self.run_cycle(PullMode::Incremental).await
    }

    /// Re-fetches every table from the epoch and removes local rows the
    /// remote no longer has, unless they still have outbox entries.
    ///
    /// Does not push. Subject to the same single-flight guard as
    /// [`sync_now`](Self::sync_now).
    pub async fn force_full_pull(&self) -> SyncCycleResult {
        self.run_cycle(PullMode::Full).await
    }

    /// Starts background scheduling: one cycle after the startup delay
    /// (if online), one per sync interval, and one on every reconnect.
    ///
    /// Calling `start` on a running engine does nothing.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::NoRuntime`] outside a tokio runtime.
    pub fn start(self: &Arc<Self>) -> SyncResult<()> {
        let handle = tokio::runtime::Handle::try_current().map_err(|_| SyncError::NoRuntime)?;
        let mut tasks = self.tasks.lock();
        if tasks.is_some() {
            debug!("sync engine already started");
            return Ok(());
        }
        *tasks = Some(BackgroundTasks::spawn(self, &handle));
        info!(
            interval_ms = self.config.sync_interval.as_millis() as u64,
            "sync engine started"
        );
        Ok(())
    }

    /// Stops background scheduling. A cycle already running completes.
    pub fn stop(&self) {
        if let Some(mut tasks) = self.tasks.lock().take() {
            tasks.abort();
            info!("sync engine stopped");
        }
    }

    /// Returns true between `start` and `stop`.
    pub fn is_running(&self) -> bool {
        self.tasks.lock().is_some()
    }

    /// Re-evaluates the observable status after a connectivity change.
    pub(crate) fn refresh_status(&self) {
        let emitted = {
            let mut cell = self.status.write();
            self.transition(&mut cell)
        };
        self.emit(emitted);
    }

    async fn run_cycle(&self, mode: PullMode) -> SyncCycleResult {
        let Some(_guard) = CycleGuard::acquire(&self.in_flight) else {
            debug!("sync already in progress, skipping");
            self.stats.write().cycles_skipped += 1;
            return SyncCycleResult::skipped();
        };
        if !self.connectivity.is_online() {
            debug!("offline, skipping sync");
            self.refresh_status();
            return SyncCycleResult::offline();
        }

        let started = Instant::now();
        self.set_phase(SyncStatus::Syncing);

        let mut result = SyncCycleResult {
            executed: true,
            ..SyncCycleResult::default()
        };
        if mode == PullMode::Incremental {
            self.push(&mut result).await;
        }
        self.pull(mode, &mut result).await;

        result.duration = started.elapsed();
        let phase = if result.errors.is_empty() {
            SyncStatus::Idle
        } else {
            SyncStatus::Error
        };
        result.status = self.overlay(phase);

        self.stats.write().record(&result);
        info!(
            pushed = result.pushed,
            deferred = result.deferred,
            push_failed = result.push_failed,
            pulled = result.pulled,
            discarded = result.discarded,
            removed = result.removed,
            errors = result.errors.len(),
            duration_ms = result.duration.as_millis() as u64,
            "sync cycle complete"
        );

        self.set_phase(phase);
        self.listeners.emit_complete(&result);
        result
    }

    async fn push(&self, result: &mut SyncCycleResult) {
        let queue = self.store.queue();
        let claimed = match queue.claim_pending() {
            Ok(claimed) => claimed,
            Err(err) => {
                warn!(error = %err, "could not read outbox");
                result.errors.push(format!("push: {err}"));
                return;
            }
        };
        if claimed.is_empty() {
            return;
        }
        debug!(count = claimed.len(), "pushing outbox");

        for item in &claimed {
            // Once connectivity drops, the rest of the batch waits for the next cycle.
            let pushed = if self.connectivity.is_online() {
                self.push_item(item).await
            } else {
                Err(SyncError::Offline)
            };
            let outcome = match pushed {
                Ok(()) => queue.remove_synced(&[item.id]).map(|_| Pushed::Done),
                Err(err) => {
                    warn!(
                        table = %item.table_name,
                        record = %item.record_id,
                        mutation = %item.mutation_type,
                        error = %err,
                        retryable = err.is_retryable(),
                        "push failed"
                    );
                    result
                        .errors
                        .push(format!("{}/{}: {err}", item.table_name, item.record_id));
                    if err.is_retryable() {
                        queue.release(&[item.id], &err.to_string()).map(|_| Pushed::Deferred)
                    } else {
                        queue.mark_failed(&[item.id], &err.to_string()).map(|_| Pushed::Failed)
                    }
                }
            };
            match outcome {
                Ok(Pushed::Done) => result.pushed += 1,
                Ok(Pushed::Deferred) => result.deferred += 1,
                Ok(Pushed::Failed) => result.push_failed += 1,
                Err(err) => {
                    warn!(error = %err, "could not update outbox");
                    result.errors.push(format!("outbox: {err}"));
                }
            }
        }

        if result.pushed > 0 {
            let now = Timestamp::now();
            if let Err(err) = self.store.meta().update(|m| m.last_push = Some(now)) {
                result.errors.push(format!("meta: {err}"));
            }
        }
    }

    async fn push_item(&self, item: &SyncQueueItem) -> SyncResult<()> {
        let table = item.table_name.as_str();
        let def = self.store.table_def(table)?;

        match item.mutation_type {
            MutationType::Insert => {
                let owner = self
                    .remote
                    .authenticated_user()
                    .ok_or(SyncError::NotAuthenticated)?;
                let mut row =
                    Row::from_value(item.payload.clone())?.without_fields(&def.local_only_fields);
                row.set(&self.config.owner_field, owner);
                self.remote_call(self.remote.upsert(table, row)).await
            }
            MutationType::Update => {
                let row =
                    Row::from_value(item.payload.clone())?.without_fields(&def.local_only_fields);
                self.remote_call(self.remote.update(table, row)).await
            }
            MutationType::Delete => {
                self.remote_call(self.remote.delete(table, &item.record_id)).await
            }
        }
    }

    /// Bounds a remote call by the configured request timeout.
    async fn remote_call<T>(
        &self,
        call: impl std::future::Future<Output = SyncResult<T>>,
    ) -> SyncResult<T> {
        tokio::time::timeout(self.config.request_timeout, call)
            .await
            .map_err(|_| SyncError::Timeout)?
    }

    async fn pull(&self, mode: PullMode, result: &mut SyncCycleResult) {
        let meta = match self.store.meta().get() {
            Ok(meta) => meta,
            Err(err) => {
                result.errors.push(format!("pull: {err}"));
                return;
            }
        };
        let started = Timestamp::now();
        let tables: Vec<String> = self.store.config().table_names().map(String::from).collect();
        let mut fetched = Vec::new();

        for table in tables {
            let since = match mode {
                PullMode::Incremental => meta.pull_watermark(&table),
                PullMode::Full => Timestamp::EPOCH,
            };
            match self.pull_table(&table, since, mode, result).await {
                Ok(()) => fetched.push(table),
                Err(err) => {
                    warn!(table = %table, error = %err, "pull failed");
                    result.errors.push(format!("{table}: {err}"));
                }
            }
        }

        let update = self.store.meta().update(|m| {
            m.last_pull = started;
            for table in fetched {
                m.table_pulls.insert(table, started);
            }
        });
        if let Err(err) = update {
            result.errors.push(format!("meta: {err}"));
        }
    }

    async fn pull_table(
        &self,
        table: &str,
        since: Timestamp,
        mode: PullMode,
        result: &mut SyncCycleResult,
    ) -> SyncResult<()> {
        let rows = self
            .remote_call(self.remote.fetch_since(table, since))
            .await?;
        let remote_ids: HashSet<String> = rows.iter().map(|r| r.id.clone()).collect();

        let merged = self.store.apply_remote(table, rows)?;
        result.pulled += merged.applied;
        result.discarded += merged.discarded;

        if mode == PullMode::Full {
            let queue = self.store.queue();
            let mut stale = Vec::new();
            for row in self.store.get_all(table)? {
                if !remote_ids.contains(&row.id) && !queue.has_entry(table, &row.id)? {
                    stale.push(row.id);
                }
            }
            if !stale.is_empty() {
                debug!(table, count = stale.len(), "removing rows deleted remotely");
                result.removed += self.store.bulk_delete(table, &stale)?;
            }
        }
        Ok(())
    }

    fn set_phase(&self, phase: SyncStatus) {
        let emitted = {
            let mut cell = self.status.write();
            cell.phase = phase;
            self.transition(&mut cell)
        };
        self.emit(emitted);
    }

    fn transition(&self, cell: &mut StatusCell) -> Option<SyncStatus> {
        let effective = self.overlay(cell.phase);
        if effective == cell.emitted {
            return None;
        }
        cell.emitted = effective;
        Some(effective)
    }

    fn emit(&self, status: Option<SyncStatus>) {
        if let Some(status) = status {
            debug!(%status, "sync status changed");
            self.listeners.emit_status(status);
        }
    }

    fn overlay(&self, phase: SyncStatus) -> SyncStatus {
        if self.connectivity.is_online() {
            phase
        } else {
            SyncStatus::Offline
        }
    }
}

impl<R> std::fmt::Debug for SyncEngine<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncEngine")
            .field("config", &self.config)
            .field("status", &self.status.read().phase)
            .field("in_flight", &self.in_flight.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}
