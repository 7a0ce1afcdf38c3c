//! Sync status, cycle results and statistics.

use std::fmt;
use std::time::{Duration, Instant};

/// Externally observable state of the sync engine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SyncStatus {
    /// No cycle is running and the last one succeeded.
    #[default]
    Idle,
    /// A cycle is running.
    Syncing,
    /// The last cycle recorded at least one error.
    Error,
    /// Connectivity is absent; overrides every other state.
    Offline,
}

impl SyncStatus {
    /// Returns true while a cycle is running.
    pub fn is_active(&self) -> bool {
        matches!(self, SyncStatus::Syncing)
    }
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SyncStatus::Idle => "idle",
            SyncStatus::Syncing => "syncing",
            SyncStatus::Error => "error",
            SyncStatus::Offline => "offline",
        };
        f.write_str(name)
    }
}

/// Result of a sync cycle.
#[derive(Debug, Clone, Default)]
pub struct SyncCycleResult {
    /// Whether the cycle did any work. False when skipped or offline.
    pub executed: bool,
    /// Status the engine settled in after the cycle.
    pub status: SyncStatus,
    /// Outbox entries the remote accepted.
    pub pushed: usize,
    /// Outbox entries returned to PENDING after a transient failure.
    pub deferred: usize,
    /// Outbox entries marked FAILED.
    pub push_failed: usize,
    /// Remote rows written locally.
    pub pulled: usize,
    /// Remote rows discarded because the local copy is newer.
    pub discarded: usize,
    /// Local rows removed because the remote no longer has them.
    pub removed: usize,
    /// Per-entry and per-table error messages.
    pub errors: Vec<String>,
    /// Wall time of the cycle.
    pub duration: Duration,
}

impl SyncCycleResult {
    /// The no-op result for a call that found another cycle in flight.
    pub fn skipped() -> Self {
        Self {
            status: SyncStatus::Syncing,
            ..Self::default()
        }
    }

    /// The no-op result for a call made without connectivity.
    pub fn offline() -> Self {
        Self {
            status: SyncStatus::Offline,
            ..Self::default()
        }
    }

    /// Returns true if no error was recorded.
    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Cumulative statistics across cycles.
#[derive(Debug, Clone, Default)]
pub struct SyncStats {
    /// Executed cycles.
    pub cycles_completed: u64,
    /// Calls that found a cycle in flight.
    pub cycles_skipped: u64,
    /// Outbox entries pushed.
    pub items_pushed: u64,
    /// Outbox entries deferred to a later cycle.
    pub items_deferred: u64,
    /// Outbox entries marked FAILED.
    pub items_failed: u64,
    /// Remote rows written locally.
    pub rows_pulled: u64,
    /// Remote rows discarded by last-write-wins.
    pub rows_discarded: u64,
    /// Last executed cycle.
    pub last_sync_time: Option<Instant>,
    /// Last recorded error.
    pub last_error: Option<String>,
}

impl SyncStats {
    pub(crate) fn record(&mut self, result: &SyncCycleResult) {
        self.cycles_completed += 1;
        self.items_pushed += result.pushed as u64;
        self.items_deferred += result.deferred as u64;
        self.items_failed += result.push_failed as u64;
        self.rows_pulled += result.pulled as u64;
        self.rows_discarded += result.discarded as u64;
        self.last_sync_time = Some(Instant::now());
        if let Some(error) = result.errors.last() {
            self.last_error = Some(error.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_display() {
        assert_eq!(SyncStatus::Idle.to_string(), "idle");
        assert_eq!(SyncStatus::Offline.to_string(), "offline");
        assert!(SyncStatus::Syncing.is_active());
        assert!(!SyncStatus::Error.is_active());
    }

    #[test]
    fn no_op_results() {
        let skipped = SyncCycleResult::skipped();
        assert!(!skipped.executed);
        assert_eq!(skipped.pushed + skipped.pulled, 0);

        let offline = SyncCycleResult::offline();
        assert!(!offline.executed);
        assert_eq!(offline.status, SyncStatus::Offline);
    }

    #[test]
    fn stats_accumulate() {
        let mut stats = SyncStats::default();
        stats.record(&SyncCycleResult {
            executed: true,
            pushed: 2,
            pulled: 3,
            ..Default::default()
        });
        stats.record(&SyncCycleResult {
            executed: true,
            push_failed: 1,
            deferred: 2,
            errors: vec!["tasks/a: rejected".into()],
            ..Default::default()
        });

        assert_eq!(stats.cycles_completed, 2);
        assert_eq!(stats.items_pushed, 2);
        assert_eq!(stats.items_failed, 1);
        assert_eq!(stats.items_deferred, 2);
        assert_eq!(stats.rows_pulled, 3);
        assert_eq!(stats.last_error.as_deref(), Some("tasks/a: rejected"));
        assert!(stats.last_sync_time.is_some());
    }
}
