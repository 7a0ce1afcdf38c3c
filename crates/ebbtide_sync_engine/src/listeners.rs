//! Status and completion listener registry.

use crate::status::{SyncCycleResult, SyncStatus};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Handle returned when registering a listener; pass it to
/// [`SyncEngine::remove_listener`](crate::SyncEngine::remove_listener).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type StatusListener = Arc<dyn Fn(SyncStatus) + Send + Sync>;
type CompleteListener = Arc<dyn Fn(&SyncCycleResult) + Send + Sync>;

/// Registered callbacks. Callbacks run outside the registry lock, so a
/// callback may register or remove listeners.
#[derive(Default)]
pub(crate) struct Listeners {
    next_id: AtomicU64,
    status: RwLock<Vec<(ListenerId, StatusListener)>>,
    complete: RwLock<Vec<(ListenerId, CompleteListener)>>,
}

impl Listeners {
    pub(crate) fn on_status(&self, f: impl Fn(SyncStatus) + Send + Sync + 'static) -> ListenerId {
        let id = self.next();
        self.status.write().push((id, Arc::new(f)));
        id
    }

    pub(crate) fn on_complete(
        &self,
        f: impl Fn(&SyncCycleResult) + Send + Sync + 'static,
    ) -> ListenerId {
        let id = self.next();
        self.complete.write().push((id, Arc::new(f)));
        id
    }

    pub(crate) fn remove(&self, id: ListenerId) -> bool {
        let mut removed = false;
        self.status.write().retain(|(lid, _)| {
            let keep = *lid != id;
            removed |= !keep;
            keep
        });
        self.complete.write().retain(|(lid, _)| {
            let keep = *lid != id;
            removed |= !keep;
            keep
        });
        removed
    }

    pub(crate) fn emit_status(&self, status: SyncStatus) {
        let listeners: Vec<StatusListener> =
            self.status.read().iter().map(|(_, f)| Arc::clone(f)).collect();
        for listener in listeners {
            listener(status);
        }
    }

    pub(crate) fn emit_complete(&self, result: &SyncCycleResult) {
        let listeners: Vec<CompleteListener> = self
            .complete
            .read()
            .iter()
            .map(|(_, f)| Arc::clone(f))
            .collect();
        for listener in listeners {
            listener(result);
        }
    }

    fn next(&self) -> ListenerId {
        ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }
}

impl std::fmt::Debug for Listeners {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Listeners")
            .field("status", &self.status.read().len())
            .field("complete", &self.complete.read().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[test]
    fn emit_and_remove() {
        let listeners = Listeners::default();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let sink = Arc::clone(&seen);
        let id = listeners.on_status(move |s| sink.lock().push(s));
        listeners.emit_status(SyncStatus::Syncing);

        assert!(listeners.remove(id));
        assert!(!listeners.remove(id));
        listeners.emit_status(SyncStatus::Idle);

        assert_eq!(*seen.lock(), vec![SyncStatus::Syncing]);
    }

    #[test]
    fn ids_are_unique_across_kinds() {
        let listeners = Listeners::default();
        let a = listeners.on_status(|_| {});
        let b = listeners.on_complete(|_| {});
        assert_ne!(a, b);

        assert!(listeners.remove(b));
        let calls = Arc::new(AtomicU64::new(0));
        let counter = Arc::clone(&calls);
        listeners.on_complete(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        listeners.emit_complete(&SyncCycleResult::default());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
