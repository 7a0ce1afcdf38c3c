//! Network connectivity signal.

use std::sync::Arc;
use tokio::sync::watch;
use tracing::info;

/// Shared online/offline flag with change notification.
///
/// The platform layer calls [`set_online`](Self::set_online) when the
/// network changes; the engine subscribes to react to transitions.
/// Clones share the same state.
#[derive(Debug, Clone)]
pub struct ConnectivityMonitor {
    tx: Arc<watch::Sender<bool>>,
}

impl ConnectivityMonitor {
    /// Creates a monitor with the given initial state.
    pub fn new(online: bool) -> Self {
        let (tx, _rx) = watch::channel(online);
        Self { tx: Arc::new(tx) }
    }

    /// Records the current connectivity. Subscribers are notified only on
    /// an actual transition.
    pub fn set_online(&self, online: bool) {
        let changed = self.tx.send_if_modified(|current| {
            if *current == online {
                return false;
            }
            *current = online;
            true
        });
        if changed {
            info!(online, "connectivity changed");
        }
    }

    /// Returns the current connectivity.
    pub fn is_online(&self) -> bool {
        *self.tx.borrow()
    }

    /// Subscribes to transitions.
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }
}

impl Default for ConnectivityMonitor {
    fn default() -> Self {
        Self::new(true)
    }
}
