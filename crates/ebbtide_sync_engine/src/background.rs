//! Background scheduling of sync cycles.

use crate::engine::SyncEngine;
use crate::remote::RemoteStore;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Scheduler tasks owned by a running engine.
///
/// Tasks hold only a weak reference to the engine, so dropping the engine
/// ends them. Cycles they trigger run as separate tasks and are never
/// aborted with the scheduler.
#[derive(Debug)]
pub(crate) struct BackgroundTasks {
    handles: Vec<JoinHandle<()>>,
}

impl BackgroundTasks {
    pub(crate) fn spawn<R: RemoteStore + 'static>(
        engine: &Arc<SyncEngine<R>>,
        runtime: &Handle,
    ) -> Self {
        let config = engine.config();
        let mut handles = Vec::with_capacity(3);

        if engine.connectivity().is_online() {
            handles.push(runtime.spawn(startup(
                Arc::downgrade(engine),
                config.startup_delay,
            )));
        }
        handles.push(runtime.spawn(periodic(
            Arc::downgrade(engine),
            config.sync_interval,
        )));
        handles.push(runtime.spawn(watch_connectivity(
            Arc::downgrade(engine),
            engine.connectivity().subscribe(),
        )));

        Self { handles }
    }

    pub(crate) fn abort(&mut self) {
        for handle in self.handles.drain(..) {
            handle.abort();
        }
    }
}

impl Drop for BackgroundTasks {
    fn drop(&mut self) {
        self.abort();
    }
}

async fn startup<R: RemoteStore + 'static>(engine: Weak<SyncEngine<R>>, delay: Duration) {
    time::sleep(delay).await;
    if let Some(engine) = engine.upgrade() {
        debug!("running startup sync");
        trigger(&engine);
    }
}

async fn periodic<R: RemoteStore + 'static>(engine: Weak<SyncEngine<R>>, period: Duration) {
    let mut ticker = time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        let Some(engine) = engine.upgrade() else {
            break;
        };
        if engine.connectivity().is_online() {
            trigger(&engine);
        }
    }
}

async fn watch_connectivity<R: RemoteStore + 'static>(
    engine: Weak<SyncEngine<R>>,
    mut rx: watch::Receiver<bool>,
) {
    while rx.changed().await.is_ok() {
        let online = *rx.borrow_and_update();
        let Some(engine) = engine.upgrade() else {
            break;
        };
        engine.refresh_status();
        if !online {
            continue;
        }

        info!("connectivity restored, syncing");
        if let Err(err) = engine.retry_failed() {
            warn!(error = %err, "could not requeue failed entries");
        }
        trigger(&engine);
    }
}

/// Runs a cycle on its own task so stopping the scheduler never cancels it.
fn trigger<R: RemoteStore + 'static>(engine: &Arc<SyncEngine<R>>) {
    let engine = Arc::clone(engine);
    tokio::spawn(async move {
        engine.sync_now().await;
    });
}
