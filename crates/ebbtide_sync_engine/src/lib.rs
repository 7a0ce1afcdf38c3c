//! # ebbtide Sync Engine
//!
//! Reconciles an ebbtide [`LocalStore`](ebbtide_core::LocalStore) with a
//! remote backend.
//!
//! This crate provides:
//! - Sync status machine (idle → syncing → idle | error, offline override)
//! - Push phase: drains the outbox, one independent remote call per entry
//! - Pull phase: incremental fetch per table with last-write-wins merge
//! - Single-flight guard on sync cycles
//! - Background scheduling (startup delay, periodic timer, reconnect)
//! - Remote store abstraction and an in-memory remote for tests
//!
//! ## Architecture
//!
//! Each cycle is **push-then-pull**:
//! 1. Push every PENDING outbox entry (INSERT → upsert, UPDATE → partial
//!    update, DELETE → delete)
//! 2. Fetch rows changed since the table's watermark
//! 3. Accept a remote row iff it is new locally or its `updated_at` is not
//!    older than the local copy
//!
//! ## Key Invariants
//!
//! - At most one cycle runs at a time; overlapping calls return immediately
//! - One failed outbox entry never blocks the others
//! - One failed table never blocks the others
//! - An in-flight cycle is never cancelled

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod background;
mod config;
mod connectivity;
mod engine;
mod error;
mod listeners;
mod remote;
mod status;

pub use config::SyncConfig;
pub use connectivity::ConnectivityMonitor;
pub use engine::SyncEngine;
pub use error::{SyncError, SyncResult};
pub use listeners::ListenerId;
pub use remote::{MemoryRemote, RemoteCalls, RemoteStore};
pub use status::{SyncCycleResult, SyncStats, SyncStatus};
