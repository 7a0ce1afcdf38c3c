//! # ebbtide Core
//!
//! Offline-first local data layer for ebbtide.
//!
//! This crate provides:
//! - [`LocalStore`]: in-memory table cache mirrored to one durable blob per table
//! - [`SyncQueue`]: the ordered, deduplicated outbox of pending mutations
//! - [`SyncMetaStore`]: persisted pull/push watermarks and the device id
//! - [`TypedTable`]: statically-typed access to a table through [`Record`]
//! - [`Snapshot`]: read-only view of a data directory for tooling
//!
//! ## Write path
//!
//! Every local mutation (`insert`, `update`, `delete`):
//! 1. mutates the in-memory table
//! 2. rewrites the table's durable blob
//! 3. appends (or collapses into) one outbox entry
//!
//! Rows arriving from the remote go through `apply_remote` (last-write-wins
//! under the table lock) or `bulk_delete`, which never touch the outbox.
//!
//! ## Key Invariants
//!
//! - At most one PENDING outbox entry per `(table, record_id)`
//! - INSERT followed by DELETE before a push leaves no outbox entry
//! - Reads are always served from memory

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod codec;
mod config;
mod error;
mod meta;
mod queue;
mod row;
mod snapshot;
mod store;
mod typed;
mod types;

pub use codec::{decode, encode};
pub use config::{StoreConfig, TableDef, DEFAULT_MAX_RETRIES};
pub use error::{CoreError, CoreResult};
pub use meta::{SyncMeta, SyncMetaStore};
pub use queue::{MutationType, QueueItemId, QueueStatus, SyncQueue, SyncQueueItem};
pub use row::{Fields, Row};
pub use snapshot::Snapshot;
pub use store::{
    table_blob_name, LocalStore, RemoteApply, META_BLOB, QUEUE_BLOB, TABLE_BLOB_PREFIX,
};
pub use typed::{Record, TypedTable};
pub use types::Timestamp;

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
