//! # ebbtide Storage
//!
//! Durable blob storage for the ebbtide local store.
//!
//! A blob store is a flat namespace of **named byte blobs**. Each blob is
//! read and written as a whole snapshot; there is no append or partial
//! write. Higher layers (tables, the sync queue, sync metadata) own the
//! encoding of what goes inside a blob.
//!
//! ## Available Stores
//!
//! - [`InMemoryBlobStore`] - For testing and ephemeral storage
//! - [`FileBlobStore`] - One file per blob inside a directory
//!
//! ## Example
//!
//! ```rust
//! use ebbtide_storage::{BlobStore, InMemoryBlobStore};
//!
//! let store = InMemoryBlobStore::new();
//! store.write("table.items", b"snapshot").unwrap();
//! assert_eq!(store.read("table.items").unwrap().as_deref(), Some(&b"snapshot"[..]));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod blob;
mod error;
mod file;
mod memory;

pub use blob::{validate_name, BlobStore};
pub use error::{StorageError, StorageResult};
pub use file::FileBlobStore;
pub use memory::InMemoryBlobStore;
