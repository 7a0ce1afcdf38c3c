//! In-memory blob store for testing.

use crate::blob::{validate_name, BlobStore};
use crate::error::StorageResult;
use parking_lot::RwLock;
use std::collections::BTreeMap;

/// An in-memory blob store.
///
/// This store keeps all blobs in memory and is suitable for:
/// - Unit tests
/// - Integration tests
/// - Ephemeral stores that don't need persistence
///
/// # Example
///
/// ```rust
/// use ebbtide_storage::{BlobStore, InMemoryBlobStore};
///
/// let store = InMemoryBlobStore::new();
/// store.write("sync_queue", b"[]").unwrap();
/// assert!(store.exists("sync_queue").unwrap());
/// ```
#[derive(Debug, Default)]
pub struct InMemoryBlobStore {
    blobs: RwLock<BTreeMap<String, Vec<u8>>>,
    write_count: RwLock<u64>,
}

impl InMemoryBlobStore {
    /// Creates a new empty in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns how many successful writes the store has seen.
    ///
    /// Useful for asserting that an operation persisted (or did not).
    #[must_use]
    pub fn write_count(&self) -> u64 {
        *self.write_count.read()
    }

    /// Clears all blobs.
    pub fn clear(&self) {
        self.blobs.write().clear();
    }
}

impl BlobStore for InMemoryBlobStore {
    fn read(&self, name: &str) -> StorageResult<Option<Vec<u8>>> {
        validate_name(name)?;
        Ok(self.blobs.read().get(name).cloned())
    }

    fn write(&self, name: &str, data: &[u8]) -> StorageResult<()> {
        validate_name(name)?;
        self.blobs.write().insert(name.to_string(), data.to_vec());
        *self.write_count.write() += 1;
        Ok(())
    }

    fn exists(&self, name: &str) -> StorageResult<bool> {
        validate_name(name)?;
        Ok(self.blobs.read().contains_key(name))
    }

    fn remove(&self, name: &str) -> StorageResult<()> {
        validate_name(name)?;
        self.blobs.write().remove(name);
        Ok(())
    }

    fn names(&self) -> StorageResult<Vec<String>> {
        Ok(self.blobs.read().keys().cloned().collect())
    }
}
