//! Blob store trait definition.

use crate::error::{StorageError, StorageResult};

/// A store of named, opaque byte blobs.
///
/// Blobs are **whole snapshots**: `write` replaces the previous content in
/// full and `read` returns exactly the last successfully written bytes.
/// The store never interprets the bytes it holds.
///
/// # Invariants
///
/// - `read` after a successful `write` returns the written bytes
/// - A failed `write` leaves the previous content readable
/// - Stores must be `Send + Sync` and use interior mutability
///
/// # Implementors
///
/// - [`super::InMemoryBlobStore`] - For testing
/// - [`super::FileBlobStore`] - For persistent storage
pub trait BlobStore: Send + Sync {
    /// Reads the whole blob, or `None` if it has never been written.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is invalid or an I/O error occurs.
    fn read(&self, name: &str) -> StorageResult<Option<Vec<u8>>>;

    /// Replaces the blob with `data`.
    ///
    /// After this returns successfully the data survives process
    /// termination (for durable implementations).
    ///
    /// # Errors
    ///
    /// Returns an error if the name is invalid or an I/O error occurs.
    fn write(&self, name: &str, data: &[u8]) -> StorageResult<()>;

    /// Returns true if a blob with this name exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is invalid or an I/O error occurs.
    fn exists(&self, name: &str) -> StorageResult<bool>;

    /// Removes the blob. Removing a missing blob is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is invalid or an I/O error occurs.
    fn remove(&self, name: &str) -> StorageResult<()>;

    /// Lists the names of all stored blobs, sorted.
    ///
    /// # Errors
    ///
    /// Returns an error if the listing fails.
    fn names(&self) -> StorageResult<Vec<String>>;
}

/// Checks that a blob name is usable by every store implementation.
///
/// Names must be non-empty, must not start with `.`, and may only
/// contain ASCII alphanumerics, `_`, `-` and `.`.
///
/// # Errors
///
/// Returns [`StorageError::InvalidName`] for any other name.
pub fn validate_name(name: &str) -> StorageResult<()> {
    let valid = !name.is_empty()
        && !name.starts_with('.')
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'));

    if valid {
        Ok(())
    } else {
        Err(StorageError::InvalidName {
            name: name.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_plain_names() {
        assert!(validate_name("sync_queue").is_ok());
        assert!(validate_name("table.inventory-items").is_ok());
    }

    #[test]
    fn rejects_bad_names() {
        assert!(validate_name("").is_err());
        assert!(validate_name(".hidden").is_err());
        assert!(validate_name("../escape").is_err());
        assert!(validate_name("a/b").is_err());
        assert!(validate_name("with space").is_err());
    }
}
