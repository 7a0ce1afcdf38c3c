//! CLI command implementations.

pub mod inspect;
pub mod queue;
pub mod retry;
pub mod rows;

use ebbtide_core::{LocalStore, Snapshot, StoreConfig, TABLE_BLOB_PREFIX};
use ebbtide_storage::{BlobStore, FileBlobStore};
use std::path::Path;
use std::sync::Arc;

/// Reads an existing data directory without writing to it.
pub(crate) fn read_snapshot(path: &Path) -> Result<Snapshot, Box<dyn std::error::Error>> {
    let blobs = open_blobs(path)?;
    tracing::debug!(path = %path.display(), "reading data directory");
    Ok(Snapshot::read(&blobs)?)
}

/// Opens an existing data directory for writing, registering every table
/// that has a blob.
pub(crate) fn open_store(
    path: &Path,
    max_retries: u32,
) -> Result<LocalStore, Box<dyn std::error::Error>> {
    let blobs = open_blobs(path)?;
    let tables: Vec<String> = blobs
        .names()?
        .into_iter()
        .filter_map(|name| name.strip_prefix(TABLE_BLOB_PREFIX).map(String::from))
        .collect();
    tracing::debug!(path = %path.display(), tables = tables.len(), "opening data directory");

    let config = StoreConfig::new()
        .with_tables(tables)
        .max_retries(max_retries);
    Ok(LocalStore::open(Arc::new(blobs), config)?)
}

fn open_blobs(path: &Path) -> Result<FileBlobStore, Box<dyn std::error::Error>> {
    if !path.is_dir() {
        return Err(format!("No data directory found at {:?}", path).into());
    }
    Ok(FileBlobStore::open(path)?)
}
