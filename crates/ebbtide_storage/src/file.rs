//! File-based blob store for persistent storage.

use crate::blob::{validate_name, BlobStore};
use crate::error::StorageResult;
use parking_lot::Mutex;
use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

const BLOB_EXTENSION: &str = "blob";
const TEMP_EXTENSION: &str = "tmp";

/// A directory-backed blob store.
///
/// Each blob lives in its own file, `<root>/<name>.blob`. Data survives
/// process restarts.
///
/// # Durability
///
/// `write` goes to a sibling temp file, calls `File::sync_all()`, then
/// renames it over the target. A crash mid-write leaves the previous
/// snapshot in place.
///
/// # Thread Safety
///
/// Writers are serialized by an internal lock; readers never observe a
/// partially written blob.
///
/// # Example
///
/// ```no_run
/// use ebbtide_storage::{BlobStore, FileBlobStore};
/// use std::path::Path;
///
/// let store = FileBlobStore::open(Path::new("data")).unwrap();
/// store.write("sync_meta", b"...").unwrap();
/// ```
#[derive(Debug)]
pub struct FileBlobStore {
    root: PathBuf,
    write_lock: Mutex<()>,
}

impl FileBlobStore {
    /// Opens a blob store rooted at `root`, creating the directory if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn open(root: &Path) -> StorageResult<Self> {
        fs::create_dir_all(root)?;
        Ok(Self {
            root: root.to_path_buf(),
            write_lock: Mutex::new(()),
        })
    }

    /// Returns the root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn blob_path(&self, name: &str) -> StorageResult<PathBuf> {
        validate_name(name)?;
        Ok(self.root.join(format!("{name}.{BLOB_EXTENSION}")))
    }
}

impl BlobStore for FileBlobStore {
    fn read(&self, name: &str) -> StorageResult<Option<Vec<u8>>> {
        let path = self.blob_path(name)?;
        match fs::read(&path) {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn write(&self, name: &str, data: &[u8]) -> StorageResult<()> {
        let path = self.blob_path(name)?;
        let temp = path.with_extension(TEMP_EXTENSION);

        let _guard = self.write_lock.lock();
        {
            let mut file = OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .open(&temp)?;
            file.write_all(data)?;
            file.sync_all()?;
        }
        fs::rename(&temp, &path)?;

        // Persist the rename itself where the platform allows opening dirs.
        if let Ok(dir) = File::open(&self.root) {
            let _ = dir.sync_all();
        }

        tracing::trace!(blob = name, bytes = data.len(), "blob written");
        Ok(())
    }

    fn exists(&self, name: &str) -> StorageResult<bool> {
        Ok(self.blob_path(name)?.is_file())
    }

    fn remove(&self, name: &str) -> StorageResult<()> {
        let path = self.blob_path(name)?;
        let _guard = self.write_lock.lock();
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn names(&self) -> StorageResult<Vec<String>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(BLOB_EXTENSION) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                if validate_name(stem).is_ok() {
                    names.push(stem.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }
}
