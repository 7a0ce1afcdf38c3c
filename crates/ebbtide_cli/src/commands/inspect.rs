//! Inspect command implementation.

use super::read_snapshot;
use ebbtide_core::{QueueStatus, Timestamp, DEFAULT_MAX_RETRIES};
use serde::Serialize;
use std::path::Path;

/// Data directory inspection result.
#[derive(Debug, Serialize)]
pub struct InspectResult {
    /// Data directory path.
    pub path: String,
    /// Device identity. Absent until the store has been opened once.
    pub device_id: Option<String>,
    /// Global pull watermark.
    pub last_pull: Timestamp,
    /// Last successful push, if any.
    pub last_push: Option<Timestamp>,
    /// Per-table statistics.
    pub tables: Vec<TableStats>,
    /// Outbox summary.
    pub queue: QueueSummary,
}

/// Statistics for a single table.
#[derive(Debug, Serialize)]
pub struct TableStats {
    /// Table name.
    pub name: String,
    /// Number of rows.
    pub rows: usize,
    /// Pull watermark for this table.
    pub pulled_through: Timestamp,
}

/// Outbox entries by status.
#[derive(Debug, Default, Serialize)]
pub struct QueueSummary {
    /// Entries waiting for a push.
    pub pending: usize,
    /// Entries claimed by a push.
    pub syncing: usize,
    /// Failed entries still eligible for retry.
    pub failed: usize,
    /// Failed entries at the retry cap.
    pub exhausted: usize,
}

/// Runs the inspect command.
pub fn run(path: &Path, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let result = collect(path)?;

    // Output
    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        _ => {
            print_text_output(&result);
        }
    }

    Ok(())
}

fn collect(path: &Path) -> Result<InspectResult, Box<dyn std::error::Error>> {
    let snapshot = read_snapshot(path)?;
    let meta = snapshot.meta();

    let mut tables = Vec::new();
    for name in snapshot.table_names() {
        tables.push(TableStats {
            name: name.to_string(),
            rows: snapshot.rows(name)?.len(),
            pulled_through: meta.map_or(Timestamp::EPOCH, |m| m.pull_watermark(name)),
        });
    }

    let mut queue = QueueSummary::default();
    for item in snapshot.queue() {
        match item.status {
            QueueStatus::Pending => queue.pending += 1,
            QueueStatus::Syncing => queue.syncing += 1,
            QueueStatus::Failed if item.retry_count >= DEFAULT_MAX_RETRIES => queue.exhausted += 1,
            QueueStatus::Failed => queue.failed += 1,
        }
    }

    Ok(InspectResult {
        path: path.display().to_string(),
        device_id: meta.map(|m| m.device_id.clone()),
        last_pull: meta.map_or(Timestamp::EPOCH, |m| m.last_pull),
        last_push: meta.and_then(|m| m.last_push),
        tables,
        queue,
    })
}

fn print_text_output(result: &InspectResult) {
    println!("ebbtide Data Inspection");
    println!("=======================");
    println!();
    println!("Path:      {}", result.path);
    println!(
        "Device:    {}",
        result.device_id.as_deref().unwrap_or("(not initialized)")
    );
    println!("Last pull: {}", result.last_pull);
    match result.last_push {
        Some(at) => println!("Last push: {}", at),
        None => println!("Last push: never"),
    }
    println!();
    println!("Tables:");
    if result.tables.is_empty() {
        println!("  (none)");
    }
    for table in &result.tables {
        println!(
            "  {:<20} {:>8} rows  pulled through {}",
            table.name, table.rows, table.pulled_through
        );
    }
    println!();
    println!("Outbox:");
    println!("  Pending:   {}", result.queue.pending);
    println!("  Syncing:   {}", result.queue.syncing);
    println!("  Failed:    {}", result.queue.failed);
    println!("  Exhausted: {}", result.queue.exhausted);
}

#[cfg(test)]
mod tests {
    use super::*;
    use ebbtide_core::{table_blob_name, LocalStore, Row, StoreConfig, META_BLOB, QUEUE_BLOB};
    use ebbtide_storage::{BlobStore, FileBlobStore};
    use std::sync::Arc;

    #[test]
    fn collects_tables_and_queue() {
        let dir = tempfile::tempdir().unwrap();
        {
            let blobs = Arc::new(FileBlobStore::open(dir.path()).unwrap());
            let store =
                LocalStore::open(blobs, StoreConfig::new().with_tables(["tasks", "notes"])).unwrap();
            store.insert("tasks", Row::new("a")).unwrap();
            store.insert("tasks", Row::new("b")).unwrap();
            store.insert("notes", Row::new("n")).unwrap();
        }

        let result = collect(dir.path()).unwrap();

        let rows: Vec<_> = result
            .tables
            .iter()
            .map(|t| (t.name.as_str(), t.rows))
            .collect();
        assert!(rows.contains(&("tasks", 2)));
        assert!(rows.contains(&("notes", 1)));
        assert_eq!(result.queue.pending, 3);
        assert!(result.last_push.is_none());
        assert!(result.device_id.is_some());
    }

    #[test]
    fn inspecting_does_not_write() {
        let dir = tempfile::tempdir().unwrap();
        {
            let blobs = Arc::new(FileBlobStore::open(dir.path()).unwrap());
            let store = LocalStore::open(blobs, StoreConfig::new().with_tables(["tasks"])).unwrap();
            store.insert("tasks", Row::new("a")).unwrap();
            store.queue().claim_pending().unwrap();
        }
        let blobs = FileBlobStore::open(dir.path()).unwrap();
        let before = blobs.read(QUEUE_BLOB).unwrap();

        let result = collect(dir.path()).unwrap();

        // An interrupted push is reported as is, not recovered.
        assert_eq!(result.queue.syncing, 1);
        assert_eq!(result.queue.pending, 0);
        assert_eq!(blobs.read(QUEUE_BLOB).unwrap(), before);
    }

    #[test]
    fn directory_without_metadata_stays_without() {
        let dir = tempfile::tempdir().unwrap();
        let blobs = FileBlobStore::open(dir.path()).unwrap();
        blobs
            .write(
                &table_blob_name("tasks"),
                &ebbtide_core::encode(&vec![Row::new("a")]).unwrap(),
            )
            .unwrap();

        let result = collect(dir.path()).unwrap();

        assert!(result.device_id.is_none());
        assert_eq!(result.last_pull, Timestamp::EPOCH);
        assert_eq!(result.tables[0].rows, 1);
        assert!(!blobs.exists(META_BLOB).unwrap());
    }

    #[test]
    fn corrupt_blob_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let blobs = FileBlobStore::open(dir.path()).unwrap();
        blobs.write(&table_blob_name("tasks"), b"not cbor").unwrap();

        let err = collect(dir.path()).unwrap_err();

        assert!(err.to_string().contains("table.tasks"));
        assert!(!blobs.exists(META_BLOB).unwrap());
    }

    #[test]
    fn missing_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        assert!(collect(&dir.path().join("nope")).is_err());
    }
}
