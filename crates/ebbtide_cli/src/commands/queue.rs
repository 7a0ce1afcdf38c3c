//! Queue command implementation.

use super::read_snapshot;
use ebbtide_core::{QueueStatus, SyncQueueItem};
use std::path::Path;

/// Runs the queue command.
pub fn run(
    path: &Path,
    status: Option<&str>,
    format: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let filter = status.map(parse_status).transpose()?;
    let items = entries(path, filter)?;

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&items)?);
        }
        _ => {
            print_text_output(&items);
        }
    }

    Ok(())
}

fn entries(
    path: &Path,
    filter: Option<QueueStatus>,
) -> Result<Vec<SyncQueueItem>, Box<dyn std::error::Error>> {
    let mut items = read_snapshot(path)?.queue().to_vec();
    if let Some(status) = filter {
        items.retain(|item| item.status == status);
    }
    Ok(items)
}

fn parse_status(value: &str) -> Result<QueueStatus, String> {
    match value.to_ascii_lowercase().as_str() {
        "pending" => Ok(QueueStatus::Pending),
        "syncing" => Ok(QueueStatus::Syncing),
        "failed" => Ok(QueueStatus::Failed),
        other => Err(format!(
            "Unknown status '{other}' (expected pending, syncing or failed)"
        )),
    }
}

fn print_text_output(items: &[SyncQueueItem]) {
    if items.is_empty() {
        println!("Outbox is empty");
        return;
    }

    println!(
        "{:<8} {:<8} {:<16} {:<36} {:>7}  {}",
        "STATUS", "TYPE", "TABLE", "RECORD", "RETRIES", "ERROR"
    );
    for item in items {
        println!(
            "{:<8} {:<8} {:<16} {:<36} {:>7}  {}",
            item.status,
            item.mutation_type,
            item.table_name,
            item.record_id,
            item.retry_count,
            item.error_message.as_deref().unwrap_or("-")
        );
    }
    println!();
    println!("{} entries", items.len());
}
