//! Rows command implementation.

use super::read_snapshot;
use std::path::Path;

/// Runs the rows command, printing one JSON object per line.
pub fn run(path: &Path, table: &str, limit: Option<usize>) -> Result<(), Box<dyn std::error::Error>> {
    let snapshot = read_snapshot(path)?;
    let rows = snapshot.rows(table)?;
    let shown = limit.unwrap_or(rows.len());

    for row in rows.iter().take(shown) {
        println!("{}", serde_json::to_string(&row.to_value())?);
    }
    if shown < rows.len() {
        eprintln!("... {} more rows", rows.len() - shown);
    }
    Ok(())
}
