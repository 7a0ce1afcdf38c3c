//! Retry command implementation.

use super::open_store;
use std::path::Path;

/// Runs the retry command.
pub fn run(path: &Path, max_retries: u32) -> Result<(), Box<dyn std::error::Error>> {
    let revived = requeue(path, max_retries)?;
    println!("Requeued {} failed entries", revived);
    Ok(())
}

fn requeue(path: &Path, max_retries: u32) -> Result<usize, Box<dyn std::error::Error>> {
    let store = open_store(path, max_retries)?;
    Ok(store.queue().retry_failed()?)
}
