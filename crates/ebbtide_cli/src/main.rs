//! ebbtide CLI
//!
//! Offline tools for ebbtide data directories.
//!
//! # Commands
//!
//! - `inspect` - Display tables, outbox summary and sync metadata
//! - `queue` - Dump outbox entries
//! - `rows` - Dump the rows of one table
//! - `retry` - Requeue failed outbox entries

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// ebbtide offline data tools.
#[derive(Parser)]
#[command(name = "ebbtide")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the data directory
    #[arg(global = true, short, long)]
    path: Option<PathBuf>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Display tables, outbox summary and sync metadata
    Inspect {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Dump outbox entries
    Queue {
        /// Only show entries in this status (pending, syncing, failed)
        #[arg(short, long)]
        status: Option<String>,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Dump the rows of one table as JSON
    Rows {
        /// Table name
        table: String,

        /// Maximum number of rows to print
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Requeue failed outbox entries under the retry cap
    Retry {
        /// Retry cap applied to failed entries
        #[arg(short, long, default_value_t = ebbtide_core::DEFAULT_MAX_RETRIES)]
        max_retries: u32,
    },

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Inspect { format } => {
            let path = cli.path.ok_or("Data directory required for inspect")?;
            commands::inspect::run(&path, &format)?;
        }
        Commands::Queue { status, format } => {
            let path = cli.path.ok_or("Data directory required for queue")?;
            commands::queue::run(&path, status.as_deref(), &format)?;
        }
        Commands::Rows { table, limit } => {
            let path = cli.path.ok_or("Data directory required for rows")?;
            commands::rows::run(&path, &table, limit)?;
        }
        Commands::Retry { max_retries } => {
            let path = cli.path.ok_or("Data directory required for retry")?;
            commands::retry::run(&path, max_retries)?;
        }
        Commands::Version => {
            println!("ebbtide CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("ebbtide Core v{}", ebbtide_core::VERSION);
        }
    }

    Ok(())
}
