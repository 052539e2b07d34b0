//! Snapshot CLI commands
//!
//! Implements `create`, `load` and `list` on top of the pipeline.

use std::io::Write;

use chrono::Utc;
use clap::Subcommand;
use tabled::settings::Style;
use tabled::{Table, Tabled};

use crate::config::paths::SnapshotPaths;
use crate::config::settings::Settings;
use crate::error::SnapshotResult;
use crate::pipeline::SnapshotPipeline;
use crate::storage::ObjectInfo;

/// Snapshot subcommands
#[derive(Subcommand, Debug)]
pub enum SnapshotCommands {
    /// Dump the database and upload a new snapshot
    Create {
        /// Snapshot name (overrides the filename template)
        #[arg(long)]
        filename: Option<String>,
    },

    /// Download a snapshot and restore it into the database
    Load {
        /// Snapshot name (overrides the filename template)
        #[arg(long)]
        filename: Option<String>,
    },

    /// List snapshots in storage
    List {
        /// Show size and modification time
        #[arg(short, long)]
        long: bool,
    },
}

#[derive(Tabled)]
struct SnapshotRow {
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Size")]
    size: String,
    #[tabled(rename = "Modified")]
    modified: String,
}

impl From<&ObjectInfo> for SnapshotRow {
    fn from(info: &ObjectInfo) -> Self {
        Self {
            name: info.name.clone(),
            size: format_size(info.size),
            modified: info
                .last_modified
                .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
                .unwrap_or_else(|| "-".to_string()),
        }
    }
}

/// Handle a snapshot command
pub fn handle_snapshot_command(
    paths: &SnapshotPaths,
    settings: &Settings,
    cmd: SnapshotCommands,
) -> SnapshotResult<()> {
    let pipeline = SnapshotPipeline::from_settings(settings, paths).map_err(|e| {
        tracing::error!(kind = e.kind(), error = %e, "failed to set up pipeline");
        e
    })?;

    match cmd {
        SnapshotCommands::Create { filename } => {
            progress("Creating snapshot ... ");
            let report = pipeline.create(filename.as_deref(), Utc::now())?;
            println!("done");
            println!(
                "Uploaded {} ({})",
                report.artifact,
                format_size(report.bytes)
            );
        }

        SnapshotCommands::Load { filename } => {
            progress("Loading snapshot ... ");
            let report = pipeline.load(filename.as_deref(), Utc::now())?;
            println!("done");
            println!(
                "Restored {} ({})",
                report.artifact,
                format_size(report.bytes)
            );
        }

        SnapshotCommands::List { long } => {
            let snapshots = pipeline.list()?;

            if long {
                if snapshots.is_empty() {
                    println!("No snapshots found.");
                    return Ok(());
                }
                let rows: Vec<SnapshotRow> = snapshots.iter().map(SnapshotRow::from).collect();
                println!("{}", Table::new(rows).with(Style::sharp()));
                println!("Total: {} snapshot(s)", snapshots.len());
            } else {
                for snapshot in &snapshots {
                    println!("{}", snapshot.name);
                }
            }
        }
    }

    Ok(())
}

fn progress(message: &str) {
    print!("{}", message);
    let _ = std::io::stdout().flush();
}

/// Format a file size in human-readable form
pub fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}
