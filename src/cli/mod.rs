//! CLI command handlers
//!
//! This module contains the implementation of CLI commands,
//! bridging the clap argument parsing with the snapshot pipeline.

pub mod setup;
pub mod snapshot;

pub use setup::{handle_config_command, handle_init_command};
pub use snapshot::{handle_snapshot_command, SnapshotCommands};
