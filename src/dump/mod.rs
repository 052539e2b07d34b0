//! Database dump and restore
//!
//! The pipeline never looks inside a dump; it only hands the engine a path
//! to write to or read from.

mod command;

use std::path::Path;

pub use command::CommandDumpEngine;

use crate::config::settings::Settings;
use crate::error::SnapshotResult;

/// Capability to dump the live database to a file and load it back
pub trait DumpEngine {
    /// Write a full dump of the database to `dest`
    fn dump(&self, dest: &Path) -> SnapshotResult<()>;

    /// Load the dump at `src` into the database
    fn restore(&self, src: &Path) -> SnapshotResult<()>;
}

/// Build the dump engine from settings
pub fn from_settings(settings: &Settings) -> Box<dyn DumpEngine> {
    Box::new(CommandDumpEngine::new(
        settings.database.dump_command.clone(),
        settings.database.restore_command.clone(),
    ))
}
