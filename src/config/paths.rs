//! Path management for db-snapshot
//!
//! Resolves the host storage path and everything that lives under it.
//!
//! ## Path Resolution Order
//!
//! 1. `DB_SNAPSHOT_HOME` environment variable (if set)
//! 2. The platform data directory for `db-snapshot`
//!    (`~/.local/share/db-snapshot` on Linux)

use std::path::PathBuf;

use directories::ProjectDirs;

use crate::error::SnapshotError;

/// Environment variable that overrides the base directory
pub const HOME_ENV: &str = "DB_SNAPSHOT_HOME";

/// Manages all paths used by db-snapshot
#[derive(Debug, Clone)]
pub struct SnapshotPaths {
    /// Base directory for all db-snapshot state
    base_dir: PathBuf,
    /// Explicit settings file, if one was given on the command line
    settings_override: Option<PathBuf>,
}

impl SnapshotPaths {
    /// Create a new SnapshotPaths instance
    ///
    /// # Errors
    ///
    /// Returns an error if no home directory can be determined for the
    /// current user.
    pub fn new() -> Result<Self, SnapshotError> {
        let base_dir = if let Ok(custom) = std::env::var(HOME_ENV) {
            PathBuf::from(custom)
        } else {
            resolve_default_path()?
        };

        Ok(Self {
            base_dir,
            settings_override: None,
        })
    }

    /// Create SnapshotPaths with a custom base directory (useful for testing)
    pub fn with_base_dir(base_dir: PathBuf) -> Self {
        Self {
            base_dir,
            settings_override: None,
        }
    }

    /// Use an explicit settings file instead of `<base>/config.json`
    pub fn with_settings_file(mut self, path: PathBuf) -> Self {
        self.settings_override = Some(path);
        self
    }

    /// Get the base directory
    pub fn base_dir(&self) -> &PathBuf {
        &self.base_dir
    }

    /// Get the path to the settings file
    pub fn settings_file(&self) -> PathBuf {
        self.settings_override
            .clone()
            .unwrap_or_else(|| self.base_dir.join("config.json"))
    }

    /// Get the scratch directory used to stage snapshots
    pub fn workspace_dir(&self) -> PathBuf {
        self.base_dir.join("db_snapshots")
    }

    /// Get the path to the operator log
    pub fn log_file(&self) -> PathBuf {
        self.base_dir.join("snapshot.log")
    }

    /// Ensure the base directory exists
    ///
    /// The workspace directory is not created here; it is created lazily by
    /// the first run that needs it.
    pub fn ensure_directories(&self) -> Result<(), SnapshotError> {
        std::fs::create_dir_all(&self.base_dir)
            .map_err(|e| SnapshotError::Io(format!("Failed to create base directory: {}", e)))?;

        Ok(())
    }

    /// Check if db-snapshot has been initialized (settings file exists)
    pub fn is_initialized(&self) -> bool {
        self.settings_file().exists()
    }
}

/// Resolve the default base directory from the platform conventions
fn resolve_default_path() -> Result<PathBuf, SnapshotError> {
    ProjectDirs::from("", "", "db-snapshot")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .ok_or_else(|| SnapshotError::Config("Could not determine home directory".into()))
}
