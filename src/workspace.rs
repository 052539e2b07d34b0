//! Temp workspace for staging snapshots
//!
//! The workspace directory is shared by every run and created lazily.
//! Files inside it belong to exactly one run: each [`TempWorkspace`] carries
//! a run id that prefixes the names it hands out, and every file is wrapped
//! in a [`ScopedFile`] that removes it when the run is over, whether it
//! succeeded or not.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use uuid::Uuid;

use crate::error::{SnapshotError, SnapshotResult};

/// Create a directory and its parents if they do not exist
pub fn ensure_dir(path: &Path) -> SnapshotResult<()> {
    fs::create_dir_all(path).map_err(|e| {
        SnapshotError::Io(format!(
            "Failed to create workspace directory {}: {}",
            path.display(),
            e
        ))
    })
}

/// Scratch directory plus the identity of the run using it
#[derive(Debug, Clone)]
pub struct TempWorkspace {
    dir: PathBuf,
    run_id: String,
}

impl TempWorkspace {
    /// Workspace rooted at `dir` with a fresh run id
    pub fn new(dir: PathBuf) -> Self {
        Self {
            dir,
            run_id: Uuid::new_v4().simple().to_string(),
        }
    }

    /// The shared workspace directory
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Identifier prefixed to every file this run creates
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Create the workspace directory if needed
    pub fn ensure(&self) -> SnapshotResult<()> {
        ensure_dir(&self.dir)
    }

    /// Reserve a path for `name`, removed when the returned handle is dropped
    ///
    /// Nothing is written to disk; the caller's collaborators create the file.
    pub fn scoped_file(&self, name: &str) -> ScopedFile {
        let path = self.dir.join(format!("{}-{}", self.run_id, name));
        ScopedFile::new(path)
    }

    /// Files in the workspace that belong to this run
    pub fn run_files(&self) -> SnapshotResult<Vec<PathBuf>> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }

        let prefix = format!("{}-", self.run_id);
        let mut files = Vec::new();
        for entry in fs::read_dir(&self.dir)
            .map_err(|e| SnapshotError::Io(format!("Failed to read workspace: {}", e)))?
        {
            let entry =
                entry.map_err(|e| SnapshotError::Io(format!("Failed to read workspace: {}", e)))?;
            if entry.file_name().to_string_lossy().starts_with(&prefix) {
                files.push(entry.path());
            }
        }
        Ok(files)
    }
}

/// A temp file path whose file is removed when the handle goes away
///
/// The tracked path can move (compression renames the file); removal always
/// targets the latest path.
#[derive(Debug)]
pub struct ScopedFile {
    path: PathBuf,
    released: bool,
}

impl ScopedFile {
    fn new(path: PathBuf) -> Self {
        Self {
            path,
            released: false,
        }
    }

    /// Current path of the file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Track a new path after the file was renamed by a collaborator
    pub fn relocate(&mut self, path: PathBuf) {
        self.path = path;
    }

    /// Remove the file now and report failure
    pub fn release(mut self) -> SnapshotResult<()> {
        self.released = true;
        remove_if_present(&self.path).map_err(|e| {
            SnapshotError::Io(format!(
                "Failed to remove temp file {}: {}",
                self.path.display(),
                e
            ))
        })?;
        Ok(())
    }
}

impl Drop for ScopedFile {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        match remove_if_present(&self.path) {
            Ok(true) => tracing::debug!(path = %self.path.display(), "removed temp file"),
            Ok(false) => {}
            Err(e) => tracing::warn!(
                path = %self.path.display(),
                error = %e,
                "failed to remove temp file"
            ),
        }
    }
}

fn remove_if_present(path: &Path) -> std::io::Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}
