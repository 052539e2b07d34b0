//! `load`: download a snapshot and restore it

use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

use chrono::{DateTime, Utc};

use super::SnapshotPipeline;
use crate::error::{SnapshotError, SnapshotResult};
use crate::naming::SnapshotArtifact;

/// Last state a `load` run reached
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadStage {
    Start,
    Fetched,
    Decompressed,
    Restored,
    Cleaned,
}

/// Outcome of a successful `load`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadReport {
    /// What was restored
    pub artifact: SnapshotArtifact,
    /// Bytes downloaded
    pub bytes: u64,
}

impl SnapshotPipeline {
    /// Download a snapshot, optionally decompress it, and restore it
    ///
    /// `filename` names the snapshot directly; without it the configured
    /// template is rendered. The `.gz` suffix is added when compression is
    /// enabled. A missing snapshot is reported before anything is written
    /// to the temp workspace.
    pub fn load(&self, filename: Option<&str>, now: DateTime<Utc>) -> SnapshotResult<LoadReport> {
        let mut stage = LoadStage::Start;
        let result = self.run_load(filename, now, &mut stage);

        match &result {
            Ok(report) => tracing::info!(
                key = %report.artifact,
                bytes = report.bytes,
                run = self.workspace.run_id(),
                "snapshot loaded"
            ),
            Err(e) => tracing::error!(
                stage = ?stage,
                kind = e.kind(),
                error = %e,
                run = self.workspace.run_id(),
                "snapshot load failed"
            ),
        }
        result
    }

    fn run_load(
        &self,
        filename: Option<&str>,
        now: DateTime<Utc>,
        stage: &mut LoadStage,
    ) -> SnapshotResult<LoadReport> {
        let artifact =
            SnapshotArtifact::new(self.resolve_name(filename, now)?).with_compression(self.compress);
        let key = artifact.storage_key();

        if !self.storage.exists(&key)? {
            return Err(SnapshotError::not_found(key));
        }

        self.workspace.ensure()?;
        let mut staged = self.workspace.scoped_file(&key);

        let bytes = self.download(&key, staged.path())?;
        *stage = LoadStage::Fetched;
        tracing::debug!(%key, bytes, path = %staged.path().display(), "snapshot downloaded");

        if artifact.is_compressed() {
            let plain = self.compressor.decompress(staged.path())?;
            staged.relocate(plain);
            *stage = LoadStage::Decompressed;
            tracing::debug!(path = %staged.path().display(), "snapshot decompressed");
        }

        self.engine.restore(staged.path())?;
        *stage = LoadStage::Restored;

        staged.release()?;
        *stage = LoadStage::Cleaned;

        Ok(LoadReport { artifact, bytes })
    }

    fn download(&self, key: &str, dest: &Path) -> SnapshotResult<u64> {
        let mut reader = self.storage.get(key)?;
        let mut file = File::create(dest).map_err(|e| {
            SnapshotError::Io(format!("Failed to create {}: {}", dest.display(), e))
        })?;

        let bytes = io::copy(&mut reader, &mut file)
            .map_err(|e| SnapshotError::Storage(format!("Failed to download {}: {}", key, e)))?;
        file.flush()
            .and_then(|_| file.sync_all())
            .map_err(|e| SnapshotError::Io(format!("Failed to write {}: {}", dest.display(), e)))?;

        Ok(bytes)
    }
}
