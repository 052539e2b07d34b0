//! `create`: dump the database and upload it

use std::fs::File;

use chrono::{DateTime, Utc};

use super::SnapshotPipeline;
use crate::error::{SnapshotError, SnapshotResult};
use crate::naming::SnapshotArtifact;

/// Last state a `create` run reached
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateStage {
    Start,
    Dumped,
    Compressed,
    Uploaded,
    Cleaned,
}

/// Outcome of a successful `create`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateReport {
    /// What was uploaded
    pub artifact: SnapshotArtifact,
    /// Bytes uploaded
    pub bytes: u64,
}

impl SnapshotPipeline {
    /// Dump the database, optionally compress it, and upload it
    ///
    /// `filename` overrides the configured template. The staged file is
    /// removed on every path out of this function.
    pub fn create(
        &self,
        filename: Option<&str>,
        now: DateTime<Utc>,
    ) -> SnapshotResult<CreateReport> {
        let mut stage = CreateStage::Start;
        let result = self.run_create(filename, now, &mut stage);

        match &result {
            Ok(report) => tracing::info!(
                key = %report.artifact,
                bytes = report.bytes,
                run = self.workspace.run_id(),
                "snapshot created"
            ),
            Err(e) => tracing::error!(
                stage = ?stage,
                kind = e.kind(),
                error = %e,
                run = self.workspace.run_id(),
                "snapshot create failed"
            ),
        }
        result
    }

    fn run_create(
        &self,
        filename: Option<&str>,
        now: DateTime<Utc>,
        stage: &mut CreateStage,
    ) -> SnapshotResult<CreateReport> {
        let mut artifact = SnapshotArtifact::new(self.resolve_name(filename, now)?);
        self.workspace.ensure()?;
        let mut staged = self.workspace.scoped_file(artifact.base_name());

        self.engine.dump(staged.path())?;
        *stage = CreateStage::Dumped;
        tracing::debug!(path = %staged.path().display(), "database dumped");

        if self.compress {
            let compressed = self.compressor.compress(staged.path())?;
            staged.relocate(compressed);
            artifact = artifact.compressed();
            *stage = CreateStage::Compressed;
            tracing::debug!(path = %staged.path().display(), "dump compressed");
        }

        let key = artifact.storage_key();
        let mut file = File::open(staged.path()).map_err(|e| {
            SnapshotError::Io(format!(
                "Failed to open {} for upload: {}",
                staged.path().display(),
                e
            ))
        })?;
        let bytes = self.storage.put(&key, &mut file)?;
        drop(file);
        *stage = CreateStage::Uploaded;
        tracing::debug!(%key, bytes, "snapshot uploaded");

        staged.release()?;
        *stage = CreateStage::Cleaned;

        Ok(CreateReport { artifact, bytes })
    }
}
