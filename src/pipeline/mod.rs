//! Snapshot transfer pipeline
//!
//! Orchestrates the collaborators into two linear operations:
//!
//! - `create`: dump → (compress) → upload → clean
//! - `load`: fetch → (decompress) → restore → clean
//!
//! Every temp file a run stages lives in a [`ScopedFile`], so whatever step
//! fails, the file is gone before the error reaches the caller.
//!
//! Runs are sequential and there is no locking across processes: two
//! invocations creating or loading the same snapshot name at the same time
//! race on the storage key. Their temp files never collide because each run
//! prefixes them with its own run id.
//!
//! Collaborator calls block for as long as the collaborator does; timeouts
//! are whatever the storage client and the dump programs use.
//!
//! [`ScopedFile`]: crate::workspace::ScopedFile

mod create;
mod load;

#[cfg(test)]
mod tests;

use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::{DateTime, Utc};

pub use create::{CreateReport, CreateStage};
pub use load::{LoadReport, LoadStage};

use crate::compress::{self, Compressor};
use crate::config::paths::SnapshotPaths;
use crate::config::settings::Settings;
use crate::dump::{self, DumpEngine};
use crate::error::SnapshotResult;
use crate::naming::{check_file_name, render, TemplateVars};
use crate::storage::{self, ObjectInfo, StorageClient};
use crate::workspace::TempWorkspace;

/// Create/load/list over injected collaborators
pub struct SnapshotPipeline {
    template: String,
    template_vars: BTreeMap<String, String>,
    compress: bool,
    workspace: TempWorkspace,
    storage: Box<dyn StorageClient>,
    engine: Box<dyn DumpEngine>,
    compressor: Box<dyn Compressor>,
}

impl SnapshotPipeline {
    /// Assemble a pipeline from settings and explicit collaborators
    pub fn new(
        settings: &Settings,
        workspace_dir: PathBuf,
        storage: Box<dyn StorageClient>,
        engine: Box<dyn DumpEngine>,
        compressor: Box<dyn Compressor>,
    ) -> Self {
        Self {
            template: settings.filename.clone(),
            template_vars: settings.template_vars.clone(),
            compress: settings.compress,
            workspace: TempWorkspace::new(workspace_dir),
            storage,
            engine,
            compressor,
        }
    }

    /// Assemble a pipeline with the collaborators selected in settings
    pub fn from_settings(settings: &Settings, paths: &SnapshotPaths) -> SnapshotResult<Self> {
        Ok(Self::new(
            settings,
            paths.workspace_dir(),
            storage::from_settings(settings)?,
            dump::from_settings(settings),
            compress::from_settings(settings),
        ))
    }

    /// The temp workspace this run stages files in
    pub fn workspace(&self) -> &TempWorkspace {
        &self.workspace
    }

    /// Snapshots in storage, sorted by name
    pub fn list(&self) -> SnapshotResult<Vec<ObjectInfo>> {
        match self.storage.list() {
            Ok(objects) => {
                tracing::info!(count = objects.len(), "listed snapshots");
                Ok(objects)
            }
            Err(e) => {
                tracing::error!(kind = e.kind(), error = %e, "snapshot list failed");
                Err(e)
            }
        }
    }

    /// Base name for a run: the explicit override, or the rendered template
    fn resolve_name(&self, filename: Option<&str>, now: DateTime<Utc>) -> SnapshotResult<String> {
        match filename {
            Some(name) => {
                check_file_name(name)?;
                Ok(name.to_string())
            }
            None => {
                let vars = TemplateVars::new(now).with_extra(self.template_vars.clone());
                render(&self.template, &vars)
            }
        }
    }
}
