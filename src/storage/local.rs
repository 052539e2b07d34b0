//! Directory-backed storage
//!
//! Objects are plain files under `<root>/<prefix>/`. Writes go to a temp file
//! in the same directory and are renamed into place, so a failed upload never
//! leaves a truncated snapshot under its real key.

use std::fs::{self, File};
use std::io::{self, BufWriter, ErrorKind, Read, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use super::{ObjectInfo, StorageClient};
use crate::error::{SnapshotError, SnapshotResult};

/// Storage client over a local directory
#[derive(Debug, Clone)]
pub struct LocalStorage {
    dir: PathBuf,
}

impl LocalStorage {
    /// Storage rooted at `root`, with objects under the relative `prefix`
    pub fn new(root: PathBuf, prefix: &str) -> Self {
        let prefix = prefix.trim_matches('/');
        let dir = if prefix.is_empty() {
            root
        } else {
            root.join(prefix)
        };
        Self { dir }
    }

    /// Directory holding the objects
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn object_path(&self, key: &str) -> SnapshotResult<PathBuf> {
        if key.is_empty() || key.contains(&['/', '\\'][..]) || key == "." || key == ".." {
            return Err(SnapshotError::Storage(format!("Invalid object key {:?}", key)));
        }
        Ok(self.dir.join(key))
    }
}

impl StorageClient for LocalStorage {
    fn put(&self, key: &str, data: &mut dyn Read) -> SnapshotResult<u64> {
        let path = self.object_path(key)?;
        fs::create_dir_all(&self.dir).map_err(|e| {
            SnapshotError::Storage(format!(
                "Failed to create storage directory {}: {}",
                self.dir.display(),
                e
            ))
        })?;

        let temp_path = self.dir.join(format!(".{}.part", key));
        let result = (|| -> io::Result<u64> {
            let mut writer = BufWriter::new(File::create(&temp_path)?);
            let written = io::copy(data, &mut writer)?;
            writer.flush()?;
            writer.get_ref().sync_all()?;
            fs::rename(&temp_path, &path)?;
            Ok(written)
        })();

        result.map_err(|e| {
            let _ = fs::remove_file(&temp_path);
            SnapshotError::Storage(format!("Failed to write {}: {}", path.display(), e))
        })
    }

    fn get(&self, key: &str) -> SnapshotResult<Box<dyn Read + '_>> {
        let path = self.object_path(key)?;
        match File::open(&path) {
            Ok(file) => Ok(Box::new(file)),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(SnapshotError::not_found(key)),
            Err(e) => Err(SnapshotError::Storage(format!(
                "Failed to open {}: {}",
                path.display(),
                e
            ))),
        }
    }

    fn exists(&self, key: &str) -> SnapshotResult<bool> {
        Ok(self.object_path(key)?.is_file())
    }

    fn list(&self) -> SnapshotResult<Vec<ObjectInfo>> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }

        let mut objects = Vec::new();
        for entry in fs::read_dir(&self.dir).map_err(|e| {
            SnapshotError::Storage(format!("Failed to read storage directory: {}", e))
        })? {
            let entry = entry.map_err(|e| {
                SnapshotError::Storage(format!("Failed to read directory entry: {}", e))
            })?;
            let name = entry.file_name().to_string_lossy().to_string();
            if name.starts_with('.') {
                continue;
            }
            let metadata = entry.metadata().map_err(|e| {
                SnapshotError::Storage(format!("Failed to stat {}: {}", name, e))
            })?;
            if !metadata.is_file() {
                continue;
            }
            objects.push(ObjectInfo {
                name,
                size: metadata.len(),
                last_modified: metadata.modified().ok().map(DateTime::<Utc>::from),
            });
        }

        objects.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(objects)
    }
}
