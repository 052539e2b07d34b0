//! Object storage layer for db-snapshot
//!
//! The pipeline talks to storage only through [`StorageClient`]. Keys passed
//! to a client are relative to the configured path prefix; the client is
//! responsible for applying it.
//!
//! - `s3`: Amazon S3 and S3-compatible services
//! - `local`: a directory on the local filesystem

pub mod local;
pub mod s3;

use std::io::Read;

use chrono::{DateTime, Utc};

pub use local::LocalStorage;
pub use s3::{S3ClientOptions, S3Storage};

use crate::config::settings::{Settings, StorageBackend};
use crate::error::{SnapshotError, SnapshotResult};

/// A stored object as reported by [`StorageClient::list`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectInfo {
    /// Key relative to the path prefix
    pub name: String,
    /// Size in bytes
    pub size: u64,
    /// Last modification time, when the backend reports one
    pub last_modified: Option<DateTime<Utc>>,
}

/// Capability surface the pipeline needs from an object store
pub trait StorageClient {
    /// Store everything read from `data` under `key`, returning the byte count
    fn put(&self, key: &str, data: &mut dyn Read) -> SnapshotResult<u64>;

    /// Open the object stored under `key`
    ///
    /// Fails with [`SnapshotError::NotFound`] when the key is absent.
    fn get(&self, key: &str) -> SnapshotResult<Box<dyn Read + '_>>;

    /// Whether an object is stored under `key`
    fn exists(&self, key: &str) -> SnapshotResult<bool>;

    /// Every object under the path prefix, sorted by name
    fn list(&self) -> SnapshotResult<Vec<ObjectInfo>>;
}

/// Build the storage client selected in settings
pub fn from_settings(settings: &Settings) -> SnapshotResult<Box<dyn StorageClient>> {
    let storage = &settings.storage;
    match storage.backend {
        StorageBackend::S3 => Ok(Box::new(S3Storage::new(storage)?)),
        StorageBackend::Local => {
            let root = storage.local_root.clone().ok_or_else(|| {
                SnapshotError::Config("storage.local_root is required for the local backend".into())
            })?;
            Ok(Box::new(LocalStorage::new(root, &storage.path)))
        }
    }
}

/// Join a path prefix and a key with exactly one `/` between them
pub fn prefixed_key(prefix: &str, key: &str) -> String {
    let prefix = prefix.trim_matches('/');
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{}/{}", prefix, key)
    }
}
