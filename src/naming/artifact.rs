//! Snapshot artifact naming
//!
//! A snapshot is identified by its base name and whether it is compressed.
//! The storage key and the local temp file carry the `.gz` suffix in
//! lockstep; both are derived from this type so they cannot drift apart.

use std::ffi::OsString;
use std::fmt;
use std::path::{Path, PathBuf};

/// Suffix added to compressed snapshots
pub const GZ_SUFFIX: &str = ".gz";

/// A snapshot identified by `{base_name, compressed}`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotArtifact {
    base_name: String,
    compressed: bool,
}

impl SnapshotArtifact {
    /// Create an artifact for an uncompressed dump
    pub fn new(base_name: impl Into<String>) -> Self {
        Self {
            base_name: base_name.into(),
            compressed: false,
        }
    }

    /// The same artifact with the compressed flag set
    pub fn compressed(self) -> Self {
        Self {
            compressed: true,
            ..self
        }
    }

    /// The same artifact with the given compressed flag
    pub fn with_compression(self, compressed: bool) -> Self {
        Self { compressed, ..self }
    }

    /// Name before any suffix is applied
    pub fn base_name(&self) -> &str {
        &self.base_name
    }

    /// Whether the artifact is gzip-compressed
    pub fn is_compressed(&self) -> bool {
        self.compressed
    }

    /// Key under which the artifact is stored (relative to the storage prefix)
    pub fn storage_key(&self) -> String {
        if self.compressed {
            format!("{}{}", self.base_name, GZ_SUFFIX)
        } else {
            self.base_name.clone()
        }
    }
}

impl fmt::Display for SnapshotArtifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.storage_key())
    }
}

/// Append `.gz` to a path
pub fn with_gz_suffix(path: &Path) -> PathBuf {
    let mut raw: OsString = path.as_os_str().to_owned();
    raw.push(GZ_SUFFIX);
    PathBuf::from(raw)
}

/// Remove a trailing `.gz` from a path
///
/// Returns `None` when the file name does not end in `.gz` or nothing
/// would be left after stripping it.
pub fn strip_gz_suffix(path: &Path) -> Option<PathBuf> {
    let name = path.file_name()?.to_str()?;
    let stem = name.strip_suffix(GZ_SUFFIX)?;
    if stem.is_empty() {
        return None;
    }
    Some(path.with_file_name(stem))
}
