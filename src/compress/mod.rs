//! Snapshot compression
//!
//! Both implementations follow the same naming contract: `compress(path)`
//! yields `path + ".gz"` and removes the original, `decompress(path)`
//! yields `path` with the trailing `.gz` stripped and removes the
//! compressed file. On failure neither leaves a partial output behind.
//!
//! - [`GzipCommand`]: runs an external `gzip` binary
//! - [`NativeGzip`]: compresses in-process

mod gzip;
mod native;

use std::path::{Path, PathBuf};

pub use gzip::GzipCommand;
pub use native::NativeGzip;

use crate::config::settings::{CompressorKind, Settings};
use crate::error::{SnapshotError, SnapshotResult};
use crate::naming::strip_gz_suffix;

/// Compress and decompress snapshot files in place
pub trait Compressor {
    /// Compress `path` into `path.gz`
    fn compress(&self, path: &Path) -> SnapshotResult<PathBuf>;

    /// Decompress `path` (ending in `.gz`) into the stripped path
    fn decompress(&self, path: &Path) -> SnapshotResult<PathBuf>;
}

/// Build the compressor selected in settings
pub fn from_settings(settings: &Settings) -> Box<dyn Compressor> {
    match settings.compressor {
        CompressorKind::Gzip => Box::new(GzipCommand::new(&settings.gzip_binary)),
        CompressorKind::Native => Box::new(NativeGzip::default()),
    }
}

/// Output path for decompressing `path`
fn decompressed_path(path: &Path) -> SnapshotResult<PathBuf> {
    strip_gz_suffix(path).ok_or_else(|| {
        SnapshotError::Compression(format!(
            "{} does not have a .gz suffix",
            path.display()
        ))
    })
}
