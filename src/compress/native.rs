//! In-process gzip via flate2

use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use flate2::read::MultiGzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;

use super::{decompressed_path, Compressor};
use crate::error::{SnapshotError, SnapshotResult};
use crate::naming::with_gz_suffix;

/// Compressor that needs no external binary
#[derive(Debug, Clone)]
pub struct NativeGzip {
    level: Compression,
}

impl NativeGzip {
    /// Compressor using the given level (0-9)
    pub fn with_level(level: u32) -> Self {
        Self {
            level: Compression::new(level.min(9)),
        }
    }
}

impl Default for NativeGzip {
    fn default() -> Self {
        Self {
            level: Compression::default(),
        }
    }
}

impl Compressor for NativeGzip {
    fn compress(&self, path: &Path) -> SnapshotResult<PathBuf> {
        let output = with_gz_suffix(path);
        let level = self.level;
        transcode(path, &output, |input, out| {
            let mut encoder = GzEncoder::new(out, level);
            io::copy(input, &mut encoder)?;
            encoder.finish()?.flush()
        })?;
        Ok(output)
    }

    fn decompress(&self, path: &Path) -> SnapshotResult<PathBuf> {
        let output = decompressed_path(path)?;
        transcode(path, &output, |input, out| {
            let mut decoder = MultiGzDecoder::new(input);
            io::copy(&mut decoder, out)?;
            out.flush()
        })?;
        Ok(output)
    }
}

/// Stream `input` into `output` through `f`, then drop `input`
///
/// A failed transcode removes the partial output and keeps the input.
fn transcode<F>(input: &Path, output: &Path, f: F) -> SnapshotResult<()>
where
    F: FnOnce(&mut BufReader<File>, &mut BufWriter<File>) -> io::Result<()>,
{
    let source = File::open(input).map_err(|e| {
        SnapshotError::Compression(format!("Failed to open {}: {}", input.display(), e))
    })?;
    let sink = File::create(output).map_err(|e| {
        SnapshotError::Compression(format!("Failed to create {}: {}", output.display(), e))
    })?;

    let mut reader = BufReader::new(source);
    let mut writer = BufWriter::new(sink);
    if let Err(e) = f(&mut reader, &mut writer) {
        drop(writer);
        let _ = fs::remove_file(output);
        return Err(SnapshotError::Compression(format!(
            "Failed to process {}: {}",
            input.display(),
            e
        )));
    }
    drop(writer);

    fs::remove_file(input).map_err(|e| {
        SnapshotError::Compression(format!("Failed to remove {}: {}", input.display(), e))
    })
}
