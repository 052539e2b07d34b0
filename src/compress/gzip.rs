//! External `gzip` process

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::Command;

use super::{decompressed_path, Compressor};
use crate::error::{SnapshotError, SnapshotResult};
use crate::naming::with_gz_suffix;

/// Compressor that shells out to `gzip`
#[derive(Debug, Clone)]
pub struct GzipCommand {
    program: String,
}

impl GzipCommand {
    /// Use the given program (a name looked up on `PATH`, or a path)
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn run(&self, args: &[&str], path: &Path, output: &Path) -> SnapshotResult<()> {
        tracing::debug!(program = %self.program, ?args, path = %path.display(), "running gzip");

        let result = Command::new(&self.program).args(args).arg(path).output();
        let out = match result {
            Ok(out) => out,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(SnapshotError::tool_missing("Compression", &self.program));
            }
            Err(e) => {
                return Err(SnapshotError::Compression(format!(
                    "Failed to run {}: {}",
                    self.program, e
                )));
            }
        };

        if !out.status.success() {
            let _ = fs::remove_file(output);
            let stderr = String::from_utf8_lossy(&out.stderr);
            return Err(SnapshotError::Compression(format!(
                "{} exited with {}: {}",
                self.program,
                out.status,
                stderr.trim()
            )));
        }

        if !output.exists() {
            return Err(SnapshotError::Compression(format!(
                "{} did not produce {}",
                self.program,
                output.display()
            )));
        }
        Ok(())
    }
}

impl Default for GzipCommand {
    fn default() -> Self {
        Self::new("gzip")
    }
}

impl Compressor for GzipCommand {
    fn compress(&self, path: &Path) -> SnapshotResult<PathBuf> {
        let output = with_gz_suffix(path);
        self.run(&["-f"], path, &output)?;
        Ok(output)
    }

    fn decompress(&self, path: &Path) -> SnapshotResult<PathBuf> {
        let output = decompressed_path(path)?;
        self.run(&["-d", "-f"], path, &output)?;
        Ok(output)
    }
}
