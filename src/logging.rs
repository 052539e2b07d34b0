//! Operator log setup
//!
//! Full error detail goes to the operator log through `tracing`; the user
//! only ever sees a one-line summary on stderr. The log is an append-only
//! file under the base directory. When it cannot be opened, events go to
//! stderr instead.

use std::fs::{self, OpenOptions};
use std::path::Path;
use std::sync::Mutex;

use anyhow::{anyhow, Context, Result};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Environment variable holding the log filter
pub const LOG_ENV: &str = "DB_SNAPSHOT_LOG";

/// Filter used when `DB_SNAPSHOT_LOG` is not set
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Install a subscriber writing to `log_file`
///
/// # Errors
///
/// Returns an error if the file cannot be opened or a global subscriber is
/// already installed.
pub fn init_file_logging(log_file: &Path) -> Result<()> {
    if let Some(parent) = log_file.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create log directory {}", parent.display()))?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_file)
        .with_context(|| format!("failed to open log file {}", log_file.display()))?;

    tracing_subscriber::registry()
        .with(build_env_filter(DEFAULT_LOG_LEVEL))
        .with(
            fmt::layer()
                .with_ansi(false)
                .with_target(false)
                .with_writer(Mutex::new(file)),
        )
        .try_init()
        .map_err(|err| anyhow!("failed to install tracing subscriber: {err}"))
}

/// Install a subscriber writing warnings and errors to stderr
pub fn init_stderr_logging() -> Result<()> {
    tracing_subscriber::registry()
        .with(build_env_filter("warn"))
        .with(
            fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .try_init()
        .map_err(|err| anyhow!("failed to install tracing subscriber: {err}"))
}

fn build_env_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(level))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_file_logging_writes_events() {
        let temp_dir = TempDir::new().unwrap();
        let log_file = temp_dir.path().join("logs").join("snapshot.log");

        init_file_logging(&log_file).unwrap();
        tracing::info!(key = "a.sql.gz", "snapshot created");

        let contents = fs::read_to_string(&log_file).unwrap();
        assert!(contents.contains("snapshot created"));
        assert!(contents.contains("a.sql.gz"));

        // only one global subscriber per process
        assert!(init_stderr_logging().is_err());
    }
}
