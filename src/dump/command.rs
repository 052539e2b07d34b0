//! Dump engine backed by external commands
//!
//! Each command is an argv list. An argument containing `{file}` has it
//! replaced by the snapshot path; if no argument does, `dump` captures the
//! command's stdout into the file and `restore` feeds the file on stdin.
//!
//! ```json
//! "database": {
//!   "dump_command": ["pg_dump", "--format=custom", "--file={file}", "app"],
//!   "restore_command": ["pg_restore", "--clean", "--dbname=app", "{file}"]
//! }
//! ```

use std::fs::File;
use std::io::ErrorKind;
use std::path::Path;
use std::process::{Command, Output, Stdio};

use super::DumpEngine;
use crate::error::{SnapshotError, SnapshotResult};

const FILE_PLACEHOLDER: &str = "{file}";

/// Runs configured dump/restore programs
#[derive(Debug, Clone)]
pub struct CommandDumpEngine {
    dump_command: Vec<String>,
    restore_command: Vec<String>,
}

#[derive(Clone, Copy)]
enum Direction {
    Dump,
    Restore,
}

impl Direction {
    fn purpose(self) -> &'static str {
        match self {
            Self::Dump => "Dump",
            Self::Restore => "Restore",
        }
    }

    fn error(self, message: String) -> SnapshotError {
        match self {
            Self::Dump => SnapshotError::Dump(message),
            Self::Restore => SnapshotError::Restore(message),
        }
    }
}

impl CommandDumpEngine {
    /// Engine with the given dump and restore argv
    pub fn new(dump_command: Vec<String>, restore_command: Vec<String>) -> Self {
        Self {
            dump_command,
            restore_command,
        }
    }

    fn run(&self, argv: &[String], path: &Path, direction: Direction) -> SnapshotResult<()> {
        let (program, args) = argv
            .split_first()
            .ok_or_else(|| direction.error("no command configured".into()))?;

        let path_str = path.to_string_lossy();
        let uses_placeholder = args.iter().any(|a| a.contains(FILE_PLACEHOLDER));
        let args: Vec<String> = args
            .iter()
            .map(|a| a.replace(FILE_PLACEHOLDER, &path_str))
            .collect();

        let mut command = Command::new(program);
        command.args(&args).stderr(Stdio::piped());

        if !uses_placeholder {
            match direction {
                Direction::Dump => {
                    let file = File::create(path).map_err(|e| {
                        direction.error(format!("Failed to create {}: {}", path.display(), e))
                    })?;
                    command.stdout(file).stdin(Stdio::null());
                }
                Direction::Restore => {
                    let file = File::open(path).map_err(|e| {
                        direction.error(format!("Failed to open {}: {}", path.display(), e))
                    })?;
                    command.stdin(file).stdout(Stdio::null());
                }
            }
        } else {
            command.stdin(Stdio::null()).stdout(Stdio::null());
        }

        tracing::debug!(%program, ?args, "running {} command", direction.purpose());
        let output = command.output().map_err(|e| {
            if e.kind() == ErrorKind::NotFound {
                SnapshotError::tool_missing(direction.purpose(), program)
            } else {
                direction.error(format!("Failed to run {}: {}", program, e))
            }
        })?;

        check_status(program, &output, direction)
    }
}

fn check_status(program: &str, output: &Output, direction: Direction) -> SnapshotResult<()> {
    if output.status.success() {
        return Ok(());
    }
    let stderr = String::from_utf8_lossy(&output.stderr);
    let detail = stderr.trim();
    Err(direction.error(if detail.is_empty() {
        format!("{} exited with {}", program, output.status)
    } else {
        format!("{} exited with {}: {}", program, output.status, detail)
    }))
}

impl DumpEngine for CommandDumpEngine {
    fn dump(&self, dest: &Path) -> SnapshotResult<()> {
        self.run(&self.dump_command, dest, Direction::Dump)
    }

    fn restore(&self, src: &Path) -> SnapshotResult<()> {
        self.run(&self.restore_command, src, Direction::Restore)
    }
}
