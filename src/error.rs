//! Custom error types for db-snapshot
//!
//! This module defines the error hierarchy for the snapshot pipeline using
//! thiserror. Every collaborator failure is converted into one of these
//! variants before it reaches the command layer.

use thiserror::Error;

/// The main error type for snapshot operations
#[derive(Error, Debug)]
pub enum SnapshotError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// File I/O errors (temp workspace, settings file)
    #[error("I/O error: {0}")]
    Io(String),

    /// Filename template could not be rendered
    #[error("Template error: {0}")]
    Template(String),

    /// The database dump step failed
    #[error("Dump failed: {0}")]
    Dump(String),

    /// Loading a dump into the database failed
    #[error("Restore failed: {0}")]
    Restore(String),

    /// Compressing or decompressing a snapshot failed
    #[error("Compression error: {0}")]
    Compression(String),

    /// An external program the pipeline shells out to is not installed
    #[error("{purpose} program not found: {program}")]
    ToolMissing {
        purpose: &'static str,
        program: String,
    },

    /// Object storage errors
    #[error("Storage error: {0}")]
    Storage(String),

    /// The requested snapshot is not in storage
    #[error("Snapshot {key} does not exist")]
    NotFound { key: String },
}

impl SnapshotError {
    /// Create a "not found" error for a storage key
    pub fn not_found(key: impl Into<String>) -> Self {
        Self::NotFound { key: key.into() }
    }

    /// Create a "tool missing" error
    pub fn tool_missing(purpose: &'static str, program: impl Into<String>) -> Self {
        Self::ToolMissing {
            purpose,
            program: program.into(),
        }
    }

    /// Check if this is a "not found" error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Short label used as a structured log field
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Config(_) => "config",
            Self::Io(_) => "io",
            Self::Template(_) => "template",
            Self::Dump(_) => "dump",
            Self::Restore(_) => "restore",
            Self::Compression(_) => "compression",
            Self::ToolMissing { .. } => "tool_missing",
            Self::Storage(_) => "storage",
            Self::NotFound { .. } => "not_found",
        }
    }
}

impl From<std::io::Error> for SnapshotError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<serde_json::Error> for SnapshotError {
    fn from(err: serde_json::Error) -> Self {
        Self::Config(err.to_string())
    }
}

/// Result type alias for snapshot operations
pub type SnapshotResult<T> = Result<T, SnapshotError>;
