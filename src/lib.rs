//! db-snapshot - Database snapshots on S3-compatible storage
//!
//! This library provides the core of the `db-snapshot` tool: dump a database,
//! optionally gzip the dump, and upload it to a bucket; or download a named
//! snapshot, decompress it and restore it. Local temp files live in a per-run
//! workspace and are removed whether the operation succeeds or fails.
//!
//! # Architecture
//!
//! The crate is organized into the following modules:
//!
//! - `config`: Configuration and path management
//! - `error`: Custom error types
//! - `naming`: Filename templates and storage keys
//! - `workspace`: Temp workspace and scoped temp files
//! - `compress`: gzip compressors (external binary or in-process)
//! - `storage`: Object storage clients (S3 and a local directory)
//! - `dump`: Database dump/restore engines
//! - `pipeline`: The create, load and list operations
//! - `logging`: Operator log setup
//! - `cli`: Command handlers
//!
//! # Example
//!
//! ```rust,ignore
//! use snapshot::config::{paths::SnapshotPaths, settings::Settings};
//! use snapshot::pipeline::SnapshotPipeline;
//!
//! let paths = SnapshotPaths::new()?;
//! let settings = Settings::load(&paths)?;
//! let pipeline = SnapshotPipeline::from_settings(&settings, &paths)?;
//! let report = pipeline.create(None, chrono::Utc::now())?;
//! println!("uploaded {}", report.artifact);
//! ```

pub mod cli;
pub mod compress;
pub mod config;
pub mod dump;
pub mod error;
pub mod logging;
pub mod naming;
pub mod pipeline;
pub mod storage;
pub mod workspace;

pub use error::{SnapshotError, SnapshotResult};
