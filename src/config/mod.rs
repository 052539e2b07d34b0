//! Configuration module for db-snapshot
//!
//! This module provides configuration management including:
//! - Host storage path resolution
//! - Settings persistence and environment references

pub mod paths;
pub mod settings;

pub use paths::SnapshotPaths;
pub use settings::Settings;
