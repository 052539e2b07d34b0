//! Settings for db-snapshot
//!
//! The settings bundle is loaded once per invocation and treated as
//! read-only afterwards. String values beginning with `$` are references to
//! environment variables and are resolved during [`Settings::load`], so
//! credentials can be kept out of the settings file.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::paths::SnapshotPaths;
use crate::error::SnapshotError;

/// Which compressor implementation to use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CompressorKind {
    /// Shell out to a `gzip` binary (default)
    #[default]
    Gzip,
    /// Compress in-process
    Native,
}

/// Which storage backend holds the snapshots
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// S3 or an S3-compatible service (default)
    #[default]
    S3,
    /// A local directory
    Local,
}

/// Object storage settings
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct StorageSettings {
    /// Backend kind
    pub backend: StorageBackend,
    /// Custom endpoint URL (S3-compatible providers, VPC endpoints)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    /// AWS region; leave unset for non-AWS providers
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    /// Bucket name
    pub bucket: String,
    /// Key prefix inside the bucket
    pub path: String,
    /// Access key id
    pub access_key: String,
    /// Secret access key
    pub secret_key: String,
    /// Root directory for the local backend
    #[serde(skip_serializing_if = "Option::is_none")]
    pub local_root: Option<PathBuf>,
}

/// Database dump/restore commands
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    /// argv for producing a dump
    pub dump_command: Vec<String>,
    /// argv for loading a dump
    pub restore_command: Vec<String>,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            dump_command: vec!["mysqldump".into(), "--result-file={file}".into()],
            restore_command: vec!["mysql".into()],
        }
    }
}

/// Settings for db-snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Schema version for migration support
    pub schema_version: u32,

    /// Snapshot filename template
    pub filename: String,

    /// Whether snapshots are gzip-compressed
    pub compress: bool,

    /// Compressor implementation
    pub compressor: CompressorKind,

    /// Program used by the external compressor
    pub gzip_binary: String,

    /// Extra variables available to the filename template
    pub template_vars: BTreeMap<String, String>,

    /// Object storage settings
    pub storage: StorageSettings,

    /// Database dump/restore commands
    pub database: DatabaseSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            schema_version: 1,
            filename: "snapshot-{datetime}.sql".to_string(),
            compress: true,
            compressor: CompressorKind::default(),
            gzip_binary: "gzip".to_string(),
            template_vars: BTreeMap::new(),
            storage: StorageSettings::default(),
            database: DatabaseSettings::default(),
        }
    }
}

impl Settings {
    /// Load settings from the configured settings file
    ///
    /// Environment references are resolved and the result is validated.
    pub fn load(paths: &SnapshotPaths) -> Result<Self, SnapshotError> {
        Self::load_from(&paths.settings_file())
    }

    /// Load settings from an explicit file
    pub fn load_from(path: &Path) -> Result<Self, SnapshotError> {
        if !path.exists() {
            return Err(SnapshotError::Config(format!(
                "Settings file not found: {} (run `db-snapshot init`)",
                path.display()
            )));
        }

        let contents = fs::read_to_string(path)
            .map_err(|e| SnapshotError::Io(format!("Failed to read settings file: {}", e)))?;

        let mut settings: Settings = serde_json::from_str(&contents).map_err(|e| {
            SnapshotError::Config(format!("Failed to parse settings file: {}", e))
        })?;

        settings.resolve_env_refs()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Save settings to disk atomically
    pub fn save(&self, paths: &SnapshotPaths) -> Result<(), SnapshotError> {
        paths.ensure_directories()?;

        let settings_path = paths.settings_file();
        if let Some(parent) = settings_path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                SnapshotError::Io(format!("Failed to create settings directory: {}", e))
            })?;
        }

        let temp_path = settings_path.with_extension("json.tmp");
        let file = File::create(&temp_path)
            .map_err(|e| SnapshotError::Io(format!("Failed to create temp file: {}", e)))?;

        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, self)
            .map_err(|e| SnapshotError::Config(format!("Failed to serialize settings: {}", e)))?;
        writer
            .flush()
            .map_err(|e| SnapshotError::Io(format!("Failed to write settings file: {}", e)))?;

        fs::rename(&temp_path, &settings_path).map_err(|e| {
            let _ = fs::remove_file(&temp_path);
            SnapshotError::Io(format!("Failed to write settings file: {}", e))
        })?;

        Ok(())
    }

    /// Reject settings the pipeline cannot run with
    pub fn validate(&self) -> Result<(), SnapshotError> {
        if self.filename.trim().is_empty() {
            return Err(SnapshotError::Config("filename template is empty".into()));
        }
        if self.database.dump_command.is_empty() {
            return Err(SnapshotError::Config("database.dump_command is empty".into()));
        }
        if self.database.restore_command.is_empty() {
            return Err(SnapshotError::Config(
                "database.restore_command is empty".into(),
            ));
        }
        match self.storage.backend {
            StorageBackend::S3 if self.storage.bucket.is_empty() => Err(SnapshotError::Config(
                "storage.bucket is required for the s3 backend".into(),
            )),
            StorageBackend::Local if self.storage.local_root.is_none() => Err(
                SnapshotError::Config("storage.local_root is required for the local backend".into()),
            ),
            _ => Ok(()),
        }
    }

    /// Replace `$VAR` values with the contents of the named environment variable
    fn resolve_env_refs(&mut self) -> Result<(), SnapshotError> {
        let storage = &mut self.storage;
        for value in [
            &mut storage.bucket,
            &mut storage.path,
            &mut storage.access_key,
            &mut storage.secret_key,
        ] {
            *value = parse_env(value)?;
        }
        for value in [&mut storage.endpoint, &mut storage.region]
            .into_iter()
            .flatten()
        {
            *value = parse_env(value)?;
        }
        for value in self.template_vars.values_mut() {
            *value = parse_env(value)?;
        }
        Ok(())
    }
}

/// Resolve a single `$VAR` reference; other values pass through unchanged
pub fn parse_env(value: &str) -> Result<String, SnapshotError> {
    match value.strip_prefix('$') {
        Some(name) if !name.is_empty() => std::env::var(name).map_err(|_| {
            SnapshotError::Config(format!("Environment variable {} is not set", name))
        }),
        _ => Ok(value.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn local_settings(root: &Path) -> Settings {
        let mut settings = Settings::default();
        settings.storage.backend = StorageBackend::Local;
        settings.storage.local_root = Some(root.to_path_buf());
        settings
    }

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert!(settings.compress);
        assert_eq!(settings.compressor, CompressorKind::Gzip);
        assert_eq!(settings.storage.backend, StorageBackend::S3);
        assert!(settings.storage.region.is_none());
    }

    #[test]
    fn test_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let paths = SnapshotPaths::with_base_dir(temp_dir.path().to_path_buf());

        let mut settings = local_settings(temp_dir.path());
        settings.compress = false;
        settings.filename = "nightly-{date}.sql".into();
        settings.save(&paths).unwrap();

        assert!(!temp_dir.path().join("config.json.tmp").exists());

        let loaded = Settings::load(&paths).unwrap();
        assert!(!loaded.compress);
        assert_eq!(loaded.filename, "nightly-{date}.sql");
    }

    #[test]
    fn test_missing_file_is_config_error() {
        let temp_dir = TempDir::new().unwrap();
        let paths = SnapshotPaths::with_base_dir(temp_dir.path().to_path_buf());

        let err = Settings::load(&paths).unwrap_err();
        assert!(matches!(err, SnapshotError::Config(_)));
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.json");
        fs::write(
            &path,
            r#"{"storage": {"bucket": "backups", "region": "eu-west-1"}}"#,
        )
        .unwrap();

        let loaded = Settings::load_from(&path).unwrap();
        assert_eq!(loaded.storage.bucket, "backups");
        assert_eq!(loaded.storage.region.as_deref(), Some("eu-west-1"));
        assert!(loaded.compress);
    }

    #[test]
    fn test_env_references_are_resolved() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.json");
        std::env::set_var("DB_SNAPSHOT_TEST_SECRET", "s3cr3t");
        fs::write(
            &path,
            r#"{"storage": {"bucket": "b", "secret_key": "$DB_SNAPSHOT_TEST_SECRET"}}"#,
        )
        .unwrap();

        let loaded = Settings::load_from(&path).unwrap();
        assert_eq!(loaded.storage.secret_key, "s3cr3t");
        std::env::remove_var("DB_SNAPSHOT_TEST_SECRET");
    }

    #[test]
    fn test_unset_env_reference_fails() {
        let err = parse_env("$DB_SNAPSHOT_TEST_DEFINITELY_UNSET").unwrap_err();
        assert!(matches!(err, SnapshotError::Config(_)));
        assert_eq!(parse_env("plain").unwrap(), "plain");
        assert_eq!(parse_env("$").unwrap(), "$");
    }

    #[test]
    fn test_validate() {
        let settings = Settings::default();
        assert!(settings.validate().is_err(), "s3 without bucket");

        let mut settings = Settings::default();
        settings.storage.bucket = "backups".into();
        assert!(settings.validate().is_ok());

        settings.database.restore_command.clear();
        assert!(settings.validate().is_err());

        let mut settings = Settings::default();
        settings.storage.backend = StorageBackend::Local;
        assert!(settings.validate().is_err(), "local without root");
    }
}
