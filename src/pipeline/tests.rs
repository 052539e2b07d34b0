use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Cursor, Read};
use std::path::{Path, PathBuf};
use std::rc::Rc;

use chrono::{DateTime, TimeZone, Utc};
use tempfile::TempDir;

use super::*;
use crate::compress::NativeGzip;
use crate::error::SnapshotError;
use crate::naming::with_gz_suffix;

const DUMP: &str = "CREATE TABLE entries (id INT);\nINSERT INTO entries VALUES (1);\n";

/// How `MemoryStorage::get` misbehaves
#[derive(Clone, Copy)]
enum GetFailure {
    /// The request itself is rejected
    Refused,
    /// The body breaks off after a few bytes
    Truncated,
}

#[derive(Default)]
struct StorageState {
    objects: BTreeMap<String, Vec<u8>>,
    fail_put: bool,
    fail_get: Option<GetFailure>,
    puts: usize,
    lists: usize,
}

#[derive(Clone, Default)]
struct MemoryStorage(Rc<RefCell<StorageState>>);

impl MemoryStorage {
    fn insert(&self, key: &str, data: Vec<u8>) {
        self.0.borrow_mut().objects.insert(key.to_string(), data);
    }

    fn object(&self, key: &str) -> Option<Vec<u8>> {
        self.0.borrow().objects.get(key).cloned()
    }

    fn keys(&self) -> Vec<String> {
        self.0.borrow().objects.keys().cloned().collect()
    }
}

impl StorageClient for MemoryStorage {
    fn put(&self, key: &str, data: &mut dyn Read) -> SnapshotResult<u64> {
        let mut state = self.0.borrow_mut();
        state.puts += 1;
        if state.fail_put {
            return Err(SnapshotError::Storage("connection reset".into()));
        }
        let mut body = Vec::new();
        data.read_to_end(&mut body)?;
        let len = body.len() as u64;
        state.objects.insert(key.to_string(), body);
        Ok(len)
    }

    fn get(&self, key: &str) -> SnapshotResult<Box<dyn Read + '_>> {
        let body = match self.object(key) {
            Some(body) => body,
            None => return Err(SnapshotError::not_found(key)),
        };
        match self.0.borrow().fail_get {
            None => Ok(Box::new(Cursor::new(body))),
            Some(GetFailure::Refused) => Err(SnapshotError::Storage("403 Forbidden".into())),
            Some(GetFailure::Truncated) => Ok(Box::new(
                Cursor::new(body[..body.len().min(4)].to_vec()).chain(BrokenBody),
            )),
        }
    }

    fn exists(&self, key: &str) -> SnapshotResult<bool> {
        Ok(self.0.borrow().objects.contains_key(key))
    }

    fn list(&self) -> SnapshotResult<Vec<ObjectInfo>> {
        let mut state = self.0.borrow_mut();
        state.lists += 1;
        Ok(state
            .objects
            .iter()
            .map(|(name, body)| ObjectInfo {
                name: name.clone(),
                size: body.len() as u64,
                last_modified: None,
            })
            .collect())
    }
}

/// Body stream that fails on the first read
struct BrokenBody;

impl Read for BrokenBody {
    fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
        Err(io::Error::new(io::ErrorKind::ConnectionReset, "connection reset by peer"))
    }
}

#[derive(Default)]
struct EngineState {
    fail_dump: bool,
    fail_restore: bool,
    restored: Option<String>,
    restored_from: Option<PathBuf>,
}

#[derive(Clone, Default)]
struct FakeEngine(Rc<RefCell<EngineState>>);

impl DumpEngine for FakeEngine {
    fn dump(&self, dest: &Path) -> SnapshotResult<()> {
        if self.0.borrow().fail_dump {
            fs::write(dest, "CREATE TAB").unwrap();
            return Err(SnapshotError::Dump("mysqldump: got error 2013".into()));
        }
        fs::write(dest, DUMP).unwrap();
        Ok(())
    }

    fn restore(&self, src: &Path) -> SnapshotResult<()> {
        let mut state = self.0.borrow_mut();
        state.restored_from = Some(src.to_path_buf());
        if state.fail_restore {
            return Err(SnapshotError::Restore("mysql: syntax error".into()));
        }
        state.restored = Some(fs::read_to_string(src).unwrap());
        Ok(())
    }
}

/// Compressor that fails after leaving the input in place
struct BrokenCompressor {
    calls: Rc<Cell<usize>>,
}

impl Compressor for BrokenCompressor {
    fn compress(&self, _path: &Path) -> SnapshotResult<PathBuf> {
        self.calls.set(self.calls.get() + 1);
        Err(SnapshotError::Compression("gzip: disk full".into()))
    }

    fn decompress(&self, _path: &Path) -> SnapshotResult<PathBuf> {
        self.calls.set(self.calls.get() + 1);
        Err(SnapshotError::Compression("gzip: unexpected end of file".into()))
    }
}

struct Harness {
    _temp: TempDir,
    workspace_dir: PathBuf,
    storage: MemoryStorage,
    engine: FakeEngine,
}

impl Harness {
    fn new() -> Self {
        let temp = TempDir::new().unwrap();
        let workspace_dir = temp.path().join("storage").join("db_snapshots");
        Self {
            _temp: temp,
            workspace_dir,
            storage: MemoryStorage::default(),
            engine: FakeEngine::default(),
        }
    }

    fn pipeline(&self, template: &str, compress: bool) -> SnapshotPipeline {
        self.pipeline_with(template, compress, Box::new(NativeGzip::default()))
    }

    fn pipeline_with(
        &self,
        template: &str,
        compress: bool,
        compressor: Box<dyn Compressor>,
    ) -> SnapshotPipeline {
        let mut settings = Settings::default();
        settings.filename = template.to_string();
        settings.compress = compress;
        SnapshotPipeline::new(
            &settings,
            self.workspace_dir.clone(),
            Box::new(self.storage.clone()),
            Box::new(self.engine.clone()),
            compressor,
        )
    }

    fn workspace_files(&self) -> Vec<PathBuf> {
        if !self.workspace_dir.exists() {
            return Vec::new();
        }
        fs::read_dir(&self.workspace_dir)
            .unwrap()
            .map(|e| e.unwrap().path())
            .collect()
    }
}

fn new_year() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 2, 30, 0).unwrap()
}

fn gunzip(data: &[u8]) -> String {
    let mut out = String::new();
    flate2::read::MultiGzDecoder::new(data)
        .read_to_string(&mut out)
        .unwrap();
    out
}

#[test]
fn test_create_uploads_compressed_key() {
    let h = Harness::new();
    let pipeline = h.pipeline("backup-{date}.sql", true);

    let report = pipeline.create(None, new_year()).unwrap();

    assert_eq!(report.artifact.storage_key(), "backup-2024-01-01.sql.gz");
    assert_eq!(h.storage.keys(), vec!["backup-2024-01-01.sql.gz"]);
    let stored = h.storage.object("backup-2024-01-01.sql.gz").unwrap();
    assert_eq!(report.bytes, stored.len() as u64);
    assert_eq!(gunzip(&stored), DUMP);
    assert!(h.workspace_files().is_empty());
}

#[test]
fn test_create_uncompressed_uses_base_name() {
    let h = Harness::new();
    let pipeline = h.pipeline("backup-{date}.sql", false);

    let report = pipeline.create(None, new_year()).unwrap();

    assert!(!report.artifact.is_compressed());
    assert_eq!(
        h.storage.object("backup-2024-01-01.sql").unwrap(),
        DUMP.as_bytes()
    );
    assert!(h.workspace_files().is_empty());
}

#[test]
fn test_create_filename_override() {
    let h = Harness::new();
    let pipeline = h.pipeline("backup-{date}.sql", true);

    pipeline.create(Some("manual.sql"), new_year()).unwrap();
    assert_eq!(h.storage.keys(), vec!["manual.sql.gz"]);
}

#[test]
fn test_create_dump_failure_cleans_partial_dump() {
    let h = Harness::new();
    h.engine.0.borrow_mut().fail_dump = true;
    let pipeline = h.pipeline("backup-{date}.sql", true);

    let err = pipeline.create(None, new_year()).unwrap_err();

    assert!(matches!(err, SnapshotError::Dump(_)));
    assert_eq!(h.storage.0.borrow().puts, 0);
    assert!(h.workspace_files().is_empty());
}

#[test]
fn test_create_compression_failure_uploads_nothing() {
    let h = Harness::new();
    let calls = Rc::new(Cell::new(0));
    let pipeline = h.pipeline_with(
        "backup-{date}.sql",
        true,
        Box::new(BrokenCompressor {
            calls: calls.clone(),
        }),
    );

    let err = pipeline.create(None, new_year()).unwrap_err();

    assert!(matches!(err, SnapshotError::Compression(_)));
    assert_eq!(calls.get(), 1);
    assert_eq!(h.storage.0.borrow().puts, 0);
    assert!(h.workspace_files().is_empty());
}

#[test]
fn test_create_upload_failure_cleans_compressed_file() {
    let h = Harness::new();
    h.storage.0.borrow_mut().fail_put = true;
    let pipeline = h.pipeline("backup-{date}.sql", true);

    let err = pipeline.create(None, new_year()).unwrap_err();

    assert!(matches!(err, SnapshotError::Storage(_)));
    assert_eq!(h.storage.0.borrow().puts, 1);
    assert!(h.workspace_files().is_empty());
}

#[test]
fn test_create_template_error_touches_nothing() {
    let h = Harness::new();
    let pipeline = h.pipeline("backup-{oops}.sql", true);

    let err = pipeline.create(None, new_year()).unwrap_err();

    assert!(matches!(err, SnapshotError::Template(_)));
    assert!(!h.workspace_dir.exists());
}

#[test]
fn test_create_rejects_path_override() {
    let h = Harness::new();
    let pipeline = h.pipeline("backup.sql", false);

    let err = pipeline.create(Some("../outside.sql"), new_year()).unwrap_err();
    assert!(matches!(err, SnapshotError::Template(_)));
}

#[test]
fn test_load_missing_compressed_snapshot_writes_nothing() {
    let h = Harness::new();
    h.storage.insert("backup.sql", DUMP.as_bytes().to_vec());
    let pipeline = h.pipeline("backup.sql", true);

    let err = pipeline.load(None, new_year()).unwrap_err();

    assert!(err.is_not_found());
    assert_eq!(err.to_string(), "Snapshot backup.sql.gz does not exist");
    assert!(!h.workspace_dir.exists());
    assert!(h.engine.0.borrow().restored_from.is_none());
}

#[test]
fn test_load_override_expects_gz_key() {
    let h = Harness::new();
    let pipeline = h.pipeline("backup-{date}.sql", true);
    pipeline.create(Some("manual.sql"), new_year()).unwrap();

    let report = pipeline.load(Some("manual.sql"), new_year()).unwrap();

    assert_eq!(report.artifact.storage_key(), "manual.sql.gz");
    assert_eq!(h.engine.0.borrow().restored.as_deref(), Some(DUMP));
    assert!(h.workspace_files().is_empty());
}

#[test]
fn test_load_round_trip_through_template() {
    let h = Harness::new();
    let pipeline = h.pipeline("nightly-{date}.sql", true);
    pipeline.create(None, new_year()).unwrap();

    let later_same_day = Utc.with_ymd_and_hms(2024, 1, 1, 22, 0, 0).unwrap();
    pipeline.load(None, later_same_day).unwrap();

    let state = h.engine.0.borrow();
    assert_eq!(state.restored.as_deref(), Some(DUMP));
    let restored_from = state.restored_from.clone().unwrap();
    assert!(restored_from
        .to_string_lossy()
        .ends_with("nightly-2024-01-01.sql"));
    assert!(h.workspace_files().is_empty());
}

#[test]
fn test_load_uncompressed() {
    let h = Harness::new();
    h.storage.insert("plain.sql", DUMP.as_bytes().to_vec());
    let pipeline = h.pipeline("plain.sql", false);

    let report = pipeline.load(None, new_year()).unwrap();

    assert_eq!(report.bytes, DUMP.len() as u64);
    assert_eq!(h.engine.0.borrow().restored.as_deref(), Some(DUMP));
}

#[test]
fn test_load_restore_failure_cleans_decompressed_file() {
    let h = Harness::new();
    let pipeline = h.pipeline("backup.sql", true);
    pipeline.create(None, new_year()).unwrap();
    h.engine.0.borrow_mut().fail_restore = true;

    let err = pipeline.load(None, new_year()).unwrap_err();

    assert!(matches!(err, SnapshotError::Restore(_)));
    let restored_from = h.engine.0.borrow().restored_from.clone().unwrap();
    assert!(!restored_from.to_string_lossy().ends_with(".gz"));
    assert!(!restored_from.exists());
    assert!(!with_gz_suffix(&restored_from).exists());
    assert!(h.workspace_files().is_empty());
}

#[test]
fn test_load_corrupt_archive_cleans_download() {
    let h = Harness::new();
    h.storage.insert("backup.sql.gz", b"definitely not gzip".to_vec());
    let pipeline = h.pipeline("backup.sql", true);

    let err = pipeline.load(None, new_year()).unwrap_err();

    assert!(matches!(err, SnapshotError::Compression(_)));
    assert!(h.engine.0.borrow().restored_from.is_none());
    assert!(h.workspace_files().is_empty());
}

#[test]
fn test_load_decompress_failure_with_broken_compressor() {
    let h = Harness::new();
    h.storage.insert("backup.sql.gz", b"anything".to_vec());
    let pipeline = h.pipeline_with(
        "backup.sql",
        true,
        Box::new(BrokenCompressor {
            calls: Rc::new(Cell::new(0)),
        }),
    );

    let err = pipeline.load(None, new_year()).unwrap_err();

    assert!(matches!(err, SnapshotError::Compression(_)));
    assert!(h.workspace_files().is_empty());
}

#[test]
fn test_load_refused_download_cleans_up() {
    let h = Harness::new();
    let pipeline = h.pipeline("backup.sql", true);
    pipeline.create(None, new_year()).unwrap();
    h.storage.0.borrow_mut().fail_get = Some(GetFailure::Refused);

    let err = pipeline.load(None, new_year()).unwrap_err();

    assert!(matches!(err, SnapshotError::Storage(_)));
    assert!(h.engine.0.borrow().restored_from.is_none());
    assert!(h.workspace_files().is_empty());
}

#[test]
fn test_load_interrupted_download_cleans_partial_file() {
    let h = Harness::new();
    let pipeline = h.pipeline("backup.sql", true);
    pipeline.create(None, new_year()).unwrap();
    h.storage.0.borrow_mut().fail_get = Some(GetFailure::Truncated);

    let err = pipeline.load(None, new_year()).unwrap_err();

    assert!(matches!(err, SnapshotError::Storage(_)));
    assert!(err.to_string().contains("connection reset"));
    assert!(h.engine.0.borrow().restored_from.is_none());
    assert!(h.workspace_files().is_empty());
}

#[test]
fn test_list_calls_storage_once() {
    let h = Harness::new();
    h.storage.insert("a.sql.gz", vec![1, 2, 3]);
    h.storage.insert("b.sql.gz", vec![4]);
    let pipeline = h.pipeline("x.sql", true);

    let listed = pipeline.list().unwrap();

    let names: Vec<_> = listed.iter().map(|o| o.name.as_str()).collect();
    assert_eq!(names, vec!["a.sql.gz", "b.sql.gz"]);
    assert_eq!(h.storage.0.borrow().lists, 1);
}

#[test]
fn test_runs_in_shared_workspace_do_not_collide() {
    let h = Harness::new();
    let first = h.pipeline("same.sql", true);
    let second = h.pipeline("same.sql", true);
    assert_ne!(first.workspace().run_id(), second.workspace().run_id());

    first.create(None, new_year()).unwrap();
    second.create(None, new_year()).unwrap();

    assert_eq!(h.storage.keys(), vec!["same.sql.gz"]);
    assert!(h.workspace_files().is_empty());
}
