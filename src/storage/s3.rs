//! S3 and S3-compatible storage
//!
//! The AWS SDK is async; this client owns a current-thread tokio runtime and
//! blocks on each request, which keeps the pipeline itself synchronous.
//!
//! Uploads are streamed: a body that fits in one part is sent with a single
//! `PutObject`, anything larger goes through a multipart upload, holding at
//! most one part in memory at a time.
//!
//! ## Client configuration
//!
//! - Region unset, endpoint set: a non-AWS, S3-compatible provider (MinIO,
//!   Ceph, ...). The endpoint is used with path-style addressing and an
//!   empty region.
//! - Otherwise: standard regional addressing in the given region. An
//!   endpoint, if also set, overrides the regional one (VPC endpoints).

use std::io::{self, Cursor, Read};

use aws_sdk_s3::config::{BehaviorVersion, Credentials, Region};
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::operation::get_object::GetObjectError;
use aws_sdk_s3::operation::head_object::HeadObjectError;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{CompletedMultipartUpload, CompletedPart};
use aws_sdk_s3::Client;
use chrono::DateTime;
use tokio::runtime::Runtime;

use super::{prefixed_key, ObjectInfo, StorageClient};
use crate::config::settings::StorageSettings;
use crate::error::{SnapshotError, SnapshotResult};

/// Resolved options the S3 client is built from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct S3ClientOptions {
    /// Region passed to the SDK (empty for non-AWS providers)
    pub region: String,
    /// Endpoint override
    pub endpoint: Option<String>,
    /// Address buckets as `endpoint/bucket/key` rather than `bucket.endpoint/key`
    pub force_path_style: bool,
}

impl S3ClientOptions {
    /// Apply the provider resolution policy to storage settings
    pub fn resolve(settings: &StorageSettings) -> Self {
        let region = non_empty(settings.region.as_deref());
        let endpoint = non_empty(settings.endpoint.as_deref());

        match (region, endpoint) {
            (None, Some(endpoint)) => Self {
                region: String::new(),
                endpoint: Some(endpoint.to_string()),
                force_path_style: true,
            },
            (region, endpoint) => Self {
                region: region.unwrap_or_default().to_string(),
                endpoint: endpoint.map(str::to_string),
                force_path_style: false,
            },
        }
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Upload chunk size; S3 requires at least 5 MiB for every part but the last
const PART_SIZE: usize = 16 * 1024 * 1024;

/// Read up to `limit` bytes; a short result means `data` is exhausted
fn read_part(data: &mut dyn Read, limit: usize) -> io::Result<Vec<u8>> {
    let mut part = Vec::new();
    data.take(limit as u64).read_to_end(&mut part)?;
    Ok(part)
}

fn read_error(e: io::Error) -> SnapshotError {
    SnapshotError::Storage(format!("Failed to read snapshot for upload: {}", e))
}

/// Storage client for a bucket and key prefix
pub struct S3Storage {
    client: Client,
    runtime: Runtime,
    bucket: String,
    prefix: String,
}

impl S3Storage {
    /// Build a client from storage settings
    pub fn new(settings: &StorageSettings) -> SnapshotResult<Self> {
        let options = S3ClientOptions::resolve(settings);
        tracing::debug!(
            region = %options.region,
            endpoint = ?options.endpoint,
            path_style = options.force_path_style,
            bucket = %settings.bucket,
            "configuring s3 client"
        );

        let credentials = Credentials::new(
            settings.access_key.clone(),
            settings.secret_key.clone(),
            None,
            None,
            "db-snapshot-settings",
        );

        let mut builder = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(options.region.clone()))
            .credentials_provider(credentials)
            .force_path_style(options.force_path_style);
        if let Some(endpoint) = &options.endpoint {
            builder = builder.endpoint_url(endpoint);
        }

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| SnapshotError::Storage(format!("Failed to start runtime: {}", e)))?;

        Ok(Self {
            client: Client::from_conf(builder.build()),
            runtime,
            bucket: settings.bucket.clone(),
            prefix: settings.path.clone(),
        })
    }

    /// Send `first` and the rest of `data` as parts of `upload_id`
    fn upload_parts(
        &self,
        full_key: &str,
        upload_id: &str,
        first: Vec<u8>,
        data: &mut dyn Read,
    ) -> SnapshotResult<u64> {
        let mut parts = Vec::new();
        let mut size = 0u64;
        let mut part = first;
        let mut part_number = 1;

        while !part.is_empty() {
            size += part.len() as u64;
            let uploaded = self
                .runtime
                .block_on(
                    self.client
                        .upload_part()
                        .bucket(&self.bucket)
                        .key(full_key)
                        .upload_id(upload_id)
                        .part_number(part_number)
                        .body(ByteStream::from(part))
                        .send(),
                )
                .map_err(|e| self.request_error("upload part of", full_key, e))?;
            tracing::debug!(key = %full_key, part_number, "uploaded part");

            parts.push(
                CompletedPart::builder()
                    .set_e_tag(uploaded.e_tag().map(str::to_string))
                    .part_number(part_number)
                    .build(),
            );
            part_number += 1;
            part = read_part(data, PART_SIZE).map_err(read_error)?;
        }

        self.runtime
            .block_on(
                self.client
                    .complete_multipart_upload()
                    .bucket(&self.bucket)
                    .key(full_key)
                    .upload_id(upload_id)
                    .multipart_upload(
                        CompletedMultipartUpload::builder()
                            .set_parts(Some(parts))
                            .build(),
                    )
                    .send(),
            )
            .map_err(|e| self.request_error("complete upload of", full_key, e))?;

        Ok(size)
    }

    fn request_error<E: std::error::Error>(&self, action: &str, key: &str, e: E) -> SnapshotError {
        SnapshotError::Storage(format!(
            "Failed to {} s3://{}/{}: {}",
            action,
            self.bucket,
            key,
            DisplayErrorContext(&e)
        ))
    }

    fn key(&self, key: &str) -> String {
        prefixed_key(&self.prefix, key)
    }

    fn list_prefix(&self) -> Option<String> {
        let prefix = self.prefix.trim_matches('/');
        if prefix.is_empty() {
            None
        } else {
            Some(format!("{}/", prefix))
        }
    }
}

impl StorageClient for S3Storage {
    fn put(&self, key: &str, data: &mut dyn Read) -> SnapshotResult<u64> {
        let full_key = self.key(key);
        let first = read_part(data, PART_SIZE).map_err(read_error)?;

        if first.len() < PART_SIZE {
            let size = first.len() as u64;
            self.runtime
                .block_on(
                    self.client
                        .put_object()
                        .bucket(&self.bucket)
                        .key(&full_key)
                        .body(ByteStream::from(first))
                        .send(),
                )
                .map_err(|e| self.request_error("upload", &full_key, e))?;
            return Ok(size);
        }

        let created = self
            .runtime
            .block_on(
                self.client
                    .create_multipart_upload()
                    .bucket(&self.bucket)
                    .key(&full_key)
                    .send(),
            )
            .map_err(|e| self.request_error("start upload of", &full_key, e))?;
        let upload_id = created.upload_id().ok_or_else(|| {
            SnapshotError::Storage(format!(
                "No upload id returned for s3://{}/{}",
                self.bucket, full_key
            ))
        })?;

        match self.upload_parts(&full_key, upload_id, first, data) {
            Ok(size) => Ok(size),
            Err(e) => {
                let aborted = self.runtime.block_on(
                    self.client
                        .abort_multipart_upload()
                        .bucket(&self.bucket)
                        .key(&full_key)
                        .upload_id(upload_id)
                        .send(),
                );
                if let Err(abort) = aborted {
                    tracing::warn!(
                        key = %full_key,
                        upload_id,
                        error = %DisplayErrorContext(&abort),
                        "failed to abort multipart upload"
                    );
                }
                Err(e)
            }
        }
    }

    fn get(&self, key: &str) -> SnapshotResult<Box<dyn Read + '_>> {
        let full_key = self.key(key);
        let output = self
            .runtime
            .block_on(
                self.client
                    .get_object()
                    .bucket(&self.bucket)
                    .key(&full_key)
                    .send(),
            )
            .map_err(|e| match e.into_service_error() {
                GetObjectError::NoSuchKey(_) => SnapshotError::not_found(key),
                other => SnapshotError::Storage(format!(
                    "Failed to download s3://{}/{}: {}",
                    self.bucket,
                    full_key,
                    DisplayErrorContext(&other)
                )),
            })?;

        Ok(Box::new(BodyReader {
            runtime: &self.runtime,
            body: output.body,
            chunk: Cursor::new(Vec::new()),
        }))
    }

    fn exists(&self, key: &str) -> SnapshotResult<bool> {
        let full_key = self.key(key);
        let result = self.runtime.block_on(
            self.client
                .head_object()
                .bucket(&self.bucket)
                .key(&full_key)
                .send(),
        );

        match result {
            Ok(_) => Ok(true),
            Err(e) => match e.into_service_error() {
                HeadObjectError::NotFound(_) => Ok(false),
                other => Err(SnapshotError::Storage(format!(
                    "Failed to check s3://{}/{}: {}",
                    self.bucket,
                    full_key,
                    DisplayErrorContext(&other)
                ))),
            },
        }
    }

    fn list(&self) -> SnapshotResult<Vec<ObjectInfo>> {
        let prefix = self.list_prefix();
        let mut objects = Vec::new();
        let mut continuation: Option<String> = None;

        loop {
            let page = self
                .runtime
                .block_on(
                    self.client
                        .list_objects_v2()
                        .bucket(&self.bucket)
                        .set_prefix(prefix.clone())
                        .set_continuation_token(continuation.take())
                        .send(),
                )
                .map_err(|e| {
                    SnapshotError::Storage(format!(
                        "Failed to list s3://{}: {}",
                        self.bucket,
                        DisplayErrorContext(&e)
                    ))
                })?;

            for object in page.contents() {
                let Some(key) = object.key() else { continue };
                let name = prefix
                    .as_deref()
                    .and_then(|p| key.strip_prefix(p))
                    .unwrap_or(key);
                // "directories" below the prefix are not snapshots
                if name.is_empty() || name.contains('/') {
                    continue;
                }
                objects.push(ObjectInfo {
                    name: name.to_string(),
                    size: object.size().unwrap_or(0).max(0) as u64,
                    last_modified: object
                        .last_modified()
                        .and_then(|t| DateTime::from_timestamp(t.secs(), t.subsec_nanos())),
                });
            }

            match page.next_continuation_token() {
                Some(token) if page.is_truncated().unwrap_or(false) => {
                    continuation = Some(token.to_string());
                }
                _ => break,
            }
        }

        objects.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(objects)
    }
}

/// Blocking reader over a streamed object body
struct BodyReader<'a> {
    runtime: &'a Runtime,
    body: ByteStream,
    chunk: Cursor<Vec<u8>>,
}

impl Read for BodyReader<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        loop {
            let n = self.chunk.read(buf)?;
            if n > 0 || buf.is_empty() {
                return Ok(n);
            }
            match self.runtime.block_on(self.body.try_next()) {
                Ok(Some(bytes)) => self.chunk = Cursor::new(bytes.to_vec()),
                Ok(None) => return Ok(0),
                Err(e) => return Err(io::Error::new(io::ErrorKind::Other, e)),
            }
        }
    }
}
