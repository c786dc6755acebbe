use std::io::{self, Read};

use aws_config::{BehaviorVersion, Region};
use aws_sdk_s3::Client;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{ChecksumAlgorithm, CompletedMultipartUpload, CompletedPart};
use tokio::runtime::Runtime;

use crate::error::MirrorError;

/// S3 rejects multipart parts smaller than this, except the last one.
pub const MIN_PART_SIZE: usize = 5 * 1024 * 1024;
pub const DEFAULT_PART_SIZE: usize = 8 * 1024 * 1024;

/// Destination for transferred network content.
pub trait ObjectSink: Send + Sync {
    /// Stores `body` under `bucket`/`key`, replacing any existing object, and
    /// returns the number of bytes stored.
    fn put(&self, bucket: &str, key: &str, body: &mut dyn Read) -> Result<u64, MirrorError>;
}

/// S3 sink resolving credentials and region through the AWS shared config
/// chain (environment, `~/.aws/config`, instance profile).
///
/// Bodies are read straight from the stream one part at a time. Anything that
/// fits in a single part goes up with one `PutObject`; larger bodies become a
/// multipart upload, so at most one part per transfer is held in memory and
/// object size is not limited by the `PutObject` cap.
pub struct S3Sink {
    runtime: Runtime,
    client: Client,
    part_size: usize,
}

impl S3Sink {
    /// `endpoint_url` points the client at an S3-compatible store (MinIO,
    /// localstack) and switches to path-style addressing.
    pub fn new(region: Option<&str>, endpoint_url: Option<&str>) -> Result<Self, MirrorError> {
        let runtime = build_runtime()?;

        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(region) = region {
            loader = loader.region(Region::new(region.to_string()));
        }
        if let Some(endpoint_url) = endpoint_url {
            loader = loader.endpoint_url(endpoint_url);
        }
        let shared = runtime.block_on(loader.load());
        let s3_config = aws_sdk_s3::config::Builder::from(&shared)
            .force_path_style(endpoint_url.is_some())
            .build();

        Ok(Self {
            runtime,
            client: Client::from_conf(s3_config),
            part_size: DEFAULT_PART_SIZE,
        })
    }

    pub fn with_client(client: Client) -> Result<Self, MirrorError> {
        Ok(Self {
            runtime: build_runtime()?,
            client,
            part_size: DEFAULT_PART_SIZE,
        })
    }

    /// Overrides the part size. Real S3 needs at least [`MIN_PART_SIZE`].
    pub fn with_part_size(mut self, part_size: usize) -> Self {
        self.part_size = part_size.max(1);
        self
    }

    fn put_single(&self, bucket: &str, key: &str, content: Vec<u8>) -> Result<(), MirrorError> {
        self.runtime
            .block_on(
                self.client
                    .put_object()
                    .bucket(bucket)
                    .key(key)
                    .body(ByteStream::from(content))
                    .send(),
            )
            .map_err(|err| upload_err(key, DisplayErrorContext(err).to_string()))?;
        Ok(())
    }

    fn put_multipart(
        &self,
        bucket: &str,
        key: &str,
        first: Vec<u8>,
        body: &mut dyn Read,
    ) -> Result<u64, MirrorError> {
        let created = self
            .runtime
            .block_on(
                self.client
                    .create_multipart_upload()
                    .bucket(bucket)
                    .key(key)
                    .checksum_algorithm(ChecksumAlgorithm::Crc32)
                    .send(),
            )
            .map_err(|err| upload_err(key, DisplayErrorContext(err).to_string()))?;
        let upload_id = created
            .upload_id()
            .ok_or_else(|| upload_err(key, "multipart upload has no id".to_string()))?
            .to_string();

        match self.upload_parts(bucket, key, &upload_id, first, body) {
            Ok((parts, size)) => {
                let completed = CompletedMultipartUpload::builder()
                    .set_parts(Some(parts))
                    .build();
                self.runtime
                    .block_on(
                        self.client
                            .complete_multipart_upload()
                            .bucket(bucket)
                            .key(key)
                            .upload_id(&upload_id)
                            .multipart_upload(completed)
                            .send(),
                    )
                    .map_err(|err| upload_err(key, DisplayErrorContext(err).to_string()))?;
                Ok(size)
            }
            Err(err) => {
                let aborted = self.runtime.block_on(
                    self.client
                        .abort_multipart_upload()
                        .bucket(bucket)
                        .key(key)
                        .upload_id(&upload_id)
                        .send(),
                );
                if let Err(abort_err) = aborted {
                    tracing::warn!(
                        bucket,
                        key,
                        upload_id = %upload_id,
                        error = %DisplayErrorContext(abort_err),
                        "failed to abort multipart upload"
                    );
                }
                Err(err)
            }
        }
    }

    fn upload_parts(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        first: Vec<u8>,
        body: &mut dyn Read,
    ) -> Result<(Vec<CompletedPart>, u64), MirrorError> {
        let mut parts = Vec::new();
        let mut size = 0u64;
        let mut part = first;
        let mut part_number = 1i32;
        loop {
            size += part.len() as u64;
            let output = self
                .runtime
                .block_on(
                    self.client
                        .upload_part()
                        .bucket(bucket)
                        .key(key)
                        .upload_id(upload_id)
                        .part_number(part_number)
                        .checksum_algorithm(ChecksumAlgorithm::Crc32)
                        .body(ByteStream::from(part))
                        .send(),
                )
                .map_err(|err| upload_err(key, DisplayErrorContext(err).to_string()))?;
            parts.push(
                CompletedPart::builder()
                    .part_number(part_number)
                    .set_e_tag(output.e_tag().map(str::to_string))
                    .set_checksum_crc32(output.checksum_crc32().map(str::to_string))
                    .build(),
            );
            tracing::debug!(key, part_number, bytes = size, "part uploaded");

            part = read_part(body, self.part_size)
                .map_err(|err| upload_err(key, format!("reading network content: {err}")))?;
            if part.is_empty() {
                break;
            }
            part_number += 1;
        }
        Ok((parts, size))
    }
}

impl ObjectSink for S3Sink {
    fn put(&self, bucket: &str, key: &str, body: &mut dyn Read) -> Result<u64, MirrorError> {
        let first = read_part(body, self.part_size)
            .map_err(|err| upload_err(key, format!("reading network content: {err}")))?;

        let size = if first.len() < self.part_size {
            let size = first.len() as u64;
            self.put_single(bucket, key, first)?;
            size
        } else {
            self.put_multipart(bucket, key, first, body)?
        };

        tracing::debug!(bucket, key, bytes = size, "object stored");
        Ok(size)
    }
}

/// Reads up to `part_size` bytes, stopping early only at end of stream.
pub fn read_part(body: &mut dyn Read, part_size: usize) -> io::Result<Vec<u8>> {
    let mut part = Vec::with_capacity(part_size);
    (&mut *body).take(part_size as u64).read_to_end(&mut part)?;
    Ok(part)
}

fn build_runtime() -> Result<Runtime, MirrorError> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("ndex-mirror-s3")
        .build()
        .map_err(|err| MirrorError::S3Setup(err.to_string()))
}

fn upload_err(key: &str, message: String) -> MirrorError {
    MirrorError::S3Upload {
        key: key.to_string(),
        message,
    }
}
