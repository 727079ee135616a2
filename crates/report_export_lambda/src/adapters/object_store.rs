use std::future::Future;
use std::io::Read;

use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{CompletedMultipartUpload, CompletedPart};
use report_export_core::collaborators::ArtifactUploader;
use tracing::warn;

/// Bodies up to one part go up in a single `PutObject`; larger ones are
/// streamed as a multipart upload, holding one part in memory at a time.
/// S3 requires every part but the last to be at least 5 MiB.
pub const UPLOAD_PART_SIZE: usize = 8 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct S3ArtifactUploader {
    s3_client: aws_sdk_s3::Client,
}

impl S3ArtifactUploader {
    pub fn new(s3_client: aws_sdk_s3::Client) -> Self {
        Self { s3_client }
    }

    fn put_single(&self, bucket: &str, key: &str, body: Vec<u8>) -> Result<(), String> {
        block_on(
            self.s3_client
                .put_object()
                .bucket(bucket)
                .key(key)
                .body(ByteStream::from(body))
                .send(),
        )
        .map(|_| ())
        .map_err(|error| format!("failed to write object to s3: {}", DisplayErrorContext(&error)))
    }

    fn put_multipart(
        &self,
        bucket: &str,
        key: &str,
        first_part: Vec<u8>,
        rest: &mut dyn Read,
    ) -> Result<(), String> {
        let created = block_on(
            self.s3_client
                .create_multipart_upload()
                .bucket(bucket)
                .key(key)
                .send(),
        )
        .map_err(|error| {
            format!("failed to start multipart upload: {}", DisplayErrorContext(&error))
        })?;
        let upload_id = created
            .upload_id()
            .ok_or_else(|| "multipart upload started without an upload id".to_string())?
            .to_string();

        let finished = self
            .upload_parts(bucket, key, &upload_id, first_part, rest)
            .and_then(|parts| self.complete(bucket, key, &upload_id, parts));

        if finished.is_err() {
            let aborted = block_on(
                self.s3_client
                    .abort_multipart_upload()
                    .bucket(bucket)
                    .key(key)
                    .upload_id(&upload_id)
                    .send(),
            );
            if let Err(error) = aborted {
                warn!(
                    component = "object_store",
                    event = "multipart_abort_failed",
                    bucket,
                    key,
                    upload_id = %upload_id,
                    error = %DisplayErrorContext(&error),
                );
            }
        }
        finished
    }

    fn upload_parts(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        first_part: Vec<u8>,
        rest: &mut dyn Read,
    ) -> Result<Vec<CompletedPart>, String> {
        let mut completed = Vec::new();
        let mut part = first_part;
        let mut part_number: i32 = 1;

        while !part.is_empty() {
            let uploaded = block_on(
                self.s3_client
                    .upload_part()
                    .bucket(bucket)
                    .key(key)
                    .upload_id(upload_id)
                    .part_number(part_number)
                    .body(ByteStream::from(part))
                    .send(),
            )
            .map_err(|error| {
                format!(
                    "failed to upload part {part_number}: {}",
                    DisplayErrorContext(&error)
                )
            })?;

            completed.push(
                CompletedPart::builder()
                    .part_number(part_number)
                    .set_e_tag(uploaded.e_tag().map(str::to_string))
                    .build(),
            );
            part_number += 1;
            part = read_part(rest, UPLOAD_PART_SIZE)?;
        }

        Ok(completed)
    }

    fn complete(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        parts: Vec<CompletedPart>,
    ) -> Result<(), String> {
        block_on(
            self.s3_client
                .complete_multipart_upload()
                .bucket(bucket)
                .key(key)
                .upload_id(upload_id)
                .multipart_upload(
                    CompletedMultipartUpload::builder()
                        .set_parts(Some(parts))
                        .build(),
                )
                .send(),
        )
        .map(|_| ())
        .map_err(|error| {
            format!("failed to complete multipart upload: {}", DisplayErrorContext(&error))
        })
    }
}

impl ArtifactUploader for S3ArtifactUploader {
    fn upload(&self, bucket: &str, key: &str, body: &mut dyn Read) -> Result<String, String> {
        let first_part = read_part(body, UPLOAD_PART_SIZE)?;
        if first_part.len() < UPLOAD_PART_SIZE {
            self.put_single(bucket, key, first_part)?;
        } else {
            self.put_multipart(bucket, key, first_part, body)?;
        }
        Ok(s3_location(bucket, key))
    }
}

pub fn s3_location(bucket: &str, key: &str) -> String {
    format!("s3://{bucket}/{key}")
}

fn block_on<F: Future>(future: F) -> F::Output {
    tokio::task::block_in_place(|| tokio::runtime::Handle::current().block_on(future))
}

/// Reads up to `limit` bytes; a short part means the body is exhausted.
fn read_part(body: &mut dyn Read, limit: usize) -> Result<Vec<u8>, String> {
    let mut part = Vec::new();
    Read::take(&mut *body, limit as u64)
        .read_to_end(&mut part)
        .map_err(|error| format!("failed to read upload body: {error}"))?;
    Ok(part)
}
