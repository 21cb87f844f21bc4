//! Streaming object writer
//!
//! Bytes written to an [`S3Writer`] are buffered. Small objects go out as a
//! single PutObject on close. Once the buffer grows past the part size a
//! multipart upload is started and full parts are sent as they fill; close
//! completes the upload, abort (or dropping an unclosed writer) aborts it.

use async_trait::async_trait;
use aws_sdk_s3::types::{CompletedMultipartUpload, CompletedPart};
use aws_smithy_types::byte_stream::ByteStream;

use bk_core::{Error, ObjectLocator, ObjectSink, Result};

/// Default part size: 64 MiB
pub const DEFAULT_PART_SIZE: u64 = 64 * 1024 * 1024;

/// Minimum part size: 5 MiB (S3 requirement)
pub const MIN_PART_SIZE: u64 = 5 * 1024 * 1024;

/// Maximum part size: 5 GiB
pub const MAX_PART_SIZE: u64 = 5 * 1024 * 1024 * 1024;

/// Maximum number of parts: 10,000 (S3 limit)
pub const MAX_PARTS: usize = 10_000;

/// Multipart upload configuration
#[derive(Debug, Clone)]
pub struct MultipartConfig {
    /// Part size in bytes
    pub part_size: u64,
}

impl Default for MultipartConfig {
    fn default() -> Self {
        Self {
            part_size: DEFAULT_PART_SIZE,
        }
    }
}

impl MultipartConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn part_size(mut self, size: u64) -> Self {
        self.part_size = size.clamp(MIN_PART_SIZE, MAX_PART_SIZE);
        self
    }

    /// Largest object a writer with this configuration can produce
    pub fn max_object_size(&self) -> u64 {
        self.part_size * MAX_PARTS as u64
    }
}

/// Write stream into one S3 object
pub struct S3Writer {
    client: aws_sdk_s3::Client,
    locator: ObjectLocator,
    content_type: Option<String>,
    part_size: usize,
    max_object_size: u64,
    buffer: Vec<u8>,
    upload_id: Option<String>,
    parts: Vec<CompletedPart>,
}

impl S3Writer {
    pub(crate) fn new(
        client: aws_sdk_s3::Client,
        locator: ObjectLocator,
        config: &MultipartConfig,
    ) -> Self {
        let content_type = mime_guess::from_path(&locator.key)
            .first()
            .map(|m| m.essence_str().to_string());

        Self {
            client,
            locator,
            content_type,
            part_size: config.part_size as usize,
            max_object_size: config.max_object_size(),
            buffer: Vec::new(),
            upload_id: None,
            parts: Vec::new(),
        }
    }

    fn write_error(&self, message: impl std::fmt::Display) -> Error {
        Error::RemoteWrite {
            object: self.locator.to_string(),
            message: message.to_string(),
        }
    }

    async fn ensure_multipart(&mut self) -> Result<String> {
        if let Some(id) = &self.upload_id {
            return Ok(id.clone());
        }

        let response = self
            .client
            .create_multipart_upload()
            .bucket(&self.locator.bucket)
            .key(&self.locator.key)
            .set_content_type(self.content_type.clone())
            .send()
            .await
            .map_err(|e| self.write_error(crate::client::error_message(&e)))?;

        let upload_id = response
            .upload_id()
            .ok_or_else(|| self.write_error("multipart upload returned no upload id"))?
            .to_string();

        tracing::debug!(object = %self.locator, upload_id = %upload_id, "started multipart upload");
        self.upload_id = Some(upload_id.clone());
        Ok(upload_id)
    }

    async fn upload_part(&mut self, data: Vec<u8>) -> Result<()> {
        let part_number = self.parts.len() + 1;
        if part_number > MAX_PARTS {
            return Err(self.write_error(format!(
                "object exceeds {} bytes ({MAX_PARTS} parts of {} bytes)",
                self.max_object_size, self.part_size
            )));
        }
        let part_number = part_number as i32;
        let upload_id = self.ensure_multipart().await?;

        let response = self
            .client
            .upload_part()
            .bucket(&self.locator.bucket)
            .key(&self.locator.key)
            .upload_id(&upload_id)
            .part_number(part_number)
            .body(ByteStream::from(data))
            .send()
            .await
            .map_err(|e| self.write_error(crate::client::error_message(&e)))?;

        let mut part = CompletedPart::builder().part_number(part_number);
        if let Some(etag) = response.e_tag() {
            part = part.e_tag(etag);
        }
        self.parts.push(part.build());
        Ok(())
    }

    async fn put_whole(&mut self) -> Result<()> {
        let data = std::mem::take(&mut self.buffer);
        self.client
            .put_object()
            .bucket(&self.locator.bucket)
            .key(&self.locator.key)
            .set_content_type(self.content_type.clone())
            .body(ByteStream::from(data))
            .send()
            .await
            .map_err(|e| self.write_error(crate::client::error_message(&e)))?;
        Ok(())
    }

    async fn complete(&mut self, upload_id: &str) -> Result<()> {
        if !self.buffer.is_empty() {
            let rest = std::mem::take(&mut self.buffer);
            self.upload_part(rest).await?;
        }

        let upload = CompletedMultipartUpload::builder()
            .set_parts(Some(std::mem::take(&mut self.parts)))
            .build();

        self.client
            .complete_multipart_upload()
            .bucket(&self.locator.bucket)
            .key(&self.locator.key)
            .upload_id(upload_id)
            .multipart_upload(upload)
            .send()
            .await
            .map_err(|e| self.write_error(crate::client::error_message(&e)))?;
        Ok(())
    }

    async fn abort_upload(&mut self) {
        let Some(upload_id) = self.upload_id.take() else {
            return;
        };
        let result = self
            .client
            .abort_multipart_upload()
            .bucket(&self.locator.bucket)
            .key(&self.locator.key)
            .upload_id(&upload_id)
            .send()
            .await;
        if let Err(e) = result {
            tracing::warn!(
                object = %self.locator,
                upload_id = %upload_id,
                error = %crate::client::error_message(&e),
                "failed to abort multipart upload"
            );
        }
    }
}

#[async_trait]
impl ObjectSink for S3Writer {
    async fn write(&mut self, buf: &[u8]) -> Result<()> {
        self.buffer.extend_from_slice(buf);
        while self.buffer.len() >= self.part_size {
            let rest = self.buffer.split_off(self.part_size);
            let part = std::mem::replace(&mut self.buffer, rest);
            self.upload_part(part).await?;
        }
        Ok(())
    }

    async fn close(mut self: Box<Self>) -> Result<()> {
        let Some(upload_id) = self.upload_id.clone() else {
            return self.put_whole().await;
        };

        match self.complete(&upload_id).await {
            Ok(()) => {
                self.upload_id = None;
                tracing::debug!(
                    object = %self.locator,
                    upload_id = %upload_id,
                    "completed multipart upload"
                );
                Ok(())
            }
            Err(e) => {
                self.abort_upload().await;
                Err(e)
            }
        }
    }

    async fn abort(mut self: Box<Self>) {
        self.buffer.clear();
        self.abort_upload().await;
    }
}

impl Drop for S3Writer {
    fn drop(&mut self) {
        let Some(upload_id) = self.upload_id.take() else {
            return;
        };
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            tracing::warn!(
                object = %self.locator,
                upload_id = %upload_id,
                "writer dropped outside a runtime; multipart upload left open"
            );
            return;
        };

        let client = self.client.clone();
        let bucket = self.locator.bucket.clone();
        let key = self.locator.key.clone();
        handle.spawn(async move {
            let result = client
                .abort_multipart_upload()
                .bucket(&bucket)
                .key(&key)
                .upload_id(&upload_id)
                .send()
                .await;
            if let Err(e) = result {
                tracing::warn!(
                    bucket = %bucket,
                    key = %key,
                    upload_id = %upload_id,
                    error = %crate::client::error_message(&e),
                    "failed to abort multipart upload of dropped writer"
                );
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aws_sdk_s3::Client;
    use aws_sdk_s3::error::ErrorMetadata;
    use aws_sdk_s3::operation::abort_multipart_upload::AbortMultipartUploadOutput;
    use aws_sdk_s3::operation::complete_multipart_upload::{
        CompleteMultipartUploadError, CompleteMultipartUploadOutput,
    };
    use aws_sdk_s3::operation::create_multipart_upload::CreateMultipartUploadOutput;
    use aws_sdk_s3::operation::put_object::PutObjectOutput;
    use aws_sdk_s3::operation::upload_part::{UploadPartError, UploadPartOutput};
    use aws_smithy_mocks::{Rule, RuleMode, mock, mock_client};

    const UPLOAD_ID: &str = "upload-1";

    /// Four-byte parts keep the buffered data small
    fn tiny_parts() -> MultipartConfig {
        MultipartConfig { part_size: 4 }
    }

    fn writer(client: Client, key: &str) -> S3Writer {
        S3Writer::new(client, ObjectLocator::new("bucket", key), &tiny_parts())
    }

    fn create_rule() -> Rule {
        mock!(Client::create_multipart_upload)
            .then_output(|| CreateMultipartUploadOutput::builder().upload_id(UPLOAD_ID).build())
    }

    fn part_rule(number: i32) -> Rule {
        mock!(Client::upload_part)
            .match_requests(move |req| {
                req.part_number() == Some(number) && req.upload_id() == Some(UPLOAD_ID)
            })
            .then_output(move || {
                UploadPartOutput::builder()
                    .e_tag(format!("etag-{number}"))
                    .build()
            })
    }

    fn abort_rule() -> Rule {
        mock!(Client::abort_multipart_upload)
            .match_requests(|req| req.upload_id() == Some(UPLOAD_ID))
            .then_output(|| AbortMultipartUploadOutput::builder().build())
    }

    #[test]
    fn test_default_config() {
        let config = MultipartConfig::default();
        assert_eq!(config.part_size, DEFAULT_PART_SIZE);
    }

    #[test]
    fn test_part_size_clamping() {
        // Too small
        let config = MultipartConfig::new().part_size(1024);
        assert_eq!(config.part_size, MIN_PART_SIZE);

        // Too large
        let config = MultipartConfig::new().part_size(10 * 1024 * 1024 * 1024);
        assert_eq!(config.part_size, MAX_PART_SIZE);

        let config = MultipartConfig::new().part_size(128 * 1024 * 1024);
        assert_eq!(config.part_size, 128 * 1024 * 1024);
    }

    #[test]
    fn test_max_object_size() {
        let config = MultipartConfig::new().part_size(MIN_PART_SIZE);
        assert_eq!(config.max_object_size(), MIN_PART_SIZE * 10_000);
    }

    #[tokio::test]
    async fn test_small_object_uses_single_put() {
        let put = mock!(Client::put_object)
            .match_requests(|req| {
                req.key() == Some("notes.txt") && req.content_type() == Some("text/plain")
            })
            .then_output(|| PutObjectOutput::builder().build());
        let create = create_rule();
        let client = mock_client!(aws_sdk_s3, RuleMode::MatchAny, [&put, &create]);

        let mut sink: Box<dyn ObjectSink> = Box::new(writer(client, "notes.txt"));
        sink.write(b"abc").await.unwrap();
        sink.close().await.unwrap();

        assert_eq!(put.num_calls(), 1);
        assert_eq!(create.num_calls(), 0);
    }

    #[tokio::test]
    async fn test_large_object_switches_to_multipart() {
        let put = mock!(Client::put_object).then_output(|| PutObjectOutput::builder().build());
        let create = create_rule();
        let (part_1, part_2, part_3) = (part_rule(1), part_rule(2), part_rule(3));
        let complete = mock!(Client::complete_multipart_upload)
            .match_requests(|req| {
                req.upload_id() == Some(UPLOAD_ID)
                    && req.multipart_upload().map(|u| u.parts().len()) == Some(3)
            })
            .then_output(|| CompleteMultipartUploadOutput::builder().build());
        let abort = abort_rule();
        let client = mock_client!(
            aws_sdk_s3,
            RuleMode::MatchAny,
            [&put, &create, &part_1, &part_2, &part_3, &complete, &abort]
        );

        let mut sink: Box<dyn ObjectSink> = Box::new(writer(client, "big.bin"));
        // 10 bytes: two full parts while writing, the 2-byte tail on close
        sink.write(b"0123456").await.unwrap();
        assert_eq!(create.num_calls(), 1);
        assert_eq!(part_1.num_calls(), 1);
        sink.write(b"789").await.unwrap();
        assert_eq!(part_2.num_calls(), 1);
        assert_eq!(part_3.num_calls(), 0);
        sink.close().await.unwrap();

        assert_eq!(part_3.num_calls(), 1);
        assert_eq!(complete.num_calls(), 1);
        assert_eq!(put.num_calls(), 0);
        assert_eq!(abort.num_calls(), 0);
    }

    #[tokio::test]
    async fn test_failed_complete_aborts_upload() {
        let create = create_rule();
        let (part_1, part_2) = (part_rule(1), part_rule(2));
        let complete = mock!(Client::complete_multipart_upload).then_error(|| {
            CompleteMultipartUploadError::generic(
                ErrorMetadata::builder()
                    .code("InvalidPart")
                    .message("part etag mismatch")
                    .build(),
            )
        });
        let abort = abort_rule();
        let client = mock_client!(
            aws_sdk_s3,
            RuleMode::MatchAny,
            [&create, &part_1, &part_2, &complete, &abort]
        );

        let mut sink: Box<dyn ObjectSink> = Box::new(writer(client, "big.bin"));
        sink.write(b"012345").await.unwrap();
        let err = sink.close().await.unwrap_err();

        assert!(
            matches!(err, Error::RemoteWrite { ref object, .. } if object == "bucket/big.bin")
        );
        assert_eq!(complete.num_calls(), 1);
        assert_eq!(abort.num_calls(), 1);
    }

    #[tokio::test]
    async fn test_failed_part_is_reported() {
        let create = create_rule();
        let part_1 = mock!(Client::upload_part).then_error(|| {
            UploadPartError::generic(ErrorMetadata::builder().code("AccessDenied").build())
        });
        let abort = abort_rule();
        let client = mock_client!(aws_sdk_s3, RuleMode::MatchAny, [&create, &part_1, &abort]);

        let mut sink: Box<dyn ObjectSink> = Box::new(writer(client, "big.bin"));
        let err = sink.write(b"0123").await.unwrap_err();
        assert!(matches!(err, Error::RemoteWrite { .. }));

        sink.abort().await;
        assert_eq!(abort.num_calls(), 1);
    }

    #[tokio::test]
    async fn test_abort_after_parts_uploaded() {
        let put = mock!(Client::put_object).then_output(|| PutObjectOutput::builder().build());
        let create = create_rule();
        let part_1 = part_rule(1);
        let abort = abort_rule();
        let client = mock_client!(
            aws_sdk_s3,
            RuleMode::MatchAny,
            [&put, &create, &part_1, &abort]
        );

        let mut sink: Box<dyn ObjectSink> = Box::new(writer(client, "big.bin"));
        sink.write(b"012345").await.unwrap();
        sink.abort().await;

        assert_eq!(part_1.num_calls(), 1);
        assert_eq!(abort.num_calls(), 1);
        assert_eq!(put.num_calls(), 0);
    }

    #[tokio::test]
    async fn test_abort_before_multipart_sends_nothing() {
        let put = mock!(Client::put_object).then_output(|| PutObjectOutput::builder().build());
        let abort = abort_rule();
        let client = mock_client!(aws_sdk_s3, RuleMode::MatchAny, [&put, &abort]);

        let mut sink: Box<dyn ObjectSink> = Box::new(writer(client, "small.txt"));
        sink.write(b"ab").await.unwrap();
        sink.abort().await;

        assert_eq!(put.num_calls(), 0);
        assert_eq!(abort.num_calls(), 0);
    }

    #[tokio::test]
    async fn test_dropped_writer_aborts_upload() {
        let create = create_rule();
        let part_1 = part_rule(1);
        let abort = abort_rule();
        let client = mock_client!(aws_sdk_s3, RuleMode::MatchAny, [&create, &part_1, &abort]);

        let mut w = writer(client, "big.bin");
        w.write(b"01234").await.unwrap();
        drop(w);

        for _ in 0..100 {
            if abort.num_calls() == 1 {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        assert_eq!(abort.num_calls(), 1);
    }
}
