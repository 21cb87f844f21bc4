//! S3 store implementation
//!
//! Wraps aws-sdk-s3 and implements the ObjectStore trait from bk-core.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use aws_sdk_s3::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};

use bk_core::{
    Credentials, CredentialsFile, Error, ListingQuery, ObjectAttributes, ObjectLocator,
    ObjectReader, ObjectSink, ObjectStore, Result, StorageClient,
};

use crate::multipart::{MultipartConfig, S3Writer};

/// Provider name attached to the static credentials
const PROVIDER_NAME: &str = "bk-credentials-file";

/// Service error codes meaning the object or bucket is missing
const NOT_FOUND_CODES: &[&str] = &["NotFound", "NoSuchKey", "NoSuchBucket"];

/// Service error codes meaning the caller is not allowed in
const DENIED_CODES: &[&str] = &[
    "AccessDenied",
    "Forbidden",
    "InvalidAccessKeyId",
    "SignatureDoesNotMatch",
    "ExpiredToken",
];

/// Authenticate with the credentials file at `credentials_path` and return a
/// client bound to the resulting S3 store.
pub async fn authenticate(credentials_path: impl AsRef<Path>) -> Result<StorageClient<S3Store>> {
    let credentials = CredentialsFile::new(credentials_path.as_ref()).load()?;
    let store = S3Store::new(credentials).await?;
    Ok(StorageClient::new(store))
}

/// S3-backed object store
pub struct S3Store {
    inner: aws_sdk_s3::Client,
    multipart: MultipartConfig,
}

impl S3Store {
    /// Build a store from credentials.
    ///
    /// The SDK's own retry layer is disabled; every call is attempted once.
    pub async fn new(credentials: Credentials) -> Result<Self> {
        credentials.validate()?;

        let static_credentials = aws_credential_types::Credentials::new(
            &credentials.access_key,
            &credentials.secret_key,
            credentials.session_token.clone(),
            None, // expiry
            PROVIDER_NAME,
        );

        let timeout = credentials.timeout_config();
        let timeout_config = aws_config::timeout::TimeoutConfig::builder()
            .connect_timeout(Duration::from_millis(timeout.connect_ms))
            .read_timeout(Duration::from_millis(timeout.read_ms))
            .build();

        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .credentials_provider(static_credentials)
            .region(aws_config::Region::new(credentials.region.clone()))
            .retry_config(aws_config::retry::RetryConfig::disabled())
            .timeout_config(timeout_config);

        if let Some(endpoint) = &credentials.endpoint {
            loader = loader.endpoint_url(endpoint);
        }

        let config = loader.load().await;

        let s3_config = aws_sdk_s3::config::Builder::from(&config)
            .force_path_style(credentials.force_path_style())
            .build();

        tracing::debug!(
            endpoint = credentials.endpoint.as_deref().unwrap_or("default"),
            region = %credentials.region,
            "created S3 client"
        );

        Ok(Self {
            inner: aws_sdk_s3::Client::from_conf(s3_config),
            multipart: MultipartConfig::default(),
        })
    }

    /// Override the multipart configuration used by writers
    pub fn with_multipart(mut self, multipart: MultipartConfig) -> Self {
        self.multipart = multipart;
        self
    }

    /// Get the underlying aws-sdk-s3 client
    pub fn inner(&self) -> &aws_sdk_s3::Client {
        &self.inner
    }
}

/// Render an SDK error with its full source chain
pub(crate) fn error_message<E, R>(err: &SdkError<E, R>) -> String
where
    E: std::error::Error + 'static,
    R: std::fmt::Debug,
{
    DisplayErrorContext(err).to_string()
}

/// Map an SDK error for `object` onto the bk-core taxonomy
fn classify<E, R>(err: SdkError<E, R>, object: &str) -> Error
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
    R: std::fmt::Debug,
{
    let code = err.code().unwrap_or_default().to_string();
    let message = error_message(&err);

    if NOT_FOUND_CODES.contains(&code.as_str())
        || NOT_FOUND_CODES.iter().any(|c| message.contains(c))
    {
        Error::NotFound(object.to_string())
    } else if DENIED_CODES.contains(&code.as_str()) {
        Error::Auth(format!("{object}: {message}"))
    } else {
        Error::Network(message)
    }
}

/// Characters left as-is inside a copy source key segment
const COPY_SOURCE_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Build the `x-amz-copy-source` value: `bucket/key`, each segment
/// percent-encoded. `.` and `..` segments are kept verbatim.
pub(crate) fn copy_source(src: &ObjectLocator) -> String {
    std::iter::once(src.bucket.as_str())
        .chain(src.key.split('/'))
        .map(|segment| utf8_percent_encode(segment, COPY_SOURCE_SEGMENT).to_string())
        .collect::<Vec<_>>()
        .join("/")
}

#[async_trait]
impl ObjectStore for S3Store {
    async fn attributes(&self, locator: &ObjectLocator) -> Result<ObjectAttributes> {
        let response = self
            .inner
            .head_object()
            .bucket(&locator.bucket)
            .key(&locator.key)
            .send()
            .await
            .map_err(|e| classify(e, &locator.to_string()))?;

        let size = response.content_length().unwrap_or(0);
        let mut attrs = ObjectAttributes::object(&locator.bucket, &locator.key, size);

        if let Some(modified) = response.last_modified() {
            attrs.last_modified = jiff::Timestamp::from_second(modified.secs()).ok();
        }

        if let Some(etag) = response.e_tag() {
            attrs.etag = Some(etag.trim_matches('"').to_string());
        }

        if let Some(ct) = response.content_type() {
            attrs.content_type = Some(ct.to_string());
        }

        if let Some(sc) = response.storage_class() {
            attrs.storage_class = Some(sc.as_str().to_string());
        }

        Ok(attrs)
    }

    async fn query(&self, query: &ListingQuery) -> Result<Vec<ObjectAttributes>> {
        let mut entries = Vec::new();
        let mut continuation_token: Option<String> = None;

        loop {
            let mut request = self
                .inner
                .list_objects_v2()
                .bucket(&query.bucket)
                .set_continuation_token(continuation_token.take());

            if !query.prefix.is_empty() {
                request = request.prefix(&query.prefix);
            }

            if !query.is_recursive() {
                request = request.delimiter(&query.delimiter);
            }

            let response = request.send().await.map_err(|e| Error::Listing {
                bucket: query.bucket.clone(),
                prefix: query.prefix.clone(),
                message: error_message(&e),
            })?;

            // Add common prefixes (directories)
            for prefix in response.common_prefixes() {
                if let Some(p) = prefix.prefix() {
                    entries.push(ObjectAttributes::prefix(&query.bucket, p));
                }
            }

            // Add objects
            for object in response.contents() {
                let key = object.key().unwrap_or_default();
                let mut attrs =
                    ObjectAttributes::object(&query.bucket, key, object.size().unwrap_or(0));

                if let Some(modified) = object.last_modified() {
                    attrs.last_modified = jiff::Timestamp::from_second(modified.secs()).ok();
                }

                if let Some(etag) = object.e_tag() {
                    attrs.etag = Some(etag.trim_matches('"').to_string());
                }

                if let Some(sc) = object.storage_class() {
                    attrs.storage_class = Some(sc.as_str().to_string());
                }

                entries.push(attrs);
            }

            match response.next_continuation_token() {
                Some(token) if response.is_truncated().unwrap_or(false) => {
                    continuation_token = Some(token.to_string());
                }
                _ => break,
            }
        }

        tracing::debug!(
            bucket = %query.bucket,
            prefix = %query.prefix,
            entries = entries.len(),
            "listing complete"
        );
        Ok(entries)
    }

    async fn copy_object(&self, src: &ObjectLocator, dst: &ObjectLocator) -> Result<()> {
        self.inner
            .copy_object()
            .copy_source(copy_source(src))
            .bucket(&dst.bucket)
            .key(&dst.key)
            .send()
            .await
            .map_err(|e| classify(e, &src.to_string()))?;

        Ok(())
    }

    async fn reader(&self, locator: &ObjectLocator) -> Result<ObjectReader> {
        let response = self
            .inner
            .get_object()
            .bucket(&locator.bucket)
            .key(&locator.key)
            .send()
            .await
            .map_err(|e| match classify(e, &locator.to_string()) {
                Error::Network(message) => Error::RemoteRead {
                    object: locator.to_string(),
                    message,
                },
                other => other,
            })?;

        Ok(ObjectReader::new(
            locator.clone(),
            response.body.into_async_read(),
        ))
    }

    async fn writer(&self, locator: &ObjectLocator) -> Result<Box<dyn ObjectSink>> {
        Ok(Box::new(S3Writer::new(
            self.inner.clone(),
            locator.clone(),
            &self.multipart,
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aws_sdk_s3::Client;
    use aws_sdk_s3::error::ErrorMetadata;
    use aws_sdk_s3::operation::copy_object::CopyObjectOutput;
    use aws_sdk_s3::operation::head_object::HeadObjectError;
    use aws_sdk_s3::operation::list_objects_v2::{ListObjectsV2Error, ListObjectsV2Output};
    use aws_sdk_s3::types::{CommonPrefix, Object};
    use aws_smithy_mocks::{RuleMode, mock, mock_client};

    fn mocked_store(client: Client) -> S3Store {
        S3Store {
            inner: client,
            multipart: MultipartConfig::default(),
        }
    }

    fn first_page() -> ListObjectsV2Output {
        ListObjectsV2Output::builder()
            .common_prefixes(CommonPrefix::builder().prefix("logs/2024/").build())
            .contents(Object::builder().key("logs/a.txt").size(3).build())
            .is_truncated(true)
            .next_continuation_token("page-2")
            .build()
    }

    #[test]
    fn test_copy_source_plain_key() {
        let src = ObjectLocator::new("logs", "2024/01/app.log");
        assert_eq!(copy_source(&src), "logs/2024/01/app.log");
    }

    #[test]
    fn test_copy_source_encodes_segments() {
        let src = ObjectLocator::new("logs", "my dir/a?b#c.txt");
        assert_eq!(copy_source(&src), "logs/my%20dir/a%3Fb%23c.txt");

        let src = ObjectLocator::new("logs", "caf\u{e9}/r+s.txt");
        assert_eq!(copy_source(&src), "logs/caf%C3%A9/r%2Bs.txt");
    }

    #[test]
    fn test_copy_source_keeps_dot_segments() {
        let cases = [
            ("a/../b.txt", "logs/a/../b.txt"),
            ("a/./b.txt", "logs/a/./b.txt"),
            ("x/..", "logs/x/.."),
            ("a//b", "logs/a//b"),
        ];
        for (key, expected) in cases {
            assert_eq!(copy_source(&ObjectLocator::new("logs", key)), expected);
        }
    }

    #[tokio::test]
    async fn test_copy_object_sends_exact_source() {
        let copy = mock!(Client::copy_object)
            .match_requests(|req| {
                req.copy_source() == Some("src/a/../b.txt")
                    && req.bucket() == Some("dst")
                    && req.key() == Some("y")
            })
            .then_output(|| CopyObjectOutput::builder().build());
        let store = mocked_store(mock_client!(aws_sdk_s3, RuleMode::MatchAny, [&copy]));

        store
            .copy_object(
                &ObjectLocator::new("src", "a/../b.txt"),
                &ObjectLocator::new("dst", "y"),
            )
            .await
            .unwrap();
        assert_eq!(copy.num_calls(), 1);
    }

    #[tokio::test]
    async fn test_query_follows_continuation_tokens() {
        let page_1 = mock!(Client::list_objects_v2)
            .match_requests(|req| {
                req.continuation_token().is_none()
                    && req.prefix() == Some("logs/")
                    && req.delimiter() == Some("/")
            })
            .then_output(first_page);
        let page_2 = mock!(Client::list_objects_v2)
            .match_requests(|req| req.continuation_token() == Some("page-2"))
            .then_output(|| {
                ListObjectsV2Output::builder()
                    .contents(Object::builder().key("logs/b.txt").size(5).build())
                    .is_truncated(false)
                    .build()
            });
        let store = mocked_store(mock_client!(
            aws_sdk_s3,
            RuleMode::MatchAny,
            [&page_1, &page_2]
        ));

        let entries = store
            .query(&ListingQuery::direct_children("bucket", "logs"))
            .await
            .unwrap();
        let paths: Vec<String> = entries.iter().map(ObjectAttributes::path).collect();
        assert_eq!(paths, vec!["logs/2024", "logs/a.txt", "logs/b.txt"]);
        assert!(entries[0].is_prefix());
        assert_eq!(entries[2].size_bytes, Some(5));
        assert_eq!(page_1.num_calls(), 1);
        assert_eq!(page_2.num_calls(), 1);
    }

    #[tokio::test]
    async fn test_query_recursive_sends_no_delimiter() {
        let page = mock!(Client::list_objects_v2)
            .match_requests(|req| req.delimiter().is_none() && req.prefix().is_none())
            .then_output(|| {
                ListObjectsV2Output::builder()
                    .contents(Object::builder().key("a/b/c.txt").size(1).build())
                    .build()
            });
        let store = mocked_store(mock_client!(aws_sdk_s3, RuleMode::MatchAny, [&page]));

        let entries = store
            .query(&ListingQuery::recursive("bucket", ""))
            .await
            .unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].path(), "a/b/c.txt");
    }

    #[tokio::test]
    async fn test_query_failure_on_later_page_discards_results() {
        let page_1 = mock!(Client::list_objects_v2)
            .match_requests(|req| req.continuation_token().is_none())
            .then_output(first_page);
        let page_2 = mock!(Client::list_objects_v2)
            .match_requests(|req| req.continuation_token() == Some("page-2"))
            .then_error(|| {
                ListObjectsV2Error::generic(
                    ErrorMetadata::builder()
                        .code("NoSuchBucket")
                        .message("bucket removed during listing")
                        .build(),
                )
            });
        let store = mocked_store(mock_client!(
            aws_sdk_s3,
            RuleMode::MatchAny,
            [&page_1, &page_2]
        ));

        let err = store
            .query(&ListingQuery::direct_children("bucket", "logs"))
            .await
            .unwrap_err();
        match &err {
            Error::Listing { bucket, prefix, .. } => {
                assert_eq!(bucket, "bucket");
                assert_eq!(prefix, "logs/");
            }
            other => panic!("expected listing error, got {other:?}"),
        }
        assert!(!err.is_retryable());
        assert_eq!(page_2.num_calls(), 1);
    }

    #[tokio::test]
    async fn test_attributes_classifies_service_errors() {
        let missing = mock!(Client::head_object)
            .match_requests(|req| req.key() == Some("missing"))
            .then_error(|| {
                HeadObjectError::generic(ErrorMetadata::builder().code("NoSuchKey").build())
            });
        let denied = mock!(Client::head_object)
            .match_requests(|req| req.key() == Some("secret"))
            .then_error(|| {
                HeadObjectError::generic(ErrorMetadata::builder().code("AccessDenied").build())
            });
        let store = mocked_store(mock_client!(
            aws_sdk_s3,
            RuleMode::MatchAny,
            [&missing, &denied]
        ));

        let err = store
            .attributes(&ObjectLocator::new("bucket", "missing"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));

        let err = store
            .attributes(&ObjectLocator::new("bucket", "secret"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Auth(_)));
    }

    #[tokio::test]
    async fn test_store_rejects_invalid_credentials() {
        let creds = Credentials::new("", "secret");
        assert!(matches!(
            S3Store::new(creds).await,
            Err(Error::Credentials(_))
        ));
    }

    #[tokio::test]
    async fn test_store_builds_without_network() {
        let creds = Credentials::new("access", "secret").with_endpoint("http://127.0.0.1:9");
        let store = S3Store::new(creds)
            .await
            .unwrap()
            .with_multipart(MultipartConfig::new().part_size(0));
        assert_eq!(store.multipart.part_size, crate::multipart::MIN_PART_SIZE);
    }

    #[tokio::test]
    async fn test_authenticate_missing_file() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let result = authenticate(temp_dir.path().join("missing.toml")).await;
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
