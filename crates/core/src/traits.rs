//! ObjectStore trait definition
//!
//! This trait defines the primitives a storage backend has to provide.
//! Everything else (existence checks, listing modes, transfers) is built
//! on top of it in [`crate::client`], so the operations can be tested
//! against a mock or the in-memory backend.

use std::fmt;
use std::pin::Pin;
use std::task::{Context, Poll};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt, ReadBuf};

use crate::error::{Error, Result};
use crate::path::{ObjectLocator, dir_prefix, join_object_path};

/// Metadata for an object or a prefix entry from a delimiter listing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectAttributes {
    /// Bucket the entry belongs to
    pub bucket: String,

    /// Object key (empty for prefix entries)
    pub name: String,

    /// Common prefix (set only for prefix entries)
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub prefix: String,

    /// Size in bytes (None for prefix entries)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size_bytes: Option<i64>,

    /// Human-readable size
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size_human: Option<String>,

    /// Last modified timestamp
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<jiff::Timestamp>,

    /// ETag (usually MD5 for single-part uploads)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,

    /// Content type
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,

    /// Storage class
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage_class: Option<String>,
}

impl ObjectAttributes {
    /// Create attributes for a stored object
    pub fn object(bucket: impl Into<String>, name: impl Into<String>, size: i64) -> Self {
        Self {
            bucket: bucket.into(),
            name: name.into(),
            prefix: String::new(),
            size_bytes: Some(size),
            size_human: Some(humansize::format_size(size.max(0) as u64, humansize::BINARY)),
            last_modified: None,
            etag: None,
            content_type: None,
            storage_class: None,
        }
    }

    /// Create a prefix entry (a "directory" in a delimiter listing)
    pub fn prefix(bucket: impl Into<String>, prefix: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            name: String::new(),
            prefix: prefix.into(),
            size_bytes: None,
            size_human: None,
            last_modified: None,
            etag: None,
            content_type: None,
            storage_class: None,
        }
    }

    /// Whether this entry is a prefix rather than an object
    pub fn is_prefix(&self) -> bool {
        self.name.is_empty() && !self.prefix.is_empty()
    }

    /// Path of the entry as reported by listings
    pub fn path(&self) -> String {
        join_object_path(&self.prefix, &self.name)
    }
}

/// A prefix/delimiter listing request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingQuery {
    /// Bucket to list
    pub bucket: String,

    /// Only keys starting with this prefix are returned
    pub prefix: String,

    /// Empty lists everything under the prefix; `/` stops at the next level
    pub delimiter: String,
}

impl ListingQuery {
    /// Files and sub-prefixes directly under `path`
    pub fn direct_children(bucket: impl Into<String>, path: &str) -> Self {
        Self {
            bucket: bucket.into(),
            prefix: dir_prefix(path),
            delimiter: "/".to_string(),
        }
    }

    /// Every object under `path`, flattened
    pub fn recursive(bucket: impl Into<String>, path: &str) -> Self {
        Self {
            bucket: bucket.into(),
            prefix: dir_prefix(path),
            delimiter: String::new(),
        }
    }

    pub fn is_recursive(&self) -> bool {
        self.delimiter.is_empty()
    }
}

/// Scoped read stream over a remote object.
///
/// The underlying connection is released when the reader is dropped.
pub struct ObjectReader {
    locator: ObjectLocator,
    inner: Pin<Box<dyn AsyncRead + Send>>,
}

impl ObjectReader {
    pub fn new(locator: ObjectLocator, inner: impl AsyncRead + Send + 'static) -> Self {
        Self {
            locator,
            inner: Box::pin(inner),
        }
    }

    /// Object this reader streams
    pub fn locator(&self) -> &ObjectLocator {
        &self.locator
    }

    /// Buffer the remaining content in memory, consuming the reader
    pub async fn read_all(mut self) -> Result<Vec<u8>> {
        let mut data = Vec::new();
        self.read_to_end(&mut data)
            .await
            .map_err(|e| Error::RemoteRead {
                object: self.locator.to_string(),
                message: e.to_string(),
            })?;
        Ok(data)
    }
}

impl AsyncRead for ObjectReader {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        self.get_mut().inner.as_mut().poll_read(cx, buf)
    }
}

impl fmt::Debug for ObjectReader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectReader")
            .field("locator", &self.locator)
            .finish_non_exhaustive()
    }
}

/// Write stream into a remote object.
///
/// Nothing is visible in the store until `close` succeeds. `abort` releases
/// the stream without creating the object.
#[async_trait]
pub trait ObjectSink: Send {
    /// Append bytes to the object
    async fn write(&mut self, buf: &[u8]) -> Result<()>;

    /// Commit the object
    async fn close(self: Box<Self>) -> Result<()>;

    /// Discard everything written so far
    async fn abort(self: Box<Self>);
}

/// Trait for object storage backends
///
/// This trait is implemented by the S3 adapter and the in-memory store,
/// and can be mocked for testing.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Fetch object metadata
    async fn attributes(&self, locator: &ObjectLocator) -> Result<ObjectAttributes>;

    /// Run a listing query, draining every result page.
    ///
    /// A failure on any page returns [`Error::Listing`].
    async fn query(&self, query: &ListingQuery) -> Result<Vec<ObjectAttributes>>;

    /// Server-side copy, possibly across buckets
    async fn copy_object(&self, src: &ObjectLocator, dst: &ObjectLocator) -> Result<()>;

    /// Open a read stream over an object
    async fn reader(&self, locator: &ObjectLocator) -> Result<ObjectReader>;

    /// Open a write stream that creates or replaces an object
    async fn writer(&self, locator: &ObjectLocator) -> Result<Box<dyn ObjectSink>>;
}
