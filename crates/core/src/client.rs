//! Storage client
//!
//! [`StorageClient`] is the handle callers hold after authenticating. It owns
//! one backend behind an `Arc` and turns the backend primitives into the
//! convenience operations: existence checks, the two listing modes, copy,
//! download, upload and whole-object reads.
//!
//! No operation retries. Every open stream (local file, remote reader,
//! remote writer) is released on every exit path.

use std::path::Path;
use std::sync::Arc;

use tokio::io::{AsyncReadExt, AsyncWriteExt};

use crate::error::{Error, Result};
use crate::path::ObjectLocator;
use crate::traits::{ListingQuery, ObjectAttributes, ObjectReader, ObjectStore};

/// Chunk size used when streaming between local files and the store
const CHUNK_SIZE: usize = 256 * 1024;

/// Authenticated handle over an object store backend
pub struct StorageClient<S: ?Sized> {
    store: Arc<S>,
}

impl<S: ?Sized> Clone for StorageClient<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: ObjectStore> StorageClient<S> {
    /// Wrap an already authenticated backend
    pub fn new(store: S) -> Self {
        Self {
            store: Arc::new(store),
        }
    }
}

impl<S: ObjectStore + ?Sized> StorageClient<S> {
    /// Share an existing backend handle
    pub fn from_arc(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Get the underlying backend
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Check whether an object exists.
    ///
    /// Any failure of the metadata fetch counts as "does not exist":
    /// a missing object, a permission error and a network error all
    /// return `false`.
    pub async fn exists(&self, locator: &ObjectLocator) -> bool {
        match self.store.attributes(locator).await {
            Ok(_) => true,
            Err(e) => {
                tracing::debug!(object = %locator, error = %e, "existence check failed");
                false
            }
        }
    }

    /// Fetch object metadata
    pub async fn attributes(&self, locator: &ObjectLocator) -> Result<ObjectAttributes> {
        self.store.attributes(locator).await
    }

    /// List files and sub-directories directly under `path`.
    ///
    /// `path` is treated as a directory: `foo` lists `foo/...` and never the
    /// sibling `foobar/...`. Sub-directories are returned without a trailing
    /// separator.
    ///
    /// An iteration failure returns [`Error::Listing`]; it must not be retried.
    pub async fn list_direct_children(&self, bucket: &str, path: &str) -> Result<Vec<String>> {
        self.list(&ListingQuery::direct_children(bucket, path)).await
    }

    /// List every object under `path`, flattened, without directory entries
    pub async fn list_all(&self, bucket: &str, path: &str) -> Result<Vec<String>> {
        self.list(&ListingQuery::recursive(bucket, path)).await
    }

    async fn list(&self, query: &ListingQuery) -> Result<Vec<String>> {
        tracing::debug!(
            bucket = %query.bucket,
            prefix = %query.prefix,
            delimiter = %query.delimiter,
            "listing"
        );
        let entries = self.store.query(query).await?;
        Ok(entries.iter().map(ObjectAttributes::path).collect())
    }

    /// Server-side copy from `src` to `dst`, same or different bucket
    pub async fn copy(&self, src: &ObjectLocator, dst: &ObjectLocator) -> Result<()> {
        tracing::debug!(src = %src, dst = %dst, "copying object");
        self.store.copy_object(src, dst).await
    }

    /// Open a scoped reader after checking the object exists
    pub async fn open_reader(&self, locator: &ObjectLocator) -> Result<ObjectReader> {
        self.store.attributes(locator).await?;
        self.store.reader(locator).await
    }

    /// Read the whole object into memory
    pub async fn read(&self, locator: &ObjectLocator) -> Result<Vec<u8>> {
        let reader = self.open_reader(locator).await?;
        reader.read_all().await
    }

    /// Download an object into a local file.
    ///
    /// The object is checked before the local file is touched, so a missing
    /// object leaves no file behind. An existing local file is truncated.
    /// Returns the number of bytes written.
    pub async fn download(&self, src: &ObjectLocator, dst: impl AsRef<Path>) -> Result<u64> {
        let dst = dst.as_ref();
        self.store.attributes(src).await?;

        let mut file = tokio::fs::File::create(dst)
            .await
            .map_err(|source| Error::LocalOpen {
                path: dst.to_path_buf(),
                source,
            })?;

        let mut reader = self.store.reader(src).await?;
        let mut buf = vec![0u8; CHUNK_SIZE];
        let mut total = 0u64;

        loop {
            let n = reader.read(&mut buf).await.map_err(|e| Error::RemoteRead {
                object: src.to_string(),
                message: e.to_string(),
            })?;
            if n == 0 {
                break;
            }
            file.write_all(&buf[..n])
                .await
                .map_err(|source| Error::LocalWrite {
                    path: dst.to_path_buf(),
                    source,
                })?;
            total += n as u64;
        }

        file.flush().await.map_err(|source| Error::LocalWrite {
            path: dst.to_path_buf(),
            source,
        })?;

        tracing::debug!(src = %src, dst = %dst.display(), bytes = total, "downloaded object");
        Ok(total)
    }

    /// Upload a local file, creating or replacing the object.
    ///
    /// If reading or writing fails part way, the remote writer is aborted and
    /// no partial object is committed. A failure while closing the writer is
    /// returned like any other write failure. Returns the number of bytes sent.
    pub async fn upload(&self, dst: &ObjectLocator, src: impl AsRef<Path>) -> Result<u64> {
        let src = src.as_ref();
        let mut file = tokio::fs::File::open(src)
            .await
            .map_err(|source| Error::LocalOpen {
                path: src.to_path_buf(),
                source,
            })?;

        let mut writer = self.store.writer(dst).await?;
        let mut buf = vec![0u8; CHUNK_SIZE];
        let mut total = 0u64;

        let copied: Result<()> = async {
            loop {
                let n = file.read(&mut buf).await.map_err(|source| Error::LocalRead {
                    path: src.to_path_buf(),
                    source,
                })?;
                if n == 0 {
                    return Ok(());
                }
                writer.write(&buf[..n]).await?;
                total += n as u64;
            }
        }
        .await;

        if let Err(e) = copied {
            writer.abort().await;
            return Err(e);
        }

        if let Err(e) = writer.close().await {
            tracing::warn!(dst = %dst, error = %e, "closing object writer failed");
            return Err(e);
        }

        tracing::debug!(src = %src.display(), dst = %dst, bytes = total, "uploaded object");
        Ok(total)
    }
}
