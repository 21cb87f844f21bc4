//! In-memory object store
//!
//! Keeps objects in ordered maps and answers listing queries with the same
//! prefix/delimiter semantics as the remote store. Used by the test suites
//! and by callers that need a store without a network.

use std::collections::{BTreeMap, BTreeSet};
use std::ops::Bound;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::error::{Error, Result};
use crate::path::ObjectLocator;
use crate::traits::{ListingQuery, ObjectAttributes, ObjectReader, ObjectSink, ObjectStore};

#[derive(Debug, Clone)]
struct StoredObject {
    data: Arc<Vec<u8>>,
    last_modified: jiff::Timestamp,
}

impl StoredObject {
    fn new(data: Vec<u8>) -> Self {
        Self {
            data: Arc::new(data),
            last_modified: jiff::Timestamp::now(),
        }
    }

    fn attributes(&self, bucket: &str, key: &str) -> ObjectAttributes {
        let mut attrs = ObjectAttributes::object(bucket, key, self.data.len() as i64);
        attrs.last_modified = Some(self.last_modified);
        attrs
    }
}

type Buckets = BTreeMap<String, BTreeMap<String, StoredObject>>;

/// Object store backed by process memory
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    buckets: Arc<RwLock<Buckets>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store an object directly, replacing any existing one
    pub fn insert(&self, bucket: &str, key: &str, data: Vec<u8>) {
        let mut buckets = self.buckets.write();
        buckets
            .entry(bucket.to_string())
            .or_default()
            .insert(key.to_string(), StoredObject::new(data));
    }

    /// Number of objects in a bucket
    pub fn len(&self, bucket: &str) -> usize {
        let buckets = self.buckets.read();
        buckets.get(bucket).map_or(0, BTreeMap::len)
    }

    pub fn is_empty(&self, bucket: &str) -> bool {
        self.len(bucket) == 0
    }

    fn get(&self, locator: &ObjectLocator) -> Result<StoredObject> {
        let buckets = self.buckets.read();
        buckets
            .get(&locator.bucket)
            .and_then(|objects| objects.get(&locator.key))
            .cloned()
            .ok_or_else(|| Error::NotFound(locator.to_string()))
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn attributes(&self, locator: &ObjectLocator) -> Result<ObjectAttributes> {
        let object = self.get(locator)?;
        Ok(object.attributes(&locator.bucket, &locator.key))
    }

    async fn query(&self, query: &ListingQuery) -> Result<Vec<ObjectAttributes>> {
        let buckets = self.buckets.read();
        let Some(objects) = buckets.get(&query.bucket) else {
            return Ok(Vec::new());
        };

        let mut entries = Vec::new();
        let mut seen_prefixes = BTreeSet::new();

        let from: (Bound<&str>, Bound<&str>) =
            (Bound::Included(query.prefix.as_str()), Bound::Unbounded);
        for (key, object) in objects.range::<str, _>(from) {
            let Some(rest) = key.strip_prefix(&query.prefix) else {
                break;
            };

            if !query.delimiter.is_empty() {
                if let Some(idx) = rest.find(&query.delimiter) {
                    let common = format!(
                        "{}{}",
                        query.prefix,
                        &rest[..idx + query.delimiter.len()]
                    );
                    if seen_prefixes.insert(common.clone()) {
                        entries.push(ObjectAttributes::prefix(&query.bucket, common));
                    }
                    continue;
                }
            }

            entries.push(object.attributes(&query.bucket, key));
        }

        Ok(entries)
    }

    async fn copy_object(&self, src: &ObjectLocator, dst: &ObjectLocator) -> Result<()> {
        let object = self.get(src)?;
        let mut buckets = self.buckets.write();
        buckets.entry(dst.bucket.clone()).or_default().insert(
            dst.key.clone(),
            StoredObject {
                data: object.data,
                last_modified: jiff::Timestamp::now(),
            },
        );
        Ok(())
    }

    async fn reader(&self, locator: &ObjectLocator) -> Result<ObjectReader> {
        let object = self.get(locator)?;
        let cursor = std::io::Cursor::new(object.data.as_ref().clone());
        Ok(ObjectReader::new(locator.clone(), cursor))
    }

    async fn writer(&self, locator: &ObjectLocator) -> Result<Box<dyn ObjectSink>> {
        Ok(Box::new(MemoryWriter {
            store: self.clone(),
            locator: locator.clone(),
            buffer: Vec::new(),
        }))
    }
}

struct MemoryWriter {
    store: MemoryStore,
    locator: ObjectLocator,
    buffer: Vec<u8>,
}

#[async_trait]
impl ObjectSink for MemoryWriter {
    async fn write(&mut self, buf: &[u8]) -> Result<()> {
        self.buffer.extend_from_slice(buf);
        Ok(())
    }

    async fn close(self: Box<Self>) -> Result<()> {
        let MemoryWriter {
            store,
            locator,
            buffer,
        } = *self;
        store.insert(&locator.bucket, &locator.key, buffer);
        Ok(())
    }

    async fn abort(self: Box<Self>) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> MemoryStore {
        let store = MemoryStore::new();
        store.insert("b", "a/1", b"one".to_vec());
        store.insert("b", "a/x/2", b"two".to_vec());
        store.insert("b", "ab/3", b"three".to_vec());
        store
    }

    fn paths(entries: &[ObjectAttributes]) -> Vec<String> {
        entries.iter().map(ObjectAttributes::path).collect()
    }

    #[tokio::test]
    async fn test_query_with_delimiter() {
        let entries = store()
            .query(&ListingQuery::direct_children("b", "a"))
            .await
            .unwrap();
        assert_eq!(paths(&entries), vec!["a/1", "a/x"]);
        assert!(entries[1].is_prefix());
    }

    #[tokio::test]
    async fn test_query_without_delimiter() {
        let query = ListingQuery {
            bucket: "b".into(),
            prefix: "a".into(),
            delimiter: String::new(),
        };
        let entries = store().query(&query).await.unwrap();
        assert_eq!(paths(&entries), vec!["a/1", "a/x/2", "ab/3"]);
    }

    #[tokio::test]
    async fn test_query_prefix_skips_neighbouring_keys() {
        let store = store();
        store.insert("b", "0-before", b"x".to_vec());
        store.insert("b", "z-after", b"x".to_vec());
        store.insert("b", "a", b"bare".to_vec());

        let entries = store
            .query(&ListingQuery::recursive("b", "a/x"))
            .await
            .unwrap();
        assert_eq!(paths(&entries), vec!["a/x/2"]);

        let entries = store
            .query(&ListingQuery::direct_children("b", "ab"))
            .await
            .unwrap();
        assert_eq!(paths(&entries), vec!["ab/3"]);
    }

    #[tokio::test]
    async fn test_attributes() {
        let attrs = store()
            .attributes(&ObjectLocator::new("b", "ab/3"))
            .await
            .unwrap();
        assert_eq!(attrs.size_bytes, Some(5));
        assert!(attrs.last_modified.is_some());

        let err = store()
            .attributes(&ObjectLocator::new("b", "ab"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn test_aborted_writer_stores_nothing() {
        let store = MemoryStore::new();
        let mut writer = store.writer(&ObjectLocator::new("b", "k")).await.unwrap();
        writer.write(b"partial").await.unwrap();
        writer.abort().await;
        assert!(store.is_empty("b"));
    }

    #[tokio::test]
    async fn test_writer_commits_on_close() {
        let store = MemoryStore::new();
        let mut writer = store.writer(&ObjectLocator::new("b", "k")).await.unwrap();
        writer.write(b"hello ").await.unwrap();
        writer.write(b"world").await.unwrap();
        assert!(store.is_empty("b"));
        writer.close().await.unwrap();
        assert_eq!(store.len("b"), 1);
    }
}
