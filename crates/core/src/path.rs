//! Object paths
//!
//! Object keys are plain `/`-separated strings. The store has no real
//! directories: a "directory" is a key prefix ending in a separator, and
//! listings reconstruct paths by joining a prefix and a name. The helpers
//! here keep that string handling in one place.

use crate::error::{Error, Result};

/// Separator used by object keys
pub const SEPARATOR: char = '/';

/// Optional scheme accepted in front of `bucket/key` strings
const SCHEME: &str = "s3://";

/// A (bucket, key) pair addressing one stored object
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjectLocator {
    /// Bucket name
    pub bucket: String,
    /// Object key (empty for bucket root)
    pub key: String,
}

impl ObjectLocator {
    /// Create a new ObjectLocator
    pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
        }
    }

    /// Parse `bucket[/key]`, with an optional `s3://` scheme
    pub fn parse(path: &str) -> Result<Self> {
        let path = path.strip_prefix(SCHEME).unwrap_or(path);
        if path.is_empty() {
            return Err(Error::InvalidPath("Path cannot be empty".into()));
        }

        let (bucket, key) = path.split_once(SEPARATOR).unwrap_or((path, ""));
        if bucket.is_empty() {
            return Err(Error::InvalidPath("Bucket name cannot be empty".into()));
        }

        Ok(Self::new(bucket, key))
    }

    /// Parse `bucket/key` where the key must name an object
    pub fn parse_object(path: &str) -> Result<Self> {
        let locator = Self::parse(path)?;
        if locator.key.is_empty() {
            return Err(Error::InvalidPath(format!(
                "'{path}' has no object key. Expected: bucket/key"
            )));
        }
        Ok(locator)
    }

    /// Base name of the key (last non-empty segment)
    pub fn file_name(&self) -> Option<&str> {
        self.key
            .trim_end_matches(SEPARATOR)
            .rsplit(SEPARATOR)
            .next()
            .filter(|s| !s.is_empty())
    }
}

impl std::fmt::Display for ObjectLocator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.key.is_empty() {
            write!(f, "{}", self.bucket)
        } else {
            write!(f, "{}/{}", self.bucket, self.key)
        }
    }
}

/// Turn a directory-like path into a listing prefix.
///
/// Trailing spaces and separators are trimmed and exactly one separator is
/// appended, so `foo` lists `foo/...` and never the sibling `foobar/...`.
/// A path that trims to nothing is the bucket root and yields an empty prefix.
pub fn dir_prefix(path: &str) -> String {
    let trimmed = path.trim_end_matches([' ', SEPARATOR]);
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("{trimmed}{SEPARATOR}")
    }
}

/// Join a listing prefix and an object name into one path.
///
/// Empty elements are ignored; if both are empty the result is empty.
/// Otherwise the joined string is passed through [`clean_object_path`].
pub fn join_object_path(prefix: &str, name: &str) -> String {
    let parts: Vec<&str> = [prefix, name].into_iter().filter(|p| !p.is_empty()).collect();
    if parts.is_empty() {
        return String::new();
    }
    clean_object_path(&parts.join("/"))
}

/// Lexically normalize a `/`-separated path.
///
/// Repeated separators collapse, `.` segments are dropped, `..` removes the
/// preceding segment (or is dropped at the root of a rooted path), and any
/// trailing separator is removed. An empty result becomes `.`.
pub fn clean_object_path(path: &str) -> String {
    if path.is_empty() {
        return ".".to_string();
    }

    let rooted = path.starts_with(SEPARATOR);
    let mut segments: Vec<&str> = Vec::new();

    for segment in path.split(SEPARATOR) {
        match segment {
            "" | "." => {}
            ".." => {
                if segments.last().is_some_and(|s| *s != "..") {
                    segments.pop();
                } else if !rooted {
                    segments.push("..");
                }
            }
            s => segments.push(s),
        }
    }

    let body = segments.join("/");
    match (rooted, body.is_empty()) {
        (true, _) => format!("/{body}"),
        (false, true) => ".".to_string(),
        (false, false) => body,
    }
}
