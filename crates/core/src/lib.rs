//! bk-core: Core library for bucketkit
//!
//! This crate provides the SDK-independent parts of bucketkit:
//! - Object locators and listing path semantics
//! - The ObjectStore backend trait
//! - StorageClient, the operations callers use
//! - Credentials file loading
//! - An in-memory backend
//!
//! Backends for real services live in their own crates, so this one can be
//! tested without network access.

pub mod client;
pub mod credentials;
pub mod error;
pub mod memory;
pub mod path;
pub mod traits;

pub use client::StorageClient;
pub use credentials::{Credentials, CredentialsFile, TimeoutConfig, default_credentials_path};
pub use error::{Error, Result};
pub use memory::MemoryStore;
pub use path::{ObjectLocator, clean_object_path, dir_prefix, join_object_path};
pub use traits::{ListingQuery, ObjectAttributes, ObjectReader, ObjectSink, ObjectStore};
