//! bk-s3: S3 SDK adapter for bucketkit
//!
//! This crate provides the implementation of the ObjectStore trait
//! using the aws-sdk-s3 crate, plus `authenticate`, the entry point that
//! turns a credentials file into a ready StorageClient. It is the only
//! crate that directly depends on the AWS SDK.

pub mod client;
pub mod multipart;

pub use client::{S3Store, authenticate};
pub use multipart::{MultipartConfig, S3Writer};
