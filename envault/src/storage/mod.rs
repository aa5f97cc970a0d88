//! Object storage for archived envelope documents.
//!
//! The core depends on the [`ObjectStore`] trait. Production uses
//! [`S3ObjectStore`] against any S3-compatible endpoint (MinIO in
//! development); tests use [`memory::InMemoryObjectStore`].

pub mod memory;
pub mod s3;

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

/// Errors from object storage calls. Like provider errors, these abort the
/// current processing attempt and leave the event retriable.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("object store request failed: {0}")]
    Sdk(String),

    #[error("object not found: {bucket}/{key}")]
    NotFound { bucket: String, key: String },

    #[error("failed to presign URL: {0}")]
    Presign(String),
}

/// Capability interface for the document archive.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Create the bucket if it does not already exist. Idempotent.
    async fn ensure_bucket(&self, bucket: &str) -> Result<(), StorageError>;

    /// Upload an object, overwriting any existing object under the same
    /// key. Returns a `bucket/key` locator.
    async fn upload(&self, bucket: &str, key: &str, bytes: Bytes, content_type: &str) -> Result<String, StorageError>;

    async fn download(&self, bucket: &str, key: &str) -> Result<Bytes, StorageError>;

    async fn delete(&self, bucket: &str, key: &str) -> Result<(), StorageError>;

    /// Presigned GET URL valid for `ttl`.
    async fn presigned_url(&self, bucket: &str, key: &str, ttl: Duration) -> Result<String, StorageError>;
}

pub use memory::InMemoryObjectStore;
pub use s3::S3ObjectStore;
