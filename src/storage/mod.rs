//! Blob storage for ingested books
//!
//! Every book is stored as keyed blobs (`<id>.epub`, `<id>.txt`,
//! `<id>.cover`). Backends: S3-compatible services (MinIO, Cloudflare R2,
//! Backblaze B2, AWS S3) and a local directory.

mod local;
mod s3_client;
mod types;

pub use local::LocalBlobStore;
pub use s3_client::S3Client;
pub use types::*;

use async_trait::async_trait;

use crate::error::StorageError;

/// Key/value byte store used by the ingestion pipeline and asset routes
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store `data` under `key`, replacing any existing blob
    async fn put(&self, key: &str, data: Vec<u8>, content_type: &str) -> Result<(), StorageError>;

    /// Fetch the blob stored under `key`
    async fn get(&self, key: &str) -> Result<StoredBlob, StorageError>;
}
