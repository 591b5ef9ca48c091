//! EPUB ingestion
//!
//! Runs the blocking stages (container, package, conversion) on the
//! blocking pool, publishes the blobs and records the book.

mod pipeline;
mod publisher;

#[cfg(test)]
pub(crate) mod testing;

pub use pipeline::{run, IngestionResult};
pub use publisher::{cover_key, epub_key, text_key, ArtifactPublisher};

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use sqlx::SqlitePool;
use thiserror::Error;
use uuid::Uuid;

use crate::db::{Ebook, EbookRepository, NewEbook};
use crate::epub::{BookMetadata, EpubError};
use crate::storage::BlobStore;

/// The only failure message shown to uploaders
pub const USER_MESSAGE: &str = "Failed to process EPUB file. Please try again.";

#[derive(Error, Debug)]
pub enum IngestError {
    #[error("Invalid archive: {0}")]
    InvalidArchive(String),

    #[error("Invalid package: {0}")]
    InvalidPackage(String),

    #[error("Failed to write {key}: {reason}")]
    StorageWrite { key: String, reason: String },

    #[error("Failed to save record: {0}")]
    Record(String),

    #[error("Ingestion task failed: {0}")]
    Task(String),
}

impl IngestError {
    /// Message safe to show to the uploader, whatever the cause
    pub fn user_message(&self) -> &'static str {
        USER_MESSAGE
    }
}

impl From<EpubError> for IngestError {
    fn from(e: EpubError) -> Self {
        if e.is_invalid_package() {
            IngestError::InvalidPackage(e.to_string())
        } else {
            IngestError::InvalidArchive(e.to_string())
        }
    }
}

/// Generate a new book id (UUID v4, no hyphens)
pub fn new_book_id() -> String {
    Uuid::new_v4().simple().to_string()
}

/// A successfully ingested book
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestedBook {
    pub ebook: Ebook,
    pub metadata: BookMetadata,
    pub block_count: usize,
}

impl IngestedBook {
    pub fn has_cover(&self) -> bool {
        self.metadata.cover_path.is_some()
    }
}

/// Ingestion entry point used by the upload route
#[derive(Clone)]
pub struct IngestService {
    publisher: ArtifactPublisher,
    db: SqlitePool,
}

impl IngestService {
    pub fn new(store: Arc<dyn BlobStore>, db: SqlitePool, write_timeout: Duration) -> Self {
        Self {
            publisher: ArtifactPublisher::new(store, write_timeout),
            db,
        }
    }

    /// Ingest an uploaded archive under a fresh id
    pub async fn ingest(&self, archive: Vec<u8>) -> Result<IngestedBook, IngestError> {
        let id = new_book_id();
        let started = Instant::now();
        let size = archive.len();

        tracing::info!(id = %id, size = size, "Ingesting EPUB");

        let task_id = id.clone();
        let result = tokio::task::spawn_blocking(move || run(task_id, archive))
            .await
            .map_err(|e| IngestError::Task(e.to_string()))??;

        let block_count = result.text.block_count();
        let metadata = self.publisher.publish(result).await?;

        let ebook = EbookRepository::new(&self.db)
            .create(&NewEbook {
                id: id.clone(),
                title: metadata.title.clone(),
                authors: metadata.creator.clone(),
            })
            .await
            .map_err(|e| IngestError::Record(e.to_string()))?;

        tracing::info!(
            id = %id,
            title = %ebook.title,
            blocks = block_count,
            has_cover = metadata.cover_path.is_some(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Ingested EPUB"
        );

        Ok(IngestedBook {
            ebook,
            metadata,
            block_count,
        })
    }
}
