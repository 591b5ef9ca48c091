//! Application state management

use std::sync::Arc;

use sqlx::SqlitePool;

use crate::config::Config;
use crate::ingest::IngestService;
use crate::storage::BlobStore;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: Config,
    blobs: Arc<dyn BlobStore>,
    db: SqlitePool,
    ingest: IngestService,
}

impl AppState {
    pub fn new(config: Config, blobs: Arc<dyn BlobStore>, db: SqlitePool) -> Self {
        let ingest = IngestService::new(
            blobs.clone(),
            db.clone(),
            config.ingest.blob_write_timeout(),
        );

        Self {
            inner: Arc::new(AppStateInner {
                config,
                blobs,
                db,
                ingest,
            }),
        }
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// Get the blob store
    pub fn blobs(&self) -> &dyn BlobStore {
        self.inner.blobs.as_ref()
    }

    /// Get the database pool
    pub fn db(&self) -> &SqlitePool {
        &self.inner.db
    }

    /// Get the ingestion service
    pub fn ingest(&self) -> &IngestService {
        &self.inner.ingest
    }
}
