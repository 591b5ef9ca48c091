//! Local filesystem blob store

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use uuid::Uuid;

use super::{guess_content_type, BlobStore, StoredBlob};
use crate::error::StorageError;

/// Blob store backed by a single directory.
///
/// Content types are not persisted; they are guessed from the key on read.
#[derive(Debug, Clone)]
pub struct LocalBlobStore {
    base_path: PathBuf,
}

impl LocalBlobStore {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn blob_path(&self, key: &str) -> Result<PathBuf, StorageError> {
        if key.is_empty() || key.contains(['/', '\\']) || key.starts_with('.') {
            return Err(StorageError::InvalidKey(key.to_string()));
        }
        Ok(self.base_path.join(key))
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn put(&self, key: &str, data: Vec<u8>, _content_type: &str) -> Result<(), StorageError> {
        let path = self.blob_path(key)?;
        tokio::fs::create_dir_all(&self.base_path).await?;

        // Write then rename so readers never see a partial blob
        let temp_path = self.base_path.join(format!(".{}.{}.tmp", key, Uuid::new_v4()));
        tokio::fs::write(&temp_path, &data).await?;
        if let Err(e) = tokio::fs::rename(&temp_path, &path).await {
            let _ = tokio::fs::remove_file(&temp_path).await;
            return Err(e.into());
        }

        tracing::debug!(key = %key, size = data.len(), "Stored blob");
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<StoredBlob, StorageError> {
        let path = self.blob_path(key)?;
        let data = match tokio::fs::read(&path).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StorageError::ObjectNotFound(key.to_string()))
            }
            Err(e) => return Err(e.into()),
        };

        Ok(StoredBlob {
            data,
            content_type: guess_content_type(key),
        })
    }
}
