//! Artifact publisher: writes the archive, text and cover blobs

use std::sync::Arc;
use std::time::Duration;

use crate::epub::BookMetadata;
use crate::storage::{BlobStore, DEFAULT_COVER_CONTENT_TYPE, EPUB_CONTENT_TYPE, TEXT_CONTENT_TYPE};

use super::pipeline::IngestionResult;
use super::IngestError;

pub fn epub_key(id: &str) -> String {
    format!("{}.epub", id)
}

pub fn text_key(id: &str) -> String {
    format!("{}.txt", id)
}

pub fn cover_key(id: &str) -> String {
    format!("{}.cover", id)
}

/// Publishes ingestion results to a blob store
#[derive(Clone)]
pub struct ArtifactPublisher {
    store: Arc<dyn BlobStore>,
    write_timeout: Duration,
}

impl ArtifactPublisher {
    pub fn new(store: Arc<dyn BlobStore>, write_timeout: Duration) -> Self {
        Self {
            store,
            write_timeout,
        }
    }

    /// Write `<id>.epub`, `<id>.txt` and `<id>.cover`, in that order.
    ///
    /// The first two are required and the first failure aborts. The cover
    /// is best effort. The returned metadata has its cover fields cleared
    /// unless the cover blob was stored.
    pub async fn publish(&self, result: IngestionResult) -> Result<BookMetadata, IngestError> {
        let IngestionResult {
            id,
            mut metadata,
            text,
            archive,
            cover,
        } = result;

        self.write(&epub_key(&id), archive, EPUB_CONTENT_TYPE).await?;
        self.write(&text_key(&id), text.into_string().into_bytes(), TEXT_CONTENT_TYPE)
            .await?;

        let stored = match cover {
            Some(bytes) => self.publish_cover(&id, &metadata, bytes).await,
            None => false,
        };
        if !stored {
            metadata.cover_path = None;
            metadata.cover_media_type = None;
        }

        Ok(metadata)
    }

    async fn publish_cover(&self, id: &str, metadata: &BookMetadata, bytes: Vec<u8>) -> bool {
        let content_type = metadata
            .cover_media_type
            .as_deref()
            .filter(|t| !t.is_empty())
            .unwrap_or(DEFAULT_COVER_CONTENT_TYPE);

        match self.write(&cover_key(id), bytes, content_type).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(id = %id, error = %e, "Cover upload failed, continuing without cover");
                false
            }
        }
    }

    async fn write(&self, key: &str, data: Vec<u8>, content_type: &str) -> Result<(), IngestError> {
        let size = data.len();
        match tokio::time::timeout(self.write_timeout, self.store.put(key, data, content_type)).await {
            Ok(Ok(())) => {
                tracing::debug!(key = %key, size = size, "Published blob");
                Ok(())
            }
            Ok(Err(e)) => Err(IngestError::StorageWrite {
                key: key.to_string(),
                reason: e.to_string(),
            }),
            Err(_) => Err(IngestError::StorageWrite {
                key: key.to_string(),
                reason: format!("timed out after {}s", self.write_timeout.as_secs_f64()),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::epub::fixtures::{sample_epub, EpubBuilder};
    use crate::ingest::pipeline::run;
    use crate::ingest::testing::RecordingStore;

    fn publisher(store: Arc<RecordingStore>) -> ArtifactPublisher {
        ArtifactPublisher::new(store, Duration::from_secs(5))
    }

    #[tokio::test]
    async fn test_publish_writes_all_blobs_in_order() {
        let store = Arc::new(RecordingStore::default());
        let bytes = sample_epub();
        let result = run("b1".to_string(), bytes.clone()).unwrap();
        let text = result.text.clone().into_string();

        let metadata = publisher(store.clone()).publish(result).await.unwrap();

        let writes = store.writes();
        let keys: Vec<_> = writes.iter().map(|w| w.0.as_str()).collect();
        assert_eq!(keys, ["b1.epub", "b1.txt", "b1.cover"]);

        assert_eq!(writes[0].1, bytes);
        assert_eq!(writes[0].2, "application/epub+zip");
        assert_eq!(writes[1].1, text.as_bytes());
        assert_eq!(writes[1].2, "text/plain; charset=utf-8");
        assert_eq!(writes[2].1, b"\xFF\xD8\xFFfake-jpeg");
        assert_eq!(writes[2].2, "image/jpeg");

        assert_eq!(metadata.cover_path.as_deref(), Some("OEBPS/images/cover.jpg"));
    }

    #[tokio::test]
    async fn test_epub_failure_aborts_before_text() {
        let store = Arc::new(RecordingStore::failing_on("b2.epub"));
        let result = run("b2".to_string(), sample_epub()).unwrap();

        let err = publisher(store.clone()).publish(result).await.unwrap_err();

        assert!(matches!(&err, IngestError::StorageWrite { key, .. } if key == "b2.epub"));
        assert!(store.writes().is_empty());
    }

    #[tokio::test]
    async fn test_text_failure_is_fatal() {
        let store = Arc::new(RecordingStore::failing_on("b3.txt"));
        let result = run("b3".to_string(), sample_epub()).unwrap();

        let err = publisher(store.clone()).publish(result).await.unwrap_err();

        assert!(matches!(&err, IngestError::StorageWrite { key, .. } if key == "b3.txt"));
        let keys: Vec<_> = store.writes().into_iter().map(|w| w.0).collect();
        assert_eq!(keys, ["b3.epub"]);
    }

    #[tokio::test]
    async fn test_cover_failure_is_swallowed() {
        let store = Arc::new(RecordingStore::failing_on("b4.cover"));
        let result = run("b4".to_string(), sample_epub()).unwrap();

        let metadata = publisher(store.clone()).publish(result).await.unwrap();

        assert!(metadata.cover_path.is_none());
        assert!(metadata.cover_media_type.is_none());
        let keys: Vec<_> = store.writes().into_iter().map(|w| w.0).collect();
        assert_eq!(keys, ["b4.epub", "b4.txt"]);
    }

    #[tokio::test]
    async fn test_no_cover_writes_two_blobs() {
        let bytes = EpubBuilder::new()
            .item("c1", "c1.xhtml", "application/xhtml+xml", None)
            .spine("c1")
            .chapter("OEBPS/c1.xhtml", "<p>Text</p>")
            .build();
        let store = Arc::new(RecordingStore::default());
        let result = run("b5".to_string(), bytes).unwrap();

        publisher(store.clone()).publish(result).await.unwrap();

        assert_eq!(store.writes().len(), 2);
    }

    #[tokio::test]
    async fn test_cover_uses_manifest_media_type() {
        let bytes = EpubBuilder::new()
            .item("cover", "cover.png", "image/png", Some("cover-image"))
            .item("c1", "c1.xhtml", "application/xhtml+xml", None)
            .spine("c1")
            .chapter("OEBPS/c1.xhtml", "<p>Text</p>")
            .file("OEBPS/cover.png", b"\x89PNG".to_vec())
            .build();
        let store = Arc::new(RecordingStore::default());
        let result = run("b6".to_string(), bytes).unwrap();

        publisher(store.clone()).publish(result).await.unwrap();

        let writes = store.writes();
        assert_eq!(writes[2].0, "b6.cover");
        assert_eq!(writes[2].2, "image/png");
    }

    #[tokio::test]
    async fn test_write_timeout() {
        let store = Arc::new(RecordingStore::stalling_on("b7.epub"));
        let result = run("b7".to_string(), sample_epub()).unwrap();

        let err = ArtifactPublisher::new(store.clone(), Duration::from_millis(50))
            .publish(result)
            .await
            .unwrap_err();

        assert!(matches!(&err, IngestError::StorageWrite { key, reason } if key == "b7.epub" && reason.contains("timed out")));
        assert!(store.writes().is_empty());
    }
}
