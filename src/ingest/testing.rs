//! Blob store fakes for ingestion tests

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::StorageError;
use crate::storage::{BlobStore, StoredBlob};

/// Records successful writes; can fail or stall on chosen keys
#[derive(Default)]
pub struct RecordingStore {
    writes: Mutex<Vec<(String, Vec<u8>, String)>>,
    fail_suffix: Option<String>,
    stall_suffix: Option<String>,
}

impl RecordingStore {
    /// Fail every write whose key ends with `suffix`
    pub fn failing_on(suffix: &str) -> Self {
        Self {
            fail_suffix: Some(suffix.to_string()),
            ..Default::default()
        }
    }

    /// Hang every write whose key ends with `suffix`
    pub fn stalling_on(suffix: &str) -> Self {
        Self {
            stall_suffix: Some(suffix.to_string()),
            ..Default::default()
        }
    }

    /// `(key, data, content_type)` of every successful write, in order
    pub fn writes(&self) -> Vec<(String, Vec<u8>, String)> {
        self.writes.lock().unwrap().clone()
    }
}

#[async_trait]
impl BlobStore for RecordingStore {
    async fn put(&self, key: &str, data: Vec<u8>, content_type: &str) -> Result<(), StorageError> {
        if self.stall_suffix.as_deref().is_some_and(|s| key.ends_with(s)) {
            tokio::time::sleep(Duration::from_secs(30)).await;
        }
        if self.fail_suffix.as_deref().is_some_and(|s| key.ends_with(s)) {
            return Err(StorageError::AccessDenied(key.to_string()));
        }
        self.writes
            .lock()
            .unwrap()
            .push((key.to_string(), data, content_type.to_string()));
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<StoredBlob, StorageError> {
        let writes = self.writes.lock().unwrap();
        writes
            .iter()
            .rev()
            .find(|w| w.0 == key)
            .map(|w| StoredBlob {
                data: w.1.clone(),
                content_type: w.2.clone(),
            })
            .ok_or_else(|| StorageError::ObjectNotFound(key.to_string()))
    }
}
