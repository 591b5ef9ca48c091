//! S3-compatible storage client
//!
//! Wraps the AWS SDK for S3-compatible storage access.

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::{
    config::{Credentials, Region},
    primitives::ByteStream,
    Client,
};

use crate::config::StorageConfig;
use crate::error::StorageError;

use super::{guess_content_type, BlobStore, StoredBlob};

/// S3-compatible storage client
#[derive(Clone)]
pub struct S3Client {
    client: Client,
    bucket: String,
}

impl S3Client {
    /// Create a new S3 client from configuration
    pub async fn new(config: &StorageConfig) -> Result<Self, StorageError> {
        let credentials = Credentials::new(
            &config.access_key,
            &config.secret_key,
            None,
            None,
            "shelf-server",
        );

        let region = config
            .region
            .clone()
            .unwrap_or_else(|| "us-east-1".to_string());

        let s3_config = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .endpoint_url(&config.endpoint)
            .region(Region::new(region))
            .credentials_provider(credentials)
            .force_path_style(true) // Required for MinIO and other S3-compatible services
            .build();

        let client = Client::from_conf(s3_config);

        // Test connection by checking if bucket exists
        let bucket = config.bucket.clone();
        match client.head_bucket().bucket(&bucket).send().await {
            Ok(_) => {
                tracing::info!("Connected to S3 bucket: {}", bucket);
            }
            Err(e) => {
                tracing::warn!(
                    "Could not verify bucket {}: {}. Will attempt operations anyway.",
                    bucket,
                    e
                );
            }
        }

        Ok(Self { client, bucket })
    }

    /// Get the bucket name
    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Upload an object
    pub async fn put_object(
        &self,
        key: &str,
        data: Vec<u8>,
        content_type: &str,
    ) -> Result<(), StorageError> {
        let size = data.len();
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .body(ByteStream::from(data))
            .send()
            .await
            .map_err(|e| classify(key, "put", e.to_string()))?;

        tracing::debug!(key = %key, size = size, "Uploaded object");
        Ok(())
    }

    /// Get an object's data and content type
    pub async fn get_object(&self, key: &str) -> Result<StoredBlob, StorageError> {
        let response = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| classify(key, "get", e.to_string()))?;

        let content_type = response
            .content_type()
            .map(|s| s.to_string())
            .unwrap_or_else(|| guess_content_type(key));

        let data = response
            .body
            .collect()
            .await
            .map_err(|e| StorageError::SdkError(format!("Failed to read object body: {}", e)))?
            .into_bytes()
            .to_vec();

        Ok(StoredBlob { data, content_type })
    }
}

/// Map an SDK error message onto a storage error
fn classify(key: &str, operation: &str, message: String) -> StorageError {
    if message.contains("404") || message.contains("NoSuchKey") {
        StorageError::ObjectNotFound(key.to_string())
    } else if message.contains("403") || message.contains("AccessDenied") {
        StorageError::AccessDenied(key.to_string())
    } else if message.contains("NoSuchBucket") {
        StorageError::BucketNotFound(key.to_string())
    } else {
        StorageError::SdkError(format!("Failed to {} object {}: {}", operation, key, message))
    }
}

#[async_trait]
impl BlobStore for S3Client {
    async fn put(&self, key: &str, data: Vec<u8>, content_type: &str) -> Result<(), StorageError> {
        self.put_object(key, data, content_type).await
    }

    async fn get(&self, key: &str) -> Result<StoredBlob, StorageError> {
        self.get_object(key).await
    }
}
