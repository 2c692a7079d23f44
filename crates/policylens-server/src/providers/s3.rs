//! AWS S3 object store
//!
//! Stores uploaded policy PDFs. Credentials come from the ambient AWS
//! configuration (environment, profile, or instance role).

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::{primitives::ByteStream, Client as S3Client};

use crate::config::S3Config;
use crate::error::{Error, Result};

use super::object_store::ObjectStoreProvider;

/// S3-backed object store
pub struct S3ObjectStore {
    client: S3Client,
    bucket: String,
}

impl S3ObjectStore {
    /// Create a new S3 object store from the ambient AWS configuration
    pub async fn new(config: &S3Config) -> Result<Self> {
        if config.bucket.is_empty() {
            return Err(Error::Config("S3 bucket name is not configured".to_string()));
        }

        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(region) = &config.region {
            loader = loader.region(aws_sdk_s3::config::Region::new(region.clone()));
        }
        let sdk_config = loader.load().await;

        Ok(Self {
            client: S3Client::new(&sdk_config),
            bucket: config.bucket.clone(),
        })
    }
}

#[async_trait]
impl ObjectStoreProvider for S3ObjectStore {
    async fn put_object(&self, key: &str, data: &[u8], content_type: &str) -> Result<()> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(data.to_vec()))
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| Error::ObjectStore(format!("Failed to upload {}: {}", key, e)))?;

        Ok(())
    }

    async fn get_object(&self, key: &str) -> Result<Vec<u8>> {
        let response = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| Error::ObjectStore(format!("Failed to download {}: {}", key, e)))?;

        let body = response
            .body
            .collect()
            .await
            .map_err(|e| Error::ObjectStore(format!("Failed to read body of {}: {}", key, e)))?;

        Ok(body.into_bytes().to_vec())
    }

    async fn delete_object(&self, key: &str) -> Result<()> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| Error::ObjectStore(format!("Failed to delete {}: {}", key, e)))?;

        Ok(())
    }

    async fn health_check(&self) -> Result<bool> {
        self.client
            .list_objects_v2()
            .bucket(&self.bucket)
            .max_keys(1)
            .send()
            .await
            .map(|_| true)
            .map_err(|e| Error::ObjectStore(format!("S3 health check failed: {}", e)))
    }

    fn bucket(&self) -> &str {
        &self.bucket
    }

    fn name(&self) -> &str {
        "s3"
    }
}
