//! Object storage provider trait

use async_trait::async_trait;

use crate::error::Result;

/// Trait for raw document storage
///
/// Implementations:
/// - `S3ObjectStore`: AWS S3 (or any S3-compatible endpoint)
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ObjectStoreProvider: Send + Sync {
    /// Store an object under the given key
    async fn put_object(&self, key: &str, data: &[u8], content_type: &str) -> Result<()>;

    /// Fetch an object's bytes
    async fn get_object(&self, key: &str) -> Result<Vec<u8>>;

    /// Delete an object (best effort)
    async fn delete_object(&self, key: &str) -> Result<()>;

    /// Check that the bucket is reachable
    async fn health_check(&self) -> Result<bool>;

    /// Bucket objects are stored in
    fn bucket(&self) -> &str;

    /// Provider name for logging
    fn name(&self) -> &str;
}
