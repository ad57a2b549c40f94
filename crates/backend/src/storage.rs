use async_trait::async_trait;
use bytes::Bytes;

use crate::error::BackendResult;

#[derive(Debug, Clone)]
pub struct UploadOptions {
    pub content_type: String,
    /// Seconds, sent as the object's `cache-control` max-age.
    pub cache_control: u32,
    pub upsert: bool,
}

impl UploadOptions {
    pub fn new(content_type: impl Into<String>) -> Self {
        Self {
            content_type: content_type.into(),
            cache_control: 3_600,
            upsert: false,
        }
    }
}

#[async_trait]
pub trait StorageApi: Send + Sync {
    /// Store `body` at `path` inside `bucket`, returning the object key.
    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        body: Bytes,
        options: UploadOptions,
    ) -> BackendResult<String>;

    async fn remove(&self, bucket: &str, paths: &[String]) -> BackendResult<()>;

    /// A time-limited URL granting read access to one object.
    async fn create_signed_url(
        &self,
        bucket: &str,
        path: &str,
        expires_in_seconds: u64,
    ) -> BackendResult<String>;
}
