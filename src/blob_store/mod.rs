/// Blob storage for uploaded media
///
/// Opaque keys are generated by the core; the store never assigns them.
/// Supports S3-compatible backends (R2, MinIO) and local disk for
/// development.

pub mod disk;
pub mod s3;

use crate::config::BlobstoreConfig;
use crate::error::ApiResult;
use async_trait::async_trait;
use std::sync::Arc;
use uuid::Uuid;

/// Blob storage backend trait
#[async_trait]
pub trait BlobBackend: Send + Sync {
    /// Store a blob under the given key
    async fn put(&self, key: &str, data: Vec<u8>, content_type: &str) -> ApiResult<()>;

    /// Retrieval URL for a stored key
    fn url_for(&self, key: &str) -> String;

    /// Delete a blob by key
    async fn delete(&self, key: &str) -> ApiResult<()>;
}

/// Generate a fresh opaque key for an uploaded video
pub fn fresh_media_key() -> String {
    format!("videos/{}", Uuid::new_v4())
}

/// Construct a backend from configuration
pub async fn from_config(config: &BlobstoreConfig) -> ApiResult<Arc<dyn BlobBackend>> {
    match config {
        BlobstoreConfig::S3 {
            bucket,
            region,
            endpoint,
            access_key_id,
            secret_access_key,
            public_base_url,
        } => {
            let backend = s3::S3Backend::new(s3::S3BackendConfig {
                bucket: bucket.clone(),
                region: region.clone(),
                endpoint: endpoint.clone(),
                access_key_id: access_key_id.clone(),
                secret_access_key: secret_access_key.clone(),
                public_base_url: public_base_url.clone(),
            })
            .await?;
            Ok(Arc::new(backend))
        }
        BlobstoreConfig::Disk {
            location,
            public_base_url,
        } => {
            let backend = disk::DiskBackend::new(location.clone(), public_base_url.clone()).await?;
            Ok(Arc::new(backend))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn media_keys_are_fresh_and_opaque() {
        let a = fresh_media_key();
        let b = fresh_media_key();
        assert_ne!(a, b);
        assert!(a.starts_with("videos/"));
        assert_eq!(a.len(), "videos/".len() + 36);
    }
}
