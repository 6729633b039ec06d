/// Local disk blob storage backend, for development and tests
use crate::blob_store::BlobBackend;
use crate::error::{ApiError, ApiResult};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Disk-backed blob storage
#[derive(Clone)]
pub struct DiskBackend {
    location: PathBuf,
    public_base_url: String,
}

impl DiskBackend {
    /// Create a disk backend rooted at `location`
    pub async fn new(location: PathBuf, public_base_url: String) -> ApiResult<Self> {
        tokio::fs::create_dir_all(&location)
            .await
            .map_err(|e| ApiError::Internal(format!("Failed to create blob directory: {}", e)))?;

        Ok(Self {
            location,
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Resolve a key to a path under the root, rejecting traversal
    fn path_for(&self, key: &str) -> ApiResult<PathBuf> {
        if key.split('/').any(|part| part == ".." || part.is_empty()) {
            return Err(ApiError::Internal(format!("Malformed blob key: {}", key)));
        }
        Ok(self.location.join(Path::new(key)))
    }
}

#[async_trait]
impl BlobBackend for DiskBackend {
    async fn put(&self, key: &str, data: Vec<u8>, _content_type: &str) -> ApiResult<()> {
        let path = self.path_for(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| ApiError::StorageUnavailable(format!("Blob write failed: {}", e)))?;
        }

        tokio::fs::write(&path, data)
            .await
            .map_err(|e| ApiError::StorageUnavailable(format!("Blob write failed: {}", e)))?;

        debug!("Stored blob at {}", path.display());
        Ok(())
    }

    fn url_for(&self, key: &str) -> String {
        format!("{}/{}", self.public_base_url, key)
    }

    async fn delete(&self, key: &str) -> ApiResult<()> {
        let path = self.path_for(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(ApiError::StorageUnavailable(format!(
                "Blob delete failed: {}",
                e
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_then_delete_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let backend = DiskBackend::new(dir.path().to_path_buf(), "http://localhost/blobs".into())
            .await
            .unwrap();

        backend
            .put("videos/test-key", b"binary video bytes".to_vec(), "video/mp4")
            .await
            .unwrap();

        let stored = dir.path().join("videos/test-key");
        assert_eq!(tokio::fs::read(&stored).await.unwrap(), b"binary video bytes");

        backend.delete("videos/test-key").await.unwrap();
        assert!(!stored.exists());

        // Deleting a missing key is not an error.
        backend.delete("videos/test-key").await.unwrap();
    }

    #[tokio::test]
    async fn url_for_joins_base_and_key() {
        let dir = tempfile::tempdir().unwrap();
        let backend = DiskBackend::new(dir.path().to_path_buf(), "http://localhost/blobs/".into())
            .await
            .unwrap();

        assert_eq!(
            backend.url_for("videos/abc"),
            "http://localhost/blobs/videos/abc"
        );
    }

    #[tokio::test]
    async fn traversal_keys_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let backend = DiskBackend::new(dir.path().to_path_buf(), "http://localhost/blobs".into())
            .await
            .unwrap();

        assert!(backend.put("../escape", vec![1], "video/mp4").await.is_err());
    }
}
