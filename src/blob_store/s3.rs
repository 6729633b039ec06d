/// S3-compatible blob storage backend
use crate::blob_store::BlobBackend;
use crate::error::{ApiError, ApiResult};
use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_credential_types::Credentials;
use aws_sdk_s3::config::Builder as S3ConfigBuilder;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use std::sync::Arc;
use tracing::{debug, info};

/// S3 backend configuration
#[derive(Debug, Clone)]
pub struct S3BackendConfig {
    pub bucket: String,
    /// "auto" for R2
    pub region: String,
    /// Custom endpoint for S3-compatible providers (R2, MinIO)
    pub endpoint: Option<String>,
    pub access_key_id: String,
    pub secret_access_key: String,
    /// Base URL that serves stored objects
    pub public_base_url: String,
}

/// S3 blob storage backend
///
/// Works against AWS S3 and S3-compatible providers (Cloudflare R2, MinIO).
#[derive(Clone)]
pub struct S3Backend {
    client: Arc<Client>,
    bucket: String,
    public_base_url: String,
}

impl S3Backend {
    /// Create a new S3 backend
    pub async fn new(config: S3BackendConfig) -> ApiResult<Self> {
        info!(
            "Initializing S3 blob storage (bucket: {}, region: {})",
            config.bucket, config.region
        );

        let credentials = Credentials::new(
            &config.access_key_id,
            &config.secret_access_key,
            None,
            None,
            "emberfeed",
        );

        let aws_config = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()))
            .credentials_provider(credentials)
            .load()
            .await;

        let mut s3_config_builder = S3ConfigBuilder::from(&aws_config);

        if let Some(endpoint) = &config.endpoint {
            debug!("Using custom S3 endpoint: {}", endpoint);
            // Path style is required for MinIO and some S3-compatible services
            s3_config_builder = s3_config_builder
                .endpoint_url(endpoint)
                .force_path_style(true);
        }

        let client = Client::from_conf(s3_config_builder.build());

        Ok(Self {
            client: Arc::new(client),
            bucket: config.bucket,
            public_base_url: config.public_base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl BlobBackend for S3Backend {
    async fn put(&self, key: &str, data: Vec<u8>, content_type: &str) -> ApiResult<()> {
        let size = data.len();

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(data))
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| ApiError::StorageUnavailable(format!("S3 put failed: {}", e)))?;

        debug!("Stored blob {} ({} bytes)", key, size);
        Ok(())
    }

    fn url_for(&self, key: &str) -> String {
        format!("{}/{}", self.public_base_url, key)
    }

    async fn delete(&self, key: &str) -> ApiResult<()> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| ApiError::StorageUnavailable(format!("S3 delete failed: {}", e)))?;

        debug!("Deleted blob {}", key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn url_for_joins_base_and_key() {
        let backend = S3Backend::new(S3BackendConfig {
            bucket: "emberfeed-media".into(),
            region: "auto".into(),
            endpoint: Some("http://localhost:9000".into()),
            access_key_id: "test".into(),
            secret_access_key: "test".into(),
            public_base_url: "https://media.example.com/".into(),
        })
        .await
        .unwrap();

        assert_eq!(
            backend.url_for("videos/abc"),
            "https://media.example.com/videos/abc"
        );
    }
}
