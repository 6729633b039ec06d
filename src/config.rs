/// Configuration management for Emberfeed
use crate::error::{ApiError, ApiResult};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

/// Main server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub service: ServiceConfig,
    pub database: DatabaseConfig,
    pub blobstore: BlobstoreConfig,
    pub identity: IdentityConfig,
    pub reaper: ReaperConfig,
}

/// Service-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Address the HTTP listener binds to
    pub listen_addr: String,
    pub port: u16,
    pub version: String,
    /// Maximum accepted media upload size in bytes
    pub media_upload_limit: usize,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    /// Connection acquire timeout in seconds
    pub connect_timeout: u64,
}

/// Blob storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum BlobstoreConfig {
    S3 {
        bucket: String,
        region: String,
        endpoint: Option<String>,
        access_key_id: String,
        secret_access_key: String,
        /// Base URL that serves stored objects
        public_base_url: String,
    },
    Disk {
        location: PathBuf,
        public_base_url: String,
    },
}

/// Identity provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityConfig {
    /// Token issuer, e.g. "https://tenant.auth.example.com/"
    pub issuer: String,
    /// Expected audience claim
    pub audience: String,
    /// HS256 shared secret; set only for development, disables JWKS
    pub shared_secret: Option<String>,
    /// TTL for cached resolutions in seconds
    pub cache_ttl_secs: u64,
    /// Maximum number of cached resolutions
    pub cache_capacity: u64,
}

/// Reaper configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReaperConfig {
    /// UTC hour of day for the nightly sweep (0-23)
    pub hour_utc: u32,
    /// Rows per sweep batch
    pub batch_size: i64,
}

impl ServerConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> ApiResult<Self> {
        let database = DatabaseConfig {
            url: require_env("DATABASE_URL")?,
            max_connections: env_or("DATABASE_MAX_CONNECTIONS", 20),
            min_connections: env_or("DATABASE_MIN_CONNECTIONS", 2),
            connect_timeout: env_or("DATABASE_CONNECT_TIMEOUT", 30),
        };

        let service = ServiceConfig {
            listen_addr: env::var("LISTEN_ADDR").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env_or("PORT", 8080),
            version: env!("CARGO_PKG_VERSION").to_string(),
            media_upload_limit: env_or("MEDIA_UPLOAD_LIMIT", 100 * 1024 * 1024),
        };

        let blobstore = match env::var("BLOBSTORE_BACKEND").as_deref() {
            Ok("disk") => BlobstoreConfig::Disk {
                location: PathBuf::from(
                    env::var("BLOBSTORE_DISK_LOCATION")
                        .unwrap_or_else(|_| "./data/blobs".to_string()),
                ),
                public_base_url: env::var("BLOBSTORE_PUBLIC_URL")
                    .unwrap_or_else(|_| "http://localhost:8080/blobs".to_string()),
            },
            _ => BlobstoreConfig::S3 {
                bucket: require_env("BLOBSTORE_BUCKET")?,
                region: env::var("BLOBSTORE_REGION").unwrap_or_else(|_| "auto".to_string()),
                endpoint: env::var("BLOBSTORE_ENDPOINT").ok(),
                access_key_id: require_env("BLOBSTORE_ACCESS_KEY_ID")?,
                secret_access_key: require_env("BLOBSTORE_SECRET_ACCESS_KEY")?,
                public_base_url: require_env("BLOBSTORE_PUBLIC_URL")?,
            },
        };

        let identity = IdentityConfig {
            issuer: require_env("IDENTITY_ISSUER")?,
            audience: require_env("IDENTITY_AUDIENCE")?,
            shared_secret: env::var("IDENTITY_SHARED_SECRET").ok(),
            cache_ttl_secs: env_or("IDENTITY_CACHE_TTL_SECS", 300),
            cache_capacity: env_or("IDENTITY_CACHE_CAPACITY", 10_000),
        };

        let reaper = ReaperConfig {
            hour_utc: env_or("REAPER_HOUR_UTC", 3),
            batch_size: env_or("REAPER_BATCH_SIZE", 500),
        };

        let config = Self {
            service,
            database,
            blobstore,
            identity,
            reaper,
        };
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> ApiResult<()> {
        if self.database.url.is_empty() {
            return Err(ApiError::Internal("DATABASE_URL must not be empty".to_string()));
        }
        if self.database.max_connections == 0 {
            return Err(ApiError::Internal(
                "DATABASE_MAX_CONNECTIONS must be at least 1".to_string(),
            ));
        }
        if self.reaper.hour_utc > 23 {
            return Err(ApiError::Internal(
                "REAPER_HOUR_UTC must be in 0..=23".to_string(),
            ));
        }
        if self.reaper.batch_size <= 0 {
            return Err(ApiError::Internal(
                "REAPER_BATCH_SIZE must be positive".to_string(),
            ));
        }
        if self.identity.issuer.is_empty() || self.identity.audience.is_empty() {
            return Err(ApiError::Internal(
                "IDENTITY_ISSUER and IDENTITY_AUDIENCE must be set".to_string(),
            ));
        }
        if self.service.media_upload_limit == 0 {
            return Err(ApiError::Internal(
                "MEDIA_UPLOAD_LIMIT must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

fn require_env(name: &str) -> ApiResult<String> {
    env::var(name).map_err(|_| ApiError::Internal(format!("{} must be set", name)))
}

fn env_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> ServerConfig {
        ServerConfig {
            service: ServiceConfig {
                listen_addr: "127.0.0.1".into(),
                port: 8080,
                version: "0.1.0".into(),
                media_upload_limit: 100 * 1024 * 1024,
            },
            database: DatabaseConfig {
                url: "postgresql://localhost/emberfeed".into(),
                max_connections: 20,
                min_connections: 2,
                connect_timeout: 30,
            },
            blobstore: BlobstoreConfig::Disk {
                location: PathBuf::from("/tmp/blobs"),
                public_base_url: "http://localhost:8080/blobs".into(),
            },
            identity: IdentityConfig {
                issuer: "https://issuer.test/".into(),
                audience: "emberfeed-api".into(),
                shared_secret: None,
                cache_ttl_secs: 300,
                cache_capacity: 1000,
            },
            reaper: ReaperConfig {
                hour_utc: 3,
                batch_size: 500,
            },
        }
    }

    #[test]
    fn valid_config_passes() {
        assert!(base_config().validate().is_ok());
    }

    #[test]
    fn out_of_range_reaper_hour_rejected() {
        let mut config = base_config();
        config.reaper.hour_utc = 24;
        assert!(config.validate().is_err());
    }

    #[test]
    fn empty_issuer_rejected() {
        let mut config = base_config();
        config.identity.issuer = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_batch_size_rejected() {
        let mut config = base_config();
        config.reaper.batch_size = 0;
        assert!(config.validate().is_err());
    }
}
