/// Bearer token resolution against the identity provider
use crate::config::IdentityConfig;
use crate::error::{ApiError, ApiResult};
use jsonwebtoken::{
    decode, decode_header, errors::ErrorKind as JwtErrorKind, Algorithm, DecodingKey, Validation,
};
use moka::future::Cache;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// How long a fetched JWKS document stays valid
const JWKS_TTL: Duration = Duration::from_secs(24 * 3600);

/// Identity returned by the provider for a valid bearer
#[derive(Debug, Clone)]
pub struct ResolvedIdentity {
    /// Stable opaque subject string
    pub subject: String,
    pub email: Option<String>,
    pub display_name: Option<String>,
}

/// Claims the core reads from provider tokens
#[derive(Debug, Deserialize)]
struct Claims {
    sub: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    name: Option<String>,
}

/// JWKS document shape
#[derive(Debug, Deserialize)]
struct JwksDocument {
    keys: Vec<Jwk>,
}

#[derive(Debug, Deserialize)]
struct Jwk {
    #[serde(default)]
    kid: Option<String>,
    kty: String,
    #[serde(default)]
    n: Option<String>,
    #[serde(default)]
    e: Option<String>,
}

struct CachedJwks {
    keys: HashMap<String, (String, String)>,
    fetched_at: std::time::Instant,
}

enum KeyMode {
    /// RS256 keys fetched from the issuer's JWKS endpoint
    Jwks {
        http_client: reqwest::Client,
        jwks: RwLock<Option<CachedJwks>>,
    },
    /// HS256 shared secret, development only
    SharedSecret(DecodingKey),
}

/// Resolves bearer tokens to identities, with a bounded TTL cache
pub struct IdentityResolver {
    issuer: String,
    audience: String,
    mode: KeyMode,
    cache: Cache<String, ResolvedIdentity>,
}

impl IdentityResolver {
    /// Create a resolver from identity configuration
    pub fn new(config: &IdentityConfig) -> ApiResult<Self> {
        let mode = match &config.shared_secret {
            Some(secret) => {
                warn!("Identity resolver running with a shared secret; JWKS disabled");
                KeyMode::SharedSecret(DecodingKey::from_secret(secret.as_bytes()))
            }
            None => {
                let http_client = reqwest::Client::builder()
                    .user_agent(concat!("emberfeed/", env!("CARGO_PKG_VERSION")))
                    .timeout(Duration::from_secs(10))
                    .build()
                    .map_err(|e| {
                        ApiError::Internal(format!("Failed to create HTTP client: {}", e))
                    })?;
                KeyMode::Jwks {
                    http_client,
                    jwks: RwLock::new(None),
                }
            }
        };

        let cache = Cache::builder()
            .max_capacity(config.cache_capacity)
            .time_to_live(Duration::from_secs(config.cache_ttl_secs))
            .build();

        Ok(Self {
            issuer: config.issuer.clone(),
            audience: config.audience.clone(),
            mode,
            cache,
        })
    }

    /// Resolve a bearer token to an identity
    ///
    /// Invalid tokens fail with `Unauthenticated`; transient provider
    /// failures (JWKS unreachable) fail with `StorageUnavailable`.
    pub async fn resolve(&self, token: &str) -> ApiResult<ResolvedIdentity> {
        if let Some(cached) = self.cache.get(token).await {
            return Ok(cached);
        }

        let identity = self.verify(token).await?;
        self.cache.insert(token.to_string(), identity.clone()).await;
        Ok(identity)
    }

    async fn verify(&self, token: &str) -> ApiResult<ResolvedIdentity> {
        let (key, algorithm) = match &self.mode {
            KeyMode::SharedSecret(key) => (key.clone(), Algorithm::HS256),
            KeyMode::Jwks { .. } => {
                let header = decode_header(token)
                    .map_err(|e| ApiError::Unauthenticated(format!("Malformed token: {}", e)))?;
                let kid = header
                    .kid
                    .ok_or_else(|| ApiError::Unauthenticated("Token missing key id".to_string()))?;
                (self.signing_key_for(&kid).await?, Algorithm::RS256)
            }
        };

        let mut validation = Validation::new(algorithm);
        validation.set_audience(&[&self.audience]);
        validation.set_issuer(&[&self.issuer]);

        let data = decode::<Claims>(token, &key, &validation).map_err(|e| match e.kind() {
            JwtErrorKind::ExpiredSignature => {
                ApiError::Unauthenticated("Token expired".to_string())
            }
            JwtErrorKind::InvalidAudience | JwtErrorKind::InvalidIssuer => {
                ApiError::Unauthenticated("Token issued for a different service".to_string())
            }
            _ => ApiError::Unauthenticated(format!("Invalid token: {}", e)),
        })?;

        Ok(ResolvedIdentity {
            subject: data.claims.sub,
            email: data.claims.email,
            display_name: data.claims.name,
        })
    }

    /// Look up the RS256 decoding key for a key id, fetching the JWKS if
    /// the cached document is stale or does not know the kid.
    async fn signing_key_for(&self, kid: &str) -> ApiResult<DecodingKey> {
        let KeyMode::Jwks { http_client, jwks } = &self.mode else {
            return Err(ApiError::Internal("JWKS lookup in shared-secret mode".to_string()));
        };

        {
            let guard = jwks.read().await;
            if let Some(cached) = guard.as_ref() {
                if cached.fetched_at.elapsed() < JWKS_TTL {
                    if let Some((n, e)) = cached.keys.get(kid) {
                        return decoding_key_from_components(n, e);
                    }
                }
            }
        }

        // Cache miss or unknown kid: fetch a fresh document.
        let jwks_url = format!("{}/.well-known/jwks.json", self.issuer.trim_end_matches('/'));
        debug!("Fetching JWKS from {}", jwks_url);

        let response = http_client
            .get(&jwks_url)
            .send()
            .await
            .map_err(|e| ApiError::StorageUnavailable(format!("JWKS fetch failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(ApiError::StorageUnavailable(format!(
                "JWKS endpoint returned {}",
                response.status()
            )));
        }

        let document: JwksDocument = response
            .json()
            .await
            .map_err(|e| ApiError::StorageUnavailable(format!("Malformed JWKS: {}", e)))?;

        let keys: HashMap<String, (String, String)> = document
            .keys
            .into_iter()
            .filter(|k| k.kty == "RSA")
            .filter_map(|k| match (k.kid, k.n, k.e) {
                (Some(kid), Some(n), Some(e)) => Some((kid, (n, e))),
                _ => None,
            })
            .collect();

        let mut guard = jwks.write().await;
        *guard = Some(CachedJwks {
            keys: keys.clone(),
            fetched_at: std::time::Instant::now(),
        });

        match keys.get(kid) {
            Some((n, e)) => decoding_key_from_components(n, e),
            None => Err(ApiError::Unauthenticated(format!(
                "Token signed with unknown key id {}",
                kid
            ))),
        }
    }
}

fn decoding_key_from_components(n: &str, e: &str) -> ApiResult<DecodingKey> {
    DecodingKey::from_rsa_components(n, e)
        .map_err(|err| ApiError::Internal(format!("Invalid JWKS key material: {}", err)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use serde::Serialize;

    #[derive(Serialize)]
    struct TestClaims {
        sub: String,
        iss: String,
        aud: String,
        exp: i64,
        #[serde(skip_serializing_if = "Option::is_none")]
        email: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        name: Option<String>,
    }

    fn test_config() -> IdentityConfig {
        IdentityConfig {
            issuer: "https://issuer.test/".into(),
            audience: "emberfeed-api".into(),
            shared_secret: Some("test-secret".into()),
            cache_ttl_secs: 300,
            cache_capacity: 100,
        }
    }

    fn sign(claims: &TestClaims, secret: &str) -> String {
        encode(
            &Header::default(),
            claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    fn valid_claims() -> TestClaims {
        TestClaims {
            sub: "auth0|user-123".into(),
            iss: "https://issuer.test/".into(),
            aud: "emberfeed-api".into(),
            exp: chrono::Utc::now().timestamp() + 3600,
            email: Some("user@example.com".into()),
            name: Some("Test User".into()),
        }
    }

    #[tokio::test]
    async fn resolves_valid_token() {
        let resolver = IdentityResolver::new(&test_config()).unwrap();
        let token = sign(&valid_claims(), "test-secret");

        let identity = resolver.resolve(&token).await.unwrap();
        assert_eq!(identity.subject, "auth0|user-123");
        assert_eq!(identity.email.as_deref(), Some("user@example.com"));
        assert_eq!(identity.display_name.as_deref(), Some("Test User"));
    }

    #[tokio::test]
    async fn second_resolve_is_served_from_cache() {
        let resolver = IdentityResolver::new(&test_config()).unwrap();
        let token = sign(&valid_claims(), "test-secret");

        let first = resolver.resolve(&token).await.unwrap();
        let second = resolver.resolve(&token).await.unwrap();
        assert_eq!(first.subject, second.subject);
    }

    #[tokio::test]
    async fn rejects_wrong_signature() {
        let resolver = IdentityResolver::new(&test_config()).unwrap();
        let token = sign(&valid_claims(), "a-different-secret");

        let err = resolver.resolve(&token).await.unwrap_err();
        assert_eq!(err.kind(), "Unauthenticated");
    }

    #[tokio::test]
    async fn rejects_wrong_audience() {
        let resolver = IdentityResolver::new(&test_config()).unwrap();
        let mut claims = valid_claims();
        claims.aud = "some-other-service".into();

        let err = resolver.resolve(&sign(&claims, "test-secret")).await.unwrap_err();
        assert_eq!(err.kind(), "Unauthenticated");
    }

    #[tokio::test]
    async fn rejects_expired_token() {
        let resolver = IdentityResolver::new(&test_config()).unwrap();
        let mut claims = valid_claims();
        claims.exp = chrono::Utc::now().timestamp() - 3600;

        let err = resolver.resolve(&sign(&claims, "test-secret")).await.unwrap_err();
        assert_eq!(err.kind(), "Unauthenticated");
    }

    #[tokio::test]
    async fn rejects_garbage_token() {
        let resolver = IdentityResolver::new(&test_config()).unwrap();
        let err = resolver.resolve("not-a-jwt").await.unwrap_err();
        assert_eq!(err.kind(), "Unauthenticated");
    }
}
