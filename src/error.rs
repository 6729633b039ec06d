/// Unified error types for Emberfeed
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for the service
#[derive(Error, Debug)]
pub enum ApiError {
    /// Malformed or out-of-range parameter
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Missing or invalid bearer credential
    #[error("Authentication failed: {0}")]
    Unauthenticated(String),

    /// Authenticated but not permitted
    #[error("Not authorized: {0}")]
    Forbidden(String),

    /// Entity missing or not visible to the caller
    #[error("Not found: {0}")]
    NotFound(String),

    /// Unique-constraint violation surfacing to the caller
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Media exceeds size limits
    #[error("Payload too large: {0}")]
    PayloadTooLarge(String),

    /// Upload is not a video
    #[error("Unsupported media type: {0}")]
    UnsupportedMedia(String),

    /// Reserved for future use
    #[error("Rate limit exceeded")]
    RateLimited,

    /// Database errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Unexpected failures
    #[error("Internal error: {0}")]
    Internal(String),

    /// Blob store or identity provider transient failure
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),
}

pub type ApiResult<T> = Result<T, ApiError>;

/// Uniform error response body: `{"error": {"kind": ..., "message": ...}}`
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub kind: String,
    pub message: String,
}

impl ApiError {
    /// Stable kind string, as exposed on the wire
    pub fn kind(&self) -> &'static str {
        match self {
            ApiError::InvalidInput(_) => "InvalidInput",
            ApiError::Unauthenticated(_) => "Unauthenticated",
            ApiError::Forbidden(_) => "Forbidden",
            ApiError::NotFound(_) => "NotFound",
            ApiError::Conflict(_) => "Conflict",
            ApiError::PayloadTooLarge(_) => "PayloadTooLarge",
            ApiError::UnsupportedMedia(_) => "UnsupportedMedia",
            ApiError::RateLimited => "RateLimited",
            ApiError::Database(_) | ApiError::Internal(_) => "Internal",
            ApiError::StorageUnavailable(_) => "StorageUnavailable",
        }
    }

    /// HTTP status for this error
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::UnsupportedMedia(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            ApiError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Database(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::StorageUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

/// Convert ApiError to HTTP response
impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Internal details stay in the logs, not on the wire.
        let message = match &self {
            ApiError::Database(e) => {
                tracing::error!("database error: {}", e);
                "Unexpected internal error".to_string()
            }
            ApiError::Internal(e) => {
                tracing::error!("internal error: {}", e);
                "Unexpected internal error".to_string()
            }
            other => other.to_string(),
        };

        let body = ErrorBody {
            error: ErrorDetail {
                kind: self.kind().to_string(),
                message,
            },
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_kinds_map_to_expected_statuses() {
        let cases: Vec<(ApiError, StatusCode)> = vec![
            (ApiError::InvalidInput("x".into()), StatusCode::BAD_REQUEST),
            (ApiError::Unauthenticated("x".into()), StatusCode::UNAUTHORIZED),
            (ApiError::Forbidden("x".into()), StatusCode::FORBIDDEN),
            (ApiError::NotFound("x".into()), StatusCode::NOT_FOUND),
            (ApiError::Conflict("x".into()), StatusCode::CONFLICT),
            (ApiError::PayloadTooLarge("x".into()), StatusCode::PAYLOAD_TOO_LARGE),
            (ApiError::UnsupportedMedia("x".into()), StatusCode::UNSUPPORTED_MEDIA_TYPE),
            (ApiError::RateLimited, StatusCode::TOO_MANY_REQUESTS),
            (ApiError::Internal("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
            (ApiError::StorageUnavailable("x".into()), StatusCode::SERVICE_UNAVAILABLE),
        ];

        for (err, status) in cases {
            assert_eq!(err.status(), status, "kind {}", err.kind());
        }
    }

    #[test]
    fn internal_errors_do_not_leak_details() {
        let err = ApiError::Internal("secret pool address".into());
        assert_eq!(err.kind(), "Internal");
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn error_body_shape_round_trips() {
        let body = ErrorBody {
            error: ErrorDetail {
                kind: "NotFound".into(),
                message: "Post not found".into(),
            },
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["error"]["kind"], "NotFound");
        assert_eq!(json["error"]["message"], "Post not found");
    }
}
