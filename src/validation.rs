/// Input validation helpers shared by the services
use crate::db::models::Visibility;
use crate::error::{ApiError, ApiResult};

/// Maximum post body length in characters
pub const MAX_POST_BODY_CHARS: usize = 500;
/// Comment bodies are 1..=500 characters
pub const MAX_COMMENT_BODY_CHARS: usize = 500;

/// Validate a post body (empty allowed for media-only posts)
pub fn validate_post_body(body: &str) -> ApiResult<()> {
    let len = body.chars().count();
    if len > MAX_POST_BODY_CHARS {
        return Err(ApiError::InvalidInput(format!(
            "Post body must be at most {} characters, got {}",
            MAX_POST_BODY_CHARS, len
        )));
    }
    Ok(())
}

/// Validate a comment body (must be non-empty)
pub fn validate_comment_body(body: &str) -> ApiResult<()> {
    let len = body.chars().count();
    if len == 0 {
        return Err(ApiError::InvalidInput(
            "Comment body must not be empty".to_string(),
        ));
    }
    if len > MAX_COMMENT_BODY_CHARS {
        return Err(ApiError::InvalidInput(format!(
            "Comment body must be at most {} characters, got {}",
            MAX_COMMENT_BODY_CHARS, len
        )));
    }
    Ok(())
}

/// Parse a visibility string from a form field
pub fn parse_visibility(value: &str) -> ApiResult<Visibility> {
    Visibility::parse(value).ok_or_else(|| {
        ApiError::InvalidInput(format!(
            "Visibility must be 'public' or 'friends', got '{}'",
            value
        ))
    })
}

/// Validate an uploaded media payload: must be video/*, within the size
/// limit. Returns the normalized content type.
pub fn validate_media(content_type: Option<&str>, size: usize, limit: usize) -> ApiResult<String> {
    let mime_type: mime::Mime = content_type
        .ok_or_else(|| ApiError::UnsupportedMedia("Missing media content type".to_string()))?
        .parse()
        .map_err(|_| ApiError::UnsupportedMedia("Malformed media content type".to_string()))?;

    if mime_type.type_() != mime::VIDEO {
        return Err(ApiError::UnsupportedMedia(format!(
            "Expected a video upload, got '{}'",
            mime_type
        )));
    }

    if size > limit {
        return Err(ApiError::PayloadTooLarge(format!(
            "Media is {} bytes; limit is {} bytes",
            size, limit
        )));
    }

    Ok(mime_type.essence_str().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn post_body_boundaries() {
        assert!(validate_post_body("").is_ok());
        assert!(validate_post_body(&"a".repeat(500)).is_ok());
        assert!(validate_post_body(&"a".repeat(501)).is_err());
    }

    #[test]
    fn post_body_counts_characters_not_bytes() {
        // 500 multibyte characters are fine even though they exceed 500 bytes.
        assert!(validate_post_body(&"ü".repeat(500)).is_ok());
        assert!(validate_post_body(&"ü".repeat(501)).is_err());
    }

    #[test]
    fn comment_body_boundaries() {
        assert!(validate_comment_body("").is_err());
        assert!(validate_comment_body("x").is_ok());
        assert!(validate_comment_body(&"a".repeat(500)).is_ok());
        assert!(validate_comment_body(&"a".repeat(501)).is_err());
    }

    #[test]
    fn visibility_parsing() {
        assert_eq!(parse_visibility("public").unwrap(), Visibility::Public);
        assert_eq!(parse_visibility("friends").unwrap(), Visibility::Friends);
        assert!(parse_visibility("everyone").is_err());
    }

    #[test]
    fn media_must_be_video() {
        let limit = 100 * 1024 * 1024;
        assert_eq!(
            validate_media(Some("video/mp4"), 1024, limit).unwrap(),
            "video/mp4"
        );
        assert!(validate_media(Some("video/webm"), 1024, limit).is_ok());

        let err = validate_media(Some("image/png"), 1024, limit).unwrap_err();
        assert_eq!(err.kind(), "UnsupportedMedia");

        let err = validate_media(None, 1024, limit).unwrap_err();
        assert_eq!(err.kind(), "UnsupportedMedia");
    }

    #[test]
    fn media_size_limit() {
        let limit = 100 * 1024 * 1024;
        assert!(validate_media(Some("video/mp4"), limit, limit).is_ok());

        let err = validate_media(Some("video/mp4"), limit + 1, limit).unwrap_err();
        assert_eq!(err.kind(), "PayloadTooLarge");
    }
}
