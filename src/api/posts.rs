/// Post endpoints: creation with media upload, reads, deletion, likes, views
use crate::{
    auth::Viewer,
    context::AppContext,
    error::{ApiError, ApiResult},
    feed::FeedPost,
    posts::MediaUpload,
    validation,
};
use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use serde_json::{json, Value};
use uuid::Uuid;

pub fn routes(media_upload_limit: usize) -> Router<AppContext> {
    Router::new()
        .route(
            "/posts",
            // Multipart bodies carry the video itself; leave headroom for
            // the text fields and boundaries.
            post(create_post).layer(DefaultBodyLimit::max(media_upload_limit + 1024 * 1024)),
        )
        .route("/posts/:id", get(read_post).delete(delete_post))
        .route("/posts/:id/like", post(like_post).delete(unlike_post))
        .route("/posts/:id/view", post(record_view))
}

/// POST /posts — multipart form with `body`, `visibility`, optional `media`
async fn create_post(
    State(ctx): State<AppContext>,
    viewer: Viewer,
    mut multipart: Multipart,
) -> ApiResult<(StatusCode, Json<FeedPost>)> {
    let mut body: Option<String> = None;
    let mut visibility: Option<String> = None;
    let mut media: Option<MediaUpload> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::InvalidInput(format!("Malformed multipart body: {}", e)))?
    {
        let Some(name) = field.name().map(String::from) else {
            continue;
        };

        match name.as_str() {
            "body" => {
                body = Some(read_text_field(field, "body").await?);
            }
            "visibility" => {
                visibility = Some(read_text_field(field, "visibility").await?);
            }
            "media" => {
                let content_type = field.content_type().map(String::from);
                let data = field.bytes().await.map_err(|e| {
                    // Oversized uploads die mid-read on the body limit.
                    ApiError::PayloadTooLarge(format!("Failed to read media field: {}", e))
                })?;

                media = Some(MediaUpload {
                    data: data.to_vec(),
                    content_type,
                });
            }
            _ => {}
        }
    }

    let body = body.unwrap_or_default();
    let visibility = validation::parse_visibility(
        visibility
            .as_deref()
            .ok_or_else(|| ApiError::InvalidInput("Missing visibility field".to_string()))?,
    )?;

    let created = ctx
        .posts
        .create_post(viewer.id(), body, visibility, media)
        .await?;

    // Re-read through the projection layer so the response shape matches
    // every other post read.
    let projected = ctx
        .feed
        .read_post_for_viewer(viewer.id(), created.id)
        .await?
        .ok_or_else(|| ApiError::Internal("Created post not readable".to_string()))?;

    Ok((StatusCode::CREATED, Json(projected)))
}

/// GET /posts/{id} — per-viewer projection
async fn read_post(
    State(ctx): State<AppContext>,
    viewer: Viewer,
    Path(post_id): Path<Uuid>,
) -> ApiResult<Json<FeedPost>> {
    let post = ctx
        .feed
        .read_post_for_viewer(viewer.id(), post_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Post not found".to_string()))?;

    Ok(Json(post))
}

/// DELETE /posts/{id} — author only
async fn delete_post(
    State(ctx): State<AppContext>,
    viewer: Viewer,
    Path(post_id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    ctx.posts.delete_post(viewer.id(), post_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /posts/{id}/like — idempotent
async fn like_post(
    State(ctx): State<AppContext>,
    viewer: Viewer,
    Path(post_id): Path<Uuid>,
) -> ApiResult<Json<Value>> {
    let state = ctx.posts.like(viewer.id(), post_id).await?;
    Ok(Json(json!({
        "like_count": state.like_count,
        "liked_by_viewer": state.liked_by_viewer,
    })))
}

/// DELETE /posts/{id}/like — idempotent
async fn unlike_post(
    State(ctx): State<AppContext>,
    viewer: Viewer,
    Path(post_id): Path<Uuid>,
) -> ApiResult<Json<Value>> {
    let state = ctx.posts.unlike(viewer.id(), post_id).await?;
    Ok(Json(json!({
        "like_count": state.like_count,
        "liked_by_viewer": state.liked_by_viewer,
    })))
}

/// POST /posts/{id}/view — deduplicated view tracking
async fn record_view(
    State(ctx): State<AppContext>,
    viewer: Viewer,
    Path(post_id): Path<Uuid>,
) -> ApiResult<Json<Value>> {
    let outcome = ctx.posts.record_view(viewer.id(), post_id).await?;
    Ok(Json(json!({
        "view_count": outcome.view_count,
        "recorded": outcome.recorded,
    })))
}

async fn read_text_field(
    field: axum::extract::multipart::Field<'_>,
    name: &str,
) -> ApiResult<String> {
    field
        .text()
        .await
        .map_err(|e| ApiError::InvalidInput(format!("Failed to read {} field: {}", name, e)))
}
