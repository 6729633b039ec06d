/// User endpoints: follows, profiles, per-user feeds
use crate::{
    auth::Viewer,
    context::AppContext,
    error::{ApiError, ApiResult},
    feed::{self, FeedCursor, FeedPage, UserProfile},
};
use axum::{
    extract::{Path, Query, State},
    response::Json,
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/users/:id/follow", post(follow_user).delete(unfollow_user))
        .route("/users/:id/profile", get(user_profile))
        .route("/users/:id/posts", get(user_posts))
}

#[derive(Debug, Deserialize)]
struct UserPostsQuery {
    cursor: Option<String>,
    limit: Option<i64>,
}

/// POST /users/{id}/follow — idempotent
async fn follow_user(
    State(ctx): State<AppContext>,
    viewer: Viewer,
    Path(target): Path<Uuid>,
) -> ApiResult<Json<Value>> {
    require_user(&ctx, target).await?;
    let state = ctx.follows.follow(viewer.id(), target).await?;
    Ok(Json(json!({ "following": state.following })))
}

/// DELETE /users/{id}/follow — idempotent
async fn unfollow_user(
    State(ctx): State<AppContext>,
    viewer: Viewer,
    Path(target): Path<Uuid>,
) -> ApiResult<Json<Value>> {
    require_user(&ctx, target).await?;
    let state = ctx.follows.unfollow(viewer.id(), target).await?;
    Ok(Json(json!({ "following": state.following })))
}

/// GET /users/{id}/profile — counters plus viewer follow state
async fn user_profile(
    State(ctx): State<AppContext>,
    viewer: Viewer,
    Path(target): Path<Uuid>,
) -> ApiResult<Json<UserProfile>> {
    let profile = ctx
        .feed
        .user_profile(viewer.id(), target)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    Ok(Json(profile))
}

/// GET /users/{id}/posts — the user's live posts visible to the viewer
async fn user_posts(
    State(ctx): State<AppContext>,
    viewer: Viewer,
    Path(target): Path<Uuid>,
    Query(query): Query<UserPostsQuery>,
) -> ApiResult<Json<FeedPage>> {
    require_user(&ctx, target).await?;

    let cursor = query
        .cursor
        .as_deref()
        .map(FeedCursor::decode)
        .transpose()?;
    let limit = feed::clamp_limit(query.limit);

    let page = ctx.feed.user_feed(viewer.id(), target, cursor, limit).await?;
    Ok(Json(page))
}

async fn require_user(ctx: &AppContext, id: Uuid) -> ApiResult<()> {
    ctx.users
        .find_by_id(id)
        .await?
        .map(|_| ())
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))
}
