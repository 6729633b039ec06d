/// Home feed endpoint
use crate::{
    auth::Viewer,
    context::AppContext,
    error::ApiResult,
    feed::{self, FeedCursor, FeedPage},
};
use axum::{
    extract::{Query, State},
    response::Json,
    routing::get,
    Router,
};
use serde::Deserialize;

pub fn routes() -> Router<AppContext> {
    Router::new().route("/feed", get(home_feed))
}

#[derive(Debug, Deserialize)]
struct FeedQuery {
    cursor: Option<String>,
    limit: Option<i64>,
}

/// GET /feed — chronological feed of posts visible to the viewer
async fn home_feed(
    State(ctx): State<AppContext>,
    viewer: Viewer,
    Query(query): Query<FeedQuery>,
) -> ApiResult<Json<FeedPage>> {
    let cursor = query
        .cursor
        .as_deref()
        .map(FeedCursor::decode)
        .transpose()?;
    let limit = feed::clamp_limit(query.limit);

    let page = ctx.feed.home_feed(viewer.id(), cursor, limit).await?;
    Ok(Json(page))
}
