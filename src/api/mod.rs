/// API routes and handlers
pub mod comments;
pub mod feed;
pub mod health;
pub mod posts;
pub mod users;

use crate::context::AppContext;
use axum::Router;

/// Build all API routes, mounted under `/api/v1` by the server
pub fn routes(media_upload_limit: usize) -> Router<AppContext> {
    Router::new()
        .merge(health::routes())
        .merge(feed::routes())
        .merge(posts::routes(media_upload_limit))
        .merge(comments::routes())
        .merge(users::routes())
}
