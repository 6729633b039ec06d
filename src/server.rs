/// HTTP server setup and routing
use crate::{context::AppContext, error::ApiResult};
use axum::{
    http::{header, Method, StatusCode},
    response::Json,
    Router,
};
use serde_json::json;
use tokio::sync::watch;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::info;

/// Build the main application router
pub fn build_router(ctx: AppContext) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    let media_upload_limit = ctx.config.service.media_upload_limit;

    Router::new()
        .nest("/api/v1", crate::api::routes(media_upload_limit))
        .with_state(ctx)
        .layer(cors)
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .fallback(not_found)
}

/// 404 handler, same body shape as service errors
async fn not_found() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "error": {
                "kind": "NotFound",
                "message": "Endpoint not found"
            }
        })),
    )
}

/// Start the HTTP server; runs until the shutdown signal fires
pub async fn serve(ctx: AppContext, mut shutdown: watch::Receiver<bool>) -> ApiResult<()> {
    let addr = format!(
        "{}:{}",
        ctx.config.service.listen_addr, ctx.config.service.port
    );

    info!("Emberfeed listening on {}", addr);

    let app = build_router(ctx);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| crate::error::ApiError::Internal(format!("Failed to bind to {}: {}", addr, e)))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown.changed().await;
            info!("HTTP server shutting down");
        })
        .await
        .map_err(|e| crate::error::ApiError::Internal(format!("Server error: {}", e)))?;

    Ok(())
}
