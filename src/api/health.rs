/// Health check endpoint
///
/// Unauthenticated; reports overall status plus per-dependency checks so
/// orchestrators can tell a dead process from a degraded one.
use crate::context::AppContext;
use axum::{extract::State, response::Json, routing::get, Router};
use serde_json::{json, Value};

pub fn routes() -> Router<AppContext> {
    Router::new().route("/health", get(health_check))
}

async fn health_check(State(ctx): State<AppContext>) -> Json<Value> {
    let database_ok = sqlx::query("SELECT 1").execute(&ctx.db).await.is_ok();

    let status = if database_ok { "ok" } else { "degraded" };

    Json(json!({
        "status": status,
        "version": ctx.config.service.version,
        "deps": {
            "database": if database_ok { "ok" } else { "unavailable" },
        }
    }))
}
