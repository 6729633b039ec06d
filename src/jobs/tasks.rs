/// Background task implementations
use crate::context::AppContext;
use crate::error::ApiResult;
use crate::reaper::ReapSummary;
use chrono::{Duration, Utc};
use tokio::sync::watch;

/// Detailed view records are kept this long
const VIEW_RETENTION_DAYS: i64 = 7;

/// Run one reaper sweep
pub async fn run_reaper(
    ctx: &AppContext,
    shutdown: &mut watch::Receiver<bool>,
) -> ApiResult<ReapSummary> {
    ctx.reaper.run(shutdown).await
}

/// Delete view records older than the retention window
pub async fn prune_view_log(ctx: &AppContext) -> ApiResult<u64> {
    let cutoff = Utc::now() - Duration::days(VIEW_RETENTION_DAYS);

    let result = sqlx::query("DELETE FROM post_views WHERE viewed_at < $1")
        .bind(cutoff)
        .execute(&ctx.db)
        .await?;

    Ok(result.rows_affected())
}
