/// Nightly reaper: soft-deletes expired posts and comments
///
/// The two sweeps are independent and batched. Each batch claims rows with
/// `FOR UPDATE SKIP LOCKED` so a sweep can interleave with request-path
/// writes; the update is conditioned on `soft_deleted = FALSE AND
/// expires_at <= now`, so it can never un-delete or extend anything.
use crate::error::ApiResult;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tokio::sync::watch;
use tracing::{error, info, warn};

/// Outcome of one reaper run
#[derive(Debug, Clone)]
pub struct ReapSummary {
    pub posts_expired: u64,
    pub comments_expired: u64,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub errors: Vec<String>,
}

impl ReapSummary {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Expiration sweeps over the dataset
pub struct Reaper {
    db: PgPool,
    batch_size: i64,
}

impl Reaper {
    pub fn new(db: PgPool, batch_size: i64) -> Self {
        Self { db, batch_size }
    }

    /// Run one full sweep. Batch failures are retried once and then
    /// recorded; they never abort the run.
    pub async fn run(&self, shutdown: &mut watch::Receiver<bool>) -> ApiResult<ReapSummary> {
        let started_at = Utc::now();
        let mut errors = Vec::new();

        info!("reaper sweep starting");

        let posts_expired = self
            .sweep_table("posts", started_at, shutdown, &mut errors)
            .await;
        let comments_expired = self
            .sweep_table("comments", started_at, shutdown, &mut errors)
            .await;

        let summary = ReapSummary {
            posts_expired,
            comments_expired,
            started_at,
            finished_at: Utc::now(),
            errors,
        };

        info!(
            posts = summary.posts_expired,
            comments = summary.comments_expired,
            errors = summary.errors.len(),
            "reaper sweep finished"
        );

        Ok(summary)
    }

    /// Sweep one table in batches until no expired rows remain or shutdown
    /// is requested.
    async fn sweep_table(
        &self,
        table: &str,
        now: DateTime<Utc>,
        shutdown: &mut watch::Receiver<bool>,
        errors: &mut Vec<String>,
    ) -> u64 {
        let mut total = 0u64;

        loop {
            if *shutdown.borrow() {
                warn!(table, "shutdown requested; stopping sweep after current batch");
                break;
            }

            match self.reap_batch(table, now).await {
                Ok(0) => break,
                Ok(n) => total += n,
                Err(first) => {
                    // One retry per batch for transient failures.
                    warn!(table, error = %first, "reap batch failed; retrying once");
                    match self.reap_batch(table, now).await {
                        Ok(n) => total += n,
                        Err(second) => {
                            error!(table, error = %second, "reap batch failed after retry");
                            errors.push(format!("{}: {}", table, second));
                            break;
                        }
                    }
                }
            }
        }

        total
    }

    async fn reap_batch(&self, table: &str, now: DateTime<Utc>) -> Result<u64, sqlx::Error> {
        let sql = format!(
            "UPDATE {table}
             SET soft_deleted = TRUE
             WHERE id IN (
                 SELECT id FROM {table}
                 WHERE soft_deleted = FALSE AND expires_at <= $1
                 LIMIT $2
                 FOR UPDATE SKIP LOCKED
             )",
        );

        let result = sqlx::query(&sql)
            .bind(now)
            .bind(self.batch_size)
            .execute(&self.db)
            .await?;

        Ok(result.rows_affected())
    }
}
