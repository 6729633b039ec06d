/// Follow relations
///
/// "Friends" means mutual follow: A sees B's friends-only posts iff both
/// directed edges exist.
use crate::error::{ApiError, ApiResult};
use chrono::Utc;
use sqlx::{PgPool, Row};
use uuid::Uuid;

/// Result of a follow or unfollow call
#[derive(Debug, Clone, Copy)]
pub struct FollowState {
    /// Whether the caller now follows the target
    pub following: bool,
    /// Whether this call changed anything
    pub changed: bool,
}

/// Follow graph operations
pub struct FollowService {
    db: PgPool,
}

impl FollowService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Idempotently create the (follower, followee) edge
    pub async fn follow(&self, follower: Uuid, followee: Uuid) -> ApiResult<FollowState> {
        if follower == followee {
            return Err(ApiError::InvalidInput("Cannot follow yourself".to_string()));
        }

        let result = sqlx::query(
            r#"
            INSERT INTO follows (follower_id, followee_id, created_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (follower_id, followee_id) DO NOTHING
            "#,
        )
        .bind(follower)
        .bind(followee)
        .bind(Utc::now())
        .execute(&self.db)
        .await?;

        Ok(FollowState {
            following: true,
            changed: result.rows_affected() == 1,
        })
    }

    /// Idempotently remove the (follower, followee) edge
    pub async fn unfollow(&self, follower: Uuid, followee: Uuid) -> ApiResult<FollowState> {
        let result = sqlx::query(
            "DELETE FROM follows WHERE follower_id = $1 AND followee_id = $2",
        )
        .bind(follower)
        .bind(followee)
        .execute(&self.db)
        .await?;

        Ok(FollowState {
            following: false,
            changed: result.rows_affected() == 1,
        })
    }

    /// True iff `a` follows `b`
    pub async fn is_following(&self, a: Uuid, b: Uuid) -> ApiResult<bool> {
        let row = sqlx::query(
            "SELECT EXISTS (
                 SELECT 1 FROM follows WHERE follower_id = $1 AND followee_id = $2
             ) AS following",
        )
        .bind(a)
        .bind(b)
        .fetch_one(&self.db)
        .await?;

        Ok(row.try_get("following")?)
    }

    /// True iff both directed edges exist
    pub async fn is_friend(&self, a: Uuid, b: Uuid) -> ApiResult<bool> {
        let row = sqlx::query(
            "SELECT EXISTS (
                 SELECT 1 FROM follows WHERE follower_id = $1 AND followee_id = $2
             ) AND EXISTS (
                 SELECT 1 FROM follows WHERE follower_id = $2 AND followee_id = $1
             ) AS mutual",
        )
        .bind(a)
        .bind(b)
        .fetch_one(&self.db)
        .await?;

        Ok(row.try_get("mutual")?)
    }

    /// (followers, following) counts for a user, computed by query
    pub async fn counts(&self, user: Uuid) -> ApiResult<(i64, i64)> {
        let row = sqlx::query(
            "SELECT
                 (SELECT COUNT(*) FROM follows WHERE followee_id = $1) AS followers,
                 (SELECT COUNT(*) FROM follows WHERE follower_id = $1) AS following",
        )
        .bind(user)
        .fetch_one(&self.db)
        .await?;

        Ok((row.try_get("followers")?, row.try_get("following")?))
    }
}
