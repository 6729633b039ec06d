/// Comments: creation, listing, and voting
///
/// Voting runs in a single transaction holding a row lock on the comment:
/// the vote row, the denormalized counters, the upvote extension, and the
/// toxicity termination all commit together or not at all.
use crate::db::models::{Comment, VoteDirection};
use crate::error::{ApiError, ApiResult};
use crate::lifecycle::{self, DownvoteOutcome, EntityKind};
use crate::validation;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{FromRow, PgPool, Postgres, Row, Transaction};
use tracing::info;
use uuid::Uuid;

/// Requested vote operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteAction {
    Cast(VoteDirection),
    Remove,
}

impl VoteAction {
    /// Parse the wire form: "up", "down", or "remove"
    pub fn parse(value: &str) -> ApiResult<Self> {
        match value {
            "remove" => Ok(VoteAction::Remove),
            other => VoteDirection::parse(other)
                .map(VoteAction::Cast)
                .ok_or_else(|| {
                    ApiError::InvalidInput(format!(
                        "Direction must be 'up', 'down', or 'remove', got '{}'",
                        other
                    ))
                }),
        }
    }
}

/// Counter state after a vote call
#[derive(Debug, Clone, Copy, Serialize)]
pub struct VoteTally {
    pub upvotes: i64,
    pub downvotes: i64,
    pub net_votes: i64,
    pub caller_direction: Option<VoteDirection>,
}

/// Comment as listed for one viewer
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct CommentView {
    pub id: Uuid,
    pub post_id: Uuid,
    pub author_id: Uuid,
    pub author_display_name: String,
    pub body: String,
    pub upvotes: i64,
    pub downvotes: i64,
    pub net_votes: i64,
    pub viewer_vote: Option<VoteDirection>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Comment writes and reads
pub struct CommentService {
    db: PgPool,
}

impl CommentService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Create a comment on a post visible to the author
    pub async fn create_comment(
        &self,
        author: Uuid,
        post_id: Uuid,
        body: String,
    ) -> ApiResult<Comment> {
        validation::validate_comment_body(&body)?;

        if !self.post_visible(author, post_id).await? {
            return Err(ApiError::NotFound("Post not found".to_string()));
        }

        let created_at = Utc::now();
        let comment = Comment {
            id: Uuid::new_v4(),
            post_id,
            author_id: author,
            body,
            upvotes: 0,
            downvotes: 0,
            soft_deleted: false,
            created_at,
            expires_at: lifecycle::initial_expiry(EntityKind::Comment, created_at),
        };

        let mut tx = self.db.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO comments (id, post_id, author_id, body, created_at, expires_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(comment.id)
        .bind(comment.post_id)
        .bind(comment.author_id)
        .bind(&comment.body)
        .bind(comment.created_at)
        .bind(comment.expires_at)
        .execute(&mut *tx)
        .await?;

        sqlx::query("UPDATE posts SET comment_count = comment_count + 1 WHERE id = $1")
            .bind(post_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        info!(comment_id = %comment.id, post_id = %post_id, "created comment");
        Ok(comment)
    }

    /// Live comments on a post, newest first, with the viewer's vote joined
    pub async fn list_comments(&self, viewer: Uuid, post_id: Uuid) -> ApiResult<Vec<CommentView>> {
        if !self.post_visible(viewer, post_id).await? {
            return Err(ApiError::NotFound("Post not found".to_string()));
        }

        let comments = sqlx::query_as::<_, CommentView>(
            r#"
            SELECT c.id, c.post_id, c.author_id, u.display_name AS author_display_name,
                   c.body, c.upvotes, c.downvotes,
                   c.upvotes - c.downvotes AS net_votes,
                   v.direction AS viewer_vote,
                   c.created_at, c.expires_at
            FROM comments c
            JOIN users u ON u.id = c.author_id
            LEFT JOIN comment_votes v ON v.comment_id = c.id AND v.user_id = $1
            WHERE c.post_id = $2
              AND c.soft_deleted = FALSE
              AND c.expires_at > $3
            ORDER BY c.created_at DESC, c.id DESC
            "#,
        )
        .bind(viewer)
        .bind(post_id)
        .bind(Utc::now())
        .fetch_all(&self.db)
        .await?;

        Ok(comments)
    }

    /// Apply a vote in one transaction.
    ///
    /// Re-sending the same direction is a no-op delta, so clients can retry
    /// on network errors. A new or flipped-to upvote extends the comment's
    /// lifetime; a downvote that lifts the count to the toxicity threshold
    /// terminates the comment and its parent post. The termination never
    /// re-fires on an already-terminated comment, though the vote row is
    /// still recorded.
    pub async fn vote(
        &self,
        caller: Uuid,
        comment_id: Uuid,
        action: VoteAction,
    ) -> ApiResult<VoteTally> {
        let mut tx = self.db.begin().await?;

        // Row lock serializes concurrent votes on the same comment.
        let comment = sqlx::query_as::<_, Comment>(
            r#"
            SELECT id, post_id, author_id, body, upvotes, downvotes,
                   soft_deleted, created_at, expires_at
            FROM comments WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(comment_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| ApiError::NotFound("Comment not found".to_string()))?;

        // Friends-only gating on the parent post. Soft-deletion and expiry
        // are deliberately not checked here: a voter who could reach the
        // comment may still vote after termination.
        if !self
            .post_reachable_in_tx(&mut tx, caller, comment.post_id)
            .await?
        {
            return Err(ApiError::NotFound("Comment not found".to_string()));
        }

        let prior: Option<VoteDirection> = sqlx::query(
            "SELECT direction FROM comment_votes WHERE comment_id = $1 AND user_id = $2",
        )
        .bind(comment_id)
        .bind(caller)
        .fetch_optional(&mut *tx)
        .await?
        .map(|row| row.try_get("direction"))
        .transpose()?;

        let (up_delta, down_delta, caller_direction) = match (action, prior) {
            // No-op deltas: same direction again, or removing nothing.
            (VoteAction::Cast(dir), Some(p)) if p == dir => (0, 0, Some(dir)),
            (VoteAction::Remove, None) => (0, 0, None),

            (VoteAction::Cast(dir), None) => {
                sqlx::query(
                    r#"
                    INSERT INTO comment_votes (comment_id, user_id, direction, created_at)
                    VALUES ($1, $2, $3, $4)
                    "#,
                )
                .bind(comment_id)
                .bind(caller)
                .bind(dir)
                .bind(Utc::now())
                .execute(&mut *tx)
                .await?;

                match dir {
                    VoteDirection::Up => (1, 0, Some(dir)),
                    VoteDirection::Down => (0, 1, Some(dir)),
                }
            }

            (VoteAction::Cast(dir), Some(_)) => {
                sqlx::query(
                    "UPDATE comment_votes SET direction = $3 WHERE comment_id = $1 AND user_id = $2",
                )
                .bind(comment_id)
                .bind(caller)
                .bind(dir)
                .execute(&mut *tx)
                .await?;

                match dir {
                    VoteDirection::Up => (1, -1, Some(dir)),
                    VoteDirection::Down => (-1, 1, Some(dir)),
                }
            }

            (VoteAction::Remove, Some(p)) => {
                sqlx::query("DELETE FROM comment_votes WHERE comment_id = $1 AND user_id = $2")
                    .bind(comment_id)
                    .bind(caller)
                    .execute(&mut *tx)
                    .await?;

                match p {
                    VoteDirection::Up => (-1, 0, None),
                    VoteDirection::Down => (0, -1, None),
                }
            }
        };

        let upvotes = (comment.upvotes + up_delta).max(0);
        let downvotes = (comment.downvotes + down_delta).max(0);

        // Only new upvotes extend; removing an up never shortens.
        let expires_at = if up_delta > 0 && !comment.soft_deleted {
            lifecycle::apply_upvote(comment.expires_at, comment.created_at)
        } else {
            comment.expires_at
        };

        let terminate = down_delta > 0
            && !comment.soft_deleted
            && lifecycle::apply_downvote(downvotes) == DownvoteOutcome::Terminate;

        sqlx::query(
            r#"
            UPDATE comments
            SET upvotes = $2, downvotes = $3, expires_at = $4,
                soft_deleted = soft_deleted OR $5
            WHERE id = $1
            "#,
        )
        .bind(comment_id)
        .bind(upvotes)
        .bind(downvotes)
        .bind(expires_at)
        .bind(terminate)
        .execute(&mut *tx)
        .await?;

        if terminate {
            // Toxicity propagates one level up, and only one level.
            sqlx::query("UPDATE posts SET soft_deleted = TRUE WHERE id = $1")
                .bind(comment.post_id)
                .execute(&mut *tx)
                .await?;

            info!(
                comment_id = %comment_id,
                post_id = %comment.post_id,
                downvotes,
                "comment crossed toxicity threshold; terminated with parent post"
            );
        }

        tx.commit().await?;

        Ok(VoteTally {
            upvotes,
            downvotes,
            net_votes: upvotes - downvotes,
            caller_direction,
        })
    }

    /// Visibility test for the parent post: live and reachable by the viewer
    async fn post_visible(&self, viewer: Uuid, post_id: Uuid) -> ApiResult<bool> {
        let row = sqlx::query(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM posts p
                WHERE p.id = $3
                  AND p.soft_deleted = FALSE
                  AND p.expires_at > $2
                  AND (
                      p.visibility = 'public'
                      OR p.author_id = $1
                      OR (
                          p.visibility = 'friends'
                          AND EXISTS (
                              SELECT 1 FROM follows f1
                              WHERE f1.follower_id = $1 AND f1.followee_id = p.author_id
                          )
                          AND EXISTS (
                              SELECT 1 FROM follows f2
                              WHERE f2.follower_id = p.author_id AND f2.followee_id = $1
                          )
                      )
                  )
            ) AS visible
            "#,
        )
        .bind(viewer)
        .bind(Utc::now())
        .bind(post_id)
        .fetch_one(&self.db)
        .await?;

        Ok(row.try_get("visible")?)
    }

    async fn post_reachable_in_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        viewer: Uuid,
        post_id: Uuid,
    ) -> ApiResult<bool> {
        let row = sqlx::query(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM posts p
                WHERE p.id = $2
                  AND (
                      p.visibility = 'public'
                      OR p.author_id = $1
                      OR (
                          p.visibility = 'friends'
                          AND EXISTS (
                              SELECT 1 FROM follows f1
                              WHERE f1.follower_id = $1 AND f1.followee_id = p.author_id
                          )
                          AND EXISTS (
                              SELECT 1 FROM follows f2
                              WHERE f2.follower_id = p.author_id AND f2.followee_id = $1
                          )
                      )
                  )
            ) AS reachable
            "#,
        )
        .bind(viewer)
        .bind(post_id)
        .fetch_one(&mut **tx)
        .await?;

        Ok(row.try_get("reachable")?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vote_action_parsing() {
        assert_eq!(
            VoteAction::parse("up").unwrap(),
            VoteAction::Cast(VoteDirection::Up)
        );
        assert_eq!(
            VoteAction::parse("down").unwrap(),
            VoteAction::Cast(VoteDirection::Down)
        );
        assert_eq!(VoteAction::parse("remove").unwrap(), VoteAction::Remove);

        let err = VoteAction::parse("sideways").unwrap_err();
        assert_eq!(err.kind(), "InvalidInput");
    }
}
