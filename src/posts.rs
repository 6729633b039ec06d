/// Post lifecycle: creation with media ingest, deletion, likes, views
use crate::blob_store::{self, BlobBackend};
use crate::db::models::{Post, Visibility};
use crate::error::{ApiError, ApiResult};
use crate::lifecycle::{self, EntityKind};
use crate::validation;
use chrono::Utc;
use sqlx::{PgPool, Row};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

/// An uploaded media payload, content type as received from the client
pub struct MediaUpload {
    pub data: Vec<u8>,
    pub content_type: Option<String>,
}

/// Result of a like or unlike call
#[derive(Debug, Clone, Copy)]
pub struct LikeState {
    pub like_count: i64,
    pub liked_by_viewer: bool,
}

/// Result of a view-tracking call
#[derive(Debug, Clone, Copy)]
pub struct ViewOutcome {
    pub view_count: i64,
    /// Whether this call added a view (false within the dedup window)
    pub recorded: bool,
}

/// Post writes and engagement
pub struct PostService {
    db: PgPool,
    blobs: Arc<dyn BlobBackend>,
    media_limit: usize,
}

impl PostService {
    pub fn new(db: PgPool, blobs: Arc<dyn BlobBackend>, media_limit: usize) -> Self {
        Self {
            db,
            blobs,
            media_limit,
        }
    }

    /// Create a post, ingesting media first so no row ever references a
    /// missing blob. If the insert fails after the PUT, the orphan blob is
    /// left for a separate reclamation sweep.
    pub async fn create_post(
        &self,
        author: Uuid,
        body: String,
        visibility: Visibility,
        media: Option<MediaUpload>,
    ) -> ApiResult<Post> {
        validation::validate_post_body(&body)?;

        let media_key = match media {
            Some(upload) => {
                let content_type = validation::validate_media(
                    upload.content_type.as_deref(),
                    upload.data.len(),
                    self.media_limit,
                )?;

                let key = blob_store::fresh_media_key();
                self.blobs.put(&key, upload.data, &content_type).await?;
                Some(key)
            }
            None => None,
        };

        let created_at = Utc::now();
        let post = Post {
            id: Uuid::new_v4(),
            author_id: author,
            body,
            media_key,
            visibility,
            view_count: 0,
            like_count: 0,
            comment_count: 0,
            soft_deleted: false,
            created_at,
            expires_at: lifecycle::initial_expiry(EntityKind::Post, created_at),
        };

        sqlx::query(
            r#"
            INSERT INTO posts
                (id, author_id, body, media_key, visibility, created_at, expires_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(post.id)
        .bind(post.author_id)
        .bind(&post.body)
        .bind(&post.media_key)
        .bind(post.visibility)
        .bind(post.created_at)
        .bind(post.expires_at)
        .execute(&self.db)
        .await?;

        info!(post_id = %post.id, author = %author, "created post");
        Ok(post)
    }

    /// Author-only soft delete
    pub async fn delete_post(&self, caller: Uuid, post_id: Uuid) -> ApiResult<()> {
        // Invisible posts read as missing; a visible post owned by someone
        // else is the only Forbidden case.
        let post = self
            .visible_post(caller, post_id)
            .await?
            .ok_or_else(|| ApiError::NotFound("Post not found".to_string()))?;

        if post.author_id != caller {
            return Err(ApiError::Forbidden(
                "Only the author can delete a post".to_string(),
            ));
        }

        sqlx::query("UPDATE posts SET soft_deleted = TRUE WHERE id = $1")
            .bind(post_id)
            .execute(&self.db)
            .await?;

        info!(post_id = %post_id, "post deleted by author");
        Ok(())
    }

    /// Idempotent like. The like row and the denormalized counter move in
    /// the same transaction.
    pub async fn like(&self, caller: Uuid, post_id: Uuid) -> ApiResult<LikeState> {
        self.visible_post(caller, post_id)
            .await?
            .ok_or_else(|| ApiError::NotFound("Post not found".to_string()))?;

        let mut tx = self.db.begin().await?;

        let inserted = sqlx::query(
            r#"
            INSERT INTO likes (post_id, user_id, created_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (post_id, user_id) DO NOTHING
            "#,
        )
        .bind(post_id)
        .bind(caller)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

        let like_count: i64 = if inserted.rows_affected() == 1 {
            sqlx::query("UPDATE posts SET like_count = like_count + 1 WHERE id = $1 RETURNING like_count")
                .bind(post_id)
                .fetch_one(&mut *tx)
                .await?
                .try_get("like_count")?
        } else {
            sqlx::query("SELECT like_count FROM posts WHERE id = $1")
                .bind(post_id)
                .fetch_one(&mut *tx)
                .await?
                .try_get("like_count")?
        };

        tx.commit().await?;

        Ok(LikeState {
            like_count,
            liked_by_viewer: true,
        })
    }

    /// Idempotent unlike
    pub async fn unlike(&self, caller: Uuid, post_id: Uuid) -> ApiResult<LikeState> {
        self.visible_post(caller, post_id)
            .await?
            .ok_or_else(|| ApiError::NotFound("Post not found".to_string()))?;

        let mut tx = self.db.begin().await?;

        let deleted = sqlx::query("DELETE FROM likes WHERE post_id = $1 AND user_id = $2")
            .bind(post_id)
            .bind(caller)
            .execute(&mut *tx)
            .await?;

        let like_count: i64 = if deleted.rows_affected() == 1 {
            sqlx::query(
                "UPDATE posts SET like_count = GREATEST(like_count - 1, 0) WHERE id = $1 RETURNING like_count",
            )
            .bind(post_id)
            .fetch_one(&mut *tx)
            .await?
            .try_get("like_count")?
        } else {
            sqlx::query("SELECT like_count FROM posts WHERE id = $1")
                .bind(post_id)
                .fetch_one(&mut *tx)
                .await?
                .try_get("like_count")?
        };

        tx.commit().await?;

        Ok(LikeState {
            like_count,
            liked_by_viewer: false,
        })
    }

    /// Record a view, suppressing duplicates inside the dedup window.
    ///
    /// Views of invisible posts succeed without mutating anything, so the
    /// endpoint never discloses whether the post exists.
    pub async fn record_view(&self, caller: Uuid, post_id: Uuid) -> ApiResult<ViewOutcome> {
        let Some(post) = self.visible_post(caller, post_id).await? else {
            return Ok(ViewOutcome {
                view_count: 0,
                recorded: false,
            });
        };

        let now = Utc::now();
        let mut tx = self.db.begin().await?;

        let seen_recently: bool = sqlx::query(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM post_views
                WHERE post_id = $1 AND user_id = $2 AND viewed_at >= $3
            ) AS seen
            "#,
        )
        .bind(post_id)
        .bind(caller)
        .bind(lifecycle::view_dedup_cutoff(now))
        .fetch_one(&mut *tx)
        .await?
        .try_get("seen")?;

        if seen_recently {
            tx.commit().await?;
            return Ok(ViewOutcome {
                view_count: post.view_count,
                recorded: false,
            });
        }

        sqlx::query(
            "INSERT INTO post_views (id, post_id, user_id, viewed_at) VALUES ($1, $2, $3, $4)",
        )
        .bind(Uuid::new_v4())
        .bind(post_id)
        .bind(caller)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        let view_count: i64 = sqlx::query(
            "UPDATE posts SET view_count = view_count + 1 WHERE id = $1 RETURNING view_count",
        )
        .bind(post_id)
        .fetch_one(&mut *tx)
        .await?
        .try_get("view_count")?;

        tx.commit().await?;

        Ok(ViewOutcome {
            view_count,
            recorded: true,
        })
    }

    /// Fetch a post row iff it is visible to the viewer
    pub async fn visible_post(&self, viewer: Uuid, post_id: Uuid) -> ApiResult<Option<Post>> {
        let post = sqlx::query_as::<_, Post>(
            r#"
            SELECT p.id, p.author_id, p.body, p.media_key, p.visibility,
                   p.view_count, p.like_count, p.comment_count, p.soft_deleted,
                   p.created_at, p.expires_at
            FROM posts p
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
            "#,
        )
        .bind(viewer)
        .bind(Utc::now())
        .bind(post_id)
        .fetch_optional(&self.db)
        .await?;

        Ok(post)
    }
}
