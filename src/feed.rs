/// Feed queries and per-viewer projection
///
/// Every feed element is a projection of a post for one viewer: stored
/// fields plus the viewer-dependent computations (liked state, remaining
/// lifetime, media URL). The visibility predicate is enforced inside the
/// queries so no invisible row ever leaves this module.
use crate::blob_store::BlobBackend;
use crate::db::models::Visibility;
use crate::error::{ApiError, ApiResult};
use crate::follows::FollowService;
use crate::lifecycle;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{FromRow, PgPool, Row};
use std::sync::Arc;
use uuid::Uuid;

/// Hard upper bound on feed page size
pub const MAX_FEED_LIMIT: i64 = 50;
/// Page size when the client does not ask for one
pub const DEFAULT_FEED_LIMIT: i64 = 20;

/// Per-viewer projection of a post
#[derive(Debug, Clone, Serialize)]
pub struct FeedPost {
    pub id: Uuid,
    pub author_id: Uuid,
    pub author_display_name: String,
    pub body: String,
    pub media_url: Option<String>,
    pub visibility: Visibility,
    pub view_count: i64,
    pub like_count: i64,
    pub comment_count: i64,
    pub liked_by_viewer: bool,
    pub hours_remaining: f64,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// One feed page
#[derive(Debug, Serialize)]
pub struct FeedPage {
    pub posts: Vec<FeedPost>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
}

/// Per-viewer profile projection
#[derive(Debug, Serialize)]
pub struct UserProfile {
    pub id: Uuid,
    pub display_name: String,
    pub bio: Option<String>,
    pub post_count: i64,
    pub follower_count: i64,
    pub following_count: i64,
    pub followed_by_viewer: bool,
    /// Mutual follow between viewer and target
    pub friends_with_viewer: bool,
    pub is_self: bool,
    /// Stable external subject; exposed only on the self view
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
}

#[derive(Debug, FromRow)]
struct FeedPostRow {
    id: Uuid,
    author_id: Uuid,
    author_display_name: String,
    body: String,
    media_key: Option<String>,
    visibility: Visibility,
    view_count: i64,
    like_count: i64,
    comment_count: i64,
    liked_by_viewer: bool,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

/// Opaque keyset cursor over `(created_at, id)`, stable under insertion at
/// the head of the feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeedCursor {
    pub created_at: DateTime<Utc>,
    pub id: Uuid,
}

impl FeedCursor {
    // Microsecond precision matches the database timestamp exactly, so a
    // decoded cursor compares equal to the row it was issued from.
    pub fn encode(&self) -> String {
        URL_SAFE_NO_PAD.encode(format!("{}:{}", self.created_at.timestamp_micros(), self.id))
    }

    pub fn decode(token: &str) -> ApiResult<Self> {
        let invalid = || ApiError::InvalidInput("Malformed cursor".to_string());

        let raw = URL_SAFE_NO_PAD.decode(token).map_err(|_| invalid())?;
        let text = String::from_utf8(raw).map_err(|_| invalid())?;
        let (micros, id) = text.split_once(':').ok_or_else(invalid)?;

        let micros: i64 = micros.parse().map_err(|_| invalid())?;
        let created_at = DateTime::from_timestamp_micros(micros).ok_or_else(invalid)?;
        let id = Uuid::parse_str(id).map_err(|_| invalid())?;

        Ok(Self { created_at, id })
    }
}

/// Clamp a requested page size into `1..=MAX_FEED_LIMIT`
pub fn clamp_limit(requested: Option<i64>) -> i64 {
    requested
        .unwrap_or(DEFAULT_FEED_LIMIT)
        .clamp(1, MAX_FEED_LIMIT)
}

// Post columns selected for projection, with the viewer's like state
// resolved in the same round trip.
const PROJECTION_COLUMNS: &str = r#"
    p.id, p.author_id, u.display_name AS author_display_name, p.body,
    p.media_key, p.visibility, p.view_count, p.like_count, p.comment_count,
    p.created_at, p.expires_at,
    EXISTS (
        SELECT 1 FROM likes l WHERE l.post_id = p.id AND l.user_id = $1
    ) AS liked_by_viewer
"#;

// A post is visible to the viewer ($1) iff it is live and either public,
// the viewer's own, or friends-only with a mutual follow. $2 is `now`.
const VISIBILITY_PREDICATE: &str = r#"
    p.soft_deleted = FALSE
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
"#;

/// Feed and profile reads
pub struct FeedService {
    db: PgPool,
    blobs: Arc<dyn BlobBackend>,
    follows: Arc<FollowService>,
}

impl FeedService {
    pub fn new(db: PgPool, blobs: Arc<dyn BlobBackend>, follows: Arc<FollowService>) -> Self {
        Self { db, blobs, follows }
    }

    /// Home feed: all posts visible to the viewer, newest first
    pub async fn home_feed(
        &self,
        viewer: Uuid,
        cursor: Option<FeedCursor>,
        limit: i64,
    ) -> ApiResult<FeedPage> {
        let now = Utc::now();
        let sql = format!(
            "SELECT {columns}
             FROM posts p
             JOIN users u ON u.id = p.author_id
             WHERE {visible}
               AND ($3::timestamptz IS NULL OR (p.created_at, p.id) < ($3, $4))
             ORDER BY p.created_at DESC, p.id DESC
             LIMIT $5",
            columns = PROJECTION_COLUMNS,
            visible = VISIBILITY_PREDICATE,
        );

        let rows = sqlx::query_as::<_, FeedPostRow>(&sql)
            .bind(viewer)
            .bind(now)
            .bind(cursor.map(|c| c.created_at))
            .bind(cursor.map(|c| c.id).unwrap_or_else(Uuid::nil))
            .bind(limit)
            .fetch_all(&self.db)
            .await?;

        Ok(self.page_from_rows(rows, limit, now))
    }

    /// One user's live posts, as visible to the viewer
    pub async fn user_feed(
        &self,
        viewer: Uuid,
        target: Uuid,
        cursor: Option<FeedCursor>,
        limit: i64,
    ) -> ApiResult<FeedPage> {
        let now = Utc::now();
        let sql = format!(
            "SELECT {columns}
             FROM posts p
             JOIN users u ON u.id = p.author_id
             WHERE p.author_id = $6
               AND {visible}
               AND ($3::timestamptz IS NULL OR (p.created_at, p.id) < ($3, $4))
             ORDER BY p.created_at DESC, p.id DESC
             LIMIT $5",
            columns = PROJECTION_COLUMNS,
            visible = VISIBILITY_PREDICATE,
        );

        let rows = sqlx::query_as::<_, FeedPostRow>(&sql)
            .bind(viewer)
            .bind(now)
            .bind(cursor.map(|c| c.created_at))
            .bind(cursor.map(|c| c.id).unwrap_or_else(Uuid::nil))
            .bind(limit)
            .bind(target)
            .fetch_all(&self.db)
            .await?;

        Ok(self.page_from_rows(rows, limit, now))
    }

    /// Single post projection; None if missing or not visible to the viewer
    pub async fn read_post_for_viewer(
        &self,
        viewer: Uuid,
        post_id: Uuid,
    ) -> ApiResult<Option<FeedPost>> {
        let now = Utc::now();
        let sql = format!(
            "SELECT {columns}
             FROM posts p
             JOIN users u ON u.id = p.author_id
             WHERE p.id = $3 AND {visible}",
            columns = PROJECTION_COLUMNS,
            visible = VISIBILITY_PREDICATE,
        );

        let row = sqlx::query_as::<_, FeedPostRow>(&sql)
            .bind(viewer)
            .bind(now)
            .bind(post_id)
            .fetch_optional(&self.db)
            .await?;

        Ok(row.map(|r| self.project(r, now)))
    }

    /// Profile projection: public counters plus the viewer's follow state
    pub async fn user_profile(&self, viewer: Uuid, target: Uuid) -> ApiResult<Option<UserProfile>> {
        let row = sqlx::query("SELECT id, subject, display_name, bio FROM users WHERE id = $1")
            .bind(target)
            .fetch_optional(&self.db)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let post_count: i64 = sqlx::query(
            "SELECT COUNT(*) AS post_count FROM posts
             WHERE author_id = $1 AND soft_deleted = FALSE AND expires_at > $2",
        )
        .bind(target)
        .bind(Utc::now())
        .fetch_one(&self.db)
        .await?
        .try_get("post_count")?;

        let (follower_count, following_count) = self.follows.counts(target).await?;
        let followed_by_viewer = self.follows.is_following(viewer, target).await?;
        let friends_with_viewer = self.follows.is_friend(viewer, target).await?;

        let is_self = viewer == target;
        let subject: String = row.try_get("subject")?;

        Ok(Some(UserProfile {
            id: row.try_get("id")?,
            display_name: row.try_get("display_name")?,
            bio: row.try_get("bio")?,
            post_count,
            follower_count,
            following_count,
            followed_by_viewer,
            friends_with_viewer,
            is_self,
            subject: is_self.then_some(subject),
        }))
    }

    fn page_from_rows(&self, rows: Vec<FeedPostRow>, limit: i64, now: DateTime<Utc>) -> FeedPage {
        let full_page = rows.len() as i64 == limit;
        let posts: Vec<FeedPost> = rows.into_iter().map(|r| self.project(r, now)).collect();

        let next_cursor = if full_page {
            posts.last().map(|p| {
                FeedCursor {
                    created_at: p.created_at,
                    id: p.id,
                }
                .encode()
            })
        } else {
            None
        };

        FeedPage { posts, next_cursor }
    }

    fn project(&self, row: FeedPostRow, now: DateTime<Utc>) -> FeedPost {
        FeedPost {
            id: row.id,
            author_id: row.author_id,
            author_display_name: row.author_display_name,
            body: row.body,
            media_url: row.media_key.as_deref().map(|k| self.blobs.url_for(k)),
            visibility: row.visibility,
            view_count: row.view_count,
            like_count: row.like_count,
            comment_count: row.comment_count,
            liked_by_viewer: row.liked_by_viewer,
            hours_remaining: lifecycle::hours_remaining(row.expires_at, now),
            created_at: row.created_at,
            expires_at: row.expires_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn cursor_round_trips() {
        let cursor = FeedCursor {
            created_at: Utc.with_ymd_and_hms(2025, 1, 1, 12, 30, 0).unwrap(),
            id: Uuid::new_v4(),
        };

        let decoded = FeedCursor::decode(&cursor.encode()).unwrap();
        assert_eq!(decoded, cursor);
    }

    #[test]
    fn cursor_preserves_sub_millisecond_precision() {
        // Database timestamps carry microseconds; the cursor must not
        // round them or pagination skips rows.
        let cursor = FeedCursor {
            created_at: DateTime::from_timestamp_micros(1_735_689_600_123_456).unwrap(),
            id: Uuid::new_v4(),
        };

        let decoded = FeedCursor::decode(&cursor.encode()).unwrap();
        assert_eq!(decoded.created_at, cursor.created_at);
    }

    #[test]
    fn cursor_rejects_garbage() {
        assert!(FeedCursor::decode("???not-base64???").is_err());
        assert!(FeedCursor::decode(&URL_SAFE_NO_PAD.encode("missing-separator")).is_err());
        assert!(FeedCursor::decode(&URL_SAFE_NO_PAD.encode("abc:not-a-uuid")).is_err());
        assert!(FeedCursor::decode(&URL_SAFE_NO_PAD.encode(format!(
            "not-millis:{}",
            Uuid::new_v4()
        )))
        .is_err());
    }

    #[test]
    fn cursor_errors_are_invalid_input() {
        let err = FeedCursor::decode("!").unwrap_err();
        assert_eq!(err.kind(), "InvalidInput");
    }

    #[test]
    fn limit_clamping() {
        assert_eq!(clamp_limit(None), DEFAULT_FEED_LIMIT);
        assert_eq!(clamp_limit(Some(10)), 10);
        assert_eq!(clamp_limit(Some(0)), 1);
        assert_eq!(clamp_limit(Some(-5)), 1);
        assert_eq!(clamp_limit(Some(51)), MAX_FEED_LIMIT);
        assert_eq!(clamp_limit(Some(1_000)), MAX_FEED_LIMIT);
    }
}
