/// User accounts
///
/// Users are created lazily: the first authenticated request from a new
/// external subject inserts a row. Every later request resolves to it.
use crate::db::models::User;
use crate::error::{ApiError, ApiResult};
use crate::identity::ResolvedIdentity;
use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

/// User persistence and lookups
pub struct UserStore {
    db: PgPool,
}

impl UserStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Fetch the user for an external subject, creating it on first sight.
    ///
    /// Concurrent first requests race on the unique subject index; the
    /// loser of the race re-reads the winner's row.
    pub async fn get_or_create(&self, identity: &ResolvedIdentity) -> ApiResult<User> {
        if let Some(user) = self.find_by_subject(&identity.subject).await? {
            return Ok(user);
        }

        let display_name = identity
            .display_name
            .clone()
            .or_else(|| identity.email.clone())
            .unwrap_or_else(|| "New user".to_string());

        let user = User {
            id: Uuid::new_v4(),
            subject: identity.subject.clone(),
            display_name,
            bio: None,
            profile_public: true,
            created_at: Utc::now(),
        };

        let inserted = sqlx::query(
            r#"
            INSERT INTO users (id, subject, display_name, bio, profile_public, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (subject) DO NOTHING
            "#,
        )
        .bind(user.id)
        .bind(&user.subject)
        .bind(&user.display_name)
        .bind(&user.bio)
        .bind(user.profile_public)
        .bind(user.created_at)
        .execute(&self.db)
        .await?;

        if inserted.rows_affected() == 1 {
            return Ok(user);
        }

        // Lost the race: another request created the row first.
        self.find_by_subject(&identity.subject)
            .await?
            .ok_or_else(|| ApiError::Internal("User vanished after insert race".to_string()))
    }

    /// Fetch a user by local id
    pub async fn find_by_id(&self, id: Uuid) -> ApiResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, subject, display_name, bio, profile_public, created_at
             FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?;

        Ok(user)
    }

    async fn find_by_subject(&self, subject: &str) -> ApiResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, subject, display_name, bio, profile_public, created_at
             FROM users WHERE subject = $1",
        )
        .bind(subject)
        .fetch_optional(&self.db)
        .await?;

        Ok(user)
    }
}
