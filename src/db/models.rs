/// Database row types and shared enums
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Post visibility class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "visibility", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    /// Any authenticated viewer
    Public,
    /// Mutual-follow viewers only
    Friends,
}

impl Visibility {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "public" => Some(Visibility::Public),
            "friends" => Some(Visibility::Friends),
            _ => None,
        }
    }
}

/// Direction of a comment vote
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "vote_direction", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum VoteDirection {
    Up,
    Down,
}

impl VoteDirection {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "up" => Some(VoteDirection::Up),
            "down" => Some(VoteDirection::Down),
            _ => None,
        }
    }
}

/// Local user account, created on first authenticated request
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    /// Stable external subject from the identity provider
    pub subject: String,
    pub display_name: String,
    pub bio: Option<String>,
    pub profile_public: bool,
    pub created_at: DateTime<Utc>,
}

/// Post row
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Post {
    pub id: Uuid,
    pub author_id: Uuid,
    pub body: String,
    /// Opaque blob-store key; None for text-only posts
    pub media_key: Option<String>,
    pub visibility: Visibility,
    pub view_count: i64,
    pub like_count: i64,
    pub comment_count: i64,
    pub soft_deleted: bool,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Comment row
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Comment {
    pub id: Uuid,
    pub post_id: Uuid,
    pub author_id: Uuid,
    pub body: String,
    pub upvotes: i64,
    pub downvotes: i64,
    pub soft_deleted: bool,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn visibility_round_trips_through_strings() {
        assert_eq!(Visibility::parse("public"), Some(Visibility::Public));
        assert_eq!(Visibility::parse("friends"), Some(Visibility::Friends));
        assert_eq!(Visibility::parse("private"), None);
    }

    #[test]
    fn visibility_serializes_lowercase() {
        assert_eq!(
            serde_json::to_value(Visibility::Public).unwrap(),
            serde_json::json!("public")
        );
        assert_eq!(
            serde_json::to_value(Visibility::Friends).unwrap(),
            serde_json::json!("friends")
        );
    }

    #[test]
    fn vote_direction_round_trips_through_strings() {
        assert_eq!(VoteDirection::parse("up"), Some(VoteDirection::Up));
        assert_eq!(VoteDirection::parse("down"), Some(VoteDirection::Down));
        assert_eq!(VoteDirection::parse("sideways"), None);

        assert_eq!(
            serde_json::to_value(VoteDirection::Up).unwrap(),
            serde_json::json!("up")
        );
    }
}
