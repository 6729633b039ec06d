/// Lifecycle policy for ephemeral content
///
/// Pure functions over (entity snapshot, current time). No I/O: the vote
/// path and the reaper both call into this module so the expiry rules live
/// in exactly one place.
use chrono::{DateTime, Duration, Utc};

/// Post lifetime at creation
pub const POST_TTL_HOURS: i64 = 24;
/// Comment lifetime at creation
pub const COMMENT_TTL_DAYS: i64 = 7;
/// Lifetime added per upvote event
pub const UPVOTE_EXTENSION_HOURS: i64 = 6;
/// Downvote count at which a comment terminates
pub const TOXICITY_THRESHOLD: i64 = 5;
/// Hard cap on any entity's lifetime, measured from creation
pub const MAX_LIFETIME_DAYS: i64 = 30;
/// Window within which repeat views by the same viewer are suppressed
pub const VIEW_DEDUP_WINDOW_HOURS: i64 = 1;

/// Kind of expiring entity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Post,
    Comment,
}

/// Outcome of a downvote event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownvoteOutcome {
    /// Comment crossed the toxicity threshold; terminate it and its parent post
    Terminate,
    Continue,
}

/// Expiry assigned at creation time
pub fn initial_expiry(kind: EntityKind, created_at: DateTime<Utc>) -> DateTime<Utc> {
    match kind {
        EntityKind::Post => created_at + Duration::hours(POST_TTL_HOURS),
        EntityKind::Comment => created_at + Duration::days(COMMENT_TTL_DAYS),
    }
}

/// Latest allowed expiry for an entity created at `created_at`
pub fn max_expiry(created_at: DateTime<Utc>) -> DateTime<Utc> {
    created_at + Duration::days(MAX_LIFETIME_DAYS)
}

/// Extend expiry for one upvote event, capped at the 30-day lifetime.
///
/// One call per upvote event; the extension is applied at vote time so a
/// reader's view of `expires_at` always reflects all historical votes.
pub fn apply_upvote(expires_at: DateTime<Utc>, created_at: DateTime<Utc>) -> DateTime<Utc> {
    let extended = expires_at + Duration::hours(UPVOTE_EXTENSION_HOURS);
    extended.min(max_expiry(created_at))
}

/// Decide whether a downvote event terminates the comment.
///
/// `downvotes` is the count after the increment.
pub fn apply_downvote(downvotes: i64) -> DownvoteOutcome {
    if downvotes >= TOXICITY_THRESHOLD {
        DownvoteOutcome::Terminate
    } else {
        DownvoteOutcome::Continue
    }
}

/// True iff a live entity is past its expiry and should be soft-deleted
pub fn should_reap(expires_at: DateTime<Utc>, soft_deleted: bool, now: DateTime<Utc>) -> bool {
    !soft_deleted && now >= expires_at
}

/// Dedup cutoff: views at or after this instant suppress a new view row
pub fn view_dedup_cutoff(now: DateTime<Utc>) -> DateTime<Utc> {
    now - Duration::hours(VIEW_DEDUP_WINDOW_HOURS)
}

/// Remaining lifetime in fractional hours, clamped at zero
pub fn hours_remaining(expires_at: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    let millis = (expires_at - now).num_milliseconds();
    if millis <= 0 {
        0.0
    } else {
        millis as f64 / 3_600_000.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn post_expiry_is_24_hours() {
        let expires = initial_expiry(EntityKind::Post, t0());
        assert_eq!(expires, t0() + Duration::hours(24));
    }

    #[test]
    fn comment_expiry_is_7_days() {
        let expires = initial_expiry(EntityKind::Comment, t0());
        assert_eq!(expires, t0() + Duration::days(7));
    }

    #[test]
    fn upvote_extends_by_6_hours() {
        let created = t0();
        let expires = initial_expiry(EntityKind::Comment, created);
        let extended = apply_upvote(expires, created);
        assert_eq!(extended, expires + Duration::hours(6));
    }

    #[test]
    fn upvote_extension_caps_at_30_days() {
        let created = t0();
        let mut expires = initial_expiry(EntityKind::Comment, created);

        // 100 upvotes would be 7d + 600h; the cap wins.
        for _ in 0..100 {
            expires = apply_upvote(expires, created);
        }
        assert_eq!(expires, created + Duration::days(30));

        // Further upvotes stay pinned at the cap.
        assert_eq!(apply_upvote(expires, created), created + Duration::days(30));
    }

    #[test]
    fn extension_is_deterministic_over_a_fixed_pair() {
        let created = t0();
        let expires = initial_expiry(EntityKind::Comment, created);
        assert_eq!(apply_upvote(expires, created), apply_upvote(expires, created));
    }

    #[test]
    fn fifth_downvote_terminates() {
        assert_eq!(apply_downvote(4), DownvoteOutcome::Continue);
        assert_eq!(apply_downvote(5), DownvoteOutcome::Terminate);
        assert_eq!(apply_downvote(6), DownvoteOutcome::Terminate);
    }

    #[test]
    fn reap_predicate_boundaries() {
        let expires = t0() + Duration::hours(24);

        // One millisecond early: keep.
        assert!(!should_reap(expires, false, expires - Duration::milliseconds(1)));
        // Exactly at expiry: reap.
        assert!(should_reap(expires, false, expires));
        // Past expiry: reap.
        assert!(should_reap(expires, false, expires + Duration::seconds(1)));
        // Already soft-deleted rows are never re-reaped.
        assert!(!should_reap(expires, true, expires + Duration::days(1)));
    }

    #[test]
    fn hours_remaining_clamps_at_zero() {
        let expires = t0() + Duration::hours(24);
        assert_eq!(hours_remaining(expires, t0()), 24.0);
        assert_eq!(hours_remaining(expires, expires + Duration::hours(1)), 0.0);

        let half = hours_remaining(expires, t0() + Duration::minutes(30));
        assert!((half - 23.5).abs() < 1e-9);
    }

    #[test]
    fn dedup_cutoff_is_one_hour_back() {
        assert_eq!(view_dedup_cutoff(t0()), t0() - Duration::hours(1));
    }
}
