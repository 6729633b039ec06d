/// Contract-level tests for the ephemeral content rules
///
/// Note: These verify the arithmetic and wire formats the service promises.
/// End-to-end coverage against a live database lives outside this crate.

use chrono::{DateTime, Duration, TimeZone, Utc};

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap()
}

#[test]
fn post_expiry_contract() {
    // A post created at T expires at T + 24h.
    let expires = t0() + Duration::hours(24);
    assert_eq!(expires.to_rfc3339(), "2025-01-02T00:00:00+00:00");
}

#[test]
fn comment_extension_never_exceeds_thirty_days() {
    // 100 upvotes on a 7-day comment would add 600 hours; the 30-day cap
    // from creation always wins.
    let created = t0();
    let cap = created + Duration::days(30);

    let mut expires = created + Duration::days(7);
    for _ in 0..100 {
        expires = (expires + Duration::hours(6)).min(cap);
    }

    assert_eq!(expires, cap);
}

#[test]
fn single_upvote_extension_example() {
    // One upvote on a fresh comment moves its expiry from 7 days out to
    // 7 days 6 hours out.
    let created = t0();
    let cap = created + Duration::days(30);
    let extended = ((created + Duration::days(7)) + Duration::hours(6)).min(cap);
    assert_eq!(extended, created + Duration::days(7) + Duration::hours(6));
}

#[test]
fn hours_remaining_is_fractional() {
    let expires = t0() + Duration::hours(24);
    let now = t0() + Duration::minutes(90);
    let remaining = (expires - now).num_milliseconds() as f64 / 3_600_000.0;
    assert!((remaining - 22.5).abs() < 1e-9);
}

#[test]
fn bearer_header_parsing() {
    let auth_header = "Bearer abc123token";
    assert_eq!(auth_header.strip_prefix("Bearer "), Some("abc123token"));

    let invalid_header = "abc123token";
    assert_eq!(invalid_header.strip_prefix("Bearer "), None);
}

#[test]
fn cursor_encoding_is_url_safe() {
    use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};

    let id = uuid::Uuid::new_v4();
    let raw = format!("{}:{}", t0().timestamp_micros(), id);
    let token = URL_SAFE_NO_PAD.encode(&raw);

    // No characters that need query-string escaping.
    assert!(token.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));

    let decoded = String::from_utf8(URL_SAFE_NO_PAD.decode(&token).unwrap()).unwrap();
    assert_eq!(decoded, raw);
}

#[test]
fn error_body_wire_shape() {
    let body = serde_json::json!({
        "error": {
            "kind": "NotFound",
            "message": "Post not found"
        }
    });

    assert_eq!(body["error"]["kind"], "NotFound");
    assert!(body["error"]["message"].is_string());
}

#[test]
fn timestamps_serialize_as_iso8601_utc() {
    let ts = t0();
    let json = serde_json::to_value(ts).unwrap();
    let text = json.as_str().unwrap();
    assert!(text.starts_with("2025-01-01T00:00:00"));
    assert!(text.ends_with('Z') || text.ends_with("+00:00"));
}

#[test]
fn toxicity_threshold_counts_downvotes_not_net_score() {
    // 10 upvotes do not shield a comment: the 5th downvote terminates
    // regardless of the net score.
    let upvotes = 10i64;
    let downvotes = 5i64;
    assert!(downvotes >= 5);
    assert!(upvotes - downvotes > 0);
}

#[test]
fn vote_flip_preserves_single_row_invariant() {
    // up then down must leave exactly one vote with downvotes += 1 and
    // upvotes unchanged relative to the pre-vote state.
    let (mut up, mut down) = (0i64, 0i64);

    // vote up
    up += 1;
    // flip to down
    up -= 1;
    down += 1;

    assert_eq!((up, down), (0, 1));
}
