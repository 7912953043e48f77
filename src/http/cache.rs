//! HTTP cache control module
//!
//! Provides `ETag` generation and conditional request handling.

use chrono::{DateTime, Utc};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::time::SystemTime;

const HTTP_DATE: &str = "%a, %d %b %Y %H:%M:%S GMT";

/// Generate `ETag` for a buffered asset by hashing its content
pub fn generate_etag(content: &[u8]) -> String {
    let mut hasher = DefaultHasher::new();
    content.hash(&mut hasher);
    format!("\"{:x}\"", hasher.finish())
}

/// Generate a weak `ETag` for a file from its size and modification time,
/// so large videos are never hashed
pub fn file_etag(size: u64, modified: SystemTime) -> String {
    let secs = DateTime::<Utc>::from(modified).timestamp();
    format!("W/\"{size:x}-{secs:x}\"")
}

/// Format a timestamp as an HTTP-date (`Last-Modified`)
pub fn http_date(time: SystemTime) -> String {
    DateTime::<Utc>::from(time).format(HTTP_DATE).to_string()
}

/// Check if client's `If-None-Match` header matches the server's `ETag`
///
/// Supports a single tag, a comma separated list, and `*`. Weak comparison:
/// a `W/` prefix on either side is ignored.
pub fn check_etag_match(if_none_match: Option<&str>, etag: &str) -> bool {
    let strip = |t: &str| t.trim().trim_start_matches("W/").to_string();
    let ours = strip(etag);
    if_none_match.is_some_and(|client| {
        client
            .split(',')
            .any(|e| e.trim() == "*" || strip(e) == ours)
    })
}

/// Whether a conditional GET can be answered with 304
///
/// `If-None-Match` wins when present; otherwise `If-Modified-Since` is
/// compared at one-second resolution.
pub fn is_not_modified(
    if_none_match: Option<&str>,
    if_modified_since: Option<&str>,
    etag: &str,
    modified: SystemTime,
) -> bool {
    if if_none_match.is_some() {
        return check_etag_match(if_none_match, etag);
    }
    let Some(since) = if_modified_since.and_then(|v| DateTime::parse_from_rfc2822(v).ok()) else {
        return false;
    };
    DateTime::<Utc>::from(modified).timestamp() <= since.timestamp()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_generate_etag() {
        let etag = generate_etag(b"hello world");
        assert!(etag.starts_with('"') && etag.ends_with('"'));
        assert_eq!(etag, generate_etag(b"hello world"));
        assert_ne!(etag, generate_etag(b"hello there"));
    }

    #[test]
    fn test_file_etag_changes_with_size_and_mtime() {
        let t = SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000);
        let a = file_etag(10, t);
        assert!(a.starts_with("W/\""));
        assert_ne!(a, file_etag(11, t));
        assert_ne!(a, file_etag(10, t + Duration::from_secs(1)));
    }

    #[test]
    fn test_check_etag_match() {
        let etag = "W/\"abc123\"";
        assert!(check_etag_match(Some("W/\"abc123\""), etag));
        assert!(check_etag_match(Some("\"abc123\""), etag));
        assert!(check_etag_match(Some("\"xyz\", \"abc123\""), etag));
        assert!(check_etag_match(Some("*"), etag));
        assert!(!check_etag_match(Some("\"different\""), etag));
        assert!(!check_etag_match(None, etag));
    }

    #[test]
    fn test_http_date_round_trips_through_if_modified_since() {
        let t = SystemTime::UNIX_EPOCH + Duration::from_secs(784_111_777);
        let date = http_date(t);
        assert_eq!(date, "Sun, 06 Nov 1994 08:49:37 GMT");
        assert!(is_not_modified(None, Some(&date), "\"x\"", t));
        assert!(!is_not_modified(
            None,
            Some(&date),
            "\"x\"",
            t + Duration::from_secs(5)
        ));
    }

    #[test]
    fn test_if_none_match_takes_precedence() {
        let t = SystemTime::UNIX_EPOCH + Duration::from_secs(784_111_777);
        let date = http_date(t);
        assert!(!is_not_modified(Some("\"other\""), Some(&date), "\"x\"", t));
        assert!(!is_not_modified(None, Some("garbage"), "\"x\"", t));
    }
}
