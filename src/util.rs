//! Shared utility functions for the Tally application.

use axum::http::HeaderMap;
use subtle::ConstantTimeEq;

/// Extract client IP address and user-agent from request headers.
///
/// Tries `x-forwarded-for` first (for proxied requests), then `x-real-ip`,
/// and extracts the `user-agent` header for webhook logging.
pub fn extract_request_info(headers: &HeaderMap) -> (Option<String>, Option<String>) {
    let ip = headers
        .get("x-forwarded-for")
        .or_else(|| headers.get("x-real-ip"))
        .and_then(|v| v.to_str().ok())
        .map(String::from);

    let user_agent = headers
        .get("user-agent")
        .and_then(|v| v.to_str().ok())
        .map(String::from);

    (ip, user_agent)
}

/// Extract a Bearer token from the Authorization header.
///
/// Returns the token string without the "Bearer " prefix, or None if
/// the header is missing, malformed, or empty after the prefix.
pub fn extract_bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
}

/// Constant-time string comparison for signatures and admin keys.
///
/// The length check is not constant-time, but length is not secret here
/// (hex digests have fixed length; admin key length reveals nothing useful).
pub fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.as_bytes().ct_eq(b.as_bytes()).into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_extract_bearer_token() {
        let mut headers = HeaderMap::new();
        headers.insert("Authorization", HeaderValue::from_static("Bearer abc123"));
        assert_eq!(extract_bearer_token(&headers), Some("abc123"));

        let mut headers = HeaderMap::new();
        headers.insert("Authorization", HeaderValue::from_static("abc123"));
        assert_eq!(extract_bearer_token(&headers), None);

        let mut headers = HeaderMap::new();
        headers.insert("Authorization", HeaderValue::from_static("Bearer "));
        assert_eq!(extract_bearer_token(&headers), None);

        assert_eq!(extract_bearer_token(&HeaderMap::new()), None);
    }

    #[test]
    fn test_constant_time_eq() {
        assert!(constant_time_eq("same", "same"));
        assert!(!constant_time_eq("same", "diff"));
        assert!(!constant_time_eq("short", "longer"));
    }
}
