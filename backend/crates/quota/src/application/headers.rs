//! Rate limit response headers
//!
//! Pure formatting: the presentation layer writes these onto the
//! `Response` before its body is polled.

use http::{HeaderMap, HeaderName, HeaderValue, header};
use chrono::{DateTime, Utc};
use platform::cookie::CookieConfig;
use serde::Serialize;

use crate::domain::entities::RateLimitDecision;
use crate::domain::services::seconds_until;

pub const X_RATELIMIT_LIMIT: HeaderName = HeaderName::from_static("x-ratelimit-limit");
pub const X_RATELIMIT_REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");
pub const X_RATELIMIT_RESET: HeaderName = HeaderName::from_static("x-ratelimit-reset");
pub const X_RATELIMIT_LAYER: HeaderName = HeaderName::from_static("x-ratelimit-layer");
pub const X_RATELIMIT_DEGRADED: HeaderName = HeaderName::from_static("x-ratelimit-degraded");

/// Canonical header set for one decision
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RateLimitHeaders {
    #[serde(rename = "X-RateLimit-Limit")]
    pub limit: String,
    #[serde(rename = "X-RateLimit-Remaining")]
    pub remaining: String,
    /// Epoch ms
    #[serde(rename = "X-RateLimit-Reset")]
    pub reset: String,
    #[serde(rename = "X-RateLimit-Layer")]
    pub layer: String,
    #[serde(rename = "X-RateLimit-Degraded", skip_serializing_if = "Option::is_none")]
    pub degraded: Option<String>,
}

impl RateLimitHeaders {
    pub fn from_decision(decision: &RateLimitDecision) -> Self {
        Self {
            limit: decision.limit.to_string(),
            remaining: decision.remaining.to_string(),
            reset: decision.reset_at_ms.to_string(),
            layer: decision.layer.to_string(),
            degraded: decision.degraded.then(|| "true".to_string()),
        }
    }

    /// Name/value pairs in emission order
    pub fn pairs(&self) -> Vec<(HeaderName, &str)> {
        let mut pairs = vec![
            (X_RATELIMIT_LIMIT, self.limit.as_str()),
            (X_RATELIMIT_REMAINING, self.remaining.as_str()),
            (X_RATELIMIT_RESET, self.reset.as_str()),
            (X_RATELIMIT_LAYER, self.layer.as_str()),
        ];
        if let Some(degraded) = &self.degraded {
            pairs.push((X_RATELIMIT_DEGRADED, degraded.as_str()));
        }
        pairs
    }

    /// Write the header set onto `headers`, replacing earlier values
    pub fn apply(&self, headers: &mut HeaderMap) {
        for (name, value) in self.pairs() {
            match HeaderValue::from_str(value) {
                Ok(v) => {
                    headers.insert(name, v);
                }
                Err(e) => tracing::warn!(header = %name, error = %e, "Skipping invalid header value"),
            }
        }
    }
}

/// `Retry-After` value: whole seconds until the bucket resets
pub fn retry_after(now: DateTime<Utc>, reset_at_ms: i64) -> HeaderValue {
    HeaderValue::from(seconds_until(now, reset_at_ms))
}

/// Write `Retry-After` for a denied decision
pub fn apply_retry_after(headers: &mut HeaderMap, reset_at_ms: i64) {
    headers.insert(header::RETRY_AFTER, retry_after(Utc::now(), reset_at_ms));
}

/// `Set-Cookie` directive persisting the guest session token
pub fn session_cookie(config: &CookieConfig, session_id: &str) -> Option<HeaderValue> {
    config.set_cookie_header(session_id)
}

/// Append the session cookie to `headers`
pub fn apply_session_cookie(headers: &mut HeaderMap, config: &CookieConfig, session_id: &str) {
    if let Some(cookie) = session_cookie(config, session_id) {
        headers.append(header::SET_COOKIE, cookie);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::value_objects::{Layer, QuotaLimit, Remaining};

    fn decision(remaining: Remaining, degraded: bool) -> RateLimitDecision {
        RateLimitDecision {
            allowed: true,
            limit: QuotaLimit::Capped(10),
            remaining,
            reset_at_ms: 1_718_323_200_000,
            layer: Layer::Durable,
            degraded,
        }
    }

    #[test]
    fn test_header_set() {
        let headers = RateLimitHeaders::from_decision(&decision(Remaining::Limited(9), false));
        assert_eq!(headers.limit, "10");
        assert_eq!(headers.remaining, "9");
        assert_eq!(headers.reset, "1718323200000");
        assert_eq!(headers.layer, "durable");
        assert_eq!(headers.degraded, None);

        let mut map = HeaderMap::new();
        headers.apply(&mut map);
        assert_eq!(map.get("X-RateLimit-Remaining").unwrap(), "9");
        assert!(map.get("X-RateLimit-Degraded").is_none());
    }

    #[test]
    fn test_degraded_flag() {
        let headers = RateLimitHeaders::from_decision(&decision(Remaining::Limited(3), true));
        let mut map = HeaderMap::new();
        headers.apply(&mut map);
        assert_eq!(map.get("X-RateLimit-Degraded").unwrap(), "true");
    }

    #[test]
    fn test_unlimited_renders_as_word() {
        let mut bypass = RateLimitDecision::bypass(0);
        bypass.reset_at_ms = 42;
        let headers = RateLimitHeaders::from_decision(&bypass);
        assert_eq!(headers.limit, "unlimited");
        assert_eq!(headers.remaining, "unlimited");
        assert_eq!(headers.layer, "bypass");
    }

    #[test]
    fn test_serialized_names() {
        let headers = RateLimitHeaders::from_decision(&decision(Remaining::Limited(0), true));
        let json = serde_json::to_value(&headers).unwrap();
        assert_eq!(json["X-RateLimit-Limit"], "10");
        assert_eq!(json["X-RateLimit-Degraded"], "true");
    }

    #[test]
    fn test_retry_after_rounds_up() {
        let now = Utc::now();
        let value = retry_after(now, now.timestamp_millis() + 1_500);
        assert_eq!(value, "2");
    }

    #[test]
    fn test_session_cookie_directive() {
        let config = crate::application::config::QuotaConfig::development().session_cookie;
        let mut map = HeaderMap::new();
        apply_session_cookie(&mut map, &config, "abc-123");
        let cookie = map.get(header::SET_COOKIE).unwrap().to_str().unwrap();
        assert!(cookie.starts_with("guest_session=abc-123"));
        assert!(cookie.contains("HttpOnly"));
    }
}
