//! Guest identity resolution and session anonymization

use axum::http::HeaderMap;
use platform::client::{ClientIp, extract_client_ip};
use platform::crypto::{hmac_sha256, to_hex};
use uuid::Uuid;

use crate::application::config::SessionSecret;
use crate::domain::value_objects::{SessionHash, SessionToken};

const MAX_SESSION_TOKEN_LEN: usize = 128;

/// Client IP from proxy headers, `"unknown"` when absent or malformed
pub fn get_client_ip(headers: &HeaderMap) -> ClientIp {
    extract_client_ip(headers)
}

/// Existing session token from the cookie, or a freshly minted one
///
/// Does not set the cookie; the response side is responsible for that.
pub fn get_or_create_session_id(headers: &HeaderMap, cookie_name: &str) -> SessionToken {
    match platform::cookie::extract_cookie(headers, cookie_name) {
        Some(value) if is_well_formed(&value) => SessionToken { value, fresh: false },
        Some(_) => {
            tracing::debug!("Malformed guest session cookie, issuing a new one");
            new_session_token()
        }
        None => new_session_token(),
    }
}

fn new_session_token() -> SessionToken {
    SessionToken {
        value: Uuid::new_v4().to_string(),
        fresh: true,
    }
}

fn is_well_formed(value: &str) -> bool {
    !value.is_empty()
        && value.len() <= MAX_SESSION_TOKEN_LEN
        && value
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}

/// Keyed one-way hash of guest session tokens
#[derive(Debug, Clone)]
pub struct SessionAnonymizer {
    secret: SessionSecret,
}

impl SessionAnonymizer {
    pub fn new(secret: SessionSecret) -> Self {
        Self { secret }
    }

    /// HMAC-SHA256 of the token under the server secret, hex encoded
    pub fn hmac_session_id(&self, token: &str) -> SessionHash {
        SessionHash::from_hex(to_hex(&hmac_sha256(self.secret.as_bytes(), token.as_bytes())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderValue, header};

    fn anonymizer(byte: u8) -> SessionAnonymizer {
        SessionAnonymizer::new(SessionSecret::new(vec![byte; 32]).unwrap())
    }

    fn with_cookie(cookie: &'static str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static(cookie));
        headers
    }

    #[test]
    fn test_hmac_session_id_is_deterministic() {
        let a = anonymizer(7);
        assert_eq!(a.hmac_session_id("token-1"), a.hmac_session_id("token-1"));
        assert_ne!(a.hmac_session_id("token-1"), a.hmac_session_id("token-2"));
    }

    #[test]
    fn test_hmac_session_id_hides_token() {
        let hash = anonymizer(7).hmac_session_id("token-1");
        assert_ne!(hash.as_str(), "token-1");
        assert!(!hash.as_str().contains("token-1"));
        assert_eq!(hash.as_str().len(), 64);
    }

    #[test]
    fn test_secret_rotation_changes_hash() {
        assert_ne!(
            anonymizer(7).hmac_session_id("token-1"),
            anonymizer(8).hmac_session_id("token-1")
        );
    }

    #[test]
    fn test_existing_session_is_reused() {
        let headers = with_cookie("theme=dark; guest_session=3f2a-b_c9");
        let token = get_or_create_session_id(&headers, "guest_session");
        assert_eq!(token.value, "3f2a-b_c9");
        assert!(!token.fresh);
    }

    #[test]
    fn test_missing_session_is_minted() {
        let token = get_or_create_session_id(&HeaderMap::new(), "guest_session");
        assert!(token.fresh);
        assert!(Uuid::parse_str(&token.value).is_ok());

        let other = get_or_create_session_id(&HeaderMap::new(), "guest_session");
        assert_ne!(token.value, other.value);
    }

    #[test]
    fn test_malformed_session_is_replaced() {
        let headers = with_cookie("guest_session=<script>");
        let token = get_or_create_session_id(&headers, "guest_session");
        assert!(token.fresh);
        assert_ne!(token.value, "<script>");

        let headers = with_cookie("guest_session=");
        assert!(get_or_create_session_id(&headers, "guest_session").fresh);
    }
}
