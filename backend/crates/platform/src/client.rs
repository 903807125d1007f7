//! Client identification utilities
//!
//! Proxy-aware client IP resolution and a coarse User-Agent fingerprint.
//! Nothing here fails: malformed or missing headers degrade to
//! [`ClientIp::Unknown`] or the empty-agent fingerprint.

use axum::http::{HeaderMap, header};
use std::fmt;
use std::net::IpAddr;

use crate::crypto::sha256;

/// Sentinel used wherever a client IP cannot be determined
pub const UNKNOWN_IP: &str = "unknown";

const X_FORWARDED_FOR: &str = "x-forwarded-for";
const X_REAL_IP: &str = "x-real-ip";

/// Resolved client address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClientIp {
    Known(IpAddr),
    /// No valid address in the proxy headers
    Unknown,
}

impl ClientIp {
    pub fn is_unknown(&self) -> bool {
        matches!(self, ClientIp::Unknown)
    }

    /// Stable string form, suitable as a cache key segment
    pub fn as_key(&self) -> String {
        match self {
            ClientIp::Known(ip) => ip.to_string(),
            ClientIp::Unknown => UNKNOWN_IP.to_string(),
        }
    }
}

impl fmt::Display for ClientIp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClientIp::Known(ip) => write!(f, "{ip}"),
            ClientIp::Unknown => f.write_str(UNKNOWN_IP),
        }
    }
}

/// Extract the client IP from proxy headers
///
/// Takes the first entry of `X-Forwarded-For` if it parses as IPv4/IPv6,
/// then `X-Real-IP`, then gives up with [`ClientIp::Unknown`].
pub fn extract_client_ip(headers: &HeaderMap) -> ClientIp {
    let forwarded = header_str(headers, X_FORWARDED_FOR)
        .and_then(|xff| xff.split(',').next())
        .and_then(parse_ip);

    forwarded
        .or_else(|| header_str(headers, X_REAL_IP).and_then(parse_ip))
        .map(ClientIp::Known)
        .unwrap_or(ClientIp::Unknown)
}

/// SHA-256 of the User-Agent header (empty string when absent)
///
/// Not an identity on its own. It only splits traffic that would otherwise
/// share one key.
pub fn user_agent_fingerprint(headers: &HeaderMap) -> [u8; 32] {
    let user_agent = headers
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    sha256(user_agent.as_bytes())
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

fn parse_ip(raw: &str) -> Option<IpAddr> {
    raw.trim().parse::<IpAddr>().ok()
}
