//! Application Configuration
//!
//! Configuration for the quota application layer. Loaded once at startup;
//! every [`ConfigError`] is fatal there and nowhere else.

use base64::Engine;
use base64::engine::general_purpose;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

pub use platform::cookie::{CookieConfig, SameSite};

/// Minimum accepted secret length, in decoded bytes
pub const MIN_SECRET_LEN: usize = 32;

/// Guest session cookie lifetime (one year)
const SESSION_COOKIE_MAX_AGE_SECS: i64 = 365 * 24 * 3600;

/// Startup configuration fault
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required setting: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

/// Runtime environment indicator
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuntimeEnv {
    Production,
    /// Any explicitly named non-production environment
    NonProduction(String),
}

impl RuntimeEnv {
    /// Unset or `production` (any case) means production
    pub fn parse(raw: Option<&str>) -> Self {
        match raw.map(str::trim) {
            None | Some("") => RuntimeEnv::Production,
            Some(name) if name.eq_ignore_ascii_case("production") => RuntimeEnv::Production,
            Some(name) => RuntimeEnv::NonProduction(name.to_string()),
        }
    }

    pub fn is_production(&self) -> bool {
        matches!(self, RuntimeEnv::Production)
    }
}

/// Server-held key for session hashing
#[derive(Clone, PartialEq, Eq)]
pub struct SessionSecret(Vec<u8>);

impl SessionSecret {
    pub fn new(bytes: Vec<u8>) -> Result<Self, ConfigError> {
        if bytes.len() < MIN_SECRET_LEN {
            return Err(ConfigError::Invalid {
                key: "SESSION_HASH_SECRET",
                reason: format!("must decode to at least {MIN_SECRET_LEN} bytes"),
            });
        }
        Ok(Self(bytes))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for SessionSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SessionSecret(..)")
    }
}

/// Quota application configuration
#[derive(Debug, Clone)]
pub struct QuotaConfig {
    /// Operator escape hatch; ignored in production
    pub bypass_requested: bool,
    pub runtime_env: RuntimeEnv,
    pub session_secret: SessionSecret,
    /// Durable cap per guest session per bucket
    pub guest_daily_limit: u32,
    /// Durable cap per free-plan user per bucket
    pub free_daily_limit: u32,
    /// Bucket length in hours (1..=24)
    pub window_hours: u32,
    /// Cache cap per parseable guest IP per day
    pub guest_ip_daily_limit: u32,
    /// Cache cap for guests without a usable IP
    pub unknown_ip_daily_limit: u32,
    /// Guest session cookie
    pub session_cookie: CookieConfig,
}

impl QuotaConfig {
    /// Defaults with the given secret
    pub fn new(session_secret: SessionSecret) -> Self {
        Self {
            bypass_requested: false,
            runtime_env: RuntimeEnv::Production,
            session_secret,
            guest_daily_limit: 10,
            free_daily_limit: 20,
            window_hours: 24,
            guest_ip_daily_limit: 50,
            unknown_ip_daily_limit: 10,
            session_cookie: CookieConfig {
                name: "guest_session".to_string(),
                secure: true,
                http_only: true,
                same_site: SameSite::Lax,
                path: "/".to_string(),
                max_age_secs: Some(SESSION_COOKIE_MAX_AGE_SECS),
            },
        }
    }

    /// Config with a random secret and insecure cookie (for development and tests)
    pub fn development() -> Self {
        let secret = SessionSecret(platform::crypto::random_bytes(MIN_SECRET_LEN));
        let mut config = Self::new(secret);
        config.runtime_env = RuntimeEnv::NonProduction("development".to_string());
        config.session_cookie.secure = false;
        config
    }

    /// Load from process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let secret_b64 = lookup("SESSION_HASH_SECRET")
            .filter(|s| !s.trim().is_empty())
            .ok_or(ConfigError::Missing("SESSION_HASH_SECRET"))?;
        let secret_bytes = general_purpose::STANDARD
            .decode(secret_b64.trim())
            .map_err(|e| ConfigError::Invalid {
                key: "SESSION_HASH_SECRET",
                reason: format!("not valid base64: {e}"),
            })?;

        let mut config = Self::new(SessionSecret::new(secret_bytes)?);

        config.runtime_env = RuntimeEnv::parse(lookup("APP_ENV").as_deref());
        if let Some(raw) = lookup("RATE_LIMIT_BYPASS") {
            config.bypass_requested = parse_bool("RATE_LIMIT_BYPASS", &raw)?;
        }
        if let Some(raw) = lookup("SESSION_COOKIE_SECURE") {
            config.session_cookie.secure = parse_bool("SESSION_COOKIE_SECURE", &raw)?;
        }

        let limit = |key: &'static str, default: u32| -> Result<u32, ConfigError> {
            lookup(key).map_or(Ok(default), |raw| parse_positive(key, &raw))
        };
        config.guest_daily_limit = limit("GUEST_DAILY_LIMIT", config.guest_daily_limit)?;
        config.free_daily_limit = limit("FREE_DAILY_LIMIT", config.free_daily_limit)?;
        config.window_hours = limit("RATE_LIMIT_WINDOW_HOURS", config.window_hours)?;
        config.guest_ip_daily_limit = limit("GUEST_IP_DAILY_LIMIT", config.guest_ip_daily_limit)?;
        config.unknown_ip_daily_limit =
            limit("UNKNOWN_IP_DAILY_LIMIT", config.unknown_ip_daily_limit)?;

        config.validate()?;
        Ok(config)
    }

    /// Cross-field checks
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=24).contains(&self.window_hours) {
            return Err(ConfigError::Invalid {
                key: "RATE_LIMIT_WINDOW_HOURS",
                reason: "buckets are day-aligned, so the window must be 1..=24 hours".to_string(),
            });
        }
        if self.unknown_ip_daily_limit > self.guest_ip_daily_limit {
            return Err(ConfigError::Invalid {
                key: "UNKNOWN_IP_DAILY_LIMIT",
                reason: "must not exceed GUEST_IP_DAILY_LIMIT".to_string(),
            });
        }
        Ok(())
    }

    /// Bypass is honored only outside production
    pub fn bypass_active(&self) -> bool {
        self.bypass_requested && !self.runtime_env.is_production()
    }

    /// Fixed window used by the guest IP cache layer
    pub fn cache_window(&self) -> Duration {
        Duration::from_secs(24 * 3600)
    }
}

fn parse_bool(key: &'static str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        other => Err(ConfigError::Invalid {
            key,
            reason: format!("expected a boolean, got {other:?}"),
        }),
    }
}

fn parse_positive(key: &'static str, raw: &str) -> Result<u32, ConfigError> {
    match raw.trim().parse::<u32>() {
        Ok(0) => Err(ConfigError::Invalid {
            key,
            reason: "must be greater than zero".to_string(),
        }),
        Ok(value) => Ok(value),
        Err(e) => Err(ConfigError::Invalid {
            key,
            reason: e.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const SECRET_B64: &str = "MDEyMzQ1Njc4OWFiY2RlZjAxMjM0NTY3ODlhYmNkZWY="; // 32 ASCII bytes

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = QuotaConfig::from_lookup(lookup_from(&[("SESSION_HASH_SECRET", SECRET_B64)]))
            .unwrap();

        assert_eq!(config.guest_daily_limit, 10);
        assert_eq!(config.free_daily_limit, 20);
        assert_eq!(config.window_hours, 24);
        assert_eq!(config.guest_ip_daily_limit, 50);
        assert_eq!(config.unknown_ip_daily_limit, 10);
        assert_eq!(config.runtime_env, RuntimeEnv::Production);
        assert!(!config.bypass_requested);
        assert!(config.session_cookie.secure);
        assert_eq!(config.session_cookie.name, "guest_session");
        assert_eq!(config.session_secret.as_bytes().len(), 32);
    }

    #[test]
    fn test_missing_secret_is_fatal() {
        let err = QuotaConfig::from_lookup(lookup_from(&[])).unwrap_err();
        assert_eq!(err, ConfigError::Missing("SESSION_HASH_SECRET"));
    }

    #[test]
    fn test_short_secret_rejected() {
        let err = QuotaConfig::from_lookup(lookup_from(&[("SESSION_HASH_SECRET", "c2hvcnQ=")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "SESSION_HASH_SECRET", .. }));
    }

    #[test]
    fn test_invalid_limits_rejected() {
        for (key, value) in [
            ("GUEST_DAILY_LIMIT", "0"),
            ("FREE_DAILY_LIMIT", "lots"),
            ("RATE_LIMIT_WINDOW_HOURS", "48"),
            ("UNKNOWN_IP_DAILY_LIMIT", "500"),
            ("RATE_LIMIT_BYPASS", "maybe"),
        ] {
            let result = QuotaConfig::from_lookup(lookup_from(&[
                ("SESSION_HASH_SECRET", SECRET_B64),
                (key, value),
            ]));
            assert!(result.is_err(), "{key}={value} should be rejected");
        }
    }

    #[test]
    fn test_overrides() {
        let config = QuotaConfig::from_lookup(lookup_from(&[
            ("SESSION_HASH_SECRET", SECRET_B64),
            ("APP_ENV", "staging"),
            ("RATE_LIMIT_BYPASS", "true"),
            ("GUEST_DAILY_LIMIT", "5"),
            ("FREE_DAILY_LIMIT", "50"),
            ("SESSION_COOKIE_SECURE", "false"),
        ]))
        .unwrap();

        assert_eq!(config.guest_daily_limit, 5);
        assert_eq!(config.free_daily_limit, 50);
        assert!(!config.session_cookie.secure);
        assert!(config.bypass_active());
    }

    #[test]
    fn test_bypass_ignored_in_production() {
        for env in [None, Some("production"), Some(" Production ")] {
            let mut config = QuotaConfig::development();
            config.runtime_env = RuntimeEnv::parse(env);
            config.bypass_requested = true;
            assert!(!config.bypass_active(), "bypass must be inert for {env:?}");
        }
    }

    #[test]
    fn test_secret_is_redacted_in_debug() {
        let config = QuotaConfig::development();
        let debug = format!("{config:?}");
        assert!(debug.contains("SessionSecret(..)"));
    }
}
