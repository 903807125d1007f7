//! Guest IP limiter (cache layer)
//!
//! Cheap first line for guests: one fixed-window counter per IP per UTC day.
//! Fails open, since the durable layer still holds the authoritative count.

use chrono::Utc;
use platform::client::ClientIp;
use platform::crypto::to_hex;
use platform::rate_limit::FixedWindow;
use std::sync::Arc;

use crate::application::config::QuotaConfig;
use crate::domain::entities::LayerOutcome;
use crate::domain::repository::GuestIpCounter;
use crate::domain::value_objects::{QuotaLimit, Remaining};
use crate::error::QuotaError;

/// Remaining quota reported while the cache is unreachable
pub const DEGRADED_REMAINING_ESTIMATE: u32 = 3;

const KEY_PREFIX: &str = "quota:guest";

/// Limiter profile
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IpProfile {
    /// Parseable IP
    Normal,
    /// The `"unknown"` sentinel: lower cap
    Unknown,
}

impl IpProfile {
    pub fn for_ip(ip: &ClientIp) -> Self {
        if ip.is_unknown() {
            IpProfile::Unknown
        } else {
            IpProfile::Normal
        }
    }

    const fn as_str(&self) -> &'static str {
        match self {
            IpProfile::Normal => "ip",
            IpProfile::Unknown => "unknown",
        }
    }
}

/// Cache layer over a [`GuestIpCounter`]
pub struct GuestIpLimiter<C>
where
    C: GuestIpCounter + Send + Sync + 'static,
{
    counter: Arc<C>,
    normal: FixedWindow,
    unknown: FixedWindow,
}

impl<C> GuestIpLimiter<C>
where
    C: GuestIpCounter + Send + Sync + 'static,
{
    pub fn new(counter: Arc<C>, config: &QuotaConfig) -> Self {
        let window = config.cache_window();
        Self {
            counter,
            normal: FixedWindow::new(config.guest_ip_daily_limit, window),
            unknown: FixedWindow::new(config.unknown_ip_daily_limit, window),
        }
    }

    fn window(&self, profile: IpProfile) -> FixedWindow {
        match profile {
            IpProfile::Normal => self.normal,
            IpProfile::Unknown => self.unknown,
        }
    }

    /// Counter key for the current window
    ///
    /// Unknown-IP traffic is split by User-Agent fingerprint so one client
    /// behind a header-stripping proxy cannot drain the bucket for all others.
    pub fn key(&self, ip: &ClientIp, fingerprint: &[u8; 32], window_index: i64) -> String {
        let profile = IpProfile::for_ip(ip);
        let subject = match profile {
            IpProfile::Normal => ip.as_key(),
            IpProfile::Unknown => to_hex(&fingerprint[..8]),
        };
        format!("{KEY_PREFIX}:{}:{subject}:{window_index}", profile.as_str())
    }

    /// Count one hit for this guest IP and evaluate it
    pub async fn check(&self, ip: &ClientIp, fingerprint: &[u8; 32]) -> LayerOutcome {
        let profile = IpProfile::for_ip(ip);
        let window = self.window(profile);
        let now = Utc::now();
        let key = self.key(ip, fingerprint, window.index_at(now));

        match self.counter.hit(&key, window.window).await {
            Ok(count) => {
                let result = window.evaluate(count, now);
                if !result.allowed {
                    tracing::warn!(
                        client_ip = %ip,
                        count = count,
                        max = window.max_requests,
                        "Guest IP quota exhausted"
                    );
                }
                LayerOutcome {
                    allowed: result.allowed,
                    limit: QuotaLimit::Capped(window.max_requests),
                    remaining: Remaining::Limited(result.remaining),
                    reset_at_ms: result.reset_at_ms,
                    degraded: false,
                }
            }
            Err(e) => self.fail_open(e, window, now),
        }
    }

    /// Evaluate the current count without counting a hit
    pub async fn peek(&self, ip: &ClientIp, fingerprint: &[u8; 32]) -> LayerOutcome {
        let profile = IpProfile::for_ip(ip);
        let window = self.window(profile);
        let now = Utc::now();
        let key = self.key(ip, fingerprint, window.index_at(now));

        match self.counter.peek(&key).await {
            Ok(count) => {
                let (allowed, remaining) =
                    QuotaLimit::Capped(window.max_requests).evaluate(count as i64, false);
                LayerOutcome {
                    allowed,
                    limit: QuotaLimit::Capped(window.max_requests),
                    remaining,
                    reset_at_ms: window.reset_at_ms(now),
                    degraded: false,
                }
            }
            Err(e) => self.fail_open(e, window, now),
        }
    }

    fn fail_open(
        &self,
        error: QuotaError,
        window: FixedWindow,
        now: chrono::DateTime<Utc>,
    ) -> LayerOutcome {
        tracing::warn!(
            error = %error,
            store = error.store(),
            transient = error.is_transient(),
            "Guest IP limiter unavailable, failing open"
        );
        LayerOutcome {
            allowed: true,
            limit: QuotaLimit::Capped(window.max_requests),
            remaining: Remaining::Limited(DEGRADED_REMAINING_ESTIMATE.min(window.max_requests)),
            reset_at_ms: window.reset_at_ms(now),
            degraded: true,
        }
    }
}
