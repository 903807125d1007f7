//! Fixed-window arithmetic
//!
//! Windows are aligned to the UNIX epoch, so a 24 hour window always
//! starts and ends at UTC midnight regardless of when the first hit lands.

use chrono::{DateTime, Utc};
use std::time::Duration;

/// Fixed window definition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedWindow {
    /// Maximum hits allowed in one window
    pub max_requests: u32,
    /// Window length
    pub window: Duration,
}

impl FixedWindow {
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            max_requests,
            window,
        }
    }

    /// A one-day window
    pub fn daily(max_requests: u32) -> Self {
        Self::new(max_requests, Duration::from_secs(24 * 3600))
    }

    pub fn window_ms(&self) -> i64 {
        (self.window.as_millis() as i64).max(1)
    }

    /// Index of the window containing `now`
    pub fn index_at(&self, now: DateTime<Utc>) -> i64 {
        now.timestamp_millis().div_euclid(self.window_ms())
    }

    /// Epoch ms at which the window containing `now` ends
    pub fn reset_at_ms(&self, now: DateTime<Utc>) -> i64 {
        (self.index_at(now) + 1) * self.window_ms()
    }

    /// Evaluate a post-increment hit count
    pub fn evaluate(&self, count: u64, now: DateTime<Utc>) -> RateLimitResult {
        RateLimitResult {
            allowed: count <= u64::from(self.max_requests),
            remaining: u64::from(self.max_requests).saturating_sub(count) as u32,
            reset_at_ms: self.reset_at_ms(now),
        }
    }
}

/// Rate limit check result
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitResult {
    pub allowed: bool,
    pub remaining: u32,
    pub reset_at_ms: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_daily_window_resets_at_utc_midnight() {
        let window = FixedWindow::daily(10);
        let now = Utc.with_ymd_and_hms(2024, 3, 14, 15, 9, 26).unwrap();
        let midnight = Utc.with_ymd_and_hms(2024, 3, 15, 0, 0, 0).unwrap();
        assert_eq!(window.reset_at_ms(now), midnight.timestamp_millis());
    }

    #[test]
    fn test_same_day_same_index() {
        let window = FixedWindow::daily(10);
        let morning = Utc.with_ymd_and_hms(2024, 3, 14, 0, 0, 0).unwrap();
        let night = Utc.with_ymd_and_hms(2024, 3, 14, 23, 59, 59).unwrap();
        let next = Utc.with_ymd_and_hms(2024, 3, 15, 0, 0, 0).unwrap();
        assert_eq!(window.index_at(morning), window.index_at(night));
        assert_eq!(window.index_at(night) + 1, window.index_at(next));
    }

    #[test]
    fn test_evaluate() {
        let window = FixedWindow::daily(3);
        let now = Utc::now();

        let first = window.evaluate(1, now);
        assert!(first.allowed);
        assert_eq!(first.remaining, 2);

        let last = window.evaluate(3, now);
        assert!(last.allowed);
        assert_eq!(last.remaining, 0);

        let over = window.evaluate(4, now);
        assert!(!over.allowed);
        assert_eq!(over.remaining, 0);
    }
}
