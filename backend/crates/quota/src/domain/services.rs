//! Domain Services
//!
//! Pure bucket arithmetic.

use chrono::{DateTime, Duration, Utc};

use crate::domain::entities::BucketWindow;

/// Bucket containing `now`
///
/// Buckets always start at the UTC midnight of `now`'s day and last
/// `window_hours`.
pub fn bucket_window(now: DateTime<Utc>, window_hours: u32) -> BucketWindow {
    let start = now
        .date_naive()
        .and_hms_opt(0, 0, 0)
        .map(|midnight| midnight.and_utc())
        .unwrap_or(now);
    BucketWindow {
        start,
        end: start + Duration::hours(i64::from(window_hours)),
    }
}

/// Whole seconds from `now` until `reset_at_ms`, at least 1
pub fn seconds_until(now: DateTime<Utc>, reset_at_ms: i64) -> i64 {
    let millis = reset_at_ms - now.timestamp_millis();
    ((millis + 999) / 1000).max(1)
}
