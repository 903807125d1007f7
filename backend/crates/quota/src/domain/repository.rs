//! Repository Traits
//!
//! Ports to the two counter stores. Implementations are in the
//! infrastructure layer; fail-open policy lives in the application layer,
//! so these report every fault as an error.

use std::time::Duration;

use crate::domain::entities::{BucketIdentity, BucketWindow, RateLimitBucket};
use crate::domain::value_objects::ResourceType;
use crate::error::QuotaResult;

/// Durable day-bucketed usage counters
#[trait_variant::make(UsageCounterRepository: Send)]
pub trait LocalUsageCounterRepository {
    /// Create-or-increment the bucket in one atomic store operation
    ///
    /// Returns the post-increment count. Concurrent calls for the same
    /// bucket each observe a distinct count.
    async fn increment(
        &self,
        identity: &BucketIdentity,
        resource_type: &ResourceType,
        window: &BucketWindow,
    ) -> QuotaResult<i64>;

    /// Read the bucket starting at `bucket_start` without touching it
    async fn find(
        &self,
        identity: &BucketIdentity,
        resource_type: &ResourceType,
        bucket_start: chrono::DateTime<chrono::Utc>,
    ) -> QuotaResult<Option<RateLimitBucket>>;
}

/// Distributed fixed-window hit counters
#[trait_variant::make(GuestIpCounter: Send)]
pub trait LocalGuestIpCounter {
    /// Atomically increment `key`, expiring it after `ttl`
    ///
    /// Returns the post-increment count.
    async fn hit(&self, key: &str, ttl: Duration) -> QuotaResult<u64>;

    /// Current count of `key`, 0 if absent
    async fn peek(&self, key: &str) -> QuotaResult<u64>;
}
