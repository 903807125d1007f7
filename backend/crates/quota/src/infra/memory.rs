//! In-memory store implementations
//!
//! For tests and single-instance development. Each store serializes all
//! access through one `tokio::sync::Mutex`, which gives the same
//! increment atomicity as the networked stores.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

use crate::domain::entities::{BucketIdentity, BucketWindow, RateLimitBucket};
use crate::domain::repository::{GuestIpCounter, UsageCounterRepository};
use crate::domain::value_objects::ResourceType;
use crate::error::QuotaResult;

type BucketKey = (BucketIdentity, ResourceType, DateTime<Utc>);

/// In-memory usage counters
#[derive(Default)]
pub struct InMemoryUsageRepository {
    buckets: Mutex<HashMap<BucketKey, RateLimitBucket>>,
}

impl InMemoryUsageRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrite a bucket's count
    pub async fn seed(
        &self,
        identity: BucketIdentity,
        resource_type: ResourceType,
        window: BucketWindow,
        count: i64,
    ) {
        let mut bucket = RateLimitBucket::empty(identity.clone(), resource_type.clone(), window);
        bucket.count = count;
        self.buckets
            .lock()
            .await
            .insert((identity, resource_type, window.start), bucket);
    }

    pub async fn bucket_count(&self) -> usize {
        self.buckets.lock().await.len()
    }
}

impl UsageCounterRepository for InMemoryUsageRepository {
    async fn increment(
        &self,
        identity: &BucketIdentity,
        resource_type: &ResourceType,
        window: &BucketWindow,
    ) -> QuotaResult<i64> {
        let mut buckets = self.buckets.lock().await;
        let bucket = buckets
            .entry((identity.clone(), resource_type.clone(), window.start))
            .or_insert_with(|| RateLimitBucket::empty(identity.clone(), resource_type.clone(), *window));
        bucket.count += 1;
        Ok(bucket.count)
    }

    async fn find(
        &self,
        identity: &BucketIdentity,
        resource_type: &ResourceType,
        bucket_start: DateTime<Utc>,
    ) -> QuotaResult<Option<RateLimitBucket>> {
        let buckets = self.buckets.lock().await;
        Ok(buckets
            .get(&(identity.clone(), resource_type.clone(), bucket_start))
            .cloned())
    }
}

/// Counter entry with expiration
struct CounterEntry {
    count: u64,
    expires_at: Instant,
}

/// In-memory guest IP counters with TTL
#[derive(Default)]
pub struct InMemoryGuestCounter {
    counters: Mutex<HashMap<String, CounterEntry>>,
}

impl InMemoryGuestCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop expired counters
    pub async fn cleanup(&self) {
        let now = Instant::now();
        self.counters
            .lock()
            .await
            .retain(|_, entry| entry.expires_at > now);
    }
}

impl GuestIpCounter for InMemoryGuestCounter {
    async fn hit(&self, key: &str, ttl: Duration) -> QuotaResult<u64> {
        let now = Instant::now();
        let mut counters = self.counters.lock().await;
        let entry = counters.entry(key.to_string()).or_insert(CounterEntry {
            count: 0,
            expires_at: now + ttl,
        });
        if entry.expires_at <= now {
            entry.count = 0;
        }
        entry.count += 1;
        entry.expires_at = now + ttl;
        Ok(entry.count)
    }

    async fn peek(&self, key: &str) -> QuotaResult<u64> {
        let counters = self.counters.lock().await;
        Ok(counters
            .get(key)
            .filter(|entry| entry.expires_at > Instant::now())
            .map_or(0, |entry| entry.count))
    }
}
