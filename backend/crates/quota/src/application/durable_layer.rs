//! Durable usage limiter
//!
//! Authoritative per-identity counter. Each admitted request increments the
//! day bucket exactly once; the verdict is taken from the post-increment
//! count returned by the same atomic statement.

use chrono::Utc;
use std::sync::Arc;

use crate::domain::entities::{BucketIdentity, LayerOutcome};
use crate::domain::repository::UsageCounterRepository;
use crate::domain::services::bucket_window;
use crate::domain::value_objects::{QuotaLimit, ResourceType};

/// Durable layer over a [`UsageCounterRepository`]
pub struct DurableLimiter<R>
where
    R: UsageCounterRepository + Send + Sync + 'static,
{
    repo: Arc<R>,
}

impl<R> DurableLimiter<R>
where
    R: UsageCounterRepository + Send + Sync + 'static,
{
    pub fn new(repo: Arc<R>) -> Self {
        Self { repo }
    }

    /// Count one hit and evaluate the new count against `limit`
    ///
    /// Unlimited identities are still counted. Store faults fail open with
    /// the full limit remaining.
    pub async fn increment_and_check(
        &self,
        identity: &BucketIdentity,
        resource_type: &ResourceType,
        limit: QuotaLimit,
        window_hours: u32,
    ) -> LayerOutcome {
        let window = bucket_window(Utc::now(), window_hours);

        match self.repo.increment(identity, resource_type, &window).await {
            Ok(count) => {
                let (allowed, remaining) = limit.evaluate(count, true);
                if !allowed {
                    tracing::info!(
                        identity = %identity.log_label(),
                        resource = %resource_type,
                        count = count,
                        limit = %limit,
                        "Daily quota exhausted"
                    );
                }
                LayerOutcome {
                    allowed,
                    limit,
                    remaining,
                    reset_at_ms: window.reset_at_ms(),
                    degraded: false,
                }
            }
            Err(e) => {
                tracing::error!(
                    error = %e,
                    store = e.store(),
                    identity = %identity.log_label(),
                    resource = %resource_type,
                    "Usage counter unavailable, failing open"
                );
                LayerOutcome {
                    allowed: true,
                    limit,
                    remaining: limit.full(),
                    reset_at_ms: window.reset_at_ms(),
                    degraded: true,
                }
            }
        }
    }

    /// Evaluate the current bucket without counting a hit
    ///
    /// A missing bucket reads as zero usage.
    pub async fn check_read_only(
        &self,
        identity: &BucketIdentity,
        resource_type: &ResourceType,
        limit: QuotaLimit,
        window_hours: u32,
    ) -> LayerOutcome {
        let window = bucket_window(Utc::now(), window_hours);

        match self.repo.find(identity, resource_type, window.start).await {
            Ok(bucket) => {
                let count = bucket.map_or(0, |b| b.count);
                let (allowed, remaining) = limit.evaluate(count, false);
                LayerOutcome {
                    allowed,
                    limit,
                    remaining,
                    reset_at_ms: window.reset_at_ms(),
                    degraded: false,
                }
            }
            Err(e) => {
                tracing::error!(
                    error = %e,
                    store = e.store(),
                    identity = %identity.log_label(),
                    "Usage counter unavailable for status read, failing open"
                );
                LayerOutcome {
                    allowed: true,
                    limit,
                    remaining: limit.full(),
                    reset_at_ms: window.reset_at_ms(),
                    degraded: true,
                }
            }
        }
    }
}
