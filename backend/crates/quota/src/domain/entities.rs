//! Domain Entities
//!
//! Core entities for the quota domain.

use chrono::{DateTime, Utc};
use kernel::id::UserId;

use crate::domain::value_objects::{Layer, QuotaLimit, Remaining, ResourceType, SessionHash};

/// Owner of a bucket: exactly one of user id or session hash
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum BucketIdentity {
    User(UserId),
    Session(SessionHash),
}

impl BucketIdentity {
    /// Short, non-reversible label for logs
    pub fn log_label(&self) -> String {
        match self {
            BucketIdentity::User(id) => format!("user:{id}"),
            BucketIdentity::Session(hash) => {
                format!("session:{}", &hash.as_str()[..hash.as_str().len().min(12)])
            }
        }
    }
}

/// Time span covered by one bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BucketWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl BucketWindow {
    pub fn reset_at_ms(&self) -> i64 {
        self.end.timestamp_millis()
    }
}

/// One counting row: (identity, resource type, bucket start) is unique
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitBucket {
    pub identity: BucketIdentity,
    pub resource_type: ResourceType,
    pub bucket_start: DateTime<Utc>,
    pub bucket_end: DateTime<Utc>,
    pub count: i64,
}

impl RateLimitBucket {
    /// A bucket before its first hit
    pub fn empty(identity: BucketIdentity, resource_type: ResourceType, window: BucketWindow) -> Self {
        Self {
            identity,
            resource_type,
            bucket_start: window.start,
            bucket_end: window.end,
            count: 0,
        }
    }
}

/// Verdict of a single layer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayerOutcome {
    pub allowed: bool,
    pub limit: QuotaLimit,
    pub remaining: Remaining,
    pub reset_at_ms: i64,
    /// The layer failed and this outcome is a permissive fallback
    pub degraded: bool,
}

/// Final verdict for one request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub limit: QuotaLimit,
    pub remaining: Remaining,
    /// Epoch ms at which the current bucket ends
    pub reset_at_ms: i64,
    pub layer: Layer,
    pub degraded: bool,
}

impl RateLimitDecision {
    pub fn from_outcome(outcome: LayerOutcome, layer: Layer) -> Self {
        Self {
            allowed: outcome.allowed,
            limit: outcome.limit,
            remaining: outcome.remaining,
            reset_at_ms: outcome.reset_at_ms,
            layer,
            degraded: outcome.degraded,
        }
    }

    pub fn bypass(reset_at_ms: i64) -> Self {
        Self {
            allowed: true,
            limit: QuotaLimit::Unlimited,
            remaining: Remaining::Unlimited,
            reset_at_ms,
            layer: Layer::Bypass,
            degraded: false,
        }
    }
}
