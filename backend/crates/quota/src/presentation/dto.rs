//! Data Transfer Objects

use serde::Serialize;

use crate::application::RateLimitCheckResult;
use crate::domain::value_objects::{Layer, Remaining};

/// GET /api/quota/status response
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub allowed: bool,
    /// Number, or `"unlimited"`
    pub remaining: Remaining,
    /// Epoch ms at which the current bucket ends
    pub reset: i64,
    pub layer: Layer,
    pub degraded: bool,
}

impl From<&RateLimitCheckResult> for StatusResponse {
    fn from(result: &RateLimitCheckResult) -> Self {
        Self {
            allowed: result.allowed,
            remaining: result.remaining,
            reset: result.reset,
            layer: result.decision.layer,
            degraded: result.decision.degraded,
        }
    }
}
