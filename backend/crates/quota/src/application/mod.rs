//! Application Layer
//!
//! Limiters, the orchestrating use case and its configuration.

pub mod cache_layer;
pub mod check_rate_limit;
pub mod config;
pub mod durable_layer;
pub mod headers;
pub mod identity;

// Re-exports
pub use cache_layer::GuestIpLimiter;
pub use check_rate_limit::{CheckMode, CheckState, RateLimitCheckResult, RateLimitOrchestrator};
pub use config::QuotaConfig;
pub use durable_layer::DurableLimiter;
pub use headers::RateLimitHeaders;
pub use identity::SessionAnonymizer;
