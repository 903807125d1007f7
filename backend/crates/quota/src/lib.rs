//! Quota (Chat Message Rate Limiting) Backend Module
//!
//! Clean Architecture structure:
//! - `domain/` - Buckets, decisions, store ports
//! - `application/` - Limiters, orchestrator, configuration
//! - `infra/` - PostgreSQL, Redis and in-memory stores
//! - `presentation/` - Middleware, handlers, DTOs, router
//!
//! ## Layers
//! - Guests: Redis fixed window per IP, then a durable counter per hashed session
//! - Free plan: durable counter per user with a daily cap
//! - Paid plan: durable counter per user, never denied
//!
//! ## Failure Model
//! - Both layers fail open and mark the decision `degraded`
//! - Raw guest session tokens never reach storage, only their HMAC

pub mod application;
pub mod domain;
pub mod error;
pub mod infra;
pub mod presentation;


// Re-exports for convenience
pub use application::config::{ConfigError, QuotaConfig};
pub use application::{RateLimitCheckResult, RateLimitOrchestrator};
pub use error::{QuotaError, QuotaResult};
pub use infra::{PgUsageRepository, RedisGuestCounter};
pub use presentation::middleware::{AuthenticatedUser, enforce_message_quota};
pub use presentation::router::{QuotaAppState, quota_router, with_message_quota};

// Re-export kernel error types for unified error handling
pub use kernel::error::{
    app_error::{AppError, AppResult},
    kind::ErrorKind,
};

pub mod models {
    pub use crate::domain::entities::*;
    pub use crate::domain::value_objects::*;
    pub use crate::presentation::dto::*;
}
