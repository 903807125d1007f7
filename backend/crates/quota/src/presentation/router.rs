//! Quota Router

use axum::{Router, middleware, routing::get};
use std::sync::Arc;

use crate::application::RateLimitOrchestrator;
use crate::domain::repository::{GuestIpCounter, UsageCounterRepository};
use crate::presentation::handlers;
use crate::presentation::middleware::enforce_message_quota;

/// Shared state for quota handlers and middleware
pub struct QuotaAppState<C, R>
where
    C: GuestIpCounter + Send + Sync + 'static,
    R: UsageCounterRepository + Send + Sync + 'static,
{
    pub orchestrator: Arc<RateLimitOrchestrator<C, R>>,
}

// Manual impl: derive would demand `C: Clone` and `R: Clone`.
impl<C, R> Clone for QuotaAppState<C, R>
where
    C: GuestIpCounter + Send + Sync + 'static,
    R: UsageCounterRepository + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            orchestrator: Arc::clone(&self.orchestrator),
        }
    }
}

impl<C, R> QuotaAppState<C, R>
where
    C: GuestIpCounter + Send + Sync + 'static,
    R: UsageCounterRepository + Send + Sync + 'static,
{
    pub fn new(orchestrator: RateLimitOrchestrator<C, R>) -> Self {
        Self {
            orchestrator: Arc::new(orchestrator),
        }
    }
}

/// Routes under `/api/quota`
pub fn quota_router<C, R>(state: QuotaAppState<C, R>) -> Router
where
    C: GuestIpCounter + Send + Sync + 'static,
    R: UsageCounterRepository + Send + Sync + 'static,
{
    Router::new()
        .route("/status", get(handlers::quota_status::<C, R>))
        .with_state(state)
}

/// Put every route of `router` behind the message quota
pub fn with_message_quota<C, R>(router: Router, state: QuotaAppState<C, R>) -> Router
where
    C: GuestIpCounter + Send + Sync + 'static,
    R: UsageCounterRepository + Send + Sync + 'static,
{
    router.route_layer(middleware::from_fn_with_state(
        state,
        enforce_message_quota::<C, R>,
    ))
}
