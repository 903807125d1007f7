//! Quota Middleware
//!
//! Guards message-sending routes. The verdict's headers are written onto
//! the `Response` value before it is returned, so they always precede the
//! body.

use axum::body::Body;
use axum::extract::State;
use axum::http::{HeaderMap, Request};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use kernel::error::app_error::AppError;
use kernel::id::UserId;

use crate::application::check_rate_limit::CheckState;
use crate::application::headers::{apply_retry_after, apply_session_cookie};
use crate::application::RateLimitCheckResult;
use crate::domain::repository::{GuestIpCounter, UsageCounterRepository};
use crate::domain::value_objects::{Caller, Plan};
use crate::presentation::router::QuotaAppState;

/// Identity handed over by the authentication layer
///
/// Inserted as a request extension upstream; absence means guest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub user_id: UserId,
    pub plan: Plan,
}

impl From<AuthenticatedUser> for Caller {
    fn from(user: AuthenticatedUser) -> Self {
        Caller::Authenticated {
            user_id: user.user_id,
            plan: user.plan,
        }
    }
}

/// Resolve the caller from request extensions
pub fn caller_from_extensions(extensions: &axum::http::Extensions) -> Caller {
    extensions
        .get::<AuthenticatedUser>()
        .copied()
        .map_or(Caller::Guest, Caller::from)
}

/// Count the request against the caller's message quota
///
/// Denied requests never reach the inner handler. Allowed requests carry
/// the [`RateLimitCheckResult`] as an extension.
pub async fn enforce_message_quota<C, R>(
    State(state): State<QuotaAppState<C, R>>,
    mut req: Request<Body>,
    next: Next,
) -> Response
where
    C: GuestIpCounter + Send + Sync + 'static,
    R: UsageCounterRepository + Send + Sync + 'static,
{
    let caller = caller_from_extensions(req.extensions());
    let result = state
        .orchestrator
        .check_rate_limit(&caller, req.headers())
        .await;

    if !result.allowed {
        let mut response = denial(&result).into_response();
        apply_result_headers(response.headers_mut(), &result, &state);
        apply_retry_after(response.headers_mut(), result.reset);
        return response;
    }

    req.extensions_mut().insert(result.clone());
    let mut response = next.run(req).await;
    apply_result_headers(response.headers_mut(), &result, &state);
    response
}

/// Rate limit headers plus the guest session cookie, if one was issued
pub fn apply_result_headers<C, R>(
    headers: &mut HeaderMap,
    result: &RateLimitCheckResult,
    state: &QuotaAppState<C, R>,
) where
    C: GuestIpCounter + Send + Sync + 'static,
    R: UsageCounterRepository + Send + Sync + 'static,
{
    result.headers.apply(headers);
    if let Some(session_id) = &result.session_id {
        apply_session_cookie(
            headers,
            &state.orchestrator.config().session_cookie,
            session_id,
        );
    }
}

fn denial(result: &RateLimitCheckResult) -> AppError {
    let reason = result
        .reason
        .clone()
        .unwrap_or_else(|| "Daily message limit reached.".to_string());
    let action = match result.state {
        CheckState::GuestCacheDenied | CheckState::GuestDurableDenied => {
            "Sign in, or wait until the daily quota resets."
        }
        CheckState::FreeDenied => "Upgrade your plan, or wait until the daily quota resets.",
        _ => "Wait until the daily quota resets.",
    };
    AppError::too_many_requests(reason).with_action(action)
}
