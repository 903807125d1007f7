//! HTTP Handlers

use axum::Json;
use axum::extract::State;
use axum::http::{Extensions, HeaderMap};
use axum::response::{IntoResponse, Response};

use crate::domain::repository::{GuestIpCounter, UsageCounterRepository};
use crate::presentation::dto::StatusResponse;
use crate::presentation::middleware::{apply_result_headers, caller_from_extensions};
use crate::presentation::router::QuotaAppState;

/// GET /api/quota/status
///
/// Read-only: reports the caller's standing without counting anything.
pub async fn quota_status<C, R>(
    State(state): State<QuotaAppState<C, R>>,
    extensions: Extensions,
    headers: HeaderMap,
) -> Response
where
    C: GuestIpCounter + Send + Sync + 'static,
    R: UsageCounterRepository + Send + Sync + 'static,
{
    let caller = caller_from_extensions(&extensions);
    let result = state
        .orchestrator
        .check_rate_limit_status(&caller, &headers)
        .await;

    let mut response = Json(StatusResponse::from(&result)).into_response();
    apply_result_headers(response.headers_mut(), &result, &state);
    response
}
