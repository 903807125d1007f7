//! Check Rate Limit Use Case
//!
//! Composes the bypass gate, the guest IP cache layer and the durable
//! counter into one verdict per request. Stages run in order; a gate may
//! halt the pipeline with a decision, and the durable stage always decides.

use axum::http::HeaderMap;
use chrono::Utc;
use platform::client::user_agent_fingerprint;
use serde::Serialize;
use std::sync::Arc;

use crate::application::cache_layer::GuestIpLimiter;
use crate::application::config::QuotaConfig;
use crate::application::durable_layer::DurableLimiter;
use crate::application::headers::RateLimitHeaders;
use crate::application::identity::{SessionAnonymizer, get_client_ip, get_or_create_session_id};
use crate::domain::entities::{BucketIdentity, LayerOutcome, RateLimitDecision};
use crate::domain::repository::{GuestIpCounter, UsageCounterRepository};
use crate::domain::services::bucket_window;
use crate::domain::value_objects::{
    Caller, Layer, Plan, QuotaLimit, Remaining, ResourceType, SessionToken,
};

pub const GUEST_LIMIT_REASON: &str =
    "Daily message limit reached for guests. Sign in to keep chatting.";
pub const FREE_LIMIT_REASON: &str =
    "Daily message limit reached. Upgrade your plan for unlimited messages.";

/// Whether a check counts the request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckMode {
    /// Count the request and decide
    Consume,
    /// Report the current standing without counting
    Peek,
}

/// Pipeline stage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Bypass,
    GuestCache,
    Durable,
}

impl Stage {
    const fn as_str(&self) -> &'static str {
        match self {
            Stage::Bypass => "bypass",
            Stage::GuestCache => "guest_cache",
            Stage::Durable => "durable",
        }
    }
}

/// Gates that may decide before the durable stage
const GATES: [Stage; 2] = [Stage::Bypass, Stage::GuestCache];

/// Result of a gate stage
#[derive(Debug)]
pub enum Flow {
    Continue,
    Halt(RateLimitDecision),
}

/// Terminal state reached by one check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckState {
    Bypass,
    GuestCacheDenied,
    GuestDurableDenied,
    GuestAllowed,
    PaidAllowed,
    FreeAllowed,
    FreeDenied,
}

impl CheckState {
    pub const fn as_str(&self) -> &'static str {
        match self {
            CheckState::Bypass => "bypass",
            CheckState::GuestCacheDenied => "guest_cache_denied",
            CheckState::GuestDurableDenied => "guest_durable_denied",
            CheckState::GuestAllowed => "guest_allowed",
            CheckState::PaidAllowed => "paid_allowed",
            CheckState::FreeAllowed => "free_allowed",
            CheckState::FreeDenied => "free_denied",
        }
    }

    fn reached(caller: &Caller, decision: &RateLimitDecision) -> Self {
        if decision.layer == Layer::Bypass {
            return CheckState::Bypass;
        }
        match (caller, decision.allowed) {
            (Caller::Guest, false) if decision.layer == Layer::Cache => {
                CheckState::GuestCacheDenied
            }
            (Caller::Guest, false) => CheckState::GuestDurableDenied,
            (Caller::Guest, true) => CheckState::GuestAllowed,
            (Caller::Authenticated { plan: Plan::Paid, .. }, _) => CheckState::PaidAllowed,
            (Caller::Authenticated { plan: Plan::Free, .. }, true) => CheckState::FreeAllowed,
            (Caller::Authenticated { plan: Plan::Free, .. }, false) => CheckState::FreeDenied,
        }
    }
}

/// Outcome of a check, as handed to the host
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitCheckResult {
    pub allowed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub remaining: Remaining,
    /// Epoch ms
    pub reset: i64,
    pub headers: RateLimitHeaders,
    /// Guest session token to persist through the response
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(skip)]
    pub decision: RateLimitDecision,
    #[serde(skip)]
    pub state: CheckState,
}

/// Per-request scratch state threaded through the stages
struct CheckContext<'a> {
    caller: &'a Caller,
    headers: &'a HeaderMap,
    mode: CheckMode,
    session: Option<SessionToken>,
    /// Conservative remaining from a degraded earlier stage
    degraded_cap: Option<Remaining>,
}

impl<'a> CheckContext<'a> {
    fn new(caller: &'a Caller, headers: &'a HeaderMap, mode: CheckMode) -> Self {
        Self {
            caller,
            headers,
            mode,
            session: None,
            degraded_cap: None,
        }
    }
}

/// Rate limit orchestrator
pub struct RateLimitOrchestrator<C, R>
where
    C: GuestIpCounter + Send + Sync + 'static,
    R: UsageCounterRepository + Send + Sync + 'static,
{
    config: Arc<QuotaConfig>,
    anonymizer: SessionAnonymizer,
    cache: GuestIpLimiter<C>,
    durable: DurableLimiter<R>,
    resource_type: ResourceType,
}

impl<C, R> RateLimitOrchestrator<C, R>
where
    C: GuestIpCounter + Send + Sync + 'static,
    R: UsageCounterRepository + Send + Sync + 'static,
{
    pub fn new(counter: Arc<C>, repo: Arc<R>, config: Arc<QuotaConfig>) -> Self {
        Self {
            anonymizer: SessionAnonymizer::new(config.session_secret.clone()),
            cache: GuestIpLimiter::new(counter, &config),
            durable: DurableLimiter::new(repo),
            resource_type: ResourceType::MESSAGE,
            config,
        }
    }

    pub fn config(&self) -> &QuotaConfig {
        &self.config
    }

    /// Count this request against the caller's quota and decide
    pub async fn check_rate_limit(
        &self,
        caller: &Caller,
        headers: &HeaderMap,
    ) -> RateLimitCheckResult {
        self.run(CheckContext::new(caller, headers, CheckMode::Consume))
            .await
    }

    /// Report the caller's standing without counting anything
    pub async fn check_rate_limit_status(
        &self,
        caller: &Caller,
        headers: &HeaderMap,
    ) -> RateLimitCheckResult {
        self.run(CheckContext::new(caller, headers, CheckMode::Peek))
            .await
    }

    async fn run(&self, mut ctx: CheckContext<'_>) -> RateLimitCheckResult {
        let mut halted = None;
        for stage in GATES {
            if let Flow::Halt(decision) = self.run_gate(stage, &mut ctx).await {
                halted = Some((stage, decision));
                break;
            }
        }
        let (stage, mut decision) = match halted {
            Some(halted) => halted,
            None => (Stage::Durable, self.run_durable(&mut ctx).await),
        };

        if let Some(cap) = ctx.degraded_cap {
            decision.degraded = true;
            decision.remaining = min_remaining(decision.remaining, cap);
        }

        let state = CheckState::reached(ctx.caller, &decision);
        self.log_state(state, stage, &decision, ctx.mode);
        self.finish(ctx, decision, state)
    }

    async fn run_gate(&self, stage: Stage, ctx: &mut CheckContext<'_>) -> Flow {
        match stage {
            Stage::Bypass => self.bypass_gate(),
            Stage::GuestCache => self.guest_cache_gate(ctx).await,
            Stage::Durable => Flow::Continue,
        }
    }

    fn bypass_gate(&self) -> Flow {
        if !self.config.bypass_active() {
            return Flow::Continue;
        }
        let window = bucket_window(Utc::now(), self.config.window_hours);
        Flow::Halt(RateLimitDecision::bypass(window.reset_at_ms()))
    }

    async fn guest_cache_gate(&self, ctx: &mut CheckContext<'_>) -> Flow {
        if !matches!(ctx.caller, Caller::Guest) {
            return Flow::Continue;
        }
        let ip = get_client_ip(ctx.headers);
        let fingerprint = user_agent_fingerprint(ctx.headers);
        let outcome = match ctx.mode {
            CheckMode::Consume => self.cache.check(&ip, &fingerprint).await,
            CheckMode::Peek => self.cache.peek(&ip, &fingerprint).await,
        };

        if !outcome.allowed {
            return Flow::Halt(RateLimitDecision::from_outcome(outcome, Layer::Cache));
        }
        if outcome.degraded {
            ctx.degraded_cap = Some(outcome.remaining);
        }
        Flow::Continue
    }

    async fn run_durable(&self, ctx: &mut CheckContext<'_>) -> RateLimitDecision {
        let (identity, limit) = match ctx.caller {
            Caller::Guest => {
                let token = get_or_create_session_id(ctx.headers, &self.config.session_cookie.name);
                let hash = self.anonymizer.hmac_session_id(&token.value);
                ctx.session = Some(token);
                (
                    BucketIdentity::Session(hash),
                    QuotaLimit::Capped(self.config.guest_daily_limit),
                )
            }
            Caller::Authenticated { user_id, plan } => {
                let limit = match plan {
                    Plan::Paid => QuotaLimit::Unlimited,
                    Plan::Free => QuotaLimit::Capped(self.config.free_daily_limit),
                };
                (BucketIdentity::User(*user_id), limit)
            }
        };

        let outcome: LayerOutcome = match ctx.mode {
            CheckMode::Consume => {
                self.durable
                    .increment_and_check(&identity, &self.resource_type, limit, self.config.window_hours)
                    .await
            }
            CheckMode::Peek => {
                self.durable
                    .check_read_only(&identity, &self.resource_type, limit, self.config.window_hours)
                    .await
            }
        };
        RateLimitDecision::from_outcome(outcome, Layer::Durable)
    }

    fn finish(
        &self,
        ctx: CheckContext<'_>,
        decision: RateLimitDecision,
        state: CheckState,
    ) -> RateLimitCheckResult {
        // Guests keep their session on every allow, bypass included
        let session_id = match (ctx.caller, decision.allowed) {
            (Caller::Guest, true) => Some(
                ctx.session
                    .unwrap_or_else(|| {
                        get_or_create_session_id(ctx.headers, &self.config.session_cookie.name)
                    })
                    .value,
            ),
            _ => None,
        };

        let reason = match state {
            CheckState::GuestCacheDenied | CheckState::GuestDurableDenied => {
                Some(GUEST_LIMIT_REASON.to_string())
            }
            CheckState::FreeDenied => Some(FREE_LIMIT_REASON.to_string()),
            _ => None,
        };

        RateLimitCheckResult {
            allowed: decision.allowed,
            reason,
            remaining: decision.remaining,
            reset: decision.reset_at_ms,
            headers: RateLimitHeaders::from_decision(&decision),
            session_id,
            decision,
            state,
        }
    }

    fn log_state(&self, state: CheckState, stage: Stage, decision: &RateLimitDecision, mode: CheckMode) {
        if decision.allowed {
            tracing::debug!(
                state = state.as_str(),
                stage = stage.as_str(),
                remaining = %decision.remaining,
                degraded = decision.degraded,
                mode = ?mode,
                "Rate limit check passed"
            );
        } else if mode == CheckMode::Consume {
            tracing::warn!(
                state = state.as_str(),
                stage = stage.as_str(),
                reset_at_ms = decision.reset_at_ms,
                "Rate limit check denied"
            );
        } else {
            tracing::debug!(
                state = state.as_str(),
                stage = stage.as_str(),
                "Rate limit status: exhausted"
            );
        }
    }
}

fn min_remaining(a: Remaining, b: Remaining) -> Remaining {
    match (a, b) {
        (Remaining::Limited(x), Remaining::Limited(y)) => Remaining::Limited(x.min(y)),
        (Remaining::Limited(x), Remaining::Unlimited)
        | (Remaining::Unlimited, Remaining::Limited(x)) => Remaining::Limited(x),
        (Remaining::Unlimited, Remaining::Unlimited) => Remaining::Unlimited,
    }
}
