//! API Server Entry Point
//!
//! Application entry point and server initialization.
//! Uses `anyhow` for startup errors, but application-level
//! errors should use `kernel::error::AppError`.

use axum::{
    Extension, Json, Router, http,
    http::{Method, header},
    routing::post,
};
use quota::{
    PgUsageRepository, QuotaAppState, QuotaConfig, RateLimitCheckResult, RateLimitOrchestrator,
    RedisGuestCounter, quota_router, with_message_quota,
};
use quota::application::headers::{
    X_RATELIMIT_DEGRADED, X_RATELIMIT_LAYER, X_RATELIMIT_LIMIT, X_RATELIMIT_REMAINING,
    X_RATELIMIT_RESET,
};
use serde::Serialize;
use sqlx::postgres::PgPoolOptions;
use std::env;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{AllowHeaders, AllowMethods, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// Re-export unified error types for use in handlers
pub use kernel::error::{
    app_error::{AppError, AppResult},
    kind::ErrorKind,
};

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:31113";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "api=info,quota=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Quota configuration; any fault here is fatal
    let config = QuotaConfig::from_env()?;
    if config.bypass_active() {
        tracing::warn!(
            runtime_env = ?config.runtime_env,
            "RATE_LIMIT_BYPASS is active: message quotas are not enforced"
        );
    } else if config.bypass_requested {
        tracing::warn!("RATE_LIMIT_BYPASS ignored in production");
    }

    // Database connection
    let database_url = env::var("DATABASE_URL")
        .map_err(|_| anyhow::anyhow!("DATABASE_URL must be set in environment"))?;

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await?;

    tracing::info!("Connected to database");

    // Run migrations
    sqlx::migrate!("../../database/migrations")
        .run(&pool)
        .await?;

    tracing::info!("Migrations completed");

    // Redis connects lazily; an outage only degrades the guest IP layer
    let redis_url =
        env::var("REDIS_URL").map_err(|_| anyhow::anyhow!("REDIS_URL must be set in environment"))?;
    let guest_counter = RedisGuestCounter::open(&redis_url)?;

    let orchestrator = RateLimitOrchestrator::new(
        Arc::new(guest_counter),
        Arc::new(PgUsageRepository::new(pool)),
        Arc::new(config),
    );
    let quota_state = QuotaAppState::new(orchestrator);

    // CORS configuration
    let frontend_origins = env::var("FRONTEND_ORIGINS")
        .unwrap_or_else(|_| "http://localhost:40922,http://127.0.0.1:40922".to_string());

    let allowed_origins: Vec<http::HeaderValue> = frontend_origins
        .split(',')
        .filter_map(|origin| origin.trim().parse().ok())
        .collect();

    let cors = CorsLayer::new()
        .allow_origin(allowed_origins)
        .allow_methods(AllowMethods::list([
            Method::GET,
            Method::POST,
            Method::OPTIONS,
        ]))
        .allow_headers(AllowHeaders::list([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            header::ACCEPT,
        ]))
        .expose_headers([
            header::RETRY_AFTER,
            X_RATELIMIT_LIMIT,
            X_RATELIMIT_REMAINING,
            X_RATELIMIT_RESET,
            X_RATELIMIT_LAYER,
            X_RATELIMIT_DEGRADED,
        ])
        .allow_credentials(true);

    // Build router
    let chat = with_message_quota(
        Router::new().route("/api/chat", post(chat_placeholder)),
        quota_state.clone(),
    );

    let app = Router::new()
        .merge(chat)
        .nest("/api/quota", quota_router(quota_state))
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    // Start server
    let addr: SocketAddr = env::var("BIND_ADDR")
        .unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_string())
        .parse()?;
    tracing::info!("Listening on {}", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ChatAccepted {
    accepted: bool,
    quota: RateLimitCheckResult,
}

/// POST /api/chat
///
/// Stands in for the chat handler; only reached when the quota admits the message.
async fn chat_placeholder(Extension(quota): Extension<RateLimitCheckResult>) -> Json<ChatAccepted> {
    Json(ChatAccepted {
        accepted: true,
        quota,
    })
}
