//! REST surface over the cache store and poller status.

pub mod error;
pub mod handlers;
pub mod responses;

use std::sync::Arc;

use axum::http::{HeaderValue, Method};
use axum::routing::{get, post};
use axum::Router;
use chrono::{DateTime, Utc};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::config::GlobalConfig;
use crate::persistence::cache_store::CacheStore;
use crate::poller::status::StatusBoard;
use crate::{AppError, Result};

/// Shared handler state.
pub struct AppState {
    /// Validated configuration.
    pub config: Arc<GlobalConfig>,
    /// Snapshot and history store.
    pub store: Arc<CacheStore>,
    /// Poller status board.
    pub status: Arc<StatusBoard>,
    /// Process start time.
    pub started_at: DateTime<Utc>,
}

/// Build the router with CORS for the configured dashboard origin.
///
/// # Errors
///
/// Returns `AppError::Config` if `frontend_url` is not a valid origin.
pub fn build_router(state: Arc<AppState>) -> Result<Router> {
    let origin = HeaderValue::from_str(state.config.frontend_url.trim_end_matches('/'))
        .map_err(|err| AppError::Config(format!("invalid frontend_url: {err}")))?;
    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    Ok(Router::new()
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health))
        .route("/api/dashboard", get(handlers::dashboard))
        .route("/api/agents", get(handlers::agents))
        .route("/api/queues", get(handlers::queues))
        .route("/api/service-level", get(handlers::service_level))
        .route("/api/alerts", get(handlers::alerts))
        .route("/api/stats", get(handlers::stats))
        .route("/api/historical/{queue_id}", get(handlers::historical))
        .route(
            "/api/historical/{queue_id}/summary",
            get(handlers::historical_summary),
        )
        .route(
            "/api/alerts/{alert_id}/acknowledge",
            post(handlers::acknowledge_alert),
        )
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state))
}

/// Serve the API on `listener` until `ct` is cancelled, then drain.
///
/// # Errors
///
/// Returns `AppError::Config` for an invalid router, `AppError::Io` if the
/// server fails.
pub async fn serve(state: Arc<AppState>, listener: TcpListener, ct: CancellationToken) -> Result<()> {
    let router = build_router(state)?;
    let addr = listener
        .local_addr()
        .map_err(|err| AppError::Io(format!("listener has no address: {err}")))?;
    info!(%addr, "HTTP API listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(async move { ct.cancelled().await })
        .await
        .map_err(|err| AppError::Io(format!("HTTP server error: {err}")))?;

    info!("HTTP API shut down");
    Ok(())
}
