//! Request handlers.
//!
//! Handlers read the published snapshot and poller report without waiting
//! on the poller. Only acknowledge writes.

use std::sync::Arc;

use axum::extract::rejection::QueryRejection;
use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::{Duration, Utc};
use serde::Deserialize;
use tracing::{info, warn};

use super::responses::{
    Acknowledged, AgentStats, Banner, Dashboard, Freshness, Health, History, HistoryPoint,
    QueueStats, ServiceLevelView, Stats, SystemStats,
};
use super::AppState;
use crate::models::agent::AgentState;
use crate::models::alert::Alert;
use crate::models::queue::QueueMetric;
use crate::persistence::history_repo::QueueSummary;
use crate::poller::state::{ConnectionStatus, PollPhase};
use crate::{AppError, Result};

/// Largest accepted `hours` window (30 days).
pub const MAX_HISTORY_HOURS: u32 = 720;

const DEFAULT_HISTORY_HOURS: u32 = 24;

/// Query string of the historical endpoints.
#[derive(Debug, Deserialize)]
pub struct HistoryParams {
    hours: Option<String>,
}

/// Validate the `hours` parameter: an integer in `1..=720`, default 24.
///
/// # Errors
///
/// Returns `AppError::Validation` for anything else.
pub fn parse_hours(raw: Option<&str>) -> Result<u32> {
    let Some(raw) = raw else {
        return Ok(DEFAULT_HISTORY_HOURS);
    };
    let hours: u32 = raw
        .trim()
        .parse()
        .map_err(|_| AppError::Validation(format!("hours must be an integer, got {raw:?}")))?;
    if !(1..=MAX_HISTORY_HOURS).contains(&hours) {
        return Err(AppError::Validation(format!(
            "hours must be between 1 and {MAX_HISTORY_HOURS}, got {hours}"
        )));
    }
    Ok(hours)
}

/// `GET /`
pub async fn root() -> Json<Banner> {
    Json(Banner {
        message: "Trio Monitor API",
        version: env!("CARGO_PKG_VERSION"),
        status: "operational",
    })
}

/// `GET /health`
///
/// A database that cannot answer `SELECT 1` makes the service unhealthy
/// whatever the upstream connection looks like.
pub async fn health(State(state): State<Arc<AppState>>) -> Json<Health> {
    let report = state.status.current();
    let snapshot = state.store.read_latest();
    let db_ok = match sqlx::query("SELECT 1").execute(state.store.db().as_ref()).await {
        Ok(_) => true,
        Err(err) => {
            warn!(error = %err, "health check could not reach the database");
            false
        }
    };
    let status = match report.connection {
        _ if !db_ok => "unhealthy",
        ConnectionStatus::Connected => "healthy",
        ConnectionStatus::Connecting | ConnectionStatus::Degraded => "degraded",
        ConnectionStatus::Disconnected => "unhealthy",
    };
    Json(Health {
        status,
        database: if db_ok { "ok" } else { "unreachable" },
        timestamp: snapshot.map(|s| s.taken_at),
        poller_running: report.phase != PollPhase::Halted,
        connection_status: report.connection,
        uptime_seconds: (Utc::now() - state.started_at).num_seconds(),
        poller: report.stats.clone(),
    })
}

/// `GET /api/dashboard`
///
/// # Errors
///
/// `AppError::NoData` before the first snapshot; `AppError::Db` if alerts
/// cannot be read.
pub async fn dashboard(State(state): State<Arc<AppState>>) -> Result<Json<Dashboard>> {
    let snapshot = state
        .store
        .read_latest()
        .ok_or_else(|| AppError::NoData("no data available yet".into()))?;
    let alerts = state.store.alerts().list_active().await?;
    let freshness = Freshness::of(Some(snapshot.as_ref()), &state.status.current());
    Ok(Json(Dashboard {
        cycle: snapshot.cycle,
        agents: snapshot.agents.clone(),
        queues: snapshot.queues.clone(),
        service_level: snapshot.service_level.clone(),
        alerts,
        freshness,
    }))
}

/// `GET /api/agents`
pub async fn agents(State(state): State<Arc<AppState>>) -> Json<Vec<AgentState>> {
    Json(
        state
            .store
            .read_latest()
            .map(|s| s.agents.clone())
            .unwrap_or_default(),
    )
}

/// `GET /api/queues`
pub async fn queues(State(state): State<Arc<AppState>>) -> Json<Vec<QueueMetric>> {
    Json(
        state
            .store
            .read_latest()
            .map(|s| s.queues.clone())
            .unwrap_or_default(),
    )
}

/// `GET /api/service-level`
///
/// # Errors
///
/// `AppError::NoData` before the first snapshot.
pub async fn service_level(State(state): State<Arc<AppState>>) -> Result<Json<ServiceLevelView>> {
    let snapshot = state
        .store
        .read_latest()
        .ok_or_else(|| AppError::NoData("no data available yet".into()))?;
    Ok(Json(ServiceLevelView {
        service_level: snapshot.service_level.clone(),
        freshness: Freshness::of(Some(snapshot.as_ref()), &state.status.current()),
    }))
}

/// `GET /api/alerts`
///
/// # Errors
///
/// `AppError::Db` if the query fails.
pub async fn alerts(State(state): State<Arc<AppState>>) -> Result<Json<Vec<Alert>>> {
    Ok(Json(state.store.alerts().list_active().await?))
}

/// `GET /api/stats`
///
/// # Errors
///
/// `AppError::Db` if the alert count fails.
pub async fn stats(State(state): State<Arc<AppState>>) -> Result<Json<Stats>> {
    let snapshot = state.store.read_latest();
    let report = state.status.current();
    let alerts_count = state.store.alerts().count_active().await?;
    Ok(Json(Stats {
        agents: AgentStats::of(snapshot.as_deref()),
        queues: QueueStats::of(snapshot.as_deref()),
        service_level: snapshot.as_ref().map(|s| s.service_level.clone()),
        system: SystemStats {
            freshness: Freshness::of(snapshot.as_deref(), &report),
            alerts_count,
            poller: report.stats.clone(),
        },
    }))
}

/// `GET /api/historical/{queue_id}`
///
/// # Errors
///
/// `AppError::Validation` for a malformed query string or a bad `hours`;
/// `AppError::Db` if the query fails.
pub async fn historical(
    State(state): State<Arc<AppState>>,
    Path(queue_id): Path<String>,
    params: std::result::Result<Query<HistoryParams>, QueryRejection>,
) -> Result<Json<History>> {
    let Query(params) = params?;
    let hours = parse_hours(params.hours.as_deref())?;
    let since = Utc::now() - Duration::hours(i64::from(hours));
    let points = state
        .store
        .read_history(&queue_id, since)
        .await?
        .into_iter()
        .map(HistoryPoint::from)
        .collect();
    Ok(Json(History {
        queue_id,
        hours,
        points,
    }))
}

/// `GET /api/historical/{queue_id}/summary`
///
/// # Errors
///
/// `AppError::Validation` for a malformed query string or a bad `hours`;
/// `AppError::Db` if the query fails.
pub async fn historical_summary(
    State(state): State<Arc<AppState>>,
    Path(queue_id): Path<String>,
    params: std::result::Result<Query<HistoryParams>, QueryRejection>,
) -> Result<Json<QueueSummary>> {
    let Query(params) = params?;
    let hours = parse_hours(params.hours.as_deref())?;
    let since = Utc::now() - Duration::hours(i64::from(hours));
    Ok(Json(state.store.history().summary(&queue_id, since).await?))
}

/// `POST /api/alerts/{alert_id}/acknowledge`
///
/// # Errors
///
/// `AppError::NotFound` for an unknown id; `AppError::Db` if a query fails.
pub async fn acknowledge_alert(
    State(state): State<Arc<AppState>>,
    Path(alert_id): Path<String>,
) -> Result<Json<Acknowledged>> {
    let outcome = state.store.alerts().acknowledge(&alert_id, Utc::now()).await?;
    if !outcome.already_acknowledged {
        info!(alert_id, "alert acknowledged");
    }
    Ok(Json(Acknowledged {
        message: if outcome.already_acknowledged {
            "Alert already acknowledged"
        } else {
            "Alert acknowledged"
        },
        alert_id,
        alert: outcome.alert,
        already_acknowledged: outcome.already_acknowledged,
    }))
}
