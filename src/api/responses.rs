//! Response bodies for the REST surface.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::agent::{AgentState, AgentStatus};
use crate::models::alert::Alert;
use crate::models::queue::{QueueMetric, QueueStatus};
use crate::models::service_level::ServiceLevel;
use crate::models::snapshot::Snapshot;
use crate::poller::state::ConnectionStatus;
use crate::poller::status::{PollerReport, PollerStats};

/// Freshness fields carried by every dashboard-family response.
#[derive(Debug, Clone, Serialize)]
pub struct Freshness {
    /// Upstream connectivity.
    pub connection_status: ConnectionStatus,
    /// The data is not from a live, connected cycle.
    pub stale: bool,
    /// When the served data was fetched.
    pub last_updated: Option<DateTime<Utc>>,
}

impl Freshness {
    /// Freshness of `snapshot` given the poller's report.
    #[must_use]
    pub fn of(snapshot: Option<&Snapshot>, report: &PollerReport) -> Self {
        Self {
            connection_status: report.connection,
            stale: snapshot.is_none_or(|s| s.rehydrated)
                || report.connection != ConnectionStatus::Connected,
            last_updated: snapshot.map(|s| s.taken_at),
        }
    }
}

/// `GET /`
#[derive(Debug, Serialize)]
pub struct Banner {
    /// Service name.
    pub message: &'static str,
    /// Crate version.
    pub version: &'static str,
    /// Always `operational` when answering.
    pub status: &'static str,
}

/// `GET /health`
#[derive(Debug, Serialize)]
pub struct Health {
    /// `healthy`, `degraded` or `unhealthy`.
    pub status: &'static str,
    /// `ok` or `unreachable`.
    pub database: &'static str,
    /// When the served data was fetched.
    pub timestamp: Option<DateTime<Utc>>,
    /// Whether the poll loop is still running.
    pub poller_running: bool,
    /// Upstream connectivity.
    pub connection_status: ConnectionStatus,
    /// Seconds since startup.
    pub uptime_seconds: i64,
    /// Poller counters.
    pub poller: PollerStats,
}

/// `GET /api/dashboard`
#[derive(Debug, Serialize)]
pub struct Dashboard {
    /// Cycle the data came from.
    pub cycle: u64,
    /// Current agents.
    pub agents: Vec<AgentState>,
    /// Current queues.
    pub queues: Vec<QueueMetric>,
    /// Service level.
    pub service_level: ServiceLevel,
    /// Active alerts.
    pub alerts: Vec<Alert>,
    /// Freshness.
    #[serde(flatten)]
    pub freshness: Freshness,
}

/// `GET /api/service-level`
#[derive(Debug, Serialize)]
pub struct ServiceLevelView {
    /// Service level.
    #[serde(flatten)]
    pub service_level: ServiceLevel,
    /// Freshness.
    #[serde(flatten)]
    pub freshness: Freshness,
}

/// Agent block of `GET /api/stats`.
#[derive(Debug, Serialize)]
pub struct AgentStats {
    /// Agents reported.
    pub total: usize,
    /// Agents available.
    pub available: usize,
    /// Agents on a call.
    pub busy: usize,
    /// `busy / total * 100`, 0 with no agents.
    pub utilization: f64,
}

/// Queue block of `GET /api/stats`.
#[derive(Debug, Serialize)]
pub struct QueueStats {
    /// Queues reported.
    pub total: usize,
    /// Calls waiting across all queues.
    pub calls_waiting: u64,
    /// Highest current wait.
    pub max_wait_time: u32,
    /// Queues in critical.
    pub critical_count: usize,
    /// Queues in warning.
    pub warning_count: usize,
}

/// System block of `GET /api/stats`.
#[derive(Debug, Serialize)]
pub struct SystemStats {
    /// Freshness.
    #[serde(flatten)]
    pub freshness: Freshness,
    /// Active alerts.
    pub alerts_count: u64,
    /// Poller counters.
    pub poller: PollerStats,
}

/// `GET /api/stats`
#[derive(Debug, Serialize)]
pub struct Stats {
    /// Agent block.
    pub agents: AgentStats,
    /// Queue block.
    pub queues: QueueStats,
    /// Service level, absent before the first cycle.
    pub service_level: Option<ServiceLevel>,
    /// System block.
    pub system: SystemStats,
}

impl AgentStats {
    /// Agent counts from a snapshot.
    #[must_use]
    #[allow(clippy::cast_precision_loss)] // Agent counts are small.
    pub fn of(snapshot: Option<&Snapshot>) -> Self {
        let Some(snapshot) = snapshot else {
            return Self {
                total: 0,
                available: 0,
                busy: 0,
                utilization: 0.0,
            };
        };
        let total = snapshot.agents.len();
        let busy = snapshot.agents_in(AgentStatus::Busy);
        Self {
            total,
            available: snapshot.agents_in(AgentStatus::Available),
            busy,
            utilization: if total == 0 {
                0.0
            } else {
                busy as f64 * 100.0 / total as f64
            },
        }
    }
}

impl QueueStats {
    /// Queue aggregates from a snapshot.
    #[must_use]
    pub fn of(snapshot: Option<&Snapshot>) -> Self {
        let Some(snapshot) = snapshot else {
            return Self {
                total: 0,
                calls_waiting: 0,
                max_wait_time: 0,
                critical_count: 0,
                warning_count: 0,
            };
        };
        let queues = &snapshot.queues;
        Self {
            total: queues.len(),
            calls_waiting: queues.iter().map(|q| u64::from(q.calls_waiting)).sum(),
            max_wait_time: queues.iter().map(|q| q.current_wait_time).max().unwrap_or(0),
            critical_count: snapshot.queues_in(QueueStatus::Critical),
            warning_count: snapshot.queues_in(QueueStatus::Warning),
        }
    }
}

/// One point of `GET /api/historical/{queue_id}`.
#[derive(Debug, Serialize)]
pub struct HistoryPoint {
    /// Cycle timestamp.
    pub timestamp: DateTime<Utc>,
    /// Current wait at that time.
    pub wait_time: u32,
    /// Queue depth.
    pub queue_depth: u32,
    /// Calls waiting.
    pub calls_waiting: u32,
    /// Average wait.
    pub average_wait_time: f64,
    /// Status label.
    pub status: QueueStatus,
}

impl From<QueueMetric> for HistoryPoint {
    fn from(m: QueueMetric) -> Self {
        Self {
            timestamp: m.timestamp,
            wait_time: m.current_wait_time,
            queue_depth: m.queue_depth,
            calls_waiting: m.calls_waiting,
            average_wait_time: m.average_wait_time,
            status: m.status,
        }
    }
}

/// `GET /api/historical/{queue_id}`
#[derive(Debug, Serialize)]
pub struct History {
    /// Queue identifier.
    pub queue_id: String,
    /// Window size.
    pub hours: u32,
    /// Points, oldest first.
    pub points: Vec<HistoryPoint>,
}

/// `POST /api/alerts/{alert_id}/acknowledge`
#[derive(Debug, Serialize)]
pub struct Acknowledged {
    /// Human-readable result.
    pub message: &'static str,
    /// Alert identifier.
    pub alert_id: String,
    /// The alert after acknowledgement.
    pub alert: Alert,
    /// The alert had been acknowledged by an earlier call.
    pub already_acknowledged: bool,
}
