//! Alert model raised by the evaluator.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Alert severity.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AlertSeverity {
    /// Informational.
    Info,
    /// Needs attention.
    Warning,
    /// Needs action now.
    Critical,
}

/// What condition raised the alert.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    /// A queue's wait time crossed up into critical.
    QueueCritical,
    /// A queue's wait time crossed up into the warning band.
    QueueWarning,
    /// A queue's cumulative wait today exceeded the daily ceiling.
    DailyLimit,
    /// Service level dropped below target.
    ServiceLevel,
}

impl AlertKind {
    /// Stable name used in storage.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::QueueCritical => "queue_critical",
            Self::QueueWarning => "queue_warning",
            Self::DailyLimit => "daily_limit",
            Self::ServiceLevel => "service_level",
        }
    }
}

/// An alert. Mutated only by acknowledgement; removed only by retention.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct Alert {
    /// Unique identifier (UUID v4).
    pub id: String,
    /// Triggering condition.
    pub kind: AlertKind,
    /// Queue the alert concerns, if any.
    pub queue_id: Option<String>,
    /// Operator-facing message.
    pub message: String,
    /// Severity.
    pub severity: AlertSeverity,
    /// When the alert was raised.
    pub created_at: DateTime<Utc>,
    /// Whether an operator acknowledged it.
    pub acknowledged: bool,
    /// When it was acknowledged.
    pub acknowledged_at: Option<DateTime<Utc>>,
}

impl Alert {
    /// Construct a new unacknowledged alert.
    #[must_use]
    pub fn new(
        kind: AlertKind,
        queue_id: Option<String>,
        message: String,
        severity: AlertSeverity,
        created_at: DateTime<Utc>,
    ) -> Self {
        let id = Uuid::new_v4().to_string();
        Self {
            id,
            kind,
            queue_id,
            message,
            severity,
            created_at,
            acknowledged: false,
            acknowledged_at: None,
        }
    }
}
