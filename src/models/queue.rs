//! Queue readings and labeled queue metrics.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Wait-time health of a queue.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum QueueStatus {
    /// Below the warning threshold.
    Good,
    /// At or above warning, below critical.
    Warning,
    /// At or above the critical threshold.
    Critical,
}

impl QueueStatus {
    /// Stable lowercase name used in storage and on the wire.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Good => "good",
            Self::Warning => "warning",
            Self::Critical => "critical",
        }
    }
}

/// Raw queue numbers from upstream, before the evaluator labels them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub struct QueueReading {
    /// Upstream queue (service) identifier.
    pub queue_id: String,
    /// Display name.
    pub queue_name: String,
    /// Wait time of the call currently at the head of the queue, seconds.
    pub current_wait_time: u32,
    /// Number of calls in the queue.
    pub queue_depth: u32,
    /// Calls waiting for an agent.
    pub calls_waiting: u32,
    /// Average wait time in seconds.
    pub average_wait_time: f64,
    /// Longest wait observed, seconds.
    pub longest_wait_time: u32,
}

impl QueueReading {
    /// Reading with only an id and a wait time; other counters zeroed.
    #[must_use]
    pub fn with_wait(queue_id: impl Into<String>, current_wait_time: u32) -> Self {
        let queue_id = queue_id.into();
        Self {
            queue_name: queue_id.clone(),
            queue_id,
            current_wait_time,
            queue_depth: 0,
            calls_waiting: 0,
            average_wait_time: 0.0,
            longest_wait_time: current_wait_time,
        }
    }
}

/// A queue reading labeled with its status at a point in time.
///
/// One of these is appended to history per queue per successful cycle.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub struct QueueMetric {
    /// Upstream queue identifier.
    pub queue_id: String,
    /// Display name.
    pub queue_name: String,
    /// Current wait time, seconds.
    pub current_wait_time: u32,
    /// Number of calls in the queue.
    pub queue_depth: u32,
    /// Calls waiting for an agent.
    pub calls_waiting: u32,
    /// Average wait time, seconds.
    pub average_wait_time: f64,
    /// Longest wait observed, seconds.
    pub longest_wait_time: u32,
    /// Derived status.
    pub status: QueueStatus,
    /// Cycle timestamp.
    pub timestamp: DateTime<Utc>,
}

impl QueueMetric {
    /// Label a reading.
    #[must_use]
    pub fn labeled(reading: &QueueReading, status: QueueStatus, timestamp: DateTime<Utc>) -> Self {
        Self {
            queue_id: reading.queue_id.clone(),
            queue_name: reading.queue_name.clone(),
            current_wait_time: reading.current_wait_time,
            queue_depth: reading.queue_depth,
            calls_waiting: reading.calls_waiting,
            average_wait_time: reading.average_wait_time,
            longest_wait_time: reading.longest_wait_time,
            status,
            timestamp,
        }
    }
}
