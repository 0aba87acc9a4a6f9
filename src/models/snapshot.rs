//! The complete result of one successful poll cycle.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::agent::{AgentState, AgentStatus};
use super::queue::{QueueMetric, QueueStatus};
use super::service_level::ServiceLevel;

/// Immutable snapshot published for readers after it is committed.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub struct Snapshot {
    /// Monotonic cycle number assigned at commit.
    pub cycle: u64,
    /// When the cycle's data was fetched.
    pub taken_at: DateTime<Utc>,
    /// Agents as of this cycle.
    pub agents: Vec<AgentState>,
    /// Labeled queues as of this cycle.
    pub queues: Vec<QueueMetric>,
    /// Service level as of this cycle.
    pub service_level: ServiceLevel,
    /// Loaded from disk at startup rather than produced by this process.
    #[serde(skip)]
    pub rehydrated: bool,
}

impl Snapshot {
    /// Number of agents in the given status.
    #[must_use]
    pub fn agents_in(&self, status: AgentStatus) -> usize {
        self.agents.iter().filter(|a| a.status == status).count()
    }

    /// Number of queues in the given status.
    #[must_use]
    pub fn queues_in(&self, status: QueueStatus) -> usize {
        self.queues.iter().filter(|q| q.status == status).count()
    }
}

/// Cycle output handed to the store; the store assigns the cycle number.
#[derive(Debug, Clone, PartialEq)]
pub struct SnapshotDraft {
    /// When the cycle's data was fetched.
    pub taken_at: DateTime<Utc>,
    /// Agents as of this cycle.
    pub agents: Vec<AgentState>,
    /// Labeled queues.
    pub queues: Vec<QueueMetric>,
    /// Service level.
    pub service_level: ServiceLevel,
}
