//! Agent state as reported by upstream on every poll.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Presence status of a contact-center agent.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    /// Ready to take a call.
    Available,
    /// Handling a call.
    Busy,
    /// Logged out or otherwise not reachable.
    Unavailable,
    /// On a break.
    Break,
    /// In training.
    Training,
}

impl AgentStatus {
    /// Stable lowercase name used in storage and on the wire.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Available => "available",
            Self::Busy => "busy",
            Self::Unavailable => "unavailable",
            Self::Break => "break",
            Self::Training => "training",
        }
    }

    /// Map an upstream status string, including its vendor aliases.
    ///
    /// Unknown values map to [`AgentStatus::Unavailable`].
    #[must_use]
    pub fn from_upstream(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "available" | "ready" | "idle" => Self::Available,
            "busy" | "on_call" | "oncall" | "talking" => Self::Busy,
            "break" | "pause" | "paused" => Self::Break,
            "training" => Self::Training,
            _ => Self::Unavailable,
        }
    }
}

/// Current state of one agent. Replaced wholesale every cycle.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub struct AgentState {
    /// Upstream agent identifier.
    pub agent_id: String,
    /// Display name.
    pub name: String,
    /// Presence status.
    pub status: AgentStatus,
    /// Seconds into the current call, when on one.
    pub current_call_duration: Option<u32>,
    /// Calls handled since midnight.
    pub calls_handled_today: u32,
    /// Average handling time in seconds.
    pub average_call_time: Option<f64>,
    /// When this state was observed.
    pub last_updated: DateTime<Utc>,
}
