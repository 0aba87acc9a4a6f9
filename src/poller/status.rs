//! Poller counters and the published status board.

use std::sync::Arc;

use arc_swap::ArcSwap;
use chrono::{DateTime, Utc};
use serde::Serialize;

use super::state::{ConnectionStatus, PollPhase};

/// Running counters kept by the poller.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct PollerStats {
    /// Cycles that reached upstream.
    pub cycles_attempted: u64,
    /// Cycles that committed a snapshot.
    pub cycles_succeeded: u64,
    /// Cycles that ended in failure.
    pub cycles_failed: u64,
    /// Ticks held back by the open breaker.
    pub cycles_skipped: u64,
    /// Failures since the last success.
    pub consecutive_failures: u32,
    /// Whether the breaker is open.
    pub breaker_open: bool,
    /// Start of the latest attempted cycle.
    pub last_attempt_at: Option<DateTime<Utc>>,
    /// Start of the latest successful cycle.
    pub last_success_at: Option<DateTime<Utc>>,
    /// When the latest failure happened.
    pub last_error_at: Option<DateTime<Utc>>,
    /// Message of the latest failure.
    pub last_error: Option<String>,
    /// Wall time of the latest attempted cycle.
    pub last_cycle_ms: Option<u64>,
}

/// Everything readers need to know about the poller.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct PollerReport {
    /// Connectivity as shown to clients.
    pub connection: ConnectionStatus,
    /// Current phase.
    pub phase: PollPhase,
    /// Counters.
    pub stats: PollerStats,
}

impl Default for PollerReport {
    fn default() -> Self {
        Self {
            connection: ConnectionStatus::Connecting,
            phase: PollPhase::Idle,
            stats: PollerStats::default(),
        }
    }
}

/// Lock-free holder for the latest [`PollerReport`].
#[derive(Debug, Default)]
pub struct StatusBoard {
    report: ArcSwap<PollerReport>,
}

impl StatusBoard {
    /// Board showing `Connecting` with zeroed counters.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Latest report.
    #[must_use]
    pub fn current(&self) -> Arc<PollerReport> {
        self.report.load_full()
    }

    /// Replace the report.
    pub fn publish(&self, report: PollerReport) {
        self.report.store(Arc::new(report));
    }
}
