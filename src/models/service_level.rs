//! Service-level block recomputed every cycle.

use serde::{Deserialize, Serialize};

/// Share of today's calls answered within the target wait window.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub struct ServiceLevel {
    /// Calls offered today.
    pub total_calls: u32,
    /// Calls answered within the target window.
    pub calls_answered_within_target: u32,
    /// `calls_answered_within_target / total_calls * 100`, or 100 with no calls.
    pub percentage: f64,
    /// Configured target percentage.
    pub target_percentage: f64,
    /// Whether `percentage >= target_percentage`.
    pub meets_target: bool,
    /// Mean wait across today's calls, seconds.
    pub average_wait_time: f64,
    /// Longest wait across today's calls, seconds.
    pub peak_wait_time: u32,
    /// Sum of all wait time today, seconds.
    pub total_queue_time: u64,
    /// Whether any queue's cumulative wait today exceeds the daily ceiling.
    pub daily_limit_breached: bool,
}
