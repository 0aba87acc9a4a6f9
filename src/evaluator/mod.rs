//! Queue status labeling, service-level computation and edge-triggered
//! alert generation.
//!
//! [`evaluate`] is a pure function of the cycle's upstream readings, the
//! previous cycle's [`EvaluatorState`], the configured [`Thresholds`] and the
//! cycle timestamp. The poller owns the state and threads it from one cycle
//! to the next.

mod service_level;

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;

use crate::models::alert::{Alert, AlertKind, AlertSeverity};
use crate::models::call::CallRecord;
use crate::models::queue::{QueueMetric, QueueReading, QueueStatus};
use crate::models::service_level::ServiceLevel;
use crate::models::snapshot::Snapshot;

pub use service_level::{compute_service_level, daily_queue_time};

/// Thresholds that drive status labeling and alerting.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub struct Thresholds {
    /// Wait time at which a queue turns `warning`.
    #[serde(default = "default_warning_seconds")]
    pub warning_seconds: u32,
    /// Wait time at which a queue turns `critical`.
    #[serde(default = "default_critical_seconds")]
    pub critical_seconds: u32,
    /// A call counts toward service level when answered within this window.
    #[serde(default = "default_service_level_target_seconds")]
    pub service_level_target_seconds: u32,
    /// Service-level percentage the center aims for.
    #[serde(default = "default_service_level_target_percent")]
    pub service_level_target_percent: f64,
    /// Ceiling on a single queue's cumulative wait per day.
    #[serde(default = "default_daily_queue_time_limit_seconds")]
    pub daily_queue_time_limit_seconds: u64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            warning_seconds: default_warning_seconds(),
            critical_seconds: default_critical_seconds(),
            service_level_target_seconds: default_service_level_target_seconds(),
            service_level_target_percent: default_service_level_target_percent(),
            daily_queue_time_limit_seconds: default_daily_queue_time_limit_seconds(),
        }
    }
}

fn default_warning_seconds() -> u32 {
    15
}

fn default_critical_seconds() -> u32 {
    20
}

fn default_service_level_target_seconds() -> u32 {
    20
}

fn default_service_level_target_percent() -> f64 {
    80.0
}

fn default_daily_queue_time_limit_seconds() -> u64 {
    3600
}

/// Label a wait time against the thresholds.
#[must_use]
pub fn queue_status(wait_seconds: u32, thresholds: &Thresholds) -> QueueStatus {
    if wait_seconds >= thresholds.critical_seconds {
        QueueStatus::Critical
    } else if wait_seconds >= thresholds.warning_seconds {
        QueueStatus::Warning
    } else {
        QueueStatus::Good
    }
}

/// What the evaluator remembers between cycles.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EvaluatorState {
    /// Last observed wait time per queue.
    previous_wait: HashMap<String, u32>,
    /// Day the daily-limit bookkeeping belongs to.
    day: Option<NaiveDate>,
    /// Queues that already raised a daily-limit alert on `day`.
    daily_alerted: HashSet<String>,
    /// Whether the previous cycle met the service-level target.
    service_level_met: Option<bool>,
}

impl EvaluatorState {
    /// Seed state from a previously published snapshot so a restart does
    /// not re-raise alerts for queues that were already critical.
    #[must_use]
    pub fn from_snapshot(snapshot: &Snapshot) -> Self {
        Self {
            previous_wait: snapshot
                .queues
                .iter()
                .map(|q| (q.queue_id.clone(), q.current_wait_time))
                .collect(),
            day: Some(snapshot.taken_at.date_naive()),
            daily_alerted: HashSet::new(),
            service_level_met: Some(snapshot.service_level.meets_target),
        }
    }

    /// Wait time recorded for a queue in the previous cycle.
    #[must_use]
    pub fn previous_wait(&self, queue_id: &str) -> Option<u32> {
        self.previous_wait.get(queue_id).copied()
    }
}

/// Upstream data for one cycle.
#[derive(Debug, Clone, Copy)]
pub struct EvaluationInput<'a> {
    /// Queue readings.
    pub queues: &'a [QueueReading],
    /// Today's calls.
    pub calls: &'a [CallRecord],
}

/// Everything the evaluator derives from one cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    /// Labeled queues, in input order.
    pub queues: Vec<QueueMetric>,
    /// Service-level block.
    pub service_level: ServiceLevel,
    /// Alerts raised this cycle.
    pub alerts: Vec<Alert>,
    /// State to pass to the next cycle.
    pub next_state: EvaluatorState,
}

/// Evaluate one cycle.
#[must_use]
pub fn evaluate(
    input: EvaluationInput<'_>,
    previous: &EvaluatorState,
    thresholds: &Thresholds,
    now: DateTime<Utc>,
) -> Evaluation {
    let today = now.date_naive();
    let mut alerts = Vec::new();

    // ── 1. Label queues, edge-trigger upward crossings ───────
    let mut queues = Vec::with_capacity(input.queues.len());
    let mut previous_wait = HashMap::with_capacity(input.queues.len());
    for reading in input.queues {
        let status = queue_status(reading.current_wait_time, thresholds);
        let previous_status = previous
            .previous_wait(&reading.queue_id)
            .map_or(QueueStatus::Good, |w| queue_status(w, thresholds));
        match status {
            QueueStatus::Critical if previous_status != QueueStatus::Critical => {
                alerts.push(Alert::new(
                    AlertKind::QueueCritical,
                    Some(reading.queue_id.clone()),
                    format!(
                        "{} wait time {}s reached the {}s limit",
                        reading.queue_name, reading.current_wait_time, thresholds.critical_seconds
                    ),
                    AlertSeverity::Critical,
                    now,
                ));
            }
            // Falling back from critical into warning is not a new warning.
            QueueStatus::Warning if previous_status == QueueStatus::Good => {
                alerts.push(Alert::new(
                    AlertKind::QueueWarning,
                    Some(reading.queue_id.clone()),
                    format!(
                        "{} wait time {}s is approaching the {}s limit",
                        reading.queue_name, reading.current_wait_time, thresholds.critical_seconds
                    ),
                    AlertSeverity::Warning,
                    now,
                ));
            }
            _ => {}
        }
        previous_wait.insert(reading.queue_id.clone(), reading.current_wait_time);
        queues.push(QueueMetric::labeled(reading, status, now));
    }

    // ── 2. Daily cumulative queue time, once per queue per day ─
    let mut daily_alerted = if previous.day == Some(today) {
        previous.daily_alerted.clone()
    } else {
        HashSet::new()
    };
    let per_queue = daily_queue_time(input.calls);
    let mut over_limit: Vec<(&String, &u64)> = per_queue
        .iter()
        .filter(|(_, total)| **total > thresholds.daily_queue_time_limit_seconds)
        .collect();
    over_limit.sort();
    for (queue_id, total) in over_limit {
        if daily_alerted.insert(queue_id.clone()) {
            let name = input
                .queues
                .iter()
                .find(|q| &q.queue_id == queue_id)
                .map_or(queue_id.as_str(), |q| q.queue_name.as_str());
            alerts.push(Alert::new(
                AlertKind::DailyLimit,
                Some(queue_id.clone()),
                format!(
                    "{name} accumulated {total}s of queue time today, over the {}s daily limit",
                    thresholds.daily_queue_time_limit_seconds
                ),
                AlertSeverity::Critical,
                now,
            ));
        }
    }

    // ── 3. Service level, alert on dropping below target ─────
    let service_level = compute_service_level(input.calls, thresholds);
    if !service_level.meets_target && previous.service_level_met != Some(false) {
        alerts.push(Alert::new(
            AlertKind::ServiceLevel,
            None,
            format!(
                "Service level {:.1}% is below the {:.0}% target",
                service_level.percentage, service_level.target_percentage
            ),
            AlertSeverity::Warning,
            now,
        ));
    }

    let next_state = EvaluatorState {
        previous_wait,
        day: Some(today),
        daily_alerted,
        service_level_met: Some(service_level.meets_target),
    };

    Evaluation {
        queues,
        service_level,
        alerts,
        next_state,
    }
}
