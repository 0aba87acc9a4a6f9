//! Queue metric history for `SQLite` persistence.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::SqliteConnection;

use crate::models::queue::{QueueMetric, QueueStatus};
use crate::{AppError, Result};

use super::db::Database;
use super::schema::{parse_ts, ts};

/// Repository for queue metric history.
#[derive(Clone)]
pub struct HistoryRepo {
    db: Arc<Database>,
}

/// Internal row struct for `SQLite` deserialization.
#[derive(sqlx::FromRow)]
struct QueueMetricRow {
    queue_id: String,
    queue_name: String,
    current_wait_time: i64,
    queue_depth: i64,
    calls_waiting: i64,
    average_wait_time: f64,
    longest_wait_time: i64,
    status: String,
    recorded_at: String,
}

impl QueueMetricRow {
    fn into_metric(self) -> Result<QueueMetric> {
        Ok(QueueMetric {
            current_wait_time: to_u32("current_wait_time", self.current_wait_time)?,
            queue_depth: to_u32("queue_depth", self.queue_depth)?,
            calls_waiting: to_u32("calls_waiting", self.calls_waiting)?,
            longest_wait_time: to_u32("longest_wait_time", self.longest_wait_time)?,
            average_wait_time: self.average_wait_time,
            status: parse_status(&self.status)?,
            timestamp: parse_ts("recorded_at", &self.recorded_at)?,
            queue_id: self.queue_id,
            queue_name: self.queue_name,
        })
    }
}

fn to_u32(field: &str, value: i64) -> Result<u32> {
    u32::try_from(value).map_err(|_| AppError::Db(format!("{field} out of range: {value}")))
}

fn parse_status(s: &str) -> Result<QueueStatus> {
    match s {
        "good" => Ok(QueueStatus::Good),
        "warning" => Ok(QueueStatus::Warning),
        "critical" => Ok(QueueStatus::Critical),
        other => Err(AppError::Db(format!("invalid queue status: {other}"))),
    }
}

const COLUMNS: &str = "queue_id, queue_name, current_wait_time, queue_depth, calls_waiting, \
                       average_wait_time, longest_wait_time, status, recorded_at";

/// Aggregate statistics for one queue over a window.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct QueueSummary {
    /// Queue identifier.
    pub queue_id: String,
    /// Rows in the window.
    pub data_points: usize,
    /// Mean current wait across rows.
    pub avg_wait_time: f64,
    /// Largest current wait.
    pub max_wait_time: u32,
    /// Smallest current wait.
    pub min_wait_time: u32,
    /// Rows labeled critical.
    pub critical_count: usize,
    /// Rows labeled warning.
    pub warning_count: usize,
    /// Rows labeled good.
    pub good_count: usize,
}

impl QueueSummary {
    /// Summarize a series of metrics. An empty series yields zeros.
    #[must_use]
    #[allow(clippy::cast_precision_loss)] // Row counts are bounded by retention.
    pub fn from_metrics(queue_id: &str, metrics: &[QueueMetric]) -> Self {
        let count = |status| metrics.iter().filter(|m| m.status == status).count();
        let total: u64 = metrics.iter().map(|m| u64::from(m.current_wait_time)).sum();
        Self {
            queue_id: queue_id.to_owned(),
            data_points: metrics.len(),
            avg_wait_time: if metrics.is_empty() {
                0.0
            } else {
                total as f64 / metrics.len() as f64
            },
            max_wait_time: metrics.iter().map(|m| m.current_wait_time).max().unwrap_or(0),
            min_wait_time: metrics.iter().map(|m| m.current_wait_time).min().unwrap_or(0),
            critical_count: count(QueueStatus::Critical),
            warning_count: count(QueueStatus::Warning),
            good_count: count(QueueStatus::Good),
        }
    }
}

impl HistoryRepo {
    /// Create a new repository instance.
    #[must_use]
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Append one metric row for `cycle` on an open connection or transaction.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the insert fails.
    pub async fn insert_in(conn: &mut SqliteConnection, cycle: i64, metric: &QueueMetric) -> Result<()> {
        sqlx::query(
            "INSERT INTO queue_metric (cycle, queue_id, queue_name, current_wait_time, queue_depth,
                                       calls_waiting, average_wait_time, longest_wait_time, status, recorded_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        )
        .bind(cycle)
        .bind(&metric.queue_id)
        .bind(&metric.queue_name)
        .bind(i64::from(metric.current_wait_time))
        .bind(i64::from(metric.queue_depth))
        .bind(i64::from(metric.calls_waiting))
        .bind(metric.average_wait_time)
        .bind(i64::from(metric.longest_wait_time))
        .bind(metric.status.as_str())
        .bind(ts(metric.timestamp))
        .execute(conn)
        .await?;
        Ok(())
    }

    /// Rows for `queue_id` recorded at or after `since`, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn read_history(&self, queue_id: &str, since: DateTime<Utc>) -> Result<Vec<QueueMetric>> {
        let rows: Vec<QueueMetricRow> = sqlx::query_as(&format!(
            "SELECT {COLUMNS} FROM queue_metric
             WHERE queue_id = ?1 AND recorded_at >= ?2
             ORDER BY recorded_at ASC, id ASC"
        ))
        .bind(queue_id)
        .bind(ts(since))
        .fetch_all(self.db.as_ref())
        .await?;

        rows.into_iter().map(QueueMetricRow::into_metric).collect()
    }

    /// Summary statistics over the same window as [`read_history`](Self::read_history).
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn summary(&self, queue_id: &str, since: DateTime<Utc>) -> Result<QueueSummary> {
        let metrics = self.read_history(queue_id, since).await?;
        Ok(QueueSummary::from_metrics(queue_id, &metrics))
    }

    /// Every row written by one cycle, in insertion order.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn for_cycle(&self, cycle: i64) -> Result<Vec<QueueMetric>> {
        let rows: Vec<QueueMetricRow> = sqlx::query_as(&format!(
            "SELECT {COLUMNS} FROM queue_metric WHERE cycle = ?1 ORDER BY id ASC"
        ))
        .bind(cycle)
        .fetch_all(self.db.as_ref())
        .await?;

        rows.into_iter().map(QueueMetricRow::into_metric).collect()
    }

    /// Delete rows recorded before `before`, sparing the latest cycle.
    ///
    /// Returns the number of rows deleted.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the delete fails.
    pub async fn purge(&self, before: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query(
            "DELETE FROM queue_metric WHERE recorded_at < ?1
             AND cycle < (SELECT COALESCE(MAX(cycle), 0) FROM snapshot)",
        )
        .bind(ts(before))
        .execute(self.db.as_ref())
        .await?;
        Ok(result.rows_affected())
    }
}
