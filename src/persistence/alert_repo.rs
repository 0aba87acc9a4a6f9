//! Alert repository for `SQLite` persistence.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;

use crate::models::alert::{Alert, AlertKind, AlertSeverity};
use crate::{AppError, Result};

use super::db::Database;
use super::schema::{parse_ts, ts};

/// Result of an acknowledge call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AckOutcome {
    /// The alert after the call.
    pub alert: Alert,
    /// The alert had been acknowledged before; nothing changed.
    pub already_acknowledged: bool,
}

/// Repository for alert records.
#[derive(Clone)]
pub struct AlertRepo {
    db: Arc<Database>,
}

/// Internal row struct for `SQLite` deserialization.
#[derive(sqlx::FromRow)]
struct AlertRow {
    id: String,
    kind: String,
    queue_id: Option<String>,
    message: String,
    severity: String,
    created_at: String,
    acknowledged: i64,
    acknowledged_at: Option<String>,
}

impl AlertRow {
    fn into_alert(self) -> Result<Alert> {
        Ok(Alert {
            kind: parse_kind(&self.kind)?,
            severity: parse_severity(&self.severity)?,
            created_at: parse_ts("created_at", &self.created_at)?,
            acknowledged_at: self
                .acknowledged_at
                .as_deref()
                .map(|raw| parse_ts("acknowledged_at", raw))
                .transpose()?,
            acknowledged: self.acknowledged != 0,
            id: self.id,
            queue_id: self.queue_id,
            message: self.message,
        })
    }
}

fn parse_kind(s: &str) -> Result<AlertKind> {
    match s {
        "queue_critical" => Ok(AlertKind::QueueCritical),
        "queue_warning" => Ok(AlertKind::QueueWarning),
        "daily_limit" => Ok(AlertKind::DailyLimit),
        "service_level" => Ok(AlertKind::ServiceLevel),
        other => Err(AppError::Db(format!("invalid alert kind: {other}"))),
    }
}

fn parse_severity(s: &str) -> Result<AlertSeverity> {
    match s {
        "info" => Ok(AlertSeverity::Info),
        "warning" => Ok(AlertSeverity::Warning),
        "critical" => Ok(AlertSeverity::Critical),
        other => Err(AppError::Db(format!("invalid alert severity: {other}"))),
    }
}

fn severity_str(s: AlertSeverity) -> &'static str {
    match s {
        AlertSeverity::Info => "info",
        AlertSeverity::Warning => "warning",
        AlertSeverity::Critical => "critical",
    }
}

const COLUMNS: &str =
    "id, kind, queue_id, message, severity, created_at, acknowledged, acknowledged_at";

impl AlertRepo {
    /// Create a new repository instance.
    #[must_use]
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Insert an alert on an open connection or transaction.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the insert fails.
    pub async fn insert_in(conn: &mut SqliteConnection, alert: &Alert) -> Result<()> {
        sqlx::query(
            "INSERT INTO alert (id, kind, queue_id, message, severity, created_at, acknowledged, acknowledged_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        )
        .bind(&alert.id)
        .bind(alert.kind.as_str())
        .bind(&alert.queue_id)
        .bind(&alert.message)
        .bind(severity_str(alert.severity))
        .bind(ts(alert.created_at))
        .bind(i64::from(alert.acknowledged))
        .bind(alert.acknowledged_at.map(ts))
        .execute(conn)
        .await?;
        Ok(())
    }

    /// Insert a single alert outside a cycle transaction.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the insert fails.
    pub async fn insert(&self, alert: &Alert) -> Result<()> {
        let mut conn = self.db.acquire().await?;
        Self::insert_in(&mut conn, alert).await
    }

    /// Unacknowledged alerts, newest first.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn list_active(&self) -> Result<Vec<Alert>> {
        let rows: Vec<AlertRow> = sqlx::query_as(&format!(
            "SELECT {COLUMNS} FROM alert WHERE acknowledged = 0 ORDER BY created_at DESC, id ASC"
        ))
        .fetch_all(self.db.as_ref())
        .await?;

        rows.into_iter().map(AlertRow::into_alert).collect()
    }

    /// Number of unacknowledged alerts.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn count_active(&self) -> Result<u64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM alert WHERE acknowledged = 0")
            .fetch_one(self.db.as_ref())
            .await?;
        Ok(u64::try_from(count).unwrap_or(0))
    }

    /// Fetch one alert.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn get_by_id(&self, id: &str) -> Result<Option<Alert>> {
        let row: Option<AlertRow> =
            sqlx::query_as(&format!("SELECT {COLUMNS} FROM alert WHERE id = ?1"))
                .bind(id)
                .fetch_optional(self.db.as_ref())
                .await?;

        row.map(AlertRow::into_alert).transpose()
    }

    /// Mark an alert acknowledged at `now`.
    ///
    /// Acknowledging an already acknowledged alert leaves it untouched,
    /// including its original `acknowledged_at`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` for an unknown id, `AppError::Db` if a
    /// query fails.
    pub async fn acknowledge(&self, id: &str, now: DateTime<Utc>) -> Result<AckOutcome> {
        let updated = sqlx::query(
            "UPDATE alert SET acknowledged = 1, acknowledged_at = ?2
             WHERE id = ?1 AND acknowledged = 0",
        )
        .bind(id)
        .bind(ts(now))
        .execute(self.db.as_ref())
        .await?
        .rows_affected();

        let alert = self
            .get_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("alert {id} not found")))?;

        Ok(AckOutcome {
            alert,
            already_acknowledged: updated == 0,
        })
    }

    /// Delete acknowledged alerts acknowledged before `acknowledged_before`
    /// and any alert created before `created_before`.
    ///
    /// Returns the number of rows deleted.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the delete fails.
    pub async fn purge(
        &self,
        acknowledged_before: DateTime<Utc>,
        created_before: DateTime<Utc>,
    ) -> Result<u64> {
        let result = sqlx::query(
            "DELETE FROM alert
             WHERE (acknowledged = 1 AND acknowledged_at < ?1) OR created_at < ?2",
        )
        .bind(ts(acknowledged_before))
        .bind(ts(created_before))
        .execute(self.db.as_ref())
        .await?;
        Ok(result.rows_affected())
    }

    /// Keep only the `max_alerts` most recent alerts.
    ///
    /// Returns the number of rows deleted.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the delete fails.
    pub async fn enforce_cap(&self, max_alerts: u32) -> Result<u64> {
        let result = sqlx::query(
            "DELETE FROM alert WHERE id NOT IN
             (SELECT id FROM alert ORDER BY created_at DESC, id DESC LIMIT ?1)",
        )
        .bind(i64::from(max_alerts))
        .execute(self.db.as_ref())
        .await?;
        Ok(result.rows_affected())
    }
}
