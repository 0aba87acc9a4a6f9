//! `SQLite` schema bootstrap logic.
//!
//! All definitions use `IF NOT EXISTS` and are re-run on every startup.

use sqlx::SqlitePool;

use crate::Result;

/// Apply all table and index definitions.
///
/// # Errors
///
/// Returns `AppError::Db` if any DDL statement fails.
pub async fn bootstrap_schema(pool: &SqlitePool) -> Result<()> {
    let ddl = r"
CREATE TABLE IF NOT EXISTS snapshot (
    cycle           INTEGER PRIMARY KEY NOT NULL,
    taken_at        TEXT NOT NULL,
    service_level   TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS agent_state (
    agent_id              TEXT PRIMARY KEY NOT NULL,
    name                  TEXT NOT NULL,
    status                TEXT NOT NULL CHECK(status IN ('available','busy','unavailable','break','training')),
    current_call_duration INTEGER,
    calls_handled_today   INTEGER NOT NULL DEFAULT 0,
    average_call_time     REAL,
    last_updated          TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS queue_metric (
    id                INTEGER PRIMARY KEY AUTOINCREMENT,
    cycle             INTEGER NOT NULL,
    queue_id          TEXT NOT NULL,
    queue_name        TEXT NOT NULL,
    current_wait_time INTEGER NOT NULL,
    queue_depth       INTEGER NOT NULL,
    calls_waiting     INTEGER NOT NULL,
    average_wait_time REAL NOT NULL,
    longest_wait_time INTEGER NOT NULL,
    status            TEXT NOT NULL CHECK(status IN ('good','warning','critical')),
    recorded_at       TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS alert (
    id              TEXT PRIMARY KEY NOT NULL,
    kind            TEXT NOT NULL CHECK(kind IN ('queue_critical','queue_warning','daily_limit','service_level')),
    queue_id        TEXT,
    message         TEXT NOT NULL,
    severity        TEXT NOT NULL CHECK(severity IN ('info','warning','critical')),
    created_at      TEXT NOT NULL,
    acknowledged    INTEGER NOT NULL DEFAULT 0,
    acknowledged_at TEXT
);

CREATE INDEX IF NOT EXISTS idx_queue_metric_queue_time ON queue_metric(queue_id, recorded_at);
CREATE INDEX IF NOT EXISTS idx_queue_metric_cycle ON queue_metric(cycle);
CREATE INDEX IF NOT EXISTS idx_alert_active ON alert(acknowledged, created_at);
";

    sqlx::raw_sql(ddl).execute(pool).await?;
    Ok(())
}

/// Timestamp text that sorts lexically in time order.
#[must_use]
pub fn ts(value: chrono::DateTime<chrono::Utc>) -> String {
    value.to_rfc3339_opts(chrono::SecondsFormat::Micros, true)
}

/// Parse a stored timestamp.
///
/// # Errors
///
/// Returns `AppError::Db` naming `field` if the text is not RFC 3339.
pub fn parse_ts(field: &str, raw: &str) -> Result<chrono::DateTime<chrono::Utc>> {
    chrono::DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&chrono::Utc))
        .map_err(|e| crate::AppError::Db(format!("invalid {field}: {e}")))
}
