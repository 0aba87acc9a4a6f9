//! Snapshot rows and the latest agent view for `SQLite` persistence.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;

use crate::models::agent::{AgentState, AgentStatus};
use crate::models::service_level::ServiceLevel;
use crate::models::snapshot::Snapshot;
use crate::{AppError, Result};

use super::db::Database;
use super::history_repo::HistoryRepo;
use super::schema::{parse_ts, ts};

/// Repository for snapshot records.
#[derive(Clone)]
pub struct SnapshotRepo {
    db: Arc<Database>,
}

#[derive(sqlx::FromRow)]
struct SnapshotRow {
    cycle: i64,
    taken_at: String,
    service_level: String,
}

#[derive(sqlx::FromRow)]
struct AgentRow {
    agent_id: String,
    name: String,
    status: String,
    current_call_duration: Option<i64>,
    calls_handled_today: i64,
    average_call_time: Option<f64>,
    last_updated: String,
}

impl AgentRow {
    fn into_agent(self) -> Result<AgentState> {
        Ok(AgentState {
            status: parse_agent_status(&self.status)?,
            current_call_duration: self
                .current_call_duration
                .map(|v| u32::try_from(v).unwrap_or(u32::MAX)),
            calls_handled_today: u32::try_from(self.calls_handled_today).unwrap_or(u32::MAX),
            last_updated: parse_ts("last_updated", &self.last_updated)?,
            average_call_time: self.average_call_time,
            agent_id: self.agent_id,
            name: self.name,
        })
    }
}

fn parse_agent_status(s: &str) -> Result<AgentStatus> {
    match s {
        "available" => Ok(AgentStatus::Available),
        "busy" => Ok(AgentStatus::Busy),
        "unavailable" => Ok(AgentStatus::Unavailable),
        "break" => Ok(AgentStatus::Break),
        "training" => Ok(AgentStatus::Training),
        other => Err(AppError::Db(format!("invalid agent status: {other}"))),
    }
}

impl SnapshotRepo {
    /// Create a new repository instance.
    #[must_use]
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Record a snapshot header on an open connection or transaction.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if serialization or the insert fails.
    pub async fn insert_in(
        conn: &mut SqliteConnection,
        cycle: i64,
        taken_at: DateTime<Utc>,
        service_level: &ServiceLevel,
    ) -> Result<()> {
        let service_level = serde_json::to_string(service_level)
            .map_err(|err| AppError::Db(format!("failed to encode service level: {err}")))?;
        sqlx::query("INSERT INTO snapshot (cycle, taken_at, service_level) VALUES (?1, ?2, ?3)")
            .bind(cycle)
            .bind(ts(taken_at))
            .bind(service_level)
            .execute(conn)
            .await?;
        Ok(())
    }

    /// Replace the stored agent view with `agents`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if a statement fails.
    pub async fn replace_agents_in(conn: &mut SqliteConnection, agents: &[AgentState]) -> Result<()> {
        sqlx::query("DELETE FROM agent_state").execute(&mut *conn).await?;
        for agent in agents {
            sqlx::query(
                "INSERT INTO agent_state (agent_id, name, status, current_call_duration,
                                          calls_handled_today, average_call_time, last_updated)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                 ON CONFLICT(agent_id) DO UPDATE SET
                    name = excluded.name,
                    status = excluded.status,
                    current_call_duration = excluded.current_call_duration,
                    calls_handled_today = excluded.calls_handled_today,
                    average_call_time = excluded.average_call_time,
                    last_updated = excluded.last_updated",
            )
            .bind(&agent.agent_id)
            .bind(&agent.name)
            .bind(agent.status.as_str())
            .bind(agent.current_call_duration.map(i64::from))
            .bind(i64::from(agent.calls_handled_today))
            .bind(agent.average_call_time)
            .bind(ts(agent.last_updated))
            .execute(&mut *conn)
            .await?;
        }
        Ok(())
    }

    /// Highest committed cycle number, 0 when empty.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn max_cycle(&self) -> Result<u64> {
        let (max,): (i64,) = sqlx::query_as("SELECT COALESCE(MAX(cycle), 0) FROM snapshot")
            .fetch_one(self.db.as_ref())
            .await?;
        Ok(u64::try_from(max).unwrap_or(0))
    }

    /// Reassemble the most recent committed snapshot, marked as rehydrated.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if a query fails or a stored value is invalid.
    pub async fn latest(&self) -> Result<Option<Snapshot>> {
        let row: Option<SnapshotRow> = sqlx::query_as(
            "SELECT cycle, taken_at, service_level FROM snapshot ORDER BY cycle DESC LIMIT 1",
        )
        .fetch_optional(self.db.as_ref())
        .await?;
        let Some(row) = row else {
            return Ok(None);
        };

        let service_level: ServiceLevel = serde_json::from_str(&row.service_level)
            .map_err(|err| AppError::Db(format!("invalid service_level: {err}")))?;

        let agents: Vec<AgentRow> = sqlx::query_as(
            "SELECT agent_id, name, status, current_call_duration, calls_handled_today,
                    average_call_time, last_updated
             FROM agent_state ORDER BY agent_id ASC",
        )
        .fetch_all(self.db.as_ref())
        .await?;
        let agents = agents
            .into_iter()
            .map(AgentRow::into_agent)
            .collect::<Result<Vec<_>>>()?;

        let queues = HistoryRepo::new(Arc::clone(&self.db))
            .for_cycle(row.cycle)
            .await?;

        Ok(Some(Snapshot {
            cycle: u64::try_from(row.cycle).unwrap_or(0),
            taken_at: parse_ts("taken_at", &row.taken_at)?,
            agents,
            queues,
            service_level,
            rehydrated: true,
        }))
    }

    /// Delete snapshots taken before `before`, always keeping the latest.
    ///
    /// Returns the number of rows deleted.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the delete fails.
    pub async fn purge(&self, before: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query(
            "DELETE FROM snapshot WHERE taken_at < ?1
             AND cycle < (SELECT MAX(cycle) FROM snapshot)",
        )
        .bind(ts(before))
        .execute(self.db.as_ref())
        .await?;
        Ok(result.rows_affected())
    }
}
