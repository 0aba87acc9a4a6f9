//! Retention service for time-based data purge.
//!
//! Runs hourly: drops queue history and snapshots past the history window,
//! acknowledged alerts past their grace period, alerts past the history
//! window, and then trims alerts to the configured cap.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use super::alert_repo::AlertRepo;
use super::db::Database;
use super::history_repo::HistoryRepo;
use super::snapshot_repo::SnapshotRepo;
use crate::config::RetentionConfig;
use crate::Result;

const PURGE_INTERVAL: Duration = Duration::from_secs(3600);

/// Rows removed by one purge pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PurgeReport {
    /// Queue history rows.
    pub history: u64,
    /// Snapshot headers.
    pub snapshots: u64,
    /// Alerts.
    pub alerts: u64,
}

/// Spawn the retention purge background task.
///
/// The first pass runs immediately, then hourly until `cancel` fires.
#[must_use]
pub fn spawn_retention_task(
    db: Arc<Database>,
    config: RetentionConfig,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(PURGE_INTERVAL);
        loop {
            tokio::select! {
                () = cancel.cancelled() => {
                    info!("retention task shutting down");
                    break;
                }
                _ = interval.tick() => {
                    if let Err(err) = purge(&db, &config, Utc::now()).await {
                        error!(%err, "retention purge failed");
                    }
                }
            }
        }
    })
}

/// Run one purge pass relative to `now`.
///
/// # Errors
///
/// Returns `AppError::Db` if any delete fails.
pub async fn purge(db: &Arc<Database>, config: &RetentionConfig, now: DateTime<Utc>) -> Result<PurgeReport> {
    let history_cutoff = now - chrono::Duration::days(i64::from(config.history_days));
    let ack_cutoff = now - chrono::Duration::days(i64::from(config.acknowledged_alert_days));

    let history = HistoryRepo::new(Arc::clone(db)).purge(history_cutoff).await?;
    let snapshots = SnapshotRepo::new(Arc::clone(db)).purge(history_cutoff).await?;

    let alert_repo = AlertRepo::new(Arc::clone(db));
    let alerts = alert_repo.purge(ack_cutoff, history_cutoff).await?
        + alert_repo.enforce_cap(config.max_alerts).await?;

    let report = PurgeReport {
        history,
        snapshots,
        alerts,
    };
    info!(
        history = report.history,
        snapshots = report.snapshots,
        alerts = report.alerts,
        "retention purge completed"
    );
    Ok(report)
}
