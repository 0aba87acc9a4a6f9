//! Cycle write path and the lock-free latest-snapshot pointer.
//!
//! A cycle is written in one transaction: snapshot header, agent view,
//! queue history rows and new alerts. Only after commit is the in-memory
//! pointer swapped, so a reader sees either the previous complete snapshot
//! or the new one.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use arc_swap::ArcSwapOption;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::models::alert::Alert;
use crate::models::queue::QueueMetric;
use crate::models::snapshot::{Snapshot, SnapshotDraft};
use crate::{AppError, Result};

use super::alert_repo::AlertRepo;
use super::db::Database;
use super::history_repo::HistoryRepo;
use super::snapshot_repo::SnapshotRepo;

/// Owner of persisted history and the published snapshot.
pub struct CacheStore {
    db: Arc<Database>,
    latest: ArcSwapOption<Snapshot>,
    next_cycle: AtomicU64,
    /// Serializes writers; readers never take it.
    writer: Mutex<()>,
    snapshots: SnapshotRepo,
    history: HistoryRepo,
    alerts: AlertRepo,
}

impl CacheStore {
    /// Open the store, loading the latest persisted snapshot if any.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the stored snapshot cannot be read.
    pub async fn open(db: Arc<Database>) -> Result<Self> {
        let snapshots = SnapshotRepo::new(Arc::clone(&db));
        let latest = snapshots.latest().await?;
        let next_cycle = snapshots.max_cycle().await? + 1;

        if let Some(ref snapshot) = latest {
            info!(
                cycle = snapshot.cycle,
                taken_at = %snapshot.taken_at,
                "rehydrated latest snapshot"
            );
        }

        Ok(Self {
            history: HistoryRepo::new(Arc::clone(&db)),
            alerts: AlertRepo::new(Arc::clone(&db)),
            latest: ArcSwapOption::from(latest.map(Arc::new)),
            next_cycle: AtomicU64::new(next_cycle),
            writer: Mutex::new(()),
            snapshots,
            db,
        })
    }

    /// Persist one cycle and publish it.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if any statement or the commit fails; in that
    /// case nothing is persisted and the published snapshot is unchanged.
    pub async fn write_snapshot(&self, draft: SnapshotDraft, alerts: &[Alert]) -> Result<Arc<Snapshot>> {
        let _guard = self.writer.lock().await;
        let cycle = self.next_cycle.load(Ordering::Acquire);
        let cycle_key = i64::try_from(cycle)
            .map_err(|_| AppError::Db(format!("cycle counter overflow: {cycle}")))?;

        let mut tx = self.db.begin().await?;
        SnapshotRepo::insert_in(&mut tx, cycle_key, draft.taken_at, &draft.service_level).await?;
        SnapshotRepo::replace_agents_in(&mut tx, &draft.agents).await?;
        for metric in &draft.queues {
            HistoryRepo::insert_in(&mut tx, cycle_key, metric).await?;
        }
        for alert in alerts {
            AlertRepo::insert_in(&mut tx, alert).await?;
        }
        tx.commit().await?;

        self.next_cycle.store(cycle + 1, Ordering::Release);
        let snapshot = Arc::new(Snapshot {
            cycle,
            taken_at: draft.taken_at,
            agents: draft.agents,
            queues: draft.queues,
            service_level: draft.service_level,
            rehydrated: false,
        });
        self.latest.store(Some(Arc::clone(&snapshot)));
        debug!(cycle, alerts = alerts.len(), "snapshot committed and published");
        Ok(snapshot)
    }

    /// Most recent complete snapshot, or `None` before the first one.
    #[must_use]
    pub fn read_latest(&self) -> Option<Arc<Snapshot>> {
        self.latest.load_full()
    }

    /// History rows for a queue since `since`, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn read_history(&self, queue_id: &str, since: DateTime<Utc>) -> Result<Vec<QueueMetric>> {
        self.history.read_history(queue_id, since).await
    }

    /// Alert repository sharing this store's pool.
    #[must_use]
    pub fn alerts(&self) -> &AlertRepo {
        &self.alerts
    }

    /// History repository sharing this store's pool.
    #[must_use]
    pub fn history(&self) -> &HistoryRepo {
        &self.history
    }

    /// Underlying pool.
    #[must_use]
    pub fn db(&self) -> &Arc<Database> {
        &self.db
    }
}
