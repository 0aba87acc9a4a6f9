//! Timer-driven poll loop: fetch, evaluate, persist, publish.
//!
//! The poller is the only writer of cycle data. Each cycle fetches from
//! upstream (retrying transient failures with backoff), runs the evaluator
//! against the previous cycle's state, and commits the result through the
//! [`CacheStore`] in one short transaction. The tick source and upstream
//! source are both injected so the loop runs without real time or network.

pub mod retry;
pub mod state;
pub mod status;
pub mod ticker;

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::config::GlobalConfig;
use crate::evaluator::{evaluate, EvaluationInput, EvaluatorState, Thresholds};
use crate::models::snapshot::SnapshotDraft;
use crate::persistence::cache_store::CacheStore;
use crate::upstream::{UpstreamBatch, UpstreamSource};
use crate::{AppError, Result};

use self::retry::RetryPolicy;
use self::state::{PollMachine, TickDecision};
use self::status::{PollerReport, PollerStats, StatusBoard};
use self::ticker::Ticker;

/// How one tick ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// A snapshot was committed and published.
    Succeeded {
        /// Cycle number of the new snapshot.
        cycle: u64,
        /// Alerts raised by the cycle.
        alerts_raised: usize,
    },
    /// Every attempt failed transiently; last-known-good is still served.
    Degraded {
        /// Attempts made.
        attempts: u32,
        /// Last error message.
        error: String,
    },
    /// A fatal error stopped polling.
    Halted {
        /// Error message.
        error: String,
    },
    /// The breaker held this tick back.
    Skipped,
}

/// The poll loop and the state it threads between cycles.
pub struct Poller<S> {
    source: S,
    store: Arc<CacheStore>,
    status: Arc<StatusBoard>,
    thresholds: Thresholds,
    retry: RetryPolicy,
    fetch_timeout: Duration,
    machine: PollMachine,
    evaluator: EvaluatorState,
    stats: PollerStats,
}

impl<S: UpstreamSource> Poller<S> {
    /// Build a poller. Evaluator state is seeded from the store's latest
    /// snapshot so a restart does not re-raise standing alerts.
    #[must_use]
    pub fn new(source: S, store: Arc<CacheStore>, status: Arc<StatusBoard>, config: &GlobalConfig) -> Self {
        let evaluator = store
            .read_latest()
            .map(|snapshot| EvaluatorState::from_snapshot(&snapshot))
            .unwrap_or_default();
        Self {
            source,
            store,
            status,
            thresholds: config.thresholds,
            retry: RetryPolicy::from_config(&config.poller),
            fetch_timeout: Duration::from_secs(config.upstream.request_timeout_seconds),
            machine: PollMachine::from_config(&config.poller),
            evaluator,
            stats: PollerStats::default(),
        }
    }

    /// Current machine state.
    #[must_use]
    pub fn machine(&self) -> &PollMachine {
        &self.machine
    }

    /// Counters so far.
    #[must_use]
    pub fn stats(&self) -> &PollerStats {
        &self.stats
    }

    /// Handle one tick.
    pub async fn run_cycle(&mut self) -> CycleOutcome {
        match self.machine.on_tick() {
            TickDecision::Halted => {
                return CycleOutcome::Halted {
                    error: self.stats.last_error.clone().unwrap_or_default(),
                };
            }
            TickDecision::Skip => {
                self.stats.cycles_skipped += 1;
                debug!(
                    consecutive_failures = self.machine.consecutive_failures(),
                    "breaker open, skipping tick"
                );
                self.publish();
                return CycleOutcome::Skipped;
            }
            TickDecision::Poll => {}
        }

        self.machine.begin();
        self.publish();
        let started = Instant::now();
        let now = Utc::now();
        self.stats.cycles_attempted += 1;
        self.stats.last_attempt_at = Some(now);

        let outcome = match self.fetch_with_retry().await {
            Ok(batch) => match self.commit(batch, now).await {
                Ok((cycle, alerts_raised)) => {
                    self.machine.succeed();
                    self.stats.cycles_succeeded += 1;
                    self.stats.last_success_at = Some(now);
                    CycleOutcome::Succeeded {
                        cycle,
                        alerts_raised,
                    }
                }
                Err(err) => {
                    error!(%err, "failed to persist cycle, keeping last snapshot");
                    self.record_failure(&err);
                    self.machine.fail_transient();
                    CycleOutcome::Degraded {
                        attempts: 1,
                        error: err.to_string(),
                    }
                }
            },
            Err((attempts, err)) if err.is_retryable() => {
                warn!(attempts, %err, "upstream unavailable, serving last-known-good");
                self.record_failure(&err);
                self.machine.fail_transient();
                CycleOutcome::Degraded {
                    attempts,
                    error: err.to_string(),
                }
            }
            Err((_, err)) => {
                error!(%err, "fatal upstream error, polling halted until restart");
                self.record_failure(&err);
                self.machine.fail_fatal();
                CycleOutcome::Halted {
                    error: err.to_string(),
                }
            }
        };

        self.stats.last_cycle_ms =
            Some(u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX));
        self.machine.settle();
        self.publish();
        outcome
    }

    /// Drive cycles from `ticker` until it is exhausted, `cancel` fires, or
    /// polling halts.
    pub async fn run<T: Ticker>(mut self, mut ticker: T, cancel: CancellationToken) {
        info!("poller started");
        loop {
            let ticked = tokio::select! {
                () = cancel.cancelled() => break,
                ticked = ticker.tick() => ticked,
            };
            if !ticked {
                break;
            }

            let outcome = tokio::select! {
                () = cancel.cancelled() => break,
                outcome = self.run_cycle() => outcome,
            };
            if let CycleOutcome::Halted { error } = outcome {
                error!(error, "poller halted");
                return;
            }
        }
        info!("poller shutting down");
    }

    async fn fetch_with_retry(&mut self) -> std::result::Result<UpstreamBatch, (u32, AppError)> {
        let mut attempt = 1;
        loop {
            let timeout = self.fetch_timeout;
            let result = tokio::time::timeout(timeout, self.source.fetch())
                .await
                .unwrap_or_else(|_| {
                    Err(AppError::Transient(format!(
                        "upstream did not answer within {}s",
                        timeout.as_secs()
                    )))
                });

            match result {
                Ok(batch) => return Ok(batch),
                Err(err) if !err.is_retryable() || attempt >= self.retry.max_attempts => {
                    return Err((attempt, err));
                }
                Err(err) => {
                    let delay = self.retry.delay(attempt);
                    debug!(attempt, ?delay, %err, "upstream attempt failed, backing off");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }

    async fn commit(&mut self, batch: UpstreamBatch, now: chrono::DateTime<Utc>) -> Result<(u64, usize)> {
        let evaluation = evaluate(
            EvaluationInput {
                queues: &batch.queues,
                calls: &batch.calls,
            },
            &self.evaluator,
            &self.thresholds,
            now,
        );

        for alert in &evaluation.alerts {
            warn!(
                kind = alert.kind.as_str(),
                queue_id = alert.queue_id.as_deref().unwrap_or("-"),
                message = %alert.message,
                "alert raised"
            );
        }

        let draft = SnapshotDraft {
            taken_at: now,
            agents: batch.agents,
            queues: evaluation.queues,
            service_level: evaluation.service_level,
        };
        let snapshot = self.store.write_snapshot(draft, &evaluation.alerts).await?;

        // Advance only once the cycle is durable.
        self.evaluator = evaluation.next_state;
        Ok((snapshot.cycle, evaluation.alerts.len()))
    }

    fn record_failure(&mut self, err: &AppError) {
        self.stats.cycles_failed += 1;
        self.stats.last_error = Some(err.to_string());
        self.stats.last_error_at = Some(Utc::now());
    }

    fn publish(&mut self) {
        self.stats.consecutive_failures = self.machine.consecutive_failures();
        self.stats.breaker_open = self.machine.breaker_open();
        self.status.publish(PollerReport {
            connection: self.machine.connection(),
            phase: self.machine.phase(),
            stats: self.stats.clone(),
        });
    }
}

/// Spawn the poll loop as a background task.
#[must_use]
pub fn spawn_poller<S, T>(poller: Poller<S>, ticker: T, cancel: CancellationToken) -> JoinHandle<()>
where
    S: UpstreamSource + 'static,
    T: Ticker + 'static,
{
    tokio::spawn(poller.run(ticker, cancel).instrument(info_span!("poller")))
}
