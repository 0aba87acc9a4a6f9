//! Poll cycle behaviour against a scripted upstream.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio_util::sync::CancellationToken;

use trio_monitor::models::alert::AlertKind;
use trio_monitor::models::call::CallRecord;
use trio_monitor::models::queue::QueueStatus;
use trio_monitor::poller::state::{ConnectionStatus, PollPhase};
use trio_monitor::poller::status::StatusBoard;
use trio_monitor::poller::ticker::ChannelTicker;
use trio_monitor::poller::{spawn_poller, CycleOutcome, Poller};
use trio_monitor::AppError;

use super::test_helpers::{batch, memory_store, reading, test_config, ScriptedSource};

async fn poller(source: &ScriptedSource) -> (Poller<ScriptedSource>, Arc<StatusBoard>) {
    let config = test_config("http://127.0.0.1:1");
    let status = Arc::new(StatusBoard::new());
    let store = memory_store().await;
    (
        Poller::new(source.clone(), store, Arc::clone(&status), &config),
        status,
    )
}

#[tokio::test]
async fn successful_cycle_publishes_snapshot() {
    let source = ScriptedSource::new(vec![Ok(batch(
        vec![reading("1", 25), reading("2", 5)],
        vec![CallRecord::answered("1", 10)],
    ))]);
    let (mut poller, status) = poller(&source).await;

    let outcome = poller.run_cycle().await;
    assert_eq!(
        outcome,
        CycleOutcome::Succeeded {
            cycle: 1,
            alerts_raised: 1
        }
    );

    let report = status.current();
    assert_eq!(report.connection, ConnectionStatus::Connected);
    assert_eq!(report.phase, PollPhase::Idle);
    assert_eq!(report.stats.cycles_succeeded, 1);
    assert!(report.stats.last_success_at.is_some());
}

#[tokio::test]
async fn transient_failures_are_retried_within_cycle() {
    let source = ScriptedSource::new(vec![
        Err(AppError::Transient("503".into())),
        Err(AppError::Transient("timeout".into())),
        Ok(batch(vec![reading("1", 5)], vec![])),
    ]);
    let (mut poller, status) = poller(&source).await;

    let outcome = poller.run_cycle().await;
    assert!(matches!(outcome, CycleOutcome::Succeeded { cycle: 1, .. }));
    assert_eq!(source.fetches(), 3);
    assert_eq!(status.current().connection, ConnectionStatus::Connected);
}

#[tokio::test]
async fn exhausted_retries_degrade_and_keep_last_snapshot() {
    let source = ScriptedSource::new(vec![Ok(batch(vec![reading("1", 5)], vec![]))]);
    let (mut poller, status) = poller(&source).await;
    poller.run_cycle().await;

    // Script is now empty: every further attempt fails transiently.
    let outcome = poller.run_cycle().await;
    assert_eq!(
        outcome,
        CycleOutcome::Degraded {
            attempts: 3,
            error: "transient: script exhausted".into()
        }
    );
    assert_eq!(source.fetches(), 4);

    let report = status.current();
    assert_eq!(report.connection, ConnectionStatus::Degraded);
    assert_eq!(report.stats.consecutive_failures, 1);
    assert_eq!(report.stats.cycles_failed, 1);
    assert!(report.stats.last_error.is_some());
}

#[tokio::test]
async fn degraded_cycle_writes_no_history() {
    let config = test_config("http://127.0.0.1:1");
    let store = memory_store().await;
    let source = ScriptedSource::new(vec![Ok(batch(vec![reading("1", 5)], vec![]))]);
    let mut poller = Poller::new(source, Arc::clone(&store), Arc::new(StatusBoard::new()), &config);

    poller.run_cycle().await;
    poller.run_cycle().await;

    assert_eq!(store.read_latest().unwrap().cycle, 1);
    let history = store
        .read_history("1", Utc::now() - chrono::Duration::hours(1))
        .await
        .unwrap();
    assert_eq!(history.len(), 1);
}

#[tokio::test]
async fn fatal_error_halts_without_retry() {
    let source = ScriptedSource::new(vec![Err(AppError::Fatal("401 twice".into()))]);
    let (mut poller, status) = poller(&source).await;

    let outcome = poller.run_cycle().await;
    assert!(matches!(outcome, CycleOutcome::Halted { .. }));
    assert_eq!(source.fetches(), 1);

    let report = status.current();
    assert_eq!(report.connection, ConnectionStatus::Disconnected);
    assert_eq!(report.phase, PollPhase::Halted);

    // Later ticks do nothing.
    source.push(Ok(batch(vec![], vec![])));
    assert!(matches!(poller.run_cycle().await, CycleOutcome::Halted { .. }));
    assert_eq!(source.fetches(), 1);
}

#[tokio::test]
async fn breaker_skips_ticks_then_probes() {
    // Breaker opens after 2 failed cycles; every 3rd tick probes.
    let source = ScriptedSource::new(vec![]);
    let (mut poller, status) = poller(&source).await;

    poller.run_cycle().await;
    poller.run_cycle().await;
    assert!(poller.machine().breaker_open());
    let fetched = source.fetches();

    assert_eq!(poller.run_cycle().await, CycleOutcome::Skipped);
    assert_eq!(poller.run_cycle().await, CycleOutcome::Skipped);
    assert_eq!(source.fetches(), fetched);
    assert_eq!(status.current().stats.cycles_skipped, 2);

    source.push(Ok(batch(vec![reading("1", 5)], vec![])));
    assert!(matches!(poller.run_cycle().await, CycleOutcome::Succeeded { .. }));
    assert!(!poller.machine().breaker_open());
    assert_eq!(status.current().connection, ConnectionStatus::Connected);
}

#[tokio::test]
async fn critical_alert_is_edge_triggered_across_cycles() {
    let config = test_config("http://127.0.0.1:1");
    let store = memory_store().await;
    let source = ScriptedSource::new(
        [10, 12, 22, 23, 19]
            .into_iter()
            .map(|wait| Ok(batch(vec![reading("1", wait)], vec![])))
            .collect(),
    );
    let mut poller = Poller::new(source, Arc::clone(&store), Arc::new(StatusBoard::new()), &config);

    let mut raised = Vec::new();
    for _ in 0..5 {
        match poller.run_cycle().await {
            CycleOutcome::Succeeded { alerts_raised, .. } => raised.push(alerts_raised),
            other => panic!("unexpected outcome {other:?}"),
        }
    }
    assert_eq!(raised, vec![0, 0, 1, 0, 0]);

    let alerts = store.alerts().list_active().await.unwrap();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].kind, AlertKind::QueueCritical);
    assert_eq!(
        store.read_latest().unwrap().queues[0].status,
        QueueStatus::Warning
    );
}

#[tokio::test]
async fn restart_does_not_reraise_standing_alert() {
    let config = test_config("http://127.0.0.1:1");
    let store = memory_store().await;
    let first = ScriptedSource::new(vec![Ok(batch(vec![reading("1", 25)], vec![]))]);
    let mut poller = Poller::new(first, Arc::clone(&store), Arc::new(StatusBoard::new()), &config);
    poller.run_cycle().await;

    // A new poller seeded from the published snapshot sees the queue as already critical.
    let second = ScriptedSource::new(vec![Ok(batch(vec![reading("1", 26)], vec![]))]);
    let mut poller = Poller::new(second, Arc::clone(&store), Arc::new(StatusBoard::new()), &config);
    let outcome = poller.run_cycle().await;
    assert_eq!(
        outcome,
        CycleOutcome::Succeeded {
            cycle: 2,
            alerts_raised: 0
        }
    );
}

#[tokio::test]
async fn run_loop_follows_ticks_and_stops_on_cancel() {
    let config = test_config("http://127.0.0.1:1");
    let store = memory_store().await;
    let source = ScriptedSource::new(vec![
        Ok(batch(vec![reading("1", 5)], vec![])),
        Ok(batch(vec![reading("1", 6)], vec![])),
    ]);
    let status = Arc::new(StatusBoard::new());
    let poller = Poller::new(source, Arc::clone(&store), Arc::clone(&status), &config);
    let (tx, ticker) = ChannelTicker::new(4);
    let cancel = CancellationToken::new();
    let handle = spawn_poller(poller, ticker, cancel.clone());

    tx.send(()).await.unwrap();
    tx.send(()).await.unwrap();
    for _ in 0..100 {
        if status.current().stats.cycles_succeeded == 2 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(store.read_latest().unwrap().cycle, 2);

    cancel.cancel();
    tokio::time::timeout(Duration::from_secs(2), handle)
        .await
        .expect("poller stops on cancel")
        .unwrap();
}

#[tokio::test]
async fn run_loop_ends_when_halted() {
    let config = test_config("http://127.0.0.1:1");
    let store = memory_store().await;
    let source = ScriptedSource::new(vec![Err(AppError::Fatal("bad credentials".into()))]);
    let status = Arc::new(StatusBoard::new());
    let poller = Poller::new(source, store, Arc::clone(&status), &config);
    let (tx, ticker) = ChannelTicker::new(1);
    let handle = spawn_poller(poller, ticker, CancellationToken::new());

    tx.send(()).await.unwrap();
    tokio::time::timeout(Duration::from_secs(2), handle)
        .await
        .expect("poller exits after fatal error")
        .unwrap();
    assert_eq!(status.current().connection, ConnectionStatus::Disconnected);
}
