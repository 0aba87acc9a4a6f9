//! Unit tests for `AlertRepo`.

use std::sync::Arc;

use chrono::{Duration, Utc};

use trio_monitor::models::alert::{Alert, AlertKind, AlertSeverity};
use trio_monitor::persistence::{alert_repo::AlertRepo, db};
use trio_monitor::AppError;

fn sample(queue: &str, age: Duration) -> Alert {
    Alert::new(
        AlertKind::QueueCritical,
        Some(queue.to_owned()),
        format!("{queue} critical"),
        AlertSeverity::Critical,
        Utc::now() - age,
    )
}

async fn repo() -> AlertRepo {
    AlertRepo::new(Arc::new(db::connect_memory().await.expect("db")))
}

#[tokio::test]
async fn insert_and_get_round_trip() {
    let repo = repo().await;
    let alert = sample("1", Duration::zero());
    repo.insert(&alert).await.expect("insert");

    let loaded = repo.get_by_id(&alert.id).await.expect("get").expect("exists");
    assert_eq!(loaded.id, alert.id);
    assert_eq!(loaded.kind, AlertKind::QueueCritical);
    assert_eq!(loaded.queue_id.as_deref(), Some("1"));
    assert_eq!(loaded.severity, AlertSeverity::Critical);
    assert_eq!(
        loaded.created_at.timestamp_micros(),
        alert.created_at.timestamp_micros()
    );
    assert!(!loaded.acknowledged);
}

#[tokio::test]
async fn list_active_is_newest_first_and_excludes_acknowledged() {
    let repo = repo().await;
    let old = sample("old", Duration::minutes(10));
    let new = sample("new", Duration::minutes(1));
    let acked = sample("acked", Duration::minutes(5));
    for a in [&old, &new, &acked] {
        repo.insert(a).await.expect("insert");
    }
    repo.acknowledge(&acked.id, Utc::now()).await.expect("ack");

    let active = repo.list_active().await.expect("list");
    let ids: Vec<_> = active.iter().map(|a| a.queue_id.as_deref().unwrap()).collect();
    assert_eq!(ids, vec!["new", "old"]);
    assert_eq!(repo.count_active().await.expect("count"), 2);
}

#[tokio::test]
async fn acknowledge_unknown_id_is_not_found() {
    let repo = repo().await;
    let err = repo.acknowledge("missing", Utc::now()).await.expect_err("unknown");
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn acknowledge_twice_is_idempotent() {
    let repo = repo().await;
    let alert = sample("1", Duration::zero());
    repo.insert(&alert).await.expect("insert");

    let first_at = Utc::now();
    let first = repo.acknowledge(&alert.id, first_at).await.expect("first ack");
    assert!(!first.already_acknowledged);
    assert!(first.alert.acknowledged);

    let second = repo
        .acknowledge(&alert.id, first_at + Duration::minutes(3))
        .await
        .expect("second ack");
    assert!(second.already_acknowledged);
    assert_eq!(second.alert.acknowledged_at, first.alert.acknowledged_at);
    assert_eq!(
        second.alert.acknowledged_at.map(|t| t.timestamp_micros()),
        Some(first_at.timestamp_micros())
    );
}

#[tokio::test]
async fn purge_drops_old_acknowledged_and_expired_alerts() {
    let repo = repo().await;
    let now = Utc::now();

    let stale_ack = sample("stale-ack", Duration::days(10));
    let fresh_ack = sample("fresh-ack", Duration::days(1));
    let ancient = sample("ancient", Duration::days(40));
    let open = sample("open", Duration::days(10));
    for a in [&stale_ack, &fresh_ack, &ancient, &open] {
        repo.insert(a).await.expect("insert");
    }
    repo.acknowledge(&stale_ack.id, now - Duration::days(8)).await.expect("ack");
    repo.acknowledge(&fresh_ack.id, now - Duration::days(1)).await.expect("ack");

    let removed = repo
        .purge(now - Duration::days(7), now - Duration::days(30))
        .await
        .expect("purge");
    assert_eq!(removed, 2);
    assert!(repo.get_by_id(&stale_ack.id).await.unwrap().is_none());
    assert!(repo.get_by_id(&ancient.id).await.unwrap().is_none());
    assert!(repo.get_by_id(&fresh_ack.id).await.unwrap().is_some());
    assert!(repo.get_by_id(&open.id).await.unwrap().is_some());
}

#[tokio::test]
async fn cap_keeps_most_recent() {
    let repo = repo().await;
    for minutes in 0..5 {
        repo.insert(&sample(&format!("q{minutes}"), Duration::minutes(minutes)))
            .await
            .expect("insert");
    }
    let removed = repo.enforce_cap(2).await.expect("cap");
    assert_eq!(removed, 3);

    let kept: Vec<_> = repo
        .list_active()
        .await
        .expect("list")
        .into_iter()
        .map(|a| a.queue_id.unwrap())
        .collect();
    assert_eq!(kept, vec!["q0", "q1"]);
}

#[tokio::test]
async fn every_alert_kind_round_trips() {
    let repo = repo().await;
    for kind in [
        AlertKind::QueueCritical,
        AlertKind::QueueWarning,
        AlertKind::DailyLimit,
        AlertKind::ServiceLevel,
    ] {
        let alert = Alert::new(kind, None, kind.as_str().to_owned(), AlertSeverity::Warning, Utc::now());
        repo.insert(&alert).await.expect("insert");
        let loaded = repo.get_by_id(&alert.id).await.expect("get").expect("exists");
        assert_eq!(loaded.kind, kind);
    }
}
