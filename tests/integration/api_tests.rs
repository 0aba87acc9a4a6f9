//! REST surface over a real listener.

use std::sync::Arc;

use chrono::{Duration, Utc};
use reqwest::StatusCode;
use serde_json::Value;

use trio_monitor::models::alert::{Alert, AlertKind, AlertSeverity};
use trio_monitor::models::queue::{QueueMetric, QueueStatus};
use trio_monitor::poller::state::{ConnectionStatus, PollPhase};
use trio_monitor::poller::status::{PollerReport, StatusBoard};

use super::test_helpers::{draft, memory_store, reading, spawn_api, RunningApi};

async fn empty_api() -> RunningApi {
    spawn_api(memory_store().await, Arc::new(StatusBoard::new())).await
}

async fn connected_api_with_data() -> RunningApi {
    let store = memory_store().await;
    let now = Utc::now();
    store
        .write_snapshot(draft("1", 10, QueueStatus::Good, now - Duration::minutes(2)), &[])
        .await
        .unwrap();
    store
        .write_snapshot(draft("1", 25, QueueStatus::Critical, now), &[])
        .await
        .unwrap();
    let status = Arc::new(StatusBoard::new());
    status.publish(PollerReport {
        connection: ConnectionStatus::Connected,
        phase: PollPhase::Idle,
        ..PollerReport::default()
    });
    spawn_api(store, status).await
}

async fn get(api: &RunningApi, path: &str) -> (StatusCode, Value) {
    let response = reqwest::get(format!("{}{path}", api.base)).await.unwrap();
    let status = response.status();
    (status, response.json().await.unwrap())
}

async fn post(api: &RunningApi, path: &str) -> (StatusCode, Value) {
    let response = reqwest::Client::new()
        .post(format!("{}{path}", api.base))
        .send()
        .await
        .unwrap();
    let status = response.status();
    (status, response.json().await.unwrap())
}

#[tokio::test]
async fn root_banner() {
    let api = empty_api().await;
    let (status, body) = get(&api, "/").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Trio Monitor API");
    assert_eq!(body["status"], "operational");
}

#[tokio::test]
async fn health_before_first_cycle() {
    let api = empty_api().await;
    let (status, body) = get(&api, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "degraded");
    assert_eq!(body["connection_status"], "connecting");
    assert_eq!(body["poller_running"], true);
    assert!(body["timestamp"].is_null());
}

#[tokio::test]
async fn health_when_connected() {
    let api = connected_api_with_data().await;
    let (_, body) = get(&api, "/health").await;
    assert_eq!(body["status"], "healthy");
    assert!(body["timestamp"].is_string());
}

#[tokio::test]
async fn health_reports_unreachable_database() {
    let api = connected_api_with_data().await;
    api.state.store.db().close().await;
    let (status, body) = get(&api, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "unhealthy");
    assert_eq!(body["database"], "unreachable");
    assert_eq!(body["connection_status"], "connected");
}

#[tokio::test]
async fn health_reports_reachable_database() {
    let api = empty_api().await;
    let (_, body) = get(&api, "/health").await;
    assert_eq!(body["database"], "ok");
}

#[tokio::test]
async fn endpoints_before_first_snapshot() {
    let api = empty_api().await;

    let (status, body) = get(&api, "/api/dashboard").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["error"], "no data available yet");

    let (status, _) = get(&api, "/api/service-level").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

    for path in ["/api/agents", "/api/queues", "/api/alerts"] {
        let (status, body) = get(&api, path).await;
        assert_eq!(status, StatusCode::OK, "{path}");
        assert_eq!(body, Value::Array(vec![]), "{path}");
    }

    let (status, body) = get(&api, "/api/stats").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["agents"]["total"], 0);
    assert!(body["service_level"].is_null());
    assert_eq!(body["system"]["stale"], true);
}

#[tokio::test]
async fn dashboard_serves_latest_snapshot() {
    let api = connected_api_with_data().await;
    let (status, body) = get(&api, "/api/dashboard").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["cycle"], 2);
    assert_eq!(body["queues"][0]["status"], "critical");
    assert_eq!(body["queues"][0]["current_wait_time"], 25);
    assert_eq!(body["connection_status"], "connected");
    assert_eq!(body["stale"], false);
    assert!(body["last_updated"].is_string());
    assert_eq!(body["service_level"]["percentage"], 80.0);
}

#[tokio::test]
async fn stats_aggregate_snapshot() {
    let api = connected_api_with_data().await;
    let (_, body) = get(&api, "/api/stats").await;
    assert_eq!(body["agents"]["total"], 1);
    assert_eq!(body["agents"]["available"], 1);
    assert_eq!(body["queues"]["critical_count"], 1);
    assert_eq!(body["queues"]["max_wait_time"], 25);
    assert_eq!(body["system"]["alerts_count"], 0);
}

#[tokio::test]
async fn stats_count_queues_by_status() {
    let store = memory_store().await;
    let now = Utc::now();
    let mut snapshot = draft("1", 25, QueueStatus::Critical, now);
    snapshot.queues.extend([
        QueueMetric::labeled(&reading("2", 17), QueueStatus::Warning, now),
        QueueMetric::labeled(&reading("3", 16), QueueStatus::Warning, now),
        QueueMetric::labeled(&reading("4", 4), QueueStatus::Good, now),
    ]);
    store.write_snapshot(snapshot, &[]).await.unwrap();
    let api = spawn_api(store, Arc::new(StatusBoard::new())).await;

    let (_, body) = get(&api, "/api/stats").await;
    assert_eq!(body["queues"]["total"], 4);
    assert_eq!(body["queues"]["critical_count"], 1);
    assert_eq!(body["queues"]["warning_count"], 2);
}

#[tokio::test]
async fn historical_points_oldest_first() {
    let api = connected_api_with_data().await;
    let (status, body) = get(&api, "/api/historical/1").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["hours"], 24);
    let waits: Vec<_> = body["points"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["wait_time"].as_u64().unwrap())
        .collect();
    assert_eq!(waits, vec![10, 25]);

    let (_, body) = get(&api, "/api/historical/unknown?hours=1").await;
    assert_eq!(body["points"], Value::Array(vec![]));
}

#[tokio::test]
async fn historical_summary() {
    let api = connected_api_with_data().await;
    let (status, body) = get(&api, "/api/historical/1/summary?hours=2").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data_points"], 2);
    assert_eq!(body["max_wait_time"], 25);
    assert_eq!(body["min_wait_time"], 10);
    assert_eq!(body["critical_count"], 1);
}

#[tokio::test]
async fn hours_out_of_range_is_bad_request() {
    let api = empty_api().await;
    for query in ["hours=0", "hours=721", "hours=abc", "hours=-3"] {
        let (status, body) = get(&api, &format!("/api/historical/1?{query}")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{query}");
        assert!(body["error"].as_str().unwrap().contains("hours"), "{query}");
    }
    let (status, _) = get(&api, "/api/historical/1/summary?hours=9999").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn malformed_query_string_is_json_bad_request() {
    let api = empty_api().await;
    for path in [
        "/api/historical/1?hours=1&hours=2",
        "/api/historical/1/summary?hours=3&hours=4",
    ] {
        let response = reqwest::get(format!("{}{path}", api.base)).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{path}");
        let content_type = response.headers()[reqwest::header::CONTENT_TYPE].to_str().unwrap().to_owned();
        assert!(content_type.starts_with("application/json"), "{path}: {content_type}");
        let body: Value = response.json().await.unwrap();
        assert!(body["error"].as_str().is_some_and(|e| !e.is_empty()), "{path}");
    }
}

#[tokio::test]
async fn acknowledge_flow() {
    let api = connected_api_with_data().await;
    let alert = Alert::new(
        AlertKind::QueueCritical,
        Some("1".into()),
        "queue 1 critical".into(),
        AlertSeverity::Critical,
        Utc::now(),
    );
    api.state.store.alerts().insert(&alert).await.unwrap();

    let (_, listed) = get(&api, "/api/alerts").await;
    assert_eq!(listed.as_array().unwrap().len(), 1);

    let path = format!("/api/alerts/{}/acknowledge", alert.id);
    let (status, first) = post(&api, &path).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["message"], "Alert acknowledged");
    assert_eq!(first["already_acknowledged"], false);
    assert_eq!(first["alert"]["acknowledged"], true);

    let (status, second) = post(&api, &path).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(second["already_acknowledged"], true);
    assert_eq!(second["alert"]["acknowledged_at"], first["alert"]["acknowledged_at"]);

    let (_, listed) = get(&api, "/api/alerts").await;
    assert_eq!(listed, Value::Array(vec![]));
}

#[tokio::test]
async fn acknowledge_unknown_alert_is_not_found() {
    let api = empty_api().await;
    let (status, body) = post(&api, "/api/alerts/does-not-exist/acknowledge").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].as_str().unwrap().contains("does-not-exist"));
}

#[tokio::test]
async fn cors_allows_dashboard_origin() {
    let api = empty_api().await;
    let response = reqwest::Client::new()
        .get(format!("{}/api/agents", api.base))
        .header("Origin", "http://localhost:3000")
        .send()
        .await
        .unwrap();
    assert_eq!(
        response
            .headers()
            .get("access-control-allow-origin")
            .and_then(|v| v.to_str().ok()),
        Some("http://localhost:3000")
    );

    let response = reqwest::Client::new()
        .get(format!("{}/api/agents", api.base))
        .header("Origin", "http://evil.example")
        .send()
        .await
        .unwrap();
    assert!(response.headers().get("access-control-allow-origin").is_none());
}
