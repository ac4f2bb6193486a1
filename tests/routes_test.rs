//! Tests for the read-only query API.
//!
//! Run with: cargo test --test routes_test

mod common;

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode},
};
use chrono::Utc;
use serde_json::Value;
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

use common::{RecordingNotifier, normal, reading, temp_sink, temp_store};
use sensor_fleet::common::AppState;
use sensor_fleet::config::Config;
use sensor_fleet::pipeline::{Analyzer, bounded};
use sensor_fleet::routes::build_router;

async fn seeded_state(dir: &TempDir) -> AppState {
    let store = temp_store(dir).await;
    let sink = temp_sink(dir, Arc::new(RecordingNotifier::default())).await;
    let mut analyzer = Analyzer::new(store.clone(), sink);

    analyzer.process(normal("DEV002", 1)).await;
    analyzer.process(reading("DEV001", 1, 75.0, 8.0, 220.0)).await;
    analyzer.process(reading("DEV001", 2, 90.0, 1.0, 220.0)).await;
    analyzer.process(normal("DEV002", 2)).await;

    let config = Config::from_lookup(|_| None).unwrap();
    AppState::new(store, config)
}

async fn seeded_app(dir: &TempDir) -> Router {
    build_router(seeded_state(dir).await)
}

async fn get(app: &Router, uri: &str) -> (StatusCode, Value) {
    let response = app
        .clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

#[tokio::test]
async fn healthz_is_ok() {
    let dir = TempDir::new().unwrap();
    let app = seeded_app(&dir).await;
    let (status, _) = get(&app, "/healthz").await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn stats_endpoints_report_counts() {
    let dir = TempDir::new().unwrap();
    let app = seeded_app(&dir).await;

    let (status, body) = get(&app, "/api/stats").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 4);
    assert_eq!(body["warning"], 1);
    assert_eq!(body["critical"], 1);

    let (_, fleet) = get(&app, "/api/stats/fleet").await;
    assert_eq!(fleet["total_readings"], 4);
    assert_eq!(fleet["active_devices"], 2);
    assert_eq!(fleet["alerts"], 2);
    assert_eq!(fleet["configured_devices"], 3);
    assert_eq!(fleet["channel_capacity"], 1000);
    assert!(fleet["queue"].is_null());
}

#[tokio::test]
async fn fleet_stats_report_live_queue_depth() {
    let dir = TempDir::new().unwrap();
    let (tx, _rx) = bounded(4);
    let app = build_router(seeded_state(&dir).await.with_queue(tx.gauge()));

    tx.send(normal("DEV001", 3)).await.unwrap();
    tx.send(normal("DEV001", 4)).await.unwrap();

    let (status, fleet) = get(&app, "/api/stats/fleet").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fleet["queue"]["queued"], 2);
    assert_eq!(fleet["queue"]["capacity"], 4);

    // The gauge does not keep the channel alive
    drop(tx);
    let (_, fleet) = get(&app, "/api/stats/fleet").await;
    assert_eq!(fleet["queue"]["queued"], 0);
}

#[tokio::test]
async fn latest_readings_are_ordered_by_device() {
    let dir = TempDir::new().unwrap();
    let app = seeded_app(&dir).await;

    let (status, body) = get(&app, "/api/devices/latest").await;
    assert_eq!(status, StatusCode::OK);
    let latest = body.as_array().unwrap();
    assert_eq!(latest.len(), 2);
    assert_eq!(latest[0]["device_id"], "DEV001");
    assert_eq!(latest[0]["sequence_number"], 2);
    assert_eq!(latest[0]["status"], "Critical");
    assert_eq!(latest[0]["alert_type"], "High Temperature");
    assert_eq!(latest[1]["device_id"], "DEV002");
}

#[tokio::test]
async fn device_health_endpoints() {
    let dir = TempDir::new().unwrap();
    let app = seeded_app(&dir).await;

    let (_, all) = get(&app, "/api/devices/health").await;
    assert_eq!(all.as_array().unwrap().len(), 2);

    let (status, one) = get(&app, "/api/devices/DEV001/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(one["packets_received"], 2);
    assert_eq!(one["error_count"], 1);

    let (status, body) = get(&app, "/api/devices/NOPE/health").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].as_str().unwrap().contains("NOPE"));
}

#[tokio::test]
async fn device_readings_newest_first_with_limit() {
    let dir = TempDir::new().unwrap();
    let app = seeded_app(&dir).await;

    let (status, body) = get(&app, "/api/devices/DEV001/readings?limit=1").await;
    assert_eq!(status, StatusCode::OK);
    let rows = body.as_array().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["sequence_number"], 2);

    let (status, _) = get(&app, "/api/devices/DEV001/readings?limit=0").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn daily_report_for_today_and_bad_dates() {
    let dir = TempDir::new().unwrap();
    let app = seeded_app(&dir).await;

    let today = Utc::now().date_naive().format("%Y-%m-%d").to_string();
    let (status, body) = get(&app, &format!("/api/reports/daily?date={today}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["date"], today);
    assert_eq!(body["total"], 4);
    assert_eq!(body["critical"], 1);
    assert_eq!(body["warning"], 1);

    let (status, _) = get(&app, "/api/reports/daily?date=2026-13-40").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = get(&app, "/api/reports/daily?date=1999-01-01").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 0);
    assert!(body["avg_temperature"].is_null());
}
