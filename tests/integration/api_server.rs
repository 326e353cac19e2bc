//! Integration tests for the control surface
//!
//! Tests health, configuration, manual scans, detector lifecycle and metrics.


use serde_json::{json, Value};

use crate::test_utils::liquid_ticker;
use test_utils::TestApiServer;

#[tokio::test]
async fn health_endpoint_reports_healthy_status() {
    let app = TestApiServer::new().await;
    let response = app.server.get("/scanner-api/health").await;
    assert_eq!(response.status_code(), 200);

    let body: Value = response.json();
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["service"], "crypto-scanner");
    assert!(body["uptime_seconds"].as_u64().is_some());
    assert_eq!(body["telegram_configured"], true);
    assert_eq!(body["scanners"]["ema_touch"], true);
    assert_eq!(body["scanners"]["daily_flip"], true);
    assert_eq!(body["scanners"]["volume_spike"], true);
}

#[tokio::test]
async fn get_config_returns_current_configuration() {
    let app = TestApiServer::new().await;
    let response = app.server.get("/scanner-api/config").await;
    assert_eq!(response.status_code(), 200);

    let body: Value = response.json();
    assert_eq!(body["ema_touch"]["touch_threshold_pct"], 0.2);
    assert_eq!(body["ema_touch"]["periods"], json!([5, 10, 60, 223]));
    assert_eq!(body["daily_flip"]["reference"]["type"], "price_vs_ema");
}

#[tokio::test]
async fn partial_config_update_merges_and_applies() {
    let app = TestApiServer::new().await;
    let response = app
        .server
        .put("/scanner-api/config")
        .json(&json!({
            "ema_touch": { "touch_threshold_pct": 0.5 },
            "volume": { "enabled": false }
        }))
        .await;
    assert_eq!(response.status_code(), 200);

    let body: Value = response.json();
    assert_eq!(body["ema_touch"]["touch_threshold_pct"], 0.5);
    assert_eq!(body["ema_touch"]["interval_minutes"], 30);

    let stored = app.manager.config().get_config().await;
    assert_eq!(stored.ema_touch.touch_threshold_pct, 0.5);
    assert!(!stored.volume.enabled);
    assert!(stored.daily_flip.enabled);
}

#[tokio::test]
async fn post_config_is_accepted_too() {
    let app = TestApiServer::new().await;
    let response = app
        .server
        .post("/scanner-api/config")
        .json(&json!({ "general": { "max_symbols": 20 } }))
        .await;
    assert_eq!(response.status_code(), 200);
    assert_eq!(app.manager.config().get_config().await.general.max_symbols, 20);
}

#[tokio::test]
async fn invalid_config_update_is_rejected() {
    let app = TestApiServer::new().await;
    let response = app
        .server
        .put("/scanner-api/config")
        .json(&json!({ "ema_touch": { "touch_threshold_pct": -1.0 } }))
        .expect_failure()
        .await;
    assert_eq!(response.status_code(), 400);
    let body: Value = response.json();
    assert!(body["error"].as_str().unwrap().contains("touch_threshold_pct"));

    let stored = app.manager.config().get_config().await;
    assert_eq!(stored.ema_touch.touch_threshold_pct, 0.2);
}

#[tokio::test]
async fn mistyped_config_update_is_rejected() {
    let app = TestApiServer::new().await;
    let response = app
        .server
        .put("/scanner-api/config")
        .json(&json!({ "general": { "max_symbols": "many" } }))
        .expect_failure()
        .await;
    assert_eq!(response.status_code(), 400);
}

#[tokio::test]
async fn manual_scan_runs_detector() {
    let app = TestApiServer::new().await;
    app.context.market.set_ticker(liquid_ticker("PUMPUSDT", 25.0));

    let response = app.server.post("/scanner-api/scan/volume").await;
    assert_eq!(response.status_code(), 200);

    let body: Value = response.json();
    assert_eq!(body["scanner"], "volume_spike");
    assert_eq!(body["report"]["alerts_dispatched"], 1);
    assert_eq!(body["report"]["alerts"][0]["symbol"], "PUMPUSDT");
    assert_eq!(app.context.notifier.sent().len(), 1);
}

#[tokio::test]
async fn manual_scan_unknown_name_is_not_found() {
    let app = TestApiServer::new().await;
    let response = app
        .server
        .post("/scanner-api/scan/rsi")
        .expect_failure()
        .await;
    assert_eq!(response.status_code(), 404);
}

#[tokio::test]
async fn manual_scan_reports_market_outage() {
    let app = TestApiServer::new().await;
    app.context.market.set_universe_down(true);

    let response = app
        .server
        .post("/scanner-api/scan/ema")
        .expect_failure()
        .await;
    assert_eq!(response.status_code(), 502);
}

#[tokio::test]
async fn scanners_endpoint_lists_status() {
    let app = TestApiServer::new().await;
    let response = app.server.get("/scanner-api/scanners").await;
    assert_eq!(response.status_code(), 200);

    let body: Value = response.json();
    let scanners = body.as_array().unwrap();
    assert_eq!(scanners.len(), 3);
    assert_eq!(scanners[0]["name"], "ema_touch");
    assert_eq!(scanners[0]["running"], false);
    assert_eq!(scanners[0]["cycles"], 0);
}

#[tokio::test]
async fn start_and_stop_detector() {
    let mut config = crypto_scanner::config::ScannerConfiguration::default();
    config.daily_flip.enabled = false;
    let app = TestApiServer::with_config(config).await;

    let response = app.server.post("/scanner-api/scanners/flip/start").await;
    assert_eq!(response.status_code(), 200);
    let body: Value = response.json();
    assert_eq!(body["changed"], true);
    assert_eq!(body["status"]["running"], true);

    let response = app.server.post("/scanner-api/scanners/daily_flip/stop").await;
    assert_eq!(response.status_code(), 200);
    let body: Value = response.json();
    assert_eq!(body["changed"], true);
    assert_eq!(body["status"]["running"], false);

    let response = app.server.post("/scanner-api/scanners/daily_flip/stop").await;
    let body: Value = response.json();
    assert_eq!(body["changed"], false);
}

#[tokio::test]
async fn metrics_endpoint_exposes_prometheus_metrics() {
    let app = TestApiServer::new().await;
    app.context.market.set_ticker(liquid_ticker("PUMPUSDT", 25.0));
    let _ = app.server.post("/scanner-api/scan/volume_spike").await;

    let response = app.server.get("/metrics").await;
    assert_eq!(response.status_code(), 200);

    let body = response.text();
    assert!(body.contains("http_requests_total"), "Expected http_requests_total metric");
    assert!(body.contains("http_request_duration_seconds"));
    assert!(body.contains("scanner_cycles_total"));
}

#[tokio::test]
async fn metrics_endpoint_tracks_request_count() {
    let app = TestApiServer::new().await;
    for _ in 0..3 {
        let _ = app.server.get("/scanner-api/health").await;
    }

    let _ = app.server.get("/metrics").await;
    assert!(app.metrics.http_requests_total.get() >= 3);
}
