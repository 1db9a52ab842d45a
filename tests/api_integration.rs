//! HTTP API Integration Tests
//!
//! Runs the real router on a random port and scrapes it over TCP.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::Value;
use smokeping_exporter::server::{AppState, create_router};
use smokeping_exporter::{BucketSet, MetricsRecorder, TargetRegistry};
use tokio::net::TcpListener;
use tower::ServiceExt;

// =============================================================================
// Test Helpers
// =============================================================================

/// Create app state for two targets with some recorded traffic.
fn create_test_state(telemetry_path: &str) -> AppState {
    let buckets = BucketSet::parse("0.001,0.01,0.1").expect("valid buckets");
    let recorder = Arc::new(MetricsRecorder::new(&buckets).expect("recorder"));
    let registry = TargetRegistry::new(["10.0.0.1", "10.0.0.2"]);

    let reachable = recorder.series("10.0.0.1");
    for rtt in [0.004, 0.008, 0.05] {
        reachable.record_attempt();
        reachable.record_success(rtt);
    }
    reachable.set_active(true);

    let silent = recorder.series("10.0.0.2");
    silent.record_attempt();
    silent.record_attempt();
    silent.set_active(true);

    AppState {
        recorder,
        registry,
        telemetry_path: telemetry_path.to_string(),
    }
}

/// Start test server and return base URL.
async fn start_test_server(telemetry_path: &str) -> String {
    let router = create_router(create_test_state(telemetry_path));

    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind random port");
    let addr = listener.local_addr().expect("Failed to get local addr");

    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    // Give server time to start
    tokio::time::sleep(Duration::from_millis(50)).await;

    format!("http://{}", addr)
}

// =============================================================================
// Scrape Endpoint
// =============================================================================

#[tokio::test]
async fn test_scrape_exposes_counters_and_histogram() {
    let base_url = start_test_server("/metrics").await;

    let resp = reqwest::get(format!("{}/metrics", base_url))
        .await
        .expect("Failed to scrape");
    assert_eq!(resp.status(), 200);
    let content_type = resp
        .headers()
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    assert!(content_type.starts_with("text/plain"));

    let body = resp.text().await.expect("body");
    assert!(body.contains("probes_sent_total{host=\"10.0.0.1\"} 3"));
    assert!(body.contains("probes_received_total{host=\"10.0.0.1\"} 3"));
    assert!(body.contains("probes_sent_total{host=\"10.0.0.2\"} 2"));
    assert!(body.contains("probes_received_total{host=\"10.0.0.2\"} 0"));
    assert!(body.contains("probe_rtt_seconds_count{host=\"10.0.0.1\"} 3"));
    assert!(body.contains("probe_target_active{host=\"10.0.0.1\"} 1"));
}

#[tokio::test]
async fn test_scrape_uses_configured_buckets() {
    let base_url = start_test_server("/metrics").await;
    let body = reqwest::get(format!("{}/metrics", base_url))
        .await
        .expect("Failed to scrape")
        .text()
        .await
        .expect("body");

    let bucket_lines: Vec<&str> = body
        .lines()
        .filter(|l| l.starts_with("probe_rtt_seconds_bucket{host=\"10.0.0.1\""))
        .collect();
    assert_eq!(bucket_lines.len(), 4, "{bucket_lines:#?}");
    assert!(bucket_lines.iter().any(|l| l.contains("le=\"0.001\"")));
    assert!(bucket_lines.iter().any(|l| l.contains("le=\"0.01\"} 2")));
    assert!(bucket_lines.iter().any(|l| l.contains("le=\"0.1\"} 3")));
    assert!(bucket_lines.iter().any(|l| l.contains("le=\"+Inf\"} 3")));
}

#[tokio::test]
async fn test_custom_telemetry_path() {
    let base_url = start_test_server("/probe-metrics").await;

    let resp = reqwest::get(format!("{}/probe-metrics", base_url))
        .await
        .expect("request");
    assert_eq!(resp.status(), 200);

    let resp = reqwest::get(format!("{}/metrics", base_url))
        .await
        .expect("request");
    assert_eq!(resp.status(), 404);
}

// =============================================================================
// Landing Page and Health
// =============================================================================

#[tokio::test]
async fn test_landing_page() {
    let base_url = start_test_server("/probe-metrics").await;

    let resp = reqwest::get(format!("{}/", base_url)).await.expect("request");
    assert_eq!(resp.status(), 200);
    let body = resp.text().await.expect("body");
    assert!(body.contains("<title>Smokeping Exporter</title>"));
    assert!(body.contains("href=\"/probe-metrics\""));
}

#[tokio::test]
async fn test_healthz() {
    let base_url = start_test_server("/metrics").await;

    let resp = reqwest::get(format!("{}/healthz", base_url))
        .await
        .expect("Failed to send healthz request");
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.expect("Failed to parse healthz response");
    assert_eq!(body["status"], "ok");
}

// =============================================================================
// Target Status API
// =============================================================================

#[tokio::test]
async fn test_targets_listing() {
    let base_url = start_test_server("/metrics").await;

    let body: Value = reqwest::get(format!("{}/api/targets", base_url))
        .await
        .expect("request")
        .json()
        .await
        .expect("json");

    let targets = body["targets"].as_array().expect("targets array");
    assert_eq!(targets.len(), 2);
    assert_eq!(targets[0]["host"], "10.0.0.1");
    assert_eq!(targets[1]["host"], "10.0.0.2");
    assert_eq!(targets[0]["active"], true);
    assert!(targets[0]["seconds_since_last_attempt"].as_f64().is_some());
    assert!(targets[0]["resolved_address"].is_null());
}

#[tokio::test]
async fn test_unknown_route_is_404() {
    let app = create_router(create_test_state("/metrics"));

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/unknown")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    assert!(bytes.is_empty());
}
