//! Web server module.
//!
//! Serves the scrape endpoint, a static landing page, and a small JSON API
//! describing each target's probe loop.

use axum::{
    Json, Router,
    extract::State,
    http::{StatusCode, header},
    response::{Html, IntoResponse, Response},
    routing::get,
};
use serde::Serialize;
use std::sync::Arc;
use tokio::time::Instant;
use tower_http::trace::{DefaultMakeSpan, TraceLayer};

use crate::metrics::MetricsRecorder;
use crate::probe::{TargetRegistry, TargetStatus};

/// Content type of the text exposition format.
const EXPOSITION_CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub recorder: Arc<MetricsRecorder>,
    pub registry: TargetRegistry,
    pub telemetry_path: String,
}

/// Health check response.
#[derive(Serialize)]
struct HealthResponse {
    status: String,
}

/// Targets API response.
#[derive(Serialize)]
struct TargetsResponse {
    targets: Vec<TargetStatus>,
}

/// Create the Axum router with all routes.
pub fn create_router(state: AppState) -> Router {
    let telemetry_path = state.telemetry_path.clone();
    let app_state = Arc::new(state);

    Router::new()
        .route("/", get(landing_handler))
        .route(&telemetry_path, get(metrics_handler))
        .route("/healthz", get(healthz_handler))
        .route("/api/targets", get(targets_handler))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::default().include_headers(true)),
        )
        .with_state(app_state)
}

fn landing_page(telemetry_path: &str) -> String {
    format!(
        r#"<html>
<head><title>Smokeping Exporter</title></head>
<body>
<h1>Smokeping Exporter</h1>
<p><a href="{path}">Metrics</a></p>
</body>
</html>
"#,
        path = telemetry_path
    )
}

/// Static landing page linking to the metrics path.
async fn landing_handler(State(state): State<Arc<AppState>>) -> Html<String> {
    Html(landing_page(&state.telemetry_path))
}

/// Scrape endpoint.
async fn metrics_handler(State(state): State<Arc<AppState>>) -> Response {
    match state.recorder.encode() {
        Ok(body) => ([(header::CONTENT_TYPE, EXPOSITION_CONTENT_TYPE)], body).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Metrics encoding failed");
            (StatusCode::INTERNAL_SERVER_ERROR, format!("Error: {}", e)).into_response()
        }
    }
}

/// Liveness probe.
async fn healthz_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

/// Per-target loop status.
async fn targets_handler(State(state): State<Arc<AppState>>) -> Json<TargetsResponse> {
    Json(TargetsResponse {
        targets: state.registry.statuses(Instant::now()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BucketSet;
    use axum::body::{Body, to_bytes};
    use axum::http::Request;
    use tower::ServiceExt;

    fn create_test_state(telemetry_path: &str) -> AppState {
        let buckets = BucketSet::parse("0.001,0.01,0.1").unwrap();
        let recorder = Arc::new(MetricsRecorder::new(&buckets).unwrap());
        let registry = TargetRegistry::new(["10.0.0.1"]);
        recorder.series("10.0.0.1");

        AppState {
            recorder,
            registry,
            telemetry_path: telemetry_path.to_string(),
        }
    }

    async fn get_body(app: Router, uri: &str) -> (StatusCode, String) {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8_lossy(&bytes).into_owned())
    }

    #[tokio::test]
    async fn test_metrics_endpoint() {
        let state = create_test_state("/metrics");
        state.recorder.record_attempt("10.0.0.1");
        let app = create_router(state);

        let (status, body) = get_body(app, "/metrics").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("probes_sent_total{host=\"10.0.0.1\"} 1"));
        assert!(body.contains("probe_rtt_seconds_bucket"));
    }

    #[tokio::test]
    async fn test_custom_telemetry_path() {
        let app = create_router(create_test_state("/probe-metrics"));

        let (status, _) = get_body(app.clone(), "/probe-metrics").await;
        assert_eq!(status, StatusCode::OK);

        let (status, _) = get_body(app, "/metrics").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_landing_page_links_metrics() {
        let app = create_router(create_test_state("/probe-metrics"));

        let (status, body) = get_body(app, "/").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("<a href=\"/probe-metrics\">Metrics</a>"));
    }

    #[tokio::test]
    async fn test_targets_endpoint() {
        let app = create_router(create_test_state("/metrics"));

        let (status, body) = get_body(app, "/api/targets").await;
        assert_eq!(status, StatusCode::OK);
        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["targets"][0]["host"], "10.0.0.1");
        assert_eq!(json["targets"][0]["active"], true);
    }

    #[tokio::test]
    async fn test_reserved_paths_are_routed() {
        let app = create_router(create_test_state("/metrics"));

        for path in crate::config::RESERVED_PATHS {
            let (status, _) = get_body(app.clone(), path).await;
            assert_eq!(status, StatusCode::OK, "{path}");
        }
    }
}
