//! Monitoring endpoint handlers.
//!
//! # Responsibilities
//! - `GET /api/health`: resource snapshot + classification, optional deep
//!   dependency probe, 503 when critical
//! - `GET /api/metrics`: bearer-token-protected windowed metrics snapshot
//!
//! # Design Decisions
//! - Health returns 503 on critical so load balancers can pull the instance
//!   without parsing the body
//! - Deep-probe failures are informational: they flip the datastore field,
//!   never the HTTP status
//! - Both endpoints are pure readers over the observability state

use axum::{
    extract::{Query, State},
    http::{header, HeaderMap, StatusCode},
    response::Response,
};
use serde::Deserialize;
use serde_json::json;

use crate::error::GatewayError;
use crate::http::response::monitoring_json;
use crate::http::server::AppState;
use crate::observability::resource::{classify, ResourceSnapshot};
use crate::observability::HealthState;

#[derive(Debug, Deserialize, Default)]
pub struct HealthQuery {
    deep: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
pub struct MetricsQuery {
    window: Option<u64>,
}

fn accept_encoding(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::ACCEPT_ENCODING)
        .and_then(|v| v.to_str().ok())
}

/// Map a resource snapshot onto the health response. 503 only when the
/// host itself is critical; the datastore field never gates the status.
fn health_payload(snapshot: &ResourceSnapshot, datastore: &str) -> (StatusCode, serde_json::Value) {
    let report = classify(snapshot);
    let status = if report.status == HealthState::Critical {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::OK
    };

    let body = json!({
        "status": report.status,
        "uptime_sec": snapshot.process.uptime_secs,
        "metrics": {
            "cpu": snapshot.cpu,
            "memory": snapshot.memory,
            "process": snapshot.process,
        },
        "alerts": report.alerts,
        "datastore": datastore,
    });

    (status, body)
}

/// `GET /api/health[?deep=1]`
pub async fn health(
    State(state): State<AppState>,
    Query(query): Query<HealthQuery>,
    headers: HeaderMap,
) -> Response {
    let snapshot = state.monitor.sample();

    let datastore = if query.deep.as_deref() == Some("1") {
        match &state.probe {
            Some(probe) => match probe.ping().await {
                Ok(()) => "ok",
                Err(e) => {
                    tracing::warn!(error = %e, "Deep health probe failed");
                    "error"
                }
            },
            None => "skipped",
        }
    } else {
        "skipped"
    };

    let (status, body) = health_payload(&snapshot, datastore);

    monitoring_json(
        status,
        serde_json::to_vec(&body).unwrap_or_default(),
        accept_encoding(&headers),
        state.config.health.gzip_min_bytes,
    )
}

/// `GET /api/metrics?window=<seconds>`
pub async fn metrics(
    State(state): State<AppState>,
    Query(query): Query<MetricsQuery>,
    headers: HeaderMap,
) -> Result<Response, GatewayError> {
    let token = &state.config.observability.metrics_token;
    let authorized = !token.is_empty()
        && headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v == format!("Bearer {token}"));
    if !authorized {
        return Err(GatewayError::Unauthorized);
    }

    let window_secs = query
        .window
        .unwrap_or(state.config.observability.metrics_window_secs);
    let snapshot = state.metrics.snapshot(window_secs);

    Ok(monitoring_json(
        StatusCode::OK,
        serde_json::to_vec(&snapshot).unwrap_or_default(),
        accept_encoding(&headers),
        state.config.health.gzip_min_bytes,
    ))
}

/// Fallback for paths the gateway does not own: the CRUD surface lives in
/// the consuming backend.
pub async fn not_found() -> Response {
    monitoring_json(
        StatusCode::NOT_FOUND,
        serde_json::to_vec(&json!({
            "error": "not_found",
            "message": "no such route",
        }))
        .unwrap_or_default(),
        None,
        usize::MAX,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observability::resource::{CpuMetrics, MemoryMetrics, ProcessMetrics};

    fn snapshot_with_memory(utilization: f64) -> ResourceSnapshot {
        ResourceSnapshot {
            cpu: CpuMetrics {
                utilization: 0.1,
                load_avg: [0.1, 0.1, 0.1],
                cores: 4,
            },
            memory: MemoryMetrics {
                total_bytes: 1_000,
                used_bytes: (utilization * 1_000.0) as u64,
                free_bytes: 1_000 - (utilization * 1_000.0) as u64,
                utilization,
            },
            process: ProcessMetrics {
                rss_bytes: 100,
                virtual_bytes: 0,
                memory_fraction: 0.1,
                uptime_secs: 60,
            },
            pool_utilization: None,
        }
    }

    #[test]
    fn critical_memory_yields_503() {
        let (status, body) = health_payload(&snapshot_with_memory(0.95), "skipped");
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["status"], "critical");
    }

    #[test]
    fn warning_memory_stays_200() {
        let (status, body) = health_payload(&snapshot_with_memory(0.85), "skipped");
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "warning");
    }

    #[test]
    fn failed_datastore_check_never_gates_status() {
        let (status, body) = health_payload(&snapshot_with_memory(0.5), "error");
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["datastore"], "error");
    }
}
