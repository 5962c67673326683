//! HTTP request handlers for the dashboard API.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use chrono::{DateTime, Utc};
use pulse_core::{MonitorConfig, Snapshot, SnapshotBuilder};
use serde::Serialize;
use tracing::{error, info};

use crate::error::{DashboardError, DashboardResult};
use crate::state::DashboardState;

/// Name reported by the root endpoint.
pub const API_NAME: &str = "GCP/GKE Monitoring Dashboard API";

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Always `healthy` while the process serves requests.
    pub status: String,
    /// Time the check was answered.
    pub timestamp: DateTime<Utc>,
    /// Seconds since the server started.
    pub uptime_secs: u64,
    /// Snapshot cycles served since the server started.
    pub cycles: u64,
}

/// Endpoint directory returned by the root handler.
#[derive(Debug, Serialize)]
pub struct EndpointIndex {
    /// Snapshot endpoint.
    pub metrics: String,
    /// Liveness endpoint.
    pub health: String,
}

/// Root response.
#[derive(Debug, Serialize)]
pub struct RootResponse {
    /// API name.
    pub message: String,
    /// Crate version.
    pub version: String,
    /// Available endpoints.
    pub endpoints: EndpointIndex,
}

/// Handle GET / - API directory.
pub async fn root() -> Json<RootResponse> {
    Json(RootResponse {
        message: API_NAME.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        endpoints: EndpointIndex {
            metrics: "/api/metrics".to_string(),
            health: "/api/health".to_string(),
        },
    })
}

/// Handle GET /api/health - liveness check.
pub async fn health_check(State(state): State<Arc<DashboardState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        timestamp: Utc::now(),
        uptime_secs: state.uptime_secs(),
        cycles: state.cycles(),
    })
}

/// Handle GET /api/metrics - run one snapshot cycle.
///
/// The configuration is read on every call, so edits take effect without a
/// restart. Partial failures are reported inside the snapshot; only an
/// unusable configuration fails the request.
pub async fn get_metrics(
    State(state): State<Arc<DashboardState>>,
) -> DashboardResult<Json<Snapshot>> {
    let path = &state.config().config_path;
    let config = MonitorConfig::load(path).await.map_err(|e| {
        error!(path = %path.display(), error = %e, "failed to load monitoring config");
        DashboardError::Metrics(e)
    })?;

    let cycle = state.record_cycle();
    let snapshot = SnapshotBuilder::from_config(state.sources().clone(), &config).await;
    info!(
        cycle,
        records = snapshot.record_count(),
        errors = snapshot.errors.len(),
        "snapshot served"
    );
    Ok(Json(snapshot))
}
