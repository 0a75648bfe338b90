//! Health and Admin API Handlers
//!
//! Liveness for the pipeline API plus the admin surface: liveness, build and
//! deployment info, and the Prometheus scrape endpoint.

use axum::{
    Json,
    extract::State,
    http::{StatusCode, header},
    response::IntoResponse,
};
use cdc_core::domain::pipeline::PipelineStatus;
use serde_json::json;

use crate::api::AdminState;
use crate::api::error::ApiResult;
use crate::telemetry;

pub const SERVICE_NAME: &str = "Flink CDC Gateway";

/// GET /api/v1/health
pub async fn health_check() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(json!({ "status": "OK", "service": SERVICE_NAME })),
    )
}

/// GET /health on the admin listener
pub async fn admin_health() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(json!({ "status": "UP", "service": "CDC Gateway Admin" })),
    )
}

/// GET /info
pub async fn info(State(state): State<AdminState>) -> ApiResult<impl IntoResponse> {
    let total = state.pipelines.count_pipelines().await?;

    Ok(Json(json!({
        "name": "Apache Flink CDC Gateway",
        "version": env!("CARGO_PKG_VERSION"),
        "description": "Change Data Capture Gateway for Apache Flink",
        "pipelines": {
            "total": total,
            "workspace": state.workspace,
        },
        "flink": {
            "jobmanager": state.jobmanager,
            "port": state.jobmanager_port,
        },
    })))
}

/// GET /metrics
///
/// Refreshes the active pipeline gauge, then renders every metric.
pub async fn prometheus_scrape(State(state): State<AdminState>) -> ApiResult<impl IntoResponse> {
    let running = state
        .pipelines
        .list_pipelines()
        .await?
        .iter()
        .filter(|p| p.status == PipelineStatus::Running)
        .count();
    telemetry::set_active_pipelines(running);

    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.prometheus.render(),
    ))
}
