//! Prometheus metrics and request tracking
//!
//! The recorder is installed once in `main`; without it every macro below is
//! a no-op, which is what the tests run against.

use anyhow::Context;
use axum::{
    extract::{MatchedPath, Request},
    middleware::Next,
    response::Response,
};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

pub const METRIC_API_REQUESTS: &str = "cdc_gateway_api_requests_total";
pub const METRIC_PIPELINE_OPERATIONS: &str = "cdc_gateway_pipeline_operations_total";
pub const METRIC_ACTIVE_PIPELINES: &str = "cdc_gateway_active_pipelines";

/// Installs the global Prometheus recorder and registers metric descriptions
pub fn install_recorder() -> anyhow::Result<PrometheusHandle> {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .context("failed to install the Prometheus recorder")?;

    metrics::describe_counter!(METRIC_API_REQUESTS, metrics::Unit::Count, "Total API requests");
    metrics::describe_counter!(
        METRIC_PIPELINE_OPERATIONS,
        metrics::Unit::Count,
        "Pipeline lifecycle operations by outcome"
    );
    metrics::describe_gauge!(
        METRIC_ACTIVE_PIPELINES,
        metrics::Unit::Count,
        "Pipelines currently RUNNING"
    );

    Ok(handle)
}

pub fn record_operation(operation: &'static str, success: bool) {
    let status = if success { "success" } else { "error" };
    metrics::counter!(METRIC_PIPELINE_OPERATIONS, "operation" => operation, "status" => status)
        .increment(1);
}

pub fn set_active_pipelines(count: usize) {
    metrics::gauge!(METRIC_ACTIVE_PIPELINES).set(count as f64);
}

/// Counts every request by route template, method and response status
///
/// Installed with `route_layer` so that [`MatchedPath`] is available and
/// unmatched paths do not create new label sets.
pub async fn track_requests(request: Request, next: Next) -> Response {
    let endpoint = request
        .extensions()
        .get::<MatchedPath>()
        .map(|path| path.as_str().to_string())
        .unwrap_or_else(|| "unknown".to_string());
    let method = request.method().to_string();

    let response = next.run(request).await;

    metrics::counter!(
        METRIC_API_REQUESTS,
        "endpoint" => endpoint,
        "method" => method,
        "status" => response.status().as_u16().to_string()
    )
    .increment(1);

    response
}
