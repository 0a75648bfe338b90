//! Pipeline API Handlers
//!
//! HTTP endpoints for pipeline management.

use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
};
use cdc_core::domain::pipeline::{Pipeline, PipelineDefinition};
use cdc_core::dto::pipeline::{ImportOutcome, ImportPipelines, PipelineStatusSnapshot};
use serde_json::Value;

use crate::api::AppState;
use crate::api::error::ApiResult;
use crate::service::PipelineError;

/// POST /api/v1/pipelines
/// Create a new pipeline
pub async fn create_pipeline(
    State(state): State<AppState>,
    payload: Result<Json<Value>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Pipeline>)> {
    let Json(raw) = payload?;
    let definition = PipelineDefinition::from_json(raw).map_err(PipelineError::from)?;
    tracing::info!("Creating pipeline: {}", definition.name);

    let pipeline = state.pipelines.create_pipeline(definition).await?;

    Ok((StatusCode::CREATED, Json(pipeline)))
}

/// POST /api/v1/pipelines/import
/// Create several pipelines, reporting each outcome
pub async fn import_pipelines(
    State(state): State<AppState>,
    payload: Result<Json<ImportPipelines>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Vec<ImportOutcome>>)> {
    let Json(request) = payload?;
    tracing::info!("Importing {} pipelines", request.pipelines.len());

    let outcomes = state.pipelines.import_pipelines(request.pipelines).await;

    Ok((StatusCode::CREATED, Json(outcomes)))
}

/// GET /api/v1/pipelines
/// List all pipelines
pub async fn list_pipelines(State(state): State<AppState>) -> ApiResult<Json<Vec<Pipeline>>> {
    tracing::debug!("Listing all pipelines");

    let pipelines = state.pipelines.list_pipelines().await?;
    Ok(Json(pipelines))
}

/// GET /api/v1/pipelines/{id}
/// Get pipeline by ID
pub async fn get_pipeline(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Pipeline>> {
    tracing::debug!("Getting pipeline: {}", id);

    let pipeline = state.pipelines.get_pipeline(&id).await?;
    Ok(Json(pipeline))
}

/// PUT /api/v1/pipelines/{id}
/// Replace the definition of a pipeline that is not deployed
pub async fn update_pipeline(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<Value>, JsonRejection>,
) -> ApiResult<Json<Pipeline>> {
    let Json(raw) = payload?;
    let definition = PipelineDefinition::from_json(raw).map_err(PipelineError::from)?;
    tracing::info!("Updating pipeline: {}", id);

    let pipeline = state.pipelines.update_pipeline(&id, definition).await?;
    Ok(Json(pipeline))
}

/// DELETE /api/v1/pipelines/{id}
/// Delete a pipeline, cancelling its job when running
pub async fn delete_pipeline(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    tracing::info!("Deleting pipeline: {}", id);

    state.pipelines.delete_pipeline(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/pipelines/{id}/start
/// Deploy a pipeline to the cluster
pub async fn start_pipeline(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Pipeline>> {
    tracing::info!("Starting pipeline: {}", id);

    let pipeline = state.pipelines.start_pipeline(&id).await?;
    Ok(Json(pipeline))
}

/// POST /api/v1/pipelines/{id}/stop
/// Stop a running pipeline with a savepoint
pub async fn stop_pipeline(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Pipeline>> {
    tracing::info!("Stopping pipeline: {}", id);

    let pipeline = state.pipelines.stop_pipeline(&id).await?;
    Ok(Json(pipeline))
}

/// GET /api/v1/pipelines/{id}/status
/// Pipeline status, reconciled against the cluster
pub async fn pipeline_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<PipelineStatusSnapshot>> {
    tracing::debug!("Getting status of pipeline: {}", id);

    let snapshot = state.pipelines.pipeline_status(&id).await?;
    Ok(Json(snapshot))
}
