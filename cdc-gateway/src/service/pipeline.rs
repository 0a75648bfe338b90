//! Pipeline Service
//!
//! Lifecycle of pipelines: creation, deployment, cancellation, status
//! reconciliation and removal. Every mutating operation on a pipeline holds
//! that pipeline's lock for its whole duration, cluster calls included.

use std::sync::Arc;

use cdc_core::domain::pipeline::{Pipeline, PipelineDefinition, PipelineStatus};
use cdc_core::dto::pipeline::{ImportOutcome, PipelineStatusSnapshot};
use cdc_core::sql::{self, DefinitionError};
use cdc_flink::{ClientError, JobState};
use thiserror::Error;
use tokio::sync::OwnedMutexGuard;
use tracing::{info, warn};
use uuid::Uuid;

use crate::repository::{PipelineRepository, RepositoryError};
use crate::service::cluster::JobCluster;
use crate::service::locks::PipelineLocks;
use crate::telemetry;

/// Service error type
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("{0}")]
    Validation(String),

    #[error("pipeline '{0}' already exists")]
    Conflict(String),

    #[error("pipeline '{0}' not found")]
    NotFound(String),

    #[error("{0}")]
    InvalidState(String),

    #[error(transparent)]
    Cluster(#[from] ClientError),

    #[error(transparent)]
    Storage(RepositoryError),
}

impl From<DefinitionError> for PipelineError {
    fn from(err: DefinitionError) -> Self {
        PipelineError::Validation(err.to_string())
    }
}

impl From<RepositoryError> for PipelineError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound(id) | RepositoryError::InvalidId(id) => {
                PipelineError::NotFound(id)
            }
            RepositoryError::AlreadyExists(id) => PipelineError::Conflict(id),
            other => PipelineError::Storage(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;

pub struct PipelineService {
    repository: Arc<dyn PipelineRepository>,
    cluster: Arc<dyn JobCluster>,
    locks: PipelineLocks,
}

impl PipelineService {
    pub fn new(repository: Arc<dyn PipelineRepository>, cluster: Arc<dyn JobCluster>) -> Self {
        Self {
            repository,
            cluster,
            locks: PipelineLocks::new(),
        }
    }

    // =============================================================================
    // Registry Operations
    // =============================================================================

    /// Create a new pipeline in the `CREATED` state
    pub async fn create_pipeline(&self, definition: PipelineDefinition) -> Result<Pipeline> {
        let result = self.create(definition).await;
        telemetry::record_operation("create", result.is_ok());
        result
    }

    async fn create(&self, definition: PipelineDefinition) -> Result<Pipeline> {
        let statements = sql::compile(&definition)?;
        let id = definition
            .id
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        let pipeline = Pipeline::new(id, definition, statements);
        self.repository.insert(&pipeline).await?;

        info!("Pipeline created: {} ({})", pipeline.name, pipeline.id);

        Ok(pipeline)
    }

    /// Create one pipeline per definition, reporting each outcome separately
    pub async fn import_pipelines(&self, definitions: Vec<serde_json::Value>) -> Vec<ImportOutcome> {
        let mut outcomes = Vec::with_capacity(definitions.len());

        for raw in definitions {
            let name = raw
                .get("name")
                .and_then(|n| n.as_str())
                .unwrap_or("unknown")
                .to_string();

            let created = match PipelineDefinition::from_json(raw) {
                Ok(definition) => self.create_pipeline(definition).await,
                Err(e) => Err(e.into()),
            };

            match created {
                Ok(pipeline) => outcomes.push(ImportOutcome::created(&pipeline)),
                Err(e) => {
                    warn!("Import of pipeline '{}' failed: {}", name, e);
                    outcomes.push(ImportOutcome::failed(name, e));
                }
            }
        }

        outcomes
    }

    /// Get a pipeline by ID
    pub async fn get_pipeline(&self, id: &str) -> Result<Pipeline> {
        Ok(self.repository.load(id).await?)
    }

    /// List all pipelines, newest first
    pub async fn list_pipelines(&self) -> Result<Vec<Pipeline>> {
        Ok(self.repository.list_all().await?)
    }

    /// Number of stored pipeline records
    pub async fn count_pipelines(&self) -> Result<usize> {
        Ok(self.repository.count().await?)
    }

    /// Replace the definition of a pipeline that is not deployed
    ///
    /// The pipeline keeps its id and creation time and starts over as `CREATED`.
    pub async fn update_pipeline(&self, id: &str, definition: PipelineDefinition) -> Result<Pipeline> {
        let result = self.update(id, definition).await;
        telemetry::record_operation("update", result.is_ok());
        result
    }

    async fn update(&self, id: &str, definition: PipelineDefinition) -> Result<Pipeline> {
        if let Some(body_id) = definition.id.as_deref() {
            if body_id != id {
                return Err(PipelineError::Validation(format!(
                    "definition id '{}' does not match pipeline id '{}'",
                    body_id, id
                )));
            }
        }

        let _guard = self.acquire(id)?;
        let mut pipeline = self.repository.load(id).await?;

        if pipeline.status.is_active() {
            return Err(PipelineError::InvalidState(format!(
                "pipeline '{}' is {} and cannot be updated, stop it first",
                id, pipeline.status
            )));
        }

        pipeline.sql_statements = sql::compile(&definition)?;
        pipeline.name = definition.name.clone();
        pipeline.definition = definition;
        pipeline.job_id = None;
        pipeline.savepoint_path = None;
        pipeline.last_error = None;
        pipeline.transition(PipelineStatus::Created);
        self.repository.save(&pipeline).await?;

        info!("Pipeline updated: {} ({})", pipeline.name, pipeline.id);

        Ok(pipeline)
    }

    // =============================================================================
    // Lifecycle Operations
    // =============================================================================

    /// Deploy a pipeline to the cluster
    ///
    /// On failure the pipeline is persisted as `FAILED` before the error is
    /// returned. Statements applied before a failing one stay on the cluster.
    pub async fn start_pipeline(&self, id: &str) -> Result<Pipeline> {
        let result = self.start(id).await;
        telemetry::record_operation("start", result.is_ok());
        result
    }

    async fn start(&self, id: &str) -> Result<Pipeline> {
        let _guard = self.acquire(id)?;
        let mut pipeline = self.repository.load(id).await?;

        if pipeline.status == PipelineStatus::Deploying {
            // The lock is ours, so the recorded deployment is no longer running
            warn!("Pipeline {} was left DEPLOYING, redeploying it", id);
            pipeline.fail("deployment was interrupted before it completed");
        }

        if !pipeline.status.can_start() {
            return Err(PipelineError::InvalidState(format!(
                "pipeline '{}' is {} and cannot be started",
                id, pipeline.status
            )));
        }

        pipeline.transition(PipelineStatus::Deploying);
        self.repository.save(&pipeline).await?;
        info!("Deploying pipeline {} ({} statements)", id, pipeline.sql_statements.len());

        match self
            .cluster
            .deploy_sql_job(&pipeline.name, &pipeline.sql_statements)
            .await
        {
            Ok(job_id) => {
                pipeline.job_id = Some(job_id);
                pipeline.last_error = None;
                pipeline.transition(PipelineStatus::Running);
                self.repository.save(&pipeline).await?;

                info!(
                    "Pipeline {} running as job {}",
                    id,
                    pipeline.job_id.as_deref().unwrap_or_default()
                );
                Ok(pipeline)
            }
            Err(e) => {
                warn!("Deployment of pipeline {} failed: {}", id, e);
                pipeline.fail(e.to_string());
                self.repository.save(&pipeline).await?;
                Err(e.into())
            }
        }
    }

    /// Stop a running pipeline, taking a savepoint
    ///
    /// If the cancellation fails the pipeline stays `RUNNING`.
    pub async fn stop_pipeline(&self, id: &str) -> Result<Pipeline> {
        let result = self.stop(id).await;
        telemetry::record_operation("stop", result.is_ok());
        result
    }

    async fn stop(&self, id: &str) -> Result<Pipeline> {
        let _guard = self.acquire(id)?;
        let mut pipeline = self.repository.load(id).await?;

        let job_id = match (pipeline.status, pipeline.job_id.clone()) {
            (PipelineStatus::Running, Some(job_id)) => job_id,
            (status, _) => {
                return Err(PipelineError::InvalidState(format!(
                    "pipeline '{}' is {} and cannot be stopped",
                    id, status
                )));
            }
        };

        let savepoint = self.cluster.cancel_job(&job_id, true).await?;

        pipeline.savepoint_path = savepoint;
        pipeline.transition(PipelineStatus::Stopped);
        self.repository.save(&pipeline).await?;

        info!(
            "Pipeline {} stopped (savepoint: {})",
            id,
            pipeline.savepoint_path.as_deref().unwrap_or("none")
        );

        Ok(pipeline)
    }

    /// Current status, reconciled against the cluster when possible
    ///
    /// Cluster failures never fail this call: the stored state is returned
    /// as-is. While another operation holds the pipeline, nothing is reconciled.
    pub async fn pipeline_status(&self, id: &str) -> Result<PipelineStatusSnapshot> {
        let Some(_guard) = self.locks.try_acquire(id) else {
            let pipeline = self.repository.load(id).await?;
            return Ok(PipelineStatusSnapshot::from_pipeline(&pipeline, None));
        };

        let mut pipeline = self.repository.load(id).await?;

        if pipeline.status == PipelineStatus::Deploying {
            // Nobody holds the lock, so no deployment is in flight
            warn!("Pipeline {} was left DEPLOYING, marking it FAILED", id);
            pipeline.fail("deployment was interrupted before it completed");
            self.repository.save(&pipeline).await?;
            return Ok(PipelineStatusSnapshot::from_pipeline(&pipeline, None));
        }

        let Some(job_id) = pipeline.job_id.clone() else {
            return Ok(PipelineStatusSnapshot::from_pipeline(&pipeline, None));
        };

        let state = match self.cluster.job_state(&job_id).await {
            Ok(state) => state,
            Err(e) => {
                warn!("Could not query job {} of pipeline {}: {}", job_id, id, e);
                return Ok(PipelineStatusSnapshot::from_pipeline(&pipeline, None));
            }
        };

        if pipeline.status == PipelineStatus::Running {
            if let Some(drift) = reconcile(&job_id, state.as_ref()) {
                info!("Pipeline {} drifted from RUNNING: {}", id, drift.reason());
                match drift {
                    Drift::Failed(reason) => pipeline.fail(reason),
                    Drift::Stopped(_) => pipeline.transition(PipelineStatus::Stopped),
                }
                self.repository.save(&pipeline).await?;
            }
        }

        let cluster_state = state.map(|s| s.as_str().to_string());
        Ok(PipelineStatusSnapshot::from_pipeline(&pipeline, cluster_state))
    }

    /// Remove a pipeline, cancelling its job first when it is running
    ///
    /// The cancellation is best effort: the record is removed either way.
    pub async fn delete_pipeline(&self, id: &str) -> Result<Pipeline> {
        let result = self.delete(id).await;
        telemetry::record_operation("delete", result.is_ok());
        result
    }

    async fn delete(&self, id: &str) -> Result<Pipeline> {
        let _guard = self.acquire(id)?;
        let mut pipeline = self.repository.load(id).await?;

        if pipeline.status == PipelineStatus::Running {
            if let Some(job_id) = pipeline.job_id.as_deref() {
                if let Err(e) = self.cluster.cancel_job(job_id, false).await {
                    warn!("Failed to cancel job {} of deleted pipeline {}: {}", job_id, id, e);
                }
            }
        }

        self.repository.delete(id).await?;
        self.locks.forget(id);
        pipeline.transition(PipelineStatus::Deleted);

        info!("Pipeline deleted: {}", id);

        Ok(pipeline)
    }

    fn acquire(&self, id: &str) -> Result<OwnedMutexGuard<()>> {
        self.locks.try_acquire(id).ok_or_else(|| {
            PipelineError::InvalidState(format!(
                "an operation on pipeline '{}' is already in progress",
                id
            ))
        })
    }
}

/// How a running pipeline's job diverged from the local record
#[derive(Debug, Clone, PartialEq, Eq)]
enum Drift {
    Failed(String),
    Stopped(String),
}

impl Drift {
    fn reason(&self) -> &str {
        match self {
            Drift::Failed(reason) | Drift::Stopped(reason) => reason,
        }
    }
}

fn reconcile(job_id: &str, state: Option<&JobState>) -> Option<Drift> {
    match state {
        None => Some(Drift::Failed(format!(
            "job {} no longer exists on the cluster",
            job_id
        ))),
        Some(JobState::Failed) => Some(Drift::Failed(format!(
            "job {} failed on the cluster",
            job_id
        ))),
        Some(state @ (JobState::Canceled | JobState::Finished)) => Some(Drift::Stopped(format!(
            "job {} is {}",
            job_id,
            state.as_str()
        ))),
        Some(_) => None,
    }
}
