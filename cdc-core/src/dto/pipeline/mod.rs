//! Pipeline DTOs exchanged with the HTTP front end

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::pipeline::{Pipeline, PipelineStatus};

/// Batch of definitions submitted to the import endpoint
///
/// Items stay untyped so that one malformed definition is reported on its own
/// instead of rejecting the whole batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportPipelines {
    pub pipelines: Vec<serde_json::Value>,
}

/// Per-item result of an import
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ImportOutcome {
    Created {
        name: String,
        id: String,
        status: String,
    },
    Failed {
        name: String,
        error: String,
    },
}

impl ImportOutcome {
    pub fn created(pipeline: &Pipeline) -> Self {
        Self::Created {
            name: pipeline.name.clone(),
            id: pipeline.id.clone(),
            status: "created".to_string(),
        }
    }

    pub fn failed(name: impl Into<String>, error: impl ToString) -> Self {
        Self::Failed {
            name: name.into(),
            error: error.to_string(),
        }
    }
}

/// Status view returned by the status endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineStatusSnapshot {
    pub id: String,
    pub name: String,
    pub status: PipelineStatus,
    pub job_id: Option<String>,
    /// Job state as last reported by the cluster, when it could be queried
    pub cluster_state: Option<String>,
    pub savepoint_path: Option<String>,
    pub last_error: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl PipelineStatusSnapshot {
    pub fn from_pipeline(pipeline: &Pipeline, cluster_state: Option<String>) -> Self {
        Self {
            id: pipeline.id.clone(),
            name: pipeline.name.clone(),
            status: pipeline.status,
            job_id: pipeline.job_id.clone(),
            cluster_state,
            savepoint_path: pipeline.savepoint_path.clone(),
            last_error: pipeline.last_error.clone(),
            updated_at: pipeline.updated_at,
        }
    }
}
