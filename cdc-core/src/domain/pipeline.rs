//! Pipeline domain types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Persisted pipeline record
///
/// Structure shared between the registry (persists) and the orchestrator
/// (drives status transitions).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pipeline {
    pub id: String,
    pub name: String,
    pub definition: PipelineDefinition,
    pub sql_statements: Vec<String>,
    pub job_id: Option<String>,
    pub status: PipelineStatus,
    /// Location of the savepoint taken when the pipeline was last stopped
    #[serde(default)]
    pub savepoint_path: Option<String>,
    /// Message of the last failed deployment or reconciliation finding
    #[serde(default)]
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Pipeline {
    /// Builds a fresh record in the `CREATED` state
    pub fn new(id: String, definition: PipelineDefinition, sql_statements: Vec<String>) -> Self {
        let now = Utc::now();
        Self {
            id,
            name: definition.name.clone(),
            definition,
            sql_statements,
            job_id: None,
            status: PipelineStatus::Created,
            savepoint_path: None,
            last_error: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Moves the record to `status` and bumps `updated_at`
    pub fn transition(&mut self, status: PipelineStatus) {
        self.status = status;
        self.updated_at = Utc::now();
    }

    /// Marks the record as failed, dropping the job reference
    pub fn fail(&mut self, reason: impl Into<String>) {
        self.job_id = None;
        self.last_error = Some(reason.into());
        self.transition(PipelineStatus::Failed);
    }
}

/// Pipeline lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PipelineStatus {
    Created,
    Deploying,
    Running,
    Stopped,
    Failed,
    Deleted,
}

impl PipelineStatus {
    /// Whether `start` is legal from this status
    pub fn can_start(self) -> bool {
        matches!(self, Self::Created | Self::Stopped | Self::Failed)
    }

    /// Whether a cluster job is (or is being) attached to the pipeline
    pub fn is_active(self) -> bool {
        matches!(self, Self::Deploying | Self::Running)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Created => "CREATED",
            Self::Deploying => "DEPLOYING",
            Self::Running => "RUNNING",
            Self::Stopped => "STOPPED",
            Self::Failed => "FAILED",
            Self::Deleted => "DELETED",
        }
    }
}

impl fmt::Display for PipelineStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// User-supplied pipeline definition
///
/// Either describes a source table, a sink table and an optional transform
/// query, or carries raw SQL statements that are submitted verbatim.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineDefinition {
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Session settings emitted as `SET` statements ahead of everything else
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub settings: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<TableSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sink: Option<TableSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transform: Option<TransformSpec>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub statements: Vec<String>,
}

impl PipelineDefinition {
    /// Whether the definition carries its own SQL instead of table specs
    pub fn is_raw(&self) -> bool {
        !self.statements.is_empty()
    }
}

/// A connector-backed table declaration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TableSpec {
    pub table: String,
    pub connector: String,
    #[serde(default)]
    pub columns: Vec<ColumnSpec>,
    #[serde(default)]
    pub primary_key: Vec<String>,
    #[serde(default)]
    pub options: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub data_type: String,
}

/// Query feeding the sink; defaults to a straight copy of the source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransformSpec {
    pub query: String,
}
