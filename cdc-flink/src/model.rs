//! Wire models for the cluster's REST API
//!
//! One record per response shape. Field aliases absorb the naming differences
//! between gateway versions (`session_handle` vs `sessionHandle`, `id` vs
//! `jid`, `status` vs `state`), so API drift stays in this module.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize)]
pub(crate) struct OpenSessionRequest<'a> {
    #[serde(rename = "sessionName")]
    pub session_name: &'a str,
    pub properties: SessionProperties<'a>,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct SessionProperties<'a> {
    #[serde(rename = "pipeline.name")]
    pub pipeline_name: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct SessionHandle {
    #[serde(alias = "sessionHandle")]
    pub session_handle: String,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct ExecuteStatementRequest<'a> {
    pub statement: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct OperationHandle {
    #[serde(alias = "operationHandle")]
    pub operation_handle: String,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct OperationStatusBody {
    pub status: OperationStatus,
}

/// Execution status of a submitted statement
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OperationStatus {
    Initialized,
    Pending,
    Running,
    Finished,
    Error,
    Canceled,
    Closed,
    Timeout,
    #[serde(other)]
    Unknown,
}

impl OperationStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Initialized | Self::Pending | Self::Running)
    }
}

/// Job state as reported by the cluster
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobState {
    Initializing,
    Created,
    Running,
    Failing,
    Failed,
    Cancelling,
    Canceled,
    Finished,
    Restarting,
    Suspended,
    Reconciling,
    #[serde(other)]
    Unknown,
}

impl JobState {
    /// Whether the job is still doing (or about to do) work
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            Self::Initializing
                | Self::Created
                | Self::Running
                | Self::Restarting
                | Self::Reconciling
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Initializing => "INITIALIZING",
            Self::Created => "CREATED",
            Self::Running => "RUNNING",
            Self::Failing => "FAILING",
            Self::Failed => "FAILED",
            Self::Cancelling => "CANCELLING",
            Self::Canceled => "CANCELED",
            Self::Finished => "FINISHED",
            Self::Restarting => "RESTARTING",
            Self::Suspended => "SUSPENDED",
            Self::Reconciling => "RECONCILING",
            Self::Unknown => "UNKNOWN",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct JobsOverview {
    #[serde(default)]
    pub jobs: Vec<JobSummary>,
}

/// Entry of the cluster's job list
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct JobSummary {
    #[serde(alias = "jid")]
    pub id: String,
    #[serde(alias = "state")]
    pub status: JobState,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, rename = "start-time")]
    pub start_time: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct JobDetails {
    #[serde(alias = "id")]
    pub jid: String,
    #[serde(alias = "status")]
    pub state: JobState,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct TriggerSavepointRequest<'a> {
    #[serde(rename = "target-directory", skip_serializing_if = "Option::is_none")]
    pub target_directory: Option<&'a str>,
    #[serde(rename = "cancel-job")]
    pub cancel_job: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct SavepointTrigger {
    #[serde(rename = "request-id")]
    pub request_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct SavepointStatusBody {
    pub status: SavepointQueueStatus,
    #[serde(default)]
    pub operation: Option<SavepointOperation>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct SavepointQueueStatus {
    pub id: SavepointProgress,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub(crate) enum SavepointProgress {
    InProgress,
    Completed,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct SavepointOperation {
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default, rename = "failure-cause")]
    pub failure_cause: Option<serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handles_accept_both_spellings() {
        let snake: SessionHandle =
            serde_json::from_str(r#"{"session_handle": "s1"}"#).unwrap();
        let camel: SessionHandle = serde_json::from_str(r#"{"sessionHandle": "s1"}"#).unwrap();
        assert_eq!(snake.session_handle, camel.session_handle);

        let op: OperationHandle = serde_json::from_str(r#"{"operationHandle": "op-1"}"#).unwrap();
        assert_eq!(op.operation_handle, "op-1");
    }

    #[test]
    fn test_job_summary_aliases() {
        let overview: JobsOverview = serde_json::from_str(
            r#"{"jobs": [
                {"id": "job-123", "status": "RUNNING", "start-time": 1000},
                {"jid": "job-456", "state": "CANCELED", "name": "orders"}
            ]}"#,
        )
        .unwrap();

        assert_eq!(overview.jobs[0].id, "job-123");
        assert_eq!(overview.jobs[0].start_time, Some(1000));
        assert_eq!(overview.jobs[1].status, JobState::Canceled);
        assert_eq!(overview.jobs[1].name.as_deref(), Some("orders"));
    }

    #[test]
    fn test_unknown_states_do_not_fail_parsing() {
        let status: OperationStatusBody =
            serde_json::from_str(r#"{"status": "SOMETHING_NEW"}"#).unwrap();
        assert_eq!(status.status, OperationStatus::Unknown);
        assert!(status.status.is_terminal());

        let state: JobState = serde_json::from_str(r#""SOMETHING_NEW""#).unwrap();
        assert_eq!(state, JobState::Unknown);
    }

    #[test]
    fn test_savepoint_status_completed() {
        let body: SavepointStatusBody = serde_json::from_str(
            r#"{"status": {"id": "COMPLETED"}, "operation": {"location": "s3://sp/savepoint-1"}}"#,
        )
        .unwrap();
        assert_eq!(body.status.id, SavepointProgress::Completed);
        assert_eq!(
            body.operation.and_then(|o| o.location).as_deref(),
            Some("s3://sp/savepoint-1")
        );
    }
}
