//! Cluster seam
//!
//! The orchestrator talks to the cluster through [`JobCluster`] so that its
//! state machine can be exercised against a scripted fake.

use async_trait::async_trait;
use cdc_flink::{FlinkClient, JobState, Result};

/// Operations the orchestrator needs from the cluster
#[async_trait]
pub trait JobCluster: Send + Sync {
    /// Submits `statements` in order and returns the resulting job id
    async fn deploy_sql_job(&self, job_name: &str, statements: &[String]) -> Result<String>;

    /// Cancels a job, optionally stopping it with a savepoint
    ///
    /// # Returns
    /// The savepoint location when one was taken
    async fn cancel_job(&self, job_id: &str, with_savepoint: bool) -> Result<Option<String>>;

    /// Current job state, `None` when the cluster does not know the job
    async fn job_state(&self, job_id: &str) -> Result<Option<JobState>>;
}

#[async_trait]
impl JobCluster for FlinkClient {
    async fn deploy_sql_job(&self, job_name: &str, statements: &[String]) -> Result<String> {
        FlinkClient::deploy_sql_job(self, job_name, statements).await
    }

    async fn cancel_job(&self, job_id: &str, with_savepoint: bool) -> Result<Option<String>> {
        FlinkClient::cancel_job(self, job_id, with_savepoint).await
    }

    async fn job_state(&self, job_id: &str) -> Result<Option<JobState>> {
        FlinkClient::job_state(self, job_id).await
    }
}
