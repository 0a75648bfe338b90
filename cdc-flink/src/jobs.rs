//! Job endpoints: listing, state lookup and cancellation

use reqwest::StatusCode;
use tracing::{debug, info};

use crate::FlinkClient;
use crate::error::{ClientError, Result};
use crate::model::{
    JobDetails, JobState, JobSummary, JobsOverview, SavepointProgress, SavepointStatusBody,
    SavepointTrigger, TriggerSavepointRequest,
};

impl FlinkClient {
    // =============================================================================
    // Job Query
    // =============================================================================

    /// List all jobs known to the cluster
    pub async fn list_jobs(&self) -> Result<Vec<JobSummary>> {
        let url = format!("{}/jobs", self.base_url);
        let response = self.client.get(&url).send().await?;

        let overview: JobsOverview = self.handle_response(response).await?;
        Ok(overview.jobs)
    }

    /// Get the state of a job
    ///
    /// # Returns
    /// `None` when the cluster does not know the job
    pub async fn job_state(&self, job_id: &str) -> Result<Option<JobState>> {
        let url = format!("{}/jobs/{}", self.base_url, job_id);
        let response = self.client.get(&url).send().await?;

        if response.status() == StatusCode::NOT_FOUND {
            debug!("Job {} is unknown to the cluster", job_id);
            return Ok(None);
        }

        let details: JobDetails = self.handle_response(response).await?;
        debug!("Job {} is {}", details.jid, details.state.as_str());
        Ok(Some(details.state))
    }

    /// Find the job a deployment of `job_name` produced
    ///
    /// Polls the job list until a match shows up or the lookup budget runs out.
    pub(crate) async fn resolve_job_id(&self, job_name: &str) -> Result<String> {
        let client = self;
        let found = self
            .config
            .job_lookup_poll
            .run("job lookup", move || async move {
                let jobs = client.list_jobs().await?;
                Ok(select_job(&jobs, job_name))
            })
            .await?;

        found.ok_or_else(|| ClientError::JobNotFound(job_name.to_string()))
    }

    // =============================================================================
    // Cancellation
    // =============================================================================

    /// Cancel a job
    ///
    /// # Arguments
    /// * `job_id` - The cluster job id
    /// * `with_savepoint` - Take a savepoint and stop the job with it
    ///
    /// # Returns
    /// The savepoint location when `with_savepoint` is set, `None` otherwise
    pub async fn cancel_job(&self, job_id: &str, with_savepoint: bool) -> Result<Option<String>> {
        if with_savepoint {
            return self.stop_with_savepoint(job_id).await.map(Some);
        }

        let url = format!("{}/jobs/{}", self.base_url, job_id);
        let response = self.client.delete(&url).send().await?;
        self.handle_empty_response(response).await?;

        info!("Cancel requested for job {}", job_id);
        Ok(None)
    }

    async fn stop_with_savepoint(&self, job_id: &str) -> Result<String> {
        let cancellation = |reason: String| ClientError::Cancellation {
            job_id: job_id.to_string(),
            reason,
        };
        // Cluster answers become cancellation failures; transport errors stay as they are
        let rejected = |err: ClientError| match err {
            ClientError::Unavailable(_) => err,
            other => cancellation(other.to_string()),
        };

        let url = format!("{}/jobs/{}/savepoints", self.base_url, job_id);
        let response = self
            .client
            .post(&url)
            .json(&TriggerSavepointRequest {
                target_directory: self.config.savepoint_dir.as_deref(),
                cancel_job: true,
            })
            .send()
            .await?;

        let trigger: SavepointTrigger = self
            .handle_response(response)
            .await
            .map_err(rejected)?;
        info!(
            "Savepoint {} triggered for job {}",
            trigger.request_id, job_id
        );

        let client = self;
        let request_id = trigger.request_id.as_str();
        let outcome = self
            .config
            .savepoint_poll
            .run("savepoint", move || client.savepoint_outcome(job_id, request_id))
            .await
            .map_err(rejected)?;

        match outcome {
            Some(Ok(location)) => {
                info!("Job {} stopped with savepoint {}", job_id, location);
                Ok(location)
            }
            Some(Err(cause)) => Err(cancellation(cause)),
            None => Err(cancellation(format!(
                "savepoint did not complete within {:?}",
                self.config.savepoint_poll.budget()
            ))),
        }
    }

    /// `None` while the savepoint is in progress, then its location or failure cause
    async fn savepoint_outcome(
        &self,
        job_id: &str,
        request_id: &str,
    ) -> Result<Option<std::result::Result<String, String>>> {
        let url = format!(
            "{}/jobs/{}/savepoints/{}",
            self.base_url, job_id, request_id
        );
        let response = self.client.get(&url).send().await?;

        let body: SavepointStatusBody = self.handle_response(response).await?;
        if body.status.id == SavepointProgress::InProgress {
            return Ok(None);
        }

        let operation = body.operation.unwrap_or_default();
        let outcome = match (operation.location, operation.failure_cause) {
            (_, Some(cause)) => Err(describe_failure(&cause)),
            (Some(location), None) => Ok(location),
            (None, None) => Err("savepoint completed without a location".to_string()),
        };

        Ok(Some(outcome))
    }
}

/// Picks the job produced by a deployment of `job_name`
///
/// When the cluster reports job names, only active jobs with exactly that name
/// qualify. Otherwise the most recently started active job is taken.
fn select_job(jobs: &[JobSummary], job_name: &str) -> Option<String> {
    let names_reported = jobs.iter().any(|job| job.name.is_some());

    jobs.iter()
        .filter(|job| job.status.is_active())
        .filter(|job| !names_reported || job.name.as_deref() == Some(job_name))
        .max_by_key(|job| job.start_time.unwrap_or(i64::MIN))
        .map(|job| job.id.clone())
}

fn describe_failure(cause: &serde_json::Value) -> String {
    cause
        .get("stack-trace")
        .or_else(|| cause.get("class"))
        .and_then(|v| v.as_str())
        .and_then(|s| s.lines().next())
        .map(str::to_string)
        .unwrap_or_else(|| cause.to_string())
}
