//! Flink cluster client
//!
//! A typed HTTP client for the cluster's SQL gateway and job REST API.
//!
//! The client hides session and operation plumbing behind a handful of calls:
//! - [`FlinkClient::deploy_sql_job`] submits statements one by one and returns the job id
//! - [`FlinkClient::cancel_job`] cancels a job, optionally taking a savepoint first
//! - [`FlinkClient::job_state`] and [`FlinkClient::list_jobs`] query running jobs
//!
//! # Example
//!
//! ```no_run
//! use cdc_flink::{ClusterConfig, FlinkClient};
//!
//! # async fn example() -> cdc_flink::Result<()> {
//! let client = FlinkClient::new(ClusterConfig::new("localhost", 8081))?;
//!
//! let job_id = client
//!     .deploy_sql_job(
//!         "orders-sync",
//!         &[
//!             "CREATE TABLE src (id BIGINT) WITH ('connector' = 'datagen')".to_string(),
//!             "CREATE TABLE sink (id BIGINT) WITH ('connector' = 'print')".to_string(),
//!             "INSERT INTO sink SELECT * FROM src".to_string(),
//!         ],
//!     )
//!     .await?;
//!
//! println!("Deployed job: {}", job_id);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
mod jobs;
pub mod model;
mod sessions;

#[cfg(test)]
mod testing;

// Re-export commonly used types
pub use config::{ClusterConfig, PollPolicy};
pub use error::{ClientError, Result};
pub use model::{JobState, JobSummary};

use reqwest::Client;
use serde::de::DeserializeOwned;

/// HTTP client for the cluster's REST API
///
/// Stateless apart from the connection pool: every call is self-contained, so
/// one instance can be shared by concurrent deployments.
#[derive(Debug, Clone)]
pub struct FlinkClient {
    /// Base URL of the REST API (e.g., "http://localhost:8081/v1")
    base_url: String,
    /// HTTP client instance
    client: Client,
    config: ClusterConfig,
}

impl FlinkClient {
    /// Create a new cluster client
    ///
    /// The underlying HTTP client applies `config.request_timeout` to every
    /// request, independently of the polling budgets.
    pub fn new(config: ClusterConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self::with_client(config, client))
    }

    /// Create a new cluster client with a custom HTTP client
    pub fn with_client(config: ClusterConfig, client: Client) -> Self {
        Self {
            base_url: config.base_url().trim_end_matches('/').to_string(),
            client,
            config,
        }
    }

    /// Get the base URL of the cluster API
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn config(&self) -> &ClusterConfig {
        &self.config
    }

    // =============================================================================
    // Response Handlers
    // =============================================================================

    /// Handle an API response and deserialize JSON
    async fn handle_response<T: DeserializeOwned>(&self, response: reqwest::Response) -> Result<T> {
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(ClientError::api_error(status.as_u16(), body));
        }

        serde_json::from_str(&body)
            .map_err(|e| ClientError::ParseError(format!("{}: {}", e, body)))
    }

    /// Handle an API response whose body is irrelevant (e.g., DELETE operations)
    async fn handle_empty_response(&self, response: reqwest::Response) -> Result<()> {
        let status = response.status();

        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ClientError::api_error(status.as_u16(), error_text));
        }

        Ok(())
    }
}
