//! Cluster client configuration
//!
//! Connection settings and polling budgets for [`FlinkClient`](crate::FlinkClient).
//! Everything is passed in at construction time so tests can point the client
//! at a mock gateway and shrink the polling intervals.

use std::future::Future;
use std::time::Duration;

use tracing::debug;

use crate::error::Result;

/// Bounded polling: at most `max_attempts` probes, `interval` apart
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub max_attempts: u32,
}

impl PollPolicy {
    pub fn new(interval: Duration, max_attempts: u32) -> Self {
        Self {
            interval,
            max_attempts,
        }
    }

    /// Upper bound of the time spent sleeping between probes
    pub fn budget(&self) -> Duration {
        self.interval * self.max_attempts.saturating_sub(1)
    }

    /// Runs `probe` until it yields a value or the attempts are used up
    ///
    /// Returns `Ok(None)` when the budget is exhausted. Errors from `probe`
    /// abort the loop immediately.
    pub async fn run<T, F, Fut>(&self, what: &str, mut probe: F) -> Result<Option<T>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<Option<T>>>,
    {
        for attempt in 1..=self.max_attempts {
            if let Some(value) = probe().await? {
                return Ok(Some(value));
            }

            debug!("{} not ready (attempt {}/{})", what, attempt, self.max_attempts);

            if attempt < self.max_attempts {
                tokio::time::sleep(self.interval).await;
            }
        }

        Ok(None)
    }
}

/// Cluster client configuration
#[derive(Debug, Clone)]
pub struct ClusterConfig {
    /// JobManager / SQL gateway host
    pub host: String,

    /// REST port of the gateway
    pub rest_port: u16,

    /// Timeout applied to every single HTTP request
    pub request_timeout: Duration,

    /// Target directory for savepoints taken on cancellation
    pub savepoint_dir: Option<String>,

    /// Polling of a submitted statement's operation status
    pub operation_poll: PollPolicy,

    /// Polling of the job list after the last statement finished
    pub job_lookup_poll: PollPolicy,

    /// Polling of a savepoint trigger until it completes
    pub savepoint_poll: PollPolicy,

    /// Deadline for a whole deployment, across all statements
    pub deploy_timeout: Option<Duration>,
}

impl ClusterConfig {
    /// Creates a new configuration with defaults
    pub fn new(host: impl Into<String>, rest_port: u16) -> Self {
        Self {
            host: host.into(),
            rest_port,
            request_timeout: Duration::from_secs(30),
            savepoint_dir: None,
            operation_poll: PollPolicy::new(Duration::from_secs(1), 60),
            job_lookup_poll: PollPolicy::new(Duration::from_secs(1), 30),
            savepoint_poll: PollPolicy::new(Duration::from_secs(1), 120),
            deploy_timeout: Some(Duration::from_secs(900)),
        }
    }

    /// Base URL of the REST API, e.g. `http://localhost:8081/v1`
    pub fn base_url(&self) -> String {
        format!("http://{}:{}/v1", self.host, self.rest_port)
    }

    /// Sets one policy for all three polling loops
    pub fn with_poll_policy(mut self, policy: PollPolicy) -> Self {
        self.operation_poll = policy;
        self.job_lookup_poll = policy;
        self.savepoint_poll = policy;
        self
    }
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self::new("localhost", 8081)
    }
}
