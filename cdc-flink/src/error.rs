//! Error types for the Flink cluster client

use std::time::Duration;

use thiserror::Error;

/// Result type alias for client operations
pub type Result<T> = std::result::Result<T, ClientError>;

/// Errors that can occur when talking to the cluster
#[derive(Debug, Error)]
pub enum ClientError {
    /// Transport-level failure reaching the cluster
    #[error("cluster unavailable: {0}")]
    Unavailable(#[from] reqwest::Error),

    /// The cluster answered with an unexpected status code
    #[error("cluster API error (status {status}): {message}")]
    ApiError {
        /// HTTP status code
        status: u16,
        /// Response body returned by the cluster
        message: String,
    },

    /// The response body did not match the expected shape
    #[error("failed to parse cluster response: {0}")]
    ParseError(String),

    /// A submitted statement was rejected or failed
    ///
    /// Statements before `statement` have already been applied on the cluster
    /// and are not rolled back.
    #[error("deployment failed at statement {statement} of {total}: {reason}")]
    Deployment {
        /// 1-based index of the failing statement
        statement: usize,
        /// Number of statements in the deployment
        total: usize,
        reason: String,
    },

    /// All statements finished but no matching job showed up
    #[error("no job found for '{0}' after deployment")]
    JobNotFound(String),

    /// Stop-with-savepoint did not complete
    #[error("cancellation of job {job_id} failed: {reason}")]
    Cancellation { job_id: String, reason: String },

    /// The overall deadline for an operation elapsed
    #[error("operation timed out after {0:?}")]
    Timeout(Duration),
}

impl ClientError {
    /// Create an API error from status code and message
    pub fn api_error(status: u16, message: impl Into<String>) -> Self {
        Self::ApiError {
            status,
            message: message.into(),
        }
    }

    /// Check if this error is a "not found" answer from the cluster
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::ApiError { status: 404, .. })
    }

    /// Check if the cluster could not be reached at all
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }

    /// 1-based index of the failing statement, for deployment failures
    pub fn failed_statement(&self) -> Option<usize> {
        match self {
            Self::Deployment { statement, .. } => Some(*statement),
            _ => None,
        }
    }
}
