//! API Error Handling
//!
//! Unified error type and conversion for API responses. Every error is
//! returned as `{"error": message}`.

use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use cdc_flink::ClientError;

use crate::service::PipelineError;

/// API error type
#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    BadRequest(String),
    /// The pipeline is not in a state that allows the operation
    Conflict(String),
    GatewayTimeout(String),
    InternalError(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::GatewayTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
            ApiError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match self {
            ApiError::NotFound(msg) | ApiError::BadRequest(msg) | ApiError::Conflict(msg) => msg,
            ApiError::GatewayTimeout(msg) => {
                tracing::error!("Timeout: {}", msg);
                msg
            }
            ApiError::InternalError(msg) => {
                tracing::error!("Internal error: {}", msg);
                msg
            }
        };

        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

impl From<PipelineError> for ApiError {
    fn from(err: PipelineError) -> Self {
        let message = err.to_string();
        match err {
            PipelineError::NotFound(_) => ApiError::NotFound(message),
            PipelineError::Validation(_) | PipelineError::Conflict(_) => {
                ApiError::BadRequest(message)
            }
            PipelineError::InvalidState(_) => ApiError::Conflict(message),
            PipelineError::Cluster(ClientError::Timeout(_)) => ApiError::GatewayTimeout(message),
            PipelineError::Cluster(_) | PipelineError::Storage(_) => {
                ApiError::InternalError(message)
            }
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::RepositoryError;
    use std::time::Duration;

    fn status_of(err: PipelineError) -> StatusCode {
        ApiError::from(err).into_response().status()
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            status_of(PipelineError::NotFound("a".into())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_of(PipelineError::Validation("bad".into())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(PipelineError::Conflict("a".into())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(PipelineError::InvalidState("busy".into())),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_of(PipelineError::Cluster(ClientError::Deployment {
                statement: 2,
                total: 3,
                reason: "boom".into(),
            })),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            status_of(PipelineError::Cluster(ClientError::Cancellation {
                job_id: "job-1".into(),
                reason: "boom".into(),
            })),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            status_of(PipelineError::Cluster(ClientError::Timeout(Duration::from_secs(1)))),
            StatusCode::GATEWAY_TIMEOUT
        );
        assert_eq!(
            status_of(PipelineError::Storage(RepositoryError::Io(std::io::Error::other(
                "disk full"
            )))),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
