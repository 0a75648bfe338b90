//! SQL session endpoints: statement submission and deployment

use tracing::{debug, info, warn};

use crate::FlinkClient;
use crate::error::{ClientError, Result};
use crate::model::{
    ExecuteStatementRequest, OpenSessionRequest, OperationHandle, OperationStatus,
    OperationStatusBody, SessionHandle, SessionProperties,
};

impl FlinkClient {
    // =============================================================================
    // Deployment
    // =============================================================================

    /// Deploy a SQL job and return the id of the job it produced
    ///
    /// Statements run strictly in order inside one session: statement N+1 is
    /// only submitted once statement N's operation reports `FINISHED`, because
    /// later statements reference tables created by earlier ones.
    ///
    /// # Errors
    /// * [`ClientError::Deployment`] if a statement is rejected, ends in a
    ///   non-`FINISHED` state or does not finish within the poll budget. The
    ///   statements before it stay applied on the cluster.
    /// * [`ClientError::JobNotFound`] if no matching job appears afterwards.
    /// * [`ClientError::Timeout`] if the configured deploy deadline elapses.
    pub async fn deploy_sql_job(&self, job_name: &str, statements: &[String]) -> Result<String> {
        if statements.is_empty() {
            return Err(ClientError::Deployment {
                statement: 0,
                total: 0,
                reason: "no statements to submit".to_string(),
            });
        }

        match self.config.deploy_timeout {
            Some(limit) => tokio::time::timeout(limit, self.run_deployment(job_name, statements))
                .await
                .map_err(|_| ClientError::Timeout(limit))?,
            None => self.run_deployment(job_name, statements).await,
        }
    }

    async fn run_deployment(&self, job_name: &str, statements: &[String]) -> Result<String> {
        let session = self.open_session(job_name).await?;
        info!(
            "Opened session {} for '{}' ({} statements)",
            session,
            job_name,
            statements.len()
        );

        let executed = self.execute_statements(&session, statements).await;
        self.close_session(&session).await;
        executed?;

        let job_id = self.resolve_job_id(job_name).await?;
        info!("Deployed '{}' as job {}", job_name, job_id);

        Ok(job_id)
    }

    async fn execute_statements(&self, session: &str, statements: &[String]) -> Result<()> {
        let total = statements.len();

        for (idx, statement) in statements.iter().enumerate() {
            let position = idx + 1;
            let failed = |reason: String| ClientError::Deployment {
                statement: position,
                total,
                reason,
            };

            let operation = self
                .submit_statement(session, statement)
                .await
                .map_err(|e| into_deployment_error(e, position, total))?;
            debug!("Statement {}/{} submitted as operation {}", position, total, operation);

            let client = self;
            let op = operation.as_str();
            let status = self
                .config
                .operation_poll
                .run("operation", move || client.operation_status(session, op))
                .await
                .map_err(|e| into_deployment_error(e, position, total))?;

            match status {
                Some(OperationStatus::Finished) => {
                    debug!("Statement {}/{} finished", position, total);
                }
                Some(other) => {
                    return Err(failed(format!(
                        "operation {} ended in {:?}",
                        operation, other
                    )));
                }
                None => {
                    return Err(failed(format!(
                        "operation {} did not finish within {:?}",
                        operation,
                        self.config.operation_poll.budget()
                    )));
                }
            }
        }

        Ok(())
    }

    // =============================================================================
    // Session Plumbing
    // =============================================================================

    async fn open_session(&self, job_name: &str) -> Result<String> {
        let url = format!("{}/sessions", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&OpenSessionRequest {
                session_name: job_name,
                properties: SessionProperties {
                    pipeline_name: job_name,
                },
            })
            .send()
            .await?;

        let handle: SessionHandle = self.handle_response(response).await?;
        Ok(handle.session_handle)
    }

    async fn submit_statement(&self, session: &str, statement: &str) -> Result<String> {
        let url = format!("{}/sessions/{}/statements", self.base_url, session);
        let response = self
            .client
            .post(&url)
            .json(&ExecuteStatementRequest { statement })
            .send()
            .await?;

        let handle: OperationHandle = self.handle_response(response).await?;
        Ok(handle.operation_handle)
    }

    /// Returns the operation status once it is terminal, `None` while it runs
    async fn operation_status(
        &self,
        session: &str,
        operation: &str,
    ) -> Result<Option<OperationStatus>> {
        let url = format!(
            "{}/sessions/{}/operations/{}/status",
            self.base_url, session, operation
        );
        let response = self.client.get(&url).send().await?;

        let body: OperationStatusBody = self.handle_response(response).await?;
        Ok(body.status.is_terminal().then_some(body.status))
    }

    /// Closes the session; failures are logged and otherwise ignored
    async fn close_session(&self, session: &str) {
        let url = format!("{}/sessions/{}", self.base_url, session);

        let closed = match self.client.delete(&url).send().await {
            Ok(response) => self.handle_empty_response(response).await,
            Err(e) => Err(e.into()),
        };

        if let Err(e) = closed {
            warn!("Failed to close session {}: {}", session, e);
        }
    }
}

/// Gateway answers about a statement become deployment failures at its index;
/// transport failures stay as they are
fn into_deployment_error(err: ClientError, statement: usize, total: usize) -> ClientError {
    match err {
        ClientError::ApiError { .. } | ClientError::ParseError(_) => ClientError::Deployment {
            statement,
            total,
            reason: err.to_string(),
        },
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockGateway;

    fn pipeline_statements() -> Vec<String> {
        vec![
            "CREATE TABLE src (id BIGINT) WITH ('connector' = 'datagen')".to_string(),
            "CREATE TABLE sink (id BIGINT) WITH ('connector' = 'print')".to_string(),
            "INSERT INTO sink SELECT * FROM src".to_string(),
        ]
    }

    #[tokio::test]
    async fn test_deploy_runs_statements_in_order_and_resolves_job() {
        let gateway = MockGateway::start().await;
        gateway.script_operation("op-1", &["RUNNING", "FINISHED"]);
        gateway.set_jobs(serde_json::json!({
            "jobs": [{ "id": "job-123", "status": "RUNNING" }]
        }));

        let job_id = gateway
            .client()
            .deploy_sql_job("test-job", &pipeline_statements())
            .await
            .unwrap();

        assert_eq!(job_id, "job-123");
        assert_eq!(gateway.submitted_statements(), pipeline_statements());
        assert_eq!(gateway.status_polls("op-1"), 2);
        assert_eq!(gateway.status_polls("op-2"), 1);
        assert_eq!(gateway.status_polls("op-3"), 1);
        assert_eq!(gateway.closed_sessions(), vec!["s1".to_string()]);
    }

    #[tokio::test]
    async fn test_deploy_stops_at_failing_statement() {
        let gateway = MockGateway::start().await;
        gateway.script_operation("op-2", &["ERROR"]);

        let err = gateway
            .client()
            .deploy_sql_job("test-job", &pipeline_statements())
            .await
            .unwrap_err();

        assert_eq!(err.failed_statement(), Some(2));
        let submitted = gateway.submitted_statements();
        assert_eq!(submitted.len(), 2);
        assert!(!submitted.contains(&pipeline_statements()[2]));
        assert_eq!(gateway.job_list_calls(), 0);
    }

    #[tokio::test]
    async fn test_deploy_rejected_statement_reports_index() {
        let gateway = MockGateway::start().await;
        gateway.reject_statement(3);

        let err = gateway
            .client()
            .deploy_sql_job("test-job", &pipeline_statements())
            .await
            .unwrap_err();

        assert!(
            matches!(err, ClientError::Deployment { statement: 3, total: 3, .. }),
            "got: {err:?}"
        );
    }

    #[tokio::test]
    async fn test_deploy_operation_never_finishes() {
        let gateway = MockGateway::start().await;
        gateway.script_operation("op-1", &["RUNNING"; 10]);

        let err = gateway
            .client()
            .deploy_sql_job("test-job", &pipeline_statements())
            .await
            .unwrap_err();

        assert_eq!(err.failed_statement(), Some(1));
        // The test poll policy allows three probes
        assert_eq!(gateway.status_polls("op-1"), 3);
        assert_eq!(gateway.submitted_statements().len(), 1);
    }

    #[tokio::test]
    async fn test_deploy_job_not_found() {
        let gateway = MockGateway::start().await;
        gateway.set_jobs(serde_json::json!({ "jobs": [] }));

        let err = gateway
            .client()
            .deploy_sql_job("test-job", &pipeline_statements())
            .await
            .unwrap_err();

        assert!(matches!(err, ClientError::JobNotFound(ref name) if name == "test-job"));
        assert_eq!(gateway.job_list_calls(), 3);
    }

    #[tokio::test]
    async fn test_deploy_prefers_exact_name_match() {
        let gateway = MockGateway::start().await;
        gateway.set_jobs(serde_json::json!({
            "jobs": [
                { "jid": "job-other", "state": "RUNNING", "name": "other", "start-time": 3000 },
                { "jid": "job-old", "state": "CANCELED", "name": "test-job", "start-time": 1000 },
                { "jid": "job-new", "state": "RUNNING", "name": "test-job", "start-time": 2000 }
            ]
        }));

        let job_id = gateway
            .client()
            .deploy_sql_job("test-job", &pipeline_statements())
            .await
            .unwrap();

        assert_eq!(job_id, "job-new");
    }

    #[tokio::test]
    async fn test_deploy_empty_statement_list() {
        let gateway = MockGateway::start().await;

        let err = gateway.client().deploy_sql_job("test-job", &[]).await.unwrap_err();

        assert!(matches!(err, ClientError::Deployment { statement: 0, .. }));
        assert_eq!(gateway.request_count(), 0);
    }

    #[tokio::test]
    async fn test_deploy_unreachable_cluster() {
        let client = MockGateway::unreachable_client().await;

        let err = client
            .deploy_sql_job("test-job", &pipeline_statements())
            .await
            .unwrap_err();

        assert!(err.is_unavailable(), "got: {err:?}");
    }
}
