//! In-process mock of the cluster's REST gateway for tests
//!
//! Serves the session, statement, job and savepoint endpoints on an ephemeral
//! local port and records every call. Operation and savepoint statuses can be
//! scripted per handle; unscripted operations report `FINISHED` right away.

use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde_json::{Value, json};

use crate::{ClusterConfig, FlinkClient, PollPolicy};

type Shared = Arc<Mutex<GatewayState>>;

#[derive(Default)]
struct GatewayState {
    requests: Vec<String>,
    statements: Vec<String>,
    rejected_statement: Option<usize>,
    operation_scripts: HashMap<String, VecDeque<String>>,
    status_polls: HashMap<String, usize>,
    closed_sessions: Vec<String>,
    jobs: Value,
    job_list_calls: usize,
    job_states: HashMap<String, String>,
    cancelled_jobs: Vec<String>,
    savepoint_requests: Vec<Value>,
    savepoint_script: VecDeque<Value>,
    savepoint_polls: usize,
}

pub(crate) struct MockGateway {
    addr: SocketAddr,
    state: Shared,
}

impl MockGateway {
    pub async fn start() -> Self {
        let state: Shared = Arc::new(Mutex::new(GatewayState {
            jobs: json!({ "jobs": [{ "id": "job-1", "status": "RUNNING" }] }),
            ..Default::default()
        }));

        let app = Router::new()
            .route("/v1/sessions", post(open_session))
            .route("/v1/sessions/{session}", axum::routing::delete(close_session))
            .route("/v1/sessions/{session}/statements", post(submit_statement))
            .route(
                "/v1/sessions/{session}/operations/{operation}/status",
                get(operation_status),
            )
            .route("/v1/jobs", get(list_jobs))
            .route("/v1/jobs/{job}", get(job_details).delete(cancel_job))
            .route("/v1/jobs/{job}/savepoints", post(trigger_savepoint))
            .route("/v1/jobs/{job}/savepoints/{trigger}", get(savepoint_status))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { addr, state }
    }

    /// Client configured with short polling: three probes, 5ms apart
    pub fn client(&self) -> FlinkClient {
        FlinkClient::new(test_config(self.addr.port())).unwrap()
    }

    /// Client pointing at a port nothing listens on
    pub async fn unreachable_client() -> FlinkClient {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);
        FlinkClient::new(test_config(port)).unwrap()
    }

    pub fn script_operation(&self, operation: &str, statuses: &[&str]) {
        self.lock().operation_scripts.insert(
            operation.to_string(),
            statuses.iter().map(|s| s.to_string()).collect(),
        );
    }

    /// Makes the gateway reject the n-th (1-based) submitted statement
    pub fn reject_statement(&self, position: usize) {
        self.lock().rejected_statement = Some(position);
    }

    pub fn set_jobs(&self, jobs: Value) {
        self.lock().jobs = jobs;
    }

    pub fn set_job_state(&self, job_id: &str, state: &str) {
        self.lock()
            .job_states
            .insert(job_id.to_string(), state.to_string());
    }

    pub fn script_savepoint(&self, bodies: Vec<Value>) {
        self.lock().savepoint_script = bodies.into();
    }

    pub fn submitted_statements(&self) -> Vec<String> {
        self.lock().statements.clone()
    }

    pub fn status_polls(&self, operation: &str) -> usize {
        self.lock().status_polls.get(operation).copied().unwrap_or(0)
    }

    pub fn closed_sessions(&self) -> Vec<String> {
        self.lock().closed_sessions.clone()
    }

    pub fn job_list_calls(&self) -> usize {
        self.lock().job_list_calls
    }

    pub fn cancelled_jobs(&self) -> Vec<String> {
        self.lock().cancelled_jobs.clone()
    }

    pub fn savepoint_requests(&self) -> Vec<Value> {
        self.lock().savepoint_requests.clone()
    }

    pub fn savepoint_polls(&self) -> usize {
        self.lock().savepoint_polls
    }

    pub fn request_count(&self) -> usize {
        self.lock().requests.len()
    }

    pub fn requests(&self) -> Vec<String> {
        self.lock().requests.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, GatewayState> {
        self.state.lock().unwrap()
    }
}

fn test_config(port: u16) -> ClusterConfig {
    let mut config = ClusterConfig::new("127.0.0.1", port)
        .with_poll_policy(PollPolicy::new(Duration::from_millis(5), 3));
    config.request_timeout = Duration::from_secs(5);
    config.savepoint_dir = Some("file:///tmp/savepoints".to_string());
    config.deploy_timeout = Some(Duration::from_secs(10));
    config
}

// =============================================================================
// Handlers
// =============================================================================

async fn open_session(State(state): State<Shared>) -> Json<Value> {
    let mut state = state.lock().unwrap();
    state.requests.push("POST /sessions".to_string());
    Json(json!({ "session_handle": "s1" }))
}

async fn close_session(State(state): State<Shared>, Path(session): Path<String>) -> Json<Value> {
    let mut state = state.lock().unwrap();
    state.requests.push(format!("DELETE /sessions/{session}"));
    state.closed_sessions.push(session);
    Json(json!({ "status": "CLOSED" }))
}

async fn submit_statement(
    State(state): State<Shared>,
    Path(session): Path<String>,
    Json(body): Json<Value>,
) -> Response {
    let mut state = state.lock().unwrap();
    state
        .requests
        .push(format!("POST /sessions/{session}/statements"));
    let statement = body["statement"].as_str().unwrap_or_default().to_string();
    state.statements.push(statement);

    let position = state.statements.len();
    if state.rejected_statement == Some(position) {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "errors": ["SQL validation failed"] })),
        )
            .into_response();
    }

    Json(json!({ "operation_handle": format!("op-{position}") })).into_response()
}

async fn operation_status(
    State(state): State<Shared>,
    Path((session, operation)): Path<(String, String)>,
) -> Json<Value> {
    let mut state = state.lock().unwrap();
    state
        .requests
        .push(format!("GET /sessions/{session}/operations/{operation}/status"));
    *state.status_polls.entry(operation.clone()).or_default() += 1;

    let status = state
        .operation_scripts
        .get_mut(&operation)
        .and_then(|script| script.pop_front())
        .unwrap_or_else(|| "FINISHED".to_string());

    Json(json!({ "status": status }))
}

async fn list_jobs(State(state): State<Shared>) -> Json<Value> {
    let mut state = state.lock().unwrap();
    state.requests.push("GET /jobs".to_string());
    state.job_list_calls += 1;
    Json(state.jobs.clone())
}

async fn job_details(State(state): State<Shared>, Path(job): Path<String>) -> Response {
    let mut state = state.lock().unwrap();
    state.requests.push(format!("GET /jobs/{job}"));

    match state.job_states.get(&job) {
        Some(job_state) => Json(json!({ "jid": job, "name": "test-job", "state": job_state }))
            .into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({ "errors": ["Job could not be found."] })),
        )
            .into_response(),
    }
}

async fn cancel_job(State(state): State<Shared>, Path(job): Path<String>) -> Response {
    let mut state = state.lock().unwrap();
    state.requests.push(format!("DELETE /jobs/{job}"));
    state.cancelled_jobs.push(job);
    (StatusCode::ACCEPTED, Json(json!({}))).into_response()
}

async fn trigger_savepoint(
    State(state): State<Shared>,
    Path(job): Path<String>,
    Json(body): Json<Value>,
) -> Json<Value> {
    let mut state = state.lock().unwrap();
    state.requests.push(format!("POST /jobs/{job}/savepoints"));
    state.savepoint_requests.push(body);
    Json(json!({ "request-id": "trigger-1" }))
}

async fn savepoint_status(
    State(state): State<Shared>,
    Path((job, trigger)): Path<(String, String)>,
) -> Json<Value> {
    let mut state = state.lock().unwrap();
    state
        .requests
        .push(format!("GET /jobs/{job}/savepoints/{trigger}"));
    state.savepoint_polls += 1;

    let body = state
        .savepoint_script
        .pop_front()
        .unwrap_or_else(|| json!({ "status": { "id": "IN_PROGRESS" } }));
    Json(body)
}
