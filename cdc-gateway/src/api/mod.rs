//! API Module
//!
//! HTTP API layer for the gateway.
//! Each submodule handles endpoints for a specific concern.

pub mod error;
pub mod health;
pub mod pipeline;

use std::sync::Arc;

use axum::{
    Router, middleware,
    routing::{get, post},
};
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::trace::TraceLayer;

use crate::telemetry::track_requests;
use crate::service::PipelineService;

/// Shared state of the pipeline API
#[derive(Clone)]
pub struct AppState {
    pub pipelines: Arc<PipelineService>,
}

/// Shared state of the admin API
#[derive(Clone)]
pub struct AdminState {
    pub pipelines: Arc<PipelineService>,
    pub prometheus: PrometheusHandle,
    pub workspace: String,
    pub jobmanager: String,
    pub jobmanager_port: u16,
}

/// Create the pipeline API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/api/v1/health", get(health::health_check))
        // Pipeline endpoints
        .route(
            "/api/v1/pipelines",
            get(pipeline::list_pipelines).post(pipeline::create_pipeline),
        )
        .route("/api/v1/pipelines/import", post(pipeline::import_pipelines))
        .route(
            "/api/v1/pipelines/{id}",
            get(pipeline::get_pipeline)
                .put(pipeline::update_pipeline)
                .delete(pipeline::delete_pipeline),
        )
        .route("/api/v1/pipelines/{id}/start", post(pipeline::start_pipeline))
        .route("/api/v1/pipelines/{id}/stop", post(pipeline::stop_pipeline))
        .route("/api/v1/pipelines/{id}/status", get(pipeline::pipeline_status))
        // Add state and middleware
        .route_layer(middleware::from_fn(track_requests))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// Create the admin router
pub fn create_admin_router(state: AdminState) -> Router {
    Router::new()
        .route("/health", get(health::admin_health))
        .route("/info", get(health::info))
        .route("/metrics", get(health::prometheus_scrape))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::FileRepository;
    use cdc_flink::{ClusterConfig, FlinkClient, PollPolicy};
    use metrics_exporter_prometheus::PrometheusBuilder;
    use serde_json::{Value, json};
    use std::time::Duration;

    struct TestApi {
        _dir: tempfile::TempDir,
        pipelines: Arc<PipelineService>,
        http: reqwest::Client,
    }

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}")
    }

    /// Service backed by a temp workspace and a cluster nobody listens on
    async fn test_api() -> TestApi {
        let dir = tempfile::tempdir().unwrap();
        let repository = Arc::new(FileRepository::open(dir.path()).await.unwrap());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);
        let config = ClusterConfig::new("127.0.0.1", port)
            .with_poll_policy(PollPolicy::new(Duration::from_millis(5), 1));
        let cluster = Arc::new(FlinkClient::new(config).unwrap());

        TestApi {
            _dir: dir,
            pipelines: Arc::new(PipelineService::new(repository, cluster)),
            http: reqwest::Client::new(),
        }
    }

    fn definition(id: &str) -> Value {
        json!({
            "name": "orders",
            "id": id,
            "source": {
                "table": "orders_src",
                "connector": "datagen",
                "columns": [{ "name": "id", "type": "BIGINT" }]
            },
            "sink": { "table": "orders_sink", "connector": "print" }
        })
    }

    #[tokio::test]
    async fn test_health() {
        let api = test_api().await;
        let base = serve(create_router(AppState {
            pipelines: api.pipelines.clone(),
        }))
        .await;

        let response = api
            .http
            .get(format!("{base}/api/v1/health"))
            .send()
            .await
            .unwrap();

        assert_eq!(response.status(), 200);
        let body: Value = response.json().await.unwrap();
        assert_eq!(body["status"], "OK");
    }

    #[tokio::test]
    async fn test_pipeline_lifecycle_status_codes() {
        let api = test_api().await;
        let base = serve(create_router(AppState {
            pipelines: api.pipelines.clone(),
        }))
        .await;
        let pipelines = format!("{base}/api/v1/pipelines");

        let created = api.http.post(&pipelines).json(&definition("orders")).send().await.unwrap();
        assert_eq!(created.status(), 201);
        let body: Value = created.json().await.unwrap();
        assert_eq!(body["status"], "CREATED");

        let duplicate = api.http.post(&pipelines).json(&definition("orders")).send().await.unwrap();
        assert_eq!(duplicate.status(), 400);
        let body: Value = duplicate.json().await.unwrap();
        assert!(body["error"].as_str().unwrap().contains("already exists"));

        let listed: Value = api.http.get(&pipelines).send().await.unwrap().json().await.unwrap();
        assert_eq!(listed.as_array().unwrap().len(), 1);

        let stop = api.http.post(format!("{pipelines}/orders/stop")).send().await.unwrap();
        assert_eq!(stop.status(), 409);

        // Nothing listens on the cluster port
        let start = api.http.post(format!("{pipelines}/orders/start")).send().await.unwrap();
        assert_eq!(start.status(), 500);

        let status: Value = api
            .http
            .get(format!("{pipelines}/orders/status"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(status["status"], "FAILED");
        assert!(status["last_error"].is_string());

        let deleted = api.http.delete(format!("{pipelines}/orders")).send().await.unwrap();
        assert_eq!(deleted.status(), 204);

        let missing = api.http.get(format!("{pipelines}/orders")).send().await.unwrap();
        assert_eq!(missing.status(), 404);
        let body: Value = missing.json().await.unwrap();
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn test_invalid_bodies_are_bad_requests() {
        let api = test_api().await;
        let base = serve(create_router(AppState {
            pipelines: api.pipelines.clone(),
        }))
        .await;

        let malformed = api
            .http
            .post(format!("{base}/api/v1/pipelines"))
            .header("content-type", "application/json")
            .body("{ not json")
            .send()
            .await
            .unwrap();
        assert_eq!(malformed.status(), 400);
        let body: Value = malformed.json().await.unwrap();
        assert!(body["error"].is_string());

        let invalid = api
            .http
            .post(format!("{base}/api/v1/pipelines"))
            .json(&json!({ "name": "" }))
            .send()
            .await
            .unwrap();
        assert_eq!(invalid.status(), 400);
    }

    #[tokio::test]
    async fn test_import() {
        let api = test_api().await;
        let base = serve(create_router(AppState {
            pipelines: api.pipelines.clone(),
        }))
        .await;

        let response = api
            .http
            .post(format!("{base}/api/v1/pipelines/import"))
            .json(&json!({ "pipelines": [definition("a"), { "name": "broken" }] }))
            .send()
            .await
            .unwrap();

        assert_eq!(response.status(), 201);
        let outcomes: Value = response.json().await.unwrap();
        assert_eq!(outcomes[0]["status"], "created");
        assert_eq!(outcomes[1]["name"], "broken");
        assert!(outcomes[1]["error"].is_string());
    }

    #[tokio::test]
    async fn test_admin_endpoints() {
        let api = test_api().await;
        api.pipelines
            .create_pipeline(serde_json::from_value(definition("orders")).unwrap())
            .await
            .unwrap();
        let base = serve(create_admin_router(AdminState {
            pipelines: api.pipelines.clone(),
            prometheus: PrometheusBuilder::new().build_recorder().handle(),
            workspace: "/tmp/pipelines".to_string(),
            jobmanager: "localhost".to_string(),
            jobmanager_port: 8081,
        }))
        .await;

        let health: Value = api
            .http
            .get(format!("{base}/health"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(health["status"], "UP");

        let info: Value = api
            .http
            .get(format!("{base}/info"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(info["pipelines"]["total"], 1);
        assert_eq!(info["flink"]["port"], 8081);

        let metrics = api.http.get(format!("{base}/metrics")).send().await.unwrap();
        assert_eq!(metrics.status(), 200);
    }
}
