use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cdc_flink::FlinkClient;

use crate::api::{AdminState, AppState};
use crate::config::GatewayConfig;
use crate::repository::FileRepository;
use crate::service::PipelineService;

pub mod api;
pub mod config;
pub mod repository;
pub mod service;
pub mod telemetry;

/// REST gateway managing Flink CDC pipelines
#[derive(Debug, Parser)]
#[command(name = "cdc-gateway", version, about)]
struct Cli {
    /// Path to the YAML configuration file
    #[arg(
        long,
        env = "CONFIG_PATH",
        default_value = "/opt/flink-cdc/config/cdc-gateway-config.yaml"
    )]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cdc_gateway=info,cdc_flink=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting CDC Gateway...");

    let cli = Cli::parse();
    let config = GatewayConfig::load(&cli.config)?;
    tracing::info!(
        "Loaded configuration: jobmanager={}:{}",
        config.flink.jobmanager,
        config.flink.port
    );

    let prometheus = telemetry::install_recorder()?;

    let cluster = FlinkClient::new(config.cluster_config())
        .context("failed to build the cluster client")?;
    let repository = FileRepository::open(&config.pipelines.workspace)
        .await
        .with_context(|| {
            format!(
                "failed to open workspace {}",
                config.pipelines.workspace.display()
            )
        })?;
    tracing::info!("Using workspace {}", repository.workspace().display());

    let pipelines = Arc::new(PipelineService::new(Arc::new(repository), Arc::new(cluster)));

    let app = api::create_router(AppState {
        pipelines: pipelines.clone(),
    });
    let admin = api::create_admin_router(AdminState {
        pipelines,
        prometheus,
        workspace: config.pipelines.workspace.display().to_string(),
        jobmanager: config.flink.jobmanager.clone(),
        jobmanager_port: config.flink.port,
    });

    let api_addr = config.api.bind_addr();
    let admin_addr = config.admin.bind_addr();

    let api_listener = tokio::net::TcpListener::bind(&api_addr)
        .await
        .with_context(|| format!("failed to bind API listener to {}", api_addr))?;
    let admin_listener = tokio::net::TcpListener::bind(&admin_addr)
        .await
        .with_context(|| format!("failed to bind admin listener to {}", admin_addr))?;

    tracing::info!("API listening on {}", api_addr);
    tracing::info!("Admin listening on {}", admin_addr);

    tokio::try_join!(
        async { axum::serve(api_listener, app).await.context("API server failed") },
        async { axum::serve(admin_listener, admin).await.context("admin server failed") },
    )?;

    Ok(())
}
