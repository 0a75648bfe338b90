//! Gateway configuration
//!
//! Loaded once at startup from a YAML file, then adjusted by environment
//! overrides. Every field has a default so a missing file still yields a
//! usable local setup.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use cdc_flink::{ClusterConfig, PollPolicy};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Gateway configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub flink: FlinkSettings,
    pub api: ApiSettings,
    pub admin: AdminSettings,
    pub pipelines: WorkspaceSettings,
}

/// Connection to the cluster's REST gateway
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FlinkSettings {
    pub jobmanager: String,

    /// REST port
    pub port: u16,

    pub savepoint_dir: Option<String>,
    pub request_timeout_secs: u64,
    pub poll_interval_ms: u64,

    /// Status probes per submitted statement
    pub max_poll_attempts: u32,

    /// Job list probes after the last statement finished
    pub job_lookup_attempts: u32,

    pub savepoint_poll_attempts: u32,

    /// Deadline for a whole deployment; `null` disables it
    pub deploy_timeout_secs: Option<u64>,
}

/// Listener of the pipeline API
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiSettings {
    pub host: String,
    pub port: u16,
}

/// Listener of the admin API
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdminSettings {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkspaceSettings {
    pub workspace: PathBuf,
}

impl Default for FlinkSettings {
    fn default() -> Self {
        Self {
            jobmanager: "localhost".to_string(),
            port: 8081,
            savepoint_dir: None,
            request_timeout_secs: 30,
            poll_interval_ms: 1000,
            max_poll_attempts: 60,
            job_lookup_attempts: 30,
            savepoint_poll_attempts: 120,
            deploy_timeout_secs: Some(900),
        }
    }
}

impl ApiSettings {
    /// Socket address to bind, e.g. `0.0.0.0:8083`
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8083,
        }
    }
}

impl AdminSettings {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for AdminSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8084,
        }
    }
}

impl Default for WorkspaceSettings {
    fn default() -> Self {
        Self {
            workspace: PathBuf::from("/opt/flink-cdc/pipelines"),
        }
    }
}

impl GatewayConfig {
    /// Loads the configuration file and applies environment overrides
    ///
    /// A missing file falls back to the defaults with a warning; a file that
    /// exists but does not parse is an error.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let mut config = if path.exists() {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read config file {}", path.display()))?;
            Self::from_yaml(&raw)
                .with_context(|| format!("failed to parse config file {}", path.display()))?
        } else {
            warn!("Config file {} not found, using defaults", path.display());
            Self::default()
        };

        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;

        Ok(config)
    }

    pub fn from_yaml(raw: &str) -> anyhow::Result<Self> {
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(raw)?)
    }

    /// Applies overrides looked up by variable name
    ///
    /// Recognized variables:
    /// - FLINK_JOBMANAGER_HOST
    /// - FLINK_JOBMANAGER_PORT
    /// - CDC_GATEWAY_PORT
    /// - CDC_GATEWAY_ADMIN_PORT
    /// - CDC_GATEWAY_WORKSPACE
    pub fn apply_overrides<F>(&mut self, lookup: F) -> anyhow::Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("FLINK_JOBMANAGER_HOST") {
            self.flink.jobmanager = host;
        }
        if let Some(port) = lookup("FLINK_JOBMANAGER_PORT") {
            self.flink.port = parse_port("FLINK_JOBMANAGER_PORT", &port)?;
        }
        if let Some(port) = lookup("CDC_GATEWAY_PORT") {
            self.api.port = parse_port("CDC_GATEWAY_PORT", &port)?;
        }
        if let Some(port) = lookup("CDC_GATEWAY_ADMIN_PORT") {
            self.admin.port = parse_port("CDC_GATEWAY_ADMIN_PORT", &port)?;
        }
        if let Some(workspace) = lookup("CDC_GATEWAY_WORKSPACE") {
            self.pipelines.workspace = PathBuf::from(workspace);
        }

        Ok(())
    }

    /// Validates the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.flink.jobmanager.trim().is_empty() {
            anyhow::bail!("flink.jobmanager cannot be empty");
        }

        if self.flink.port == 0 || self.api.port == 0 || self.admin.port == 0 {
            anyhow::bail!("ports must be greater than 0");
        }

        if self.api.bind_addr() == self.admin.bind_addr() {
            anyhow::bail!("api and admin listeners must use different addresses");
        }

        if self.pipelines.workspace.as_os_str().is_empty() {
            anyhow::bail!("pipelines.workspace cannot be empty");
        }

        if self.flink.poll_interval_ms == 0 {
            anyhow::bail!("flink.pollIntervalMs must be greater than 0");
        }

        if self.flink.max_poll_attempts == 0
            || self.flink.job_lookup_attempts == 0
            || self.flink.savepoint_poll_attempts == 0
        {
            anyhow::bail!("poll attempts must be greater than 0");
        }

        Ok(())
    }

    /// Settings for the cluster client
    pub fn cluster_config(&self) -> ClusterConfig {
        let flink = &self.flink;
        let interval = Duration::from_millis(flink.poll_interval_ms);

        let mut cluster = ClusterConfig::new(flink.jobmanager.clone(), flink.port);
        cluster.request_timeout = Duration::from_secs(flink.request_timeout_secs);
        cluster.savepoint_dir = flink.savepoint_dir.clone();
        cluster.operation_poll = PollPolicy::new(interval, flink.max_poll_attempts);
        cluster.job_lookup_poll = PollPolicy::new(interval, flink.job_lookup_attempts);
        cluster.savepoint_poll = PollPolicy::new(interval, flink.savepoint_poll_attempts);
        cluster.deploy_timeout = flink.deploy_timeout_secs.map(Duration::from_secs);
        cluster
    }
}

fn parse_port(variable: &str, value: &str) -> anyhow::Result<u16> {
    value
        .trim()
        .parse::<u16>()
        .with_context(|| format!("{} is not a valid port: {}", variable, value))
}
