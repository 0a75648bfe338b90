//! Repository Module
//!
//! Persistence layer for the gateway. Pipelines are stored as one JSON
//! record per pipeline inside the workspace directory.

pub mod pipeline;

use async_trait::async_trait;
use cdc_core::domain::pipeline::Pipeline;
use thiserror::Error;

pub use pipeline::FileRepository;

/// Repository error type
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("pipeline '{0}' not found")]
    NotFound(String),

    #[error("pipeline '{0}' already exists")]
    AlreadyExists(String),

    #[error("'{0}' is not a valid pipeline id")]
    InvalidId(String),

    #[error("workspace I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("pipeline record could not be encoded: {0}")]
    Encoding(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, RepositoryError>;

/// Durable store of pipeline records, keyed by pipeline id
#[async_trait]
pub trait PipelineRepository: Send + Sync {
    /// Stores a new record; fails with `AlreadyExists` when the id is taken
    async fn insert(&self, pipeline: &Pipeline) -> Result<()>;

    /// Creates or replaces the record for `pipeline.id`
    async fn save(&self, pipeline: &Pipeline) -> Result<()>;

    async fn load(&self, id: &str) -> Result<Pipeline>;

    /// All readable records, newest first
    async fn list_all(&self) -> Result<Vec<Pipeline>>;

    async fn delete(&self, id: &str) -> Result<()>;

    /// Number of stored records, readable or not
    async fn count(&self) -> Result<usize>;
}
