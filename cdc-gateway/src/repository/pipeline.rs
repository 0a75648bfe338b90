//! Pipeline Repository
//!
//! File-backed store: `<workspace>/<id>.json`, one pretty-printed record per
//! pipeline. Writes go to a temporary sibling first and are renamed into
//! place, so a reader never observes a half-written record.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use cdc_core::domain::pipeline::Pipeline;
use cdc_core::sql::is_valid_id;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::{PipelineRepository, RepositoryError, Result};

const RECORD_EXTENSION: &str = "json";

/// Pipeline records stored in a workspace directory
#[derive(Debug)]
pub struct FileRepository {
    workspace: PathBuf,
    // Serializes writers so that insert's existence check and write are atomic
    write_lock: Mutex<()>,
}

impl FileRepository {
    /// Opens the workspace, creating the directory when missing
    pub async fn open(workspace: impl Into<PathBuf>) -> Result<Self> {
        let workspace = workspace.into();
        tokio::fs::create_dir_all(&workspace).await?;

        Ok(Self {
            workspace,
            write_lock: Mutex::new(()),
        })
    }

    pub fn workspace(&self) -> &Path {
        &self.workspace
    }

    fn record_path(&self, id: &str) -> Result<PathBuf> {
        if !is_valid_id(id) {
            return Err(RepositoryError::InvalidId(id.to_string()));
        }
        Ok(self.workspace.join(format!("{id}.{RECORD_EXTENSION}")))
    }

    async fn write_record(&self, path: &Path, pipeline: &Pipeline) -> Result<()> {
        let json = serde_json::to_vec_pretty(pipeline)?;
        let tmp = path.with_extension(format!("{RECORD_EXTENSION}.tmp"));

        tokio::fs::write(&tmp, json).await?;
        if let Err(e) = tokio::fs::rename(&tmp, path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e.into());
        }

        debug!("Wrote pipeline record {}", path.display());
        Ok(())
    }

    async fn record_paths(&self) -> Result<Vec<PathBuf>> {
        let mut entries = tokio::fs::read_dir(&self.workspace).await?;
        let mut paths = Vec::new();

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) == Some(RECORD_EXTENSION) {
                paths.push(path);
            }
        }

        Ok(paths)
    }
}

#[async_trait]
impl PipelineRepository for FileRepository {
    async fn insert(&self, pipeline: &Pipeline) -> Result<()> {
        let path = self.record_path(&pipeline.id)?;
        let _guard = self.write_lock.lock().await;

        if tokio::fs::try_exists(&path).await? {
            return Err(RepositoryError::AlreadyExists(pipeline.id.clone()));
        }

        self.write_record(&path, pipeline).await
    }

    async fn save(&self, pipeline: &Pipeline) -> Result<()> {
        let path = self.record_path(&pipeline.id)?;
        let _guard = self.write_lock.lock().await;

        self.write_record(&path, pipeline).await
    }

    async fn load(&self, id: &str) -> Result<Pipeline> {
        let path = self.record_path(id)?;

        let raw = match tokio::fs::read(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(RepositoryError::NotFound(id.to_string()));
            }
            Err(e) => return Err(e.into()),
        };

        Ok(serde_json::from_slice(&raw)?)
    }

    async fn list_all(&self) -> Result<Vec<Pipeline>> {
        let mut pipelines = Vec::new();

        for path in self.record_paths().await? {
            let parsed = match tokio::fs::read(&path).await {
                Ok(raw) => serde_json::from_slice::<Pipeline>(&raw).map_err(RepositoryError::from),
                // Deleted between listing and reading
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => Err(e.into()),
            };

            match parsed {
                Ok(pipeline) => pipelines.push(pipeline),
                Err(e) => warn!("Skipping unreadable pipeline record {}: {}", path.display(), e),
            }
        }

        pipelines.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(pipelines)
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let path = self.record_path(id)?;
        let _guard = self.write_lock.lock().await;

        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(RepositoryError::NotFound(id.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.record_paths().await?.len())
    }
}
