//! Artifact fetcher: pulls the model and its metadata into the local working area

use crate::config::{ArtifactsConfig, StorageConfig};
use crate::error::{PipelineError, Result};
use crate::storage::{join_key, ObjectStore};
use std::path::PathBuf;
use tracing::info;

/// Remote keys of a model and its metadata
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelKeys {
    pub model: String,
    pub metadata: String,
}

impl ModelKeys {
    /// `<prefix>/<model_file>` and `<prefix>/<stem>.json`, where the stem is
    /// the model file name up to its first `.`
    pub fn new(prefix: &str, model_file: &str) -> Self {
        let stem = model_file.split('.').next().unwrap_or(model_file);
        Self {
            model: join_key(prefix, model_file),
            metadata: join_key(prefix, &format!("{stem}.json")),
        }
    }

    pub fn from_config(storage: &StorageConfig, artifacts: &ArtifactsConfig) -> Self {
        Self::new(&storage.model_prefix, &artifacts.model_file)
    }
}

/// Local copies of a fetched model and its metadata
#[derive(Debug, Clone)]
pub struct FetchedModel {
    pub model_path: PathBuf,
    pub metadata_path: PathBuf,
}

/// Fetches objects from a store into a local directory
pub struct ArtifactFetcher<'a, S: ObjectStore + ?Sized> {
    store: &'a S,
    local_dir: PathBuf,
}

impl<'a, S: ObjectStore + ?Sized> ArtifactFetcher<'a, S> {
    pub fn new(store: &'a S, local_dir: impl Into<PathBuf>) -> Self {
        Self {
            store,
            local_dir: local_dir.into(),
        }
    }

    /// Fetch one object and confirm it landed locally
    pub fn fetch(&self, key: &str) -> Result<PathBuf> {
        let path = self.store.fetch(key, &self.local_dir)?;
        if !path.is_file() {
            return Err(PipelineError::transfer(
                key,
                format!("fetched file {} is missing", path.display()),
            ));
        }
        Ok(path)
    }

    /// Fetch the model and then its metadata
    pub fn fetch_model(&self, keys: &ModelKeys) -> Result<FetchedModel> {
        info!(
            model = %keys.model,
            metadata = %keys.metadata,
            dir = %self.local_dir.display(),
            "Downloading model from object store"
        );
        let model_path = self.fetch(&keys.model)?;
        let metadata_path = self.fetch(&keys.metadata)?;
        Ok(FetchedModel {
            model_path,
            metadata_path,
        })
    }
}
