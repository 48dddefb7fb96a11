//! Filesystem-backed object store

use crate::error::{PipelineError, Result};
use crate::storage::{key_file_name, ObjectStore};
use std::fs;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, info};

/// Object store that keeps every bucket as a directory under `root`.
///
/// Object `key` of bucket `b` lives at `<root>/<b>/<key>`.
#[derive(Debug, Clone)]
pub struct FsObjectStore {
    root: PathBuf,
    bucket: String,
}

impl FsObjectStore {
    /// Create a store over `bucket` rooted at `root`
    pub fn new(root: impl Into<PathBuf>, bucket: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            bucket: bucket.into(),
        }
    }

    /// Directory holding this store's bucket
    pub fn bucket_dir(&self) -> PathBuf {
        self.root.join(&self.bucket)
    }

    /// Resolve a key to its backing file, rejecting keys that escape the bucket
    pub fn object_path(&self, key: &str) -> Result<PathBuf> {
        let relative = Path::new(key);
        let valid = !key.is_empty()
            && relative
                .components()
                .all(|component| matches!(component, Component::Normal(_)));
        if !valid {
            return Err(PipelineError::transfer(key, "invalid object key"));
        }
        Ok(self.bucket_dir().join(relative))
    }
}

impl ObjectStore for FsObjectStore {
    fn fetch(&self, key: &str, local_dir: &Path) -> Result<PathBuf> {
        let source = self.object_path(key)?;
        if !source.is_file() {
            return Err(PipelineError::transfer(
                key,
                format!("no such object in bucket '{}'", self.bucket),
            ));
        }

        fs::create_dir_all(local_dir).map_err(|e| PipelineError::transfer(key, e))?;
        let destination = local_dir.join(key_file_name(key));
        let bytes = fs::copy(&source, &destination).map_err(|e| PipelineError::transfer(key, e))?;

        info!(
            bucket = %self.bucket,
            key = %key,
            path = %destination.display(),
            bytes = bytes,
            "Fetched object"
        );
        Ok(destination)
    }

    fn store(&self, local_path: &Path, key: &str) -> Result<()> {
        let destination = self.object_path(key)?;
        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent).map_err(|e| PipelineError::transfer(key, e))?;
        }
        let bytes =
            fs::copy(local_path, &destination).map_err(|e| PipelineError::transfer(key, e))?;

        info!(
            bucket = %self.bucket,
            key = %key,
            path = %local_path.display(),
            bytes = bytes,
            "Stored object"
        );
        Ok(())
    }

    fn exists(&self, key: &str) -> Result<bool> {
        let exists = self.object_path(key)?.is_file();
        debug!(bucket = %self.bucket, key = %key, exists = exists, "Checked object");
        Ok(exists)
    }
}
