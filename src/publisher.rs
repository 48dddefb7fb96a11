//! Artifact publisher: pushes the output table and cleans up local artifacts

use crate::error::{PipelineError, Result};
use crate::storage::{delete_local, join_key, key_file_name, ObjectStore};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Publishes local files under a key prefix
pub struct ArtifactPublisher<'a, S: ObjectStore + ?Sized> {
    store: &'a S,
    prefix: String,
}

impl<'a, S: ObjectStore + ?Sized> ArtifactPublisher<'a, S> {
    pub fn new(store: &'a S, prefix: &str) -> Self {
        Self {
            store,
            prefix: prefix.to_string(),
        }
    }

    /// Remote key a local file is published under
    pub fn key_for(&self, local_path: &Path) -> Result<String> {
        let name = local_path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| {
                PipelineError::transfer(
                    local_path.display().to_string(),
                    "local path has no usable file name",
                )
            })?;
        Ok(join_key(&self.prefix, name))
    }

    /// Upload `local_path`, then confirm the object is visible in the store.
    ///
    /// Returns the remote key. Nothing local is touched.
    pub fn publish(&self, local_path: &Path) -> Result<String> {
        let key = self.key_for(local_path)?;
        self.store.store(local_path, &key)?;

        if !self.store.exists(&key)? {
            return Err(PipelineError::transfer(
                &key,
                "object not visible after upload",
            ));
        }

        info!(
            key = %key,
            file = %key_file_name(&key),
            "Output saved to object store"
        );
        Ok(key)
    }
}

/// Remove local transient artifacts in order. Stops on the first failure.
pub fn cleanup_local(paths: &[PathBuf]) -> Result<()> {
    for path in paths {
        delete_local(path)?;
        debug!(path = %path.display(), "Local artifact removed");
    }
    Ok(())
}
