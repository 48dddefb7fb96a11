//! Object store contract and local file helpers

pub mod fs;

pub use fs::FsObjectStore;

use crate::error::{PipelineError, Result};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Remote blob storage the pipeline fetches artifacts from and publishes to.
///
/// Implementations own their transport; retries and credentials are their
/// concern, not the pipeline's.
pub trait ObjectStore {
    /// Download `key` into `local_dir`, returning the local file path
    fn fetch(&self, key: &str, local_dir: &Path) -> Result<PathBuf>;

    /// Upload `local_path` to `key`
    fn store(&self, local_path: &Path, key: &str) -> Result<()>;

    /// Whether an object exists at `key`
    fn exists(&self, key: &str) -> Result<bool>;
}

impl<S: ObjectStore + ?Sized> ObjectStore for &S {
    fn fetch(&self, key: &str, local_dir: &Path) -> Result<PathBuf> {
        (**self).fetch(key, local_dir)
    }

    fn store(&self, local_path: &Path, key: &str) -> Result<()> {
        (**self).store(local_path, key)
    }

    fn exists(&self, key: &str) -> Result<bool> {
        (**self).exists(key)
    }
}

/// Remove a local file. A file that is already gone is not an error.
pub fn delete_local(path: &Path) -> Result<()> {
    match std::fs::remove_file(path) {
        Ok(()) => {
            debug!(path = %path.display(), "Removed local artifact");
            Ok(())
        }
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(PipelineError::load(path, format!("cannot remove: {e}"))),
    }
}

/// Join a key prefix and an object name with a single `/`
pub fn join_key(prefix: &str, name: &str) -> String {
    let prefix = prefix.trim_matches('/');
    let name = name.trim_start_matches('/');
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{prefix}/{name}")
    }
}

/// Last path segment of a key
pub fn key_file_name(key: &str) -> &str {
    key.rsplit('/').next().unwrap_or(key)
}
