//! Error taxonomy for the cluster inference pipeline

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Result alias for stage-level operations
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Failure raised by a single pipeline component.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Remote fetch/store failure
    #[error("transfer of '{key}' failed: {reason}")]
    Transfer { key: String, reason: String },

    /// Local artifact is missing, corrupt or unreadable
    #[error("failed to load {}: {reason}", path.display())]
    Load { path: PathBuf, reason: String },

    /// Artifact was readable but its structure is not usable
    #[error("schema error in {}: {reason}", path.display())]
    Schema { path: PathBuf, reason: String },

    #[error("shape mismatch: expected {expected}, got {actual}")]
    ShapeMismatch { expected: String, actual: String },

    /// Record batch lacks feature columns the model requires
    #[error("record batch is missing required feature columns: {}", missing.join(", "))]
    FeatureMismatch { missing: Vec<String> },

    #[error("record batch has no rows to score")]
    EmptyBatch,

    #[error("top-k must be at least 1, got {0}")]
    InvalidTopK(usize),

    #[error("configuration error: {0}")]
    Config(String),
}

impl PipelineError {
    pub fn transfer(key: impl Into<String>, reason: impl fmt::Display) -> Self {
        Self::Transfer {
            key: key.into(),
            reason: reason.to_string(),
        }
    }

    pub fn load(path: impl Into<PathBuf>, reason: impl fmt::Display) -> Self {
        Self::Load {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub fn schema(path: impl Into<PathBuf>, reason: impl fmt::Display) -> Self {
        Self::Schema {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub fn shape(expected: impl fmt::Display, actual: impl fmt::Display) -> Self {
        Self::ShapeMismatch {
            expected: expected.to_string(),
            actual: actual.to_string(),
        }
    }
}

/// Pipeline stage a failure originated from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Fetch,
    LoadModel,
    LoadDataset,
    Rank,
    WriteOutput,
    Publish,
    Cleanup,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Fetch => "fetch",
            Stage::LoadModel => "load-model",
            Stage::LoadDataset => "load-dataset",
            Stage::Rank => "rank",
            Stage::WriteOutput => "write-output",
            Stage::Publish => "publish",
            Stage::Cleanup => "cleanup",
        };
        f.write_str(name)
    }
}

/// Run-level failure: the originating stage plus the original cause.
#[derive(Debug, Error)]
#[error("inference run failed during {stage} stage")]
pub struct RunError {
    pub stage: Stage,
    #[source]
    pub source: PipelineError,
}

impl RunError {
    pub fn new(stage: Stage, source: PipelineError) -> Self {
        Self { stage, source }
    }
}

/// Attach a [`Stage`] to a stage-level result.
pub trait StageExt<T> {
    fn stage(self, stage: Stage) -> std::result::Result<T, RunError>;
}

impl<T> StageExt<T> for Result<T> {
    fn stage(self, stage: Stage) -> std::result::Result<T, RunError> {
        self.map_err(|source| RunError::new(stage, source))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_run_error_keeps_cause() {
        let err: std::result::Result<(), _> = Err(PipelineError::FeatureMismatch {
            missing: vec!["recency".to_string(), "frequency".to_string()],
        });
        let run_err = err.stage(Stage::Rank).unwrap_err();

        assert_eq!(run_err.stage, Stage::Rank);
        assert_eq!(
            run_err.to_string(),
            "inference run failed during rank stage"
        );
        let cause = run_err.source().unwrap().to_string();
        assert!(cause.contains("recency, frequency"));
    }

    #[test]
    fn test_error_messages() {
        let err = PipelineError::transfer("models/cluster_pipeline.json", "not found");
        assert_eq!(
            err.to_string(),
            "transfer of 'models/cluster_pipeline.json' failed: not found"
        );
        assert_eq!(
            PipelineError::InvalidTopK(0).to_string(),
            "top-k must be at least 1, got 0"
        );
    }
}
