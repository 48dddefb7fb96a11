//! Configuration management for the cluster inference pipeline

use crate::error::PipelineError;
use crate::fetcher::ModelKeys;
use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Default location of the configuration file
pub const DEFAULT_CONFIG_PATH: &str = "config/config.toml";

/// Environment variable overriding [`DEFAULT_CONFIG_PATH`]
pub const CONFIG_PATH_ENV: &str = "CLUSTER_INFERENCE_CONFIG";

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub storage: StorageConfig,
    pub artifacts: ArtifactsConfig,
    #[serde(default)]
    pub ranking: RankingConfig,
    #[serde(default)]
    pub output: OutputConfig,
    pub logging: LoggingConfig,
}

/// Object store layout
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Directory holding the buckets of the filesystem-backed store
    pub root: PathBuf,
    /// Bucket name
    pub bucket: String,
    /// Prefix holding the model and its metadata
    pub model_prefix: String,
    /// Prefix that published outputs are written under
    pub output_prefix: String,
}

/// Local working area
#[derive(Debug, Clone, Deserialize)]
pub struct ArtifactsConfig {
    /// Directory the model and metadata are downloaded into
    pub models_dir: PathBuf,
    /// Model file name under `storage.model_prefix`
    pub model_file: String,
    /// Record batch to score
    pub data_path: PathBuf,
    /// Directory the output table is written into before publishing
    pub output_dir: PathBuf,
    /// Intra-op threads for ONNX models
    #[serde(default = "default_onnx_threads")]
    pub onnx_threads: usize,
    /// Rows sampled to infer batch column types; unset scans the whole file
    #[serde(default)]
    pub infer_schema_rows: Option<usize>,
}

fn default_onnx_threads() -> usize {
    1
}

/// Ranking parameters
#[derive(Debug, Clone, Deserialize)]
pub struct RankingConfig {
    /// Number of clusters reported per record (main + alternatives)
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    /// Identity column of the record batch
    #[serde(default = "default_id_column")]
    pub id_column: String,
}

fn default_top_k() -> usize {
    3
}

fn default_id_column() -> String {
    "id".to_string()
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            id_column: default_id_column(),
        }
    }
}

/// Output table options
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Write the row index as a leading unnamed column
    #[serde(default = "default_include_index")]
    pub include_index: bool,
}

fn default_include_index() -> bool {
    true
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            include_index: default_include_index(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Log format (json, pretty)
    pub format: String,
}

impl AppConfig {
    /// Load configuration from [`CONFIG_PATH_ENV`] or the default path
    pub fn load() -> Result<Self> {
        let path = std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Self::load_from_path(path)
    }

    /// Load configuration from a specific path.
    ///
    /// Keys can be overridden with `CLUSTER_INFERENCE__<SECTION>__<KEY>`
    /// environment variables, e.g. `CLUSTER_INFERENCE__RANKING__TOP_K=5`.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config = Config::builder()
            .add_source(File::from(path.as_ref()))
            .add_source(
                Environment::with_prefix("CLUSTER_INFERENCE")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to build configuration")?;

        let config: Self = config
            .try_deserialize()
            .context("Failed to deserialize configuration")?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values that would make a run meaningless
    pub fn validate(&self) -> std::result::Result<(), PipelineError> {
        if self.ranking.top_k == 0 {
            return Err(PipelineError::InvalidTopK(0));
        }
        let required = [
            ("storage.bucket", self.storage.bucket.as_str()),
            ("artifacts.model_file", self.artifacts.model_file.as_str()),
            ("ranking.id_column", self.ranking.id_column.as_str()),
        ];
        for (name, value) in required {
            if value.trim().is_empty() {
                return Err(PipelineError::Config(format!("{name} must not be empty")));
            }
        }
        let keys = ModelKeys::from_config(&self.storage, &self.artifacts);
        if keys.model == keys.metadata {
            return Err(PipelineError::Config(format!(
                "artifacts.model_file '{}' collides with its metadata key '{}'",
                self.artifacts.model_file, keys.metadata
            )));
        }
        Ok(())
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            storage: StorageConfig {
                root: PathBuf::from("bucket"),
                bucket: "ml-artifacts".to_string(),
                model_prefix: "crm-project/models".to_string(),
                output_prefix: "crm-project/output".to_string(),
            },
            artifacts: ArtifactsConfig {
                models_dir: PathBuf::from("models"),
                model_file: "cluster_pipeline.model".to_string(),
                data_path: PathBuf::from("artifacts/clustering/processed_data.csv"),
                output_dir: PathBuf::from("output"),
                onnx_threads: default_onnx_threads(),
                infer_schema_rows: None,
            },
            ranking: RankingConfig::default(),
            output: OutputConfig::default(),
            logging: LoggingConfig {
                level: "info".to_string(),
                format: "pretty".to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::Builder;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.ranking.top_k, 3);
        assert_eq!(config.ranking.id_column, "id");
        assert_eq!(config.storage.model_prefix, "crm-project/models");
        assert!(config.output.include_index);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_from_path() {
        let mut file = Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[storage]
root = "/tmp/bucket"
bucket = "projects"
model_prefix = "crm/models"
output_prefix = "crm/output"

[artifacts]
models_dir = "models"
model_file = "cluster_pipeline.model"
data_path = "data.csv"
output_dir = "output"

[ranking]
top_k = 2

[logging]
level = "debug"
format = "json"
"#
        )
        .unwrap();

        let config = AppConfig::load_from_path(file.path()).unwrap();
        assert_eq!(config.storage.bucket, "projects");
        assert_eq!(config.ranking.top_k, 2);
        assert_eq!(config.ranking.id_column, "id");
        assert!(config.output.include_index);
        assert_eq!(config.logging.format, "json");
        assert_eq!(config.artifacts.onnx_threads, 1);
        assert_eq!(config.artifacts.infer_schema_rows, None);
    }

    #[test]
    fn test_validate_rejects_zero_top_k() {
        let mut config = AppConfig::default();
        config.ranking.top_k = 0;
        assert!(matches!(
            config.validate(),
            Err(PipelineError::InvalidTopK(0))
        ));

        let mut config = AppConfig::default();
        config.storage.bucket = " ".to_string();
        assert!(matches!(config.validate(), Err(PipelineError::Config(_))));
    }

    #[test]
    fn test_validate_rejects_json_model_file() {
        let mut config = AppConfig::default();
        config.artifacts.model_file = "cluster_pipeline.json".to_string();
        assert!(matches!(config.validate(), Err(PipelineError::Config(_))));

        config.artifacts.model_file = "cluster_pipeline.onnx".to_string();
        assert!(config.validate().is_ok());
    }
}
