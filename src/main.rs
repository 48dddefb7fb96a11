//! Cluster Inference - Main Entry Point
//!
//! Fetches the cluster model, scores the processed record batch and publishes
//! the ranked assignments. Exits non-zero with the failure cause on error.

use anyhow::{Context, Result};
use cluster_inference::{
    config::{AppConfig, LoggingConfig},
    FsObjectStore, InferencePipeline,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    let config = AppConfig::load()?;
    init_logging(&config.logging)?;

    info!("Starting cluster inference");
    info!(
        bucket = %config.storage.bucket,
        model_prefix = %config.storage.model_prefix,
        output_prefix = %config.storage.output_prefix,
        top_k = config.ranking.top_k,
        "Configuration loaded successfully"
    );

    let store = FsObjectStore::new(&config.storage.root, &config.storage.bucket);
    let pipeline = InferencePipeline::new(config, store).context("Invalid pipeline configuration")?;

    let summary = pipeline.run()?;
    info!(
        run_id = %summary.run_id,
        output_key = %summary.output_key,
        rows = summary.rows,
        "Cluster inference complete"
    );

    Ok(())
}

/// `RUST_LOG` takes precedence over the configured level
fn init_logging(logging: &LoggingConfig) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&logging.level)
            .with_context(|| format!("Invalid log level '{}'", logging.level))?,
    };

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match logging.format.as_str() {
        "json" => builder.json().init(),
        _ => builder.pretty().init(),
    }
    Ok(())
}
