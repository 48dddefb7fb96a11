//! Seed Bucket
//!
//! Writes a demo cluster model, its metadata and a random record batch so the
//! inference pipeline can be run locally against the filesystem store.
//!
//! Usage: `seed-bucket [rows] [seed]`

use anyhow::{Context, Result};
use cluster_inference::config::AppConfig;
use cluster_inference::fetcher::ModelKeys;
use cluster_inference::models::classifier::{
    ClusterModelArtifact, EstimatorArtifact, ScalerArtifact,
};
use cluster_inference::models::ModelMetadata;
use cluster_inference::{FsObjectStore, ObjectStore};
use polars::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::fs::{self, File};
use std::path::Path;
use tracing::info;

/// Customer segment in raw recency/frequency/monetary units
struct Segment {
    label: &'static str,
    recency: f64,
    frequency: f64,
    monetary: f64,
}

const SEGMENTS: [Segment; 4] = [
    Segment { label: "champions", recency: 5.0, frequency: 40.0, monetary: 5000.0 },
    Segment { label: "loyal", recency: 30.0, frequency: 15.0, monetary: 1500.0 },
    Segment { label: "at_risk", recency: 120.0, frequency: 6.0, monetary: 600.0 },
    Segment { label: "hibernating", recency: 300.0, frequency: 1.0, monetary: 80.0 },
];

const FEATURES: [&str; 3] = ["recency", "frequency", "monetary"];

// Rough spread of each feature across the customer base
const MEAN: [f64; 3] = [114.0, 15.5, 1795.0];
const SCALE: [f64; 3] = [115.0, 15.0, 1950.0];

fn build_model() -> ClusterModelArtifact {
    let centroids: Vec<Vec<f64>> = SEGMENTS
        .iter()
        .map(|s| {
            [s.recency, s.frequency, s.monetary]
                .iter()
                .zip(MEAN.iter().zip(SCALE.iter()))
                .map(|(value, (mean, scale))| (value - mean) / scale)
                .collect::<Vec<f64>>()
        })
        .collect();

    ClusterModelArtifact {
        format_version: 1,
        classes: SEGMENTS.iter().map(|s| s.label.to_string()).collect(),
        scaler: Some(ScalerArtifact {
            mean: MEAN.to_vec(),
            scale: SCALE.to_vec(),
        }),
        estimator: EstimatorArtifact::CentroidSoftmax {
            centroids,
            temperature: 0.5,
        },
    }
}

fn build_batch(rows: usize, rng: &mut StdRng) -> Result<DataFrame> {
    let mut ids = Vec::with_capacity(rows);
    let mut columns: [Vec<f64>; 3] = Default::default();

    for i in 0..rows {
        let segment = &SEGMENTS[rng.gen_range(0..SEGMENTS.len())];
        ids.push(format!("cust_{:06}", i + 1));
        let centers = [segment.recency, segment.frequency, segment.monetary];
        for (column, center) in columns.iter_mut().zip(centers) {
            let jitter: f64 = rng.gen_range(0.6..1.4);
            column.push((center * jitter).max(0.0));
        }
    }

    let [recency, frequency, monetary] = columns;
    DataFrame::new(vec![
        Series::new("id", ids),
        Series::new(FEATURES[0], recency),
        Series::new(FEATURES[1], frequency),
        Series::new(FEATURES[2], monetary),
    ])
    .context("Failed to assemble record batch")
}

fn write_json<T: serde::Serialize>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("seed_bucket=info".parse()?),
        )
        .init();

    let args: Vec<String> = std::env::args().collect();
    let rows: usize = args.get(1).and_then(|s| s.parse().ok()).unwrap_or(200);
    let seed: u64 = args.get(2).and_then(|s| s.parse().ok()).unwrap_or(42);

    let config = AppConfig::load()?;
    let store = FsObjectStore::new(&config.storage.root, &config.storage.bucket);
    let keys = ModelKeys::from_config(&config.storage, &config.artifacts);

    info!(rows = rows, seed = seed, bucket = %config.storage.bucket, "Seeding demo artifacts");

    let staging = staging_dir(&config.artifacts.models_dir)?;
    let model_path = staging.join(&config.artifacts.model_file);
    let metadata_path = staging.join("metadata.json");

    write_json(&model_path, &build_model())?;
    let mut metadata = ModelMetadata::with_features(FEATURES);
    metadata.model_name = Some("rfm_segments".to_string());
    metadata.model_version = Some("demo".to_string());
    write_json(&metadata_path, &metadata)?;

    store.store(&model_path, &keys.model)?;
    store.store(&metadata_path, &keys.metadata)?;
    fs::remove_dir_all(&staging)?;
    info!(model = %keys.model, metadata = %keys.metadata, "Model published");

    let mut rng = StdRng::seed_from_u64(seed);
    let mut batch = build_batch(rows, &mut rng)?;
    let data_path = &config.artifacts.data_path;
    if let Some(parent) = data_path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut file = File::create(data_path)
        .with_context(|| format!("Failed to create {}", data_path.display()))?;
    CsvWriter::new(&mut file).include_header(true).finish(&mut batch)?;
    info!(path = %data_path.display(), rows = rows, "Record batch written");

    Ok(())
}

/// Scratch directory next to the local models directory
fn staging_dir(models_dir: &Path) -> Result<std::path::PathBuf> {
    let dir = models_dir.join(".seed-staging");
    fs::create_dir_all(&dir).with_context(|| format!("Failed to create {}", dir.display()))?;
    Ok(dir)
}
