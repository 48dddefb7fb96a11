//! End-to-end inference run: fetch → load → score → publish → cleanup

use crate::config::AppConfig;
use crate::dataset::DatasetLoader;
use crate::error::{PipelineError, RunError, Stage, StageExt};
use crate::fetcher::{ArtifactFetcher, ModelKeys};
use crate::metrics::RunMetrics;
use crate::models::{ModelLoader, RankingEngine};
use crate::output::{output_file_name, OutputWriter};
use crate::publisher::{cleanup_local, ArtifactPublisher};
use crate::storage::ObjectStore;
use chrono::{Local, NaiveDateTime};
use std::path::PathBuf;
use tracing::{error, info, info_span};
use uuid::Uuid;

/// Outcome of a successful run
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub run_id: Uuid,
    /// Key the output table was published under
    pub output_key: String,
    pub rows: usize,
    pub metrics: RunMetrics,
}

/// One model, one batch, one output per run.
///
/// Local artifacts are only removed after the output is published and
/// verified; any failure leaves model, metadata and output in place.
pub struct InferencePipeline<S: ObjectStore> {
    config: AppConfig,
    store: S,
    loader: ModelLoader,
    dataset_loader: DatasetLoader,
    engine: RankingEngine,
    writer: OutputWriter,
}

impl<S: ObjectStore> InferencePipeline<S> {
    pub fn new(config: AppConfig, store: S) -> Result<Self, PipelineError> {
        config.validate()?;
        let engine = RankingEngine::new(config.ranking.top_k)?;
        let dataset_loader = DatasetLoader::new(config.ranking.id_column.clone())
            .with_infer_schema_length(config.artifacts.infer_schema_rows);
        let writer = OutputWriter::new(config.output.include_index);
        let loader = ModelLoader::with_threads(config.artifacts.onnx_threads);

        Ok(Self {
            config,
            store,
            loader,
            dataset_loader,
            engine,
            writer,
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Run with the current local time as the run timestamp
    pub fn run(&self) -> Result<RunSummary, RunError> {
        self.run_at(Local::now().naive_local())
    }

    /// Run with an injected timestamp
    pub fn run_at(&self, run_at: NaiveDateTime) -> Result<RunSummary, RunError> {
        let run_id = Uuid::new_v4();
        let span = info_span!("run", run_id = %run_id);
        let _guard = span.enter();

        info!(timestamp = %run_at, "Cluster inference started");
        let result = self.execute(run_id, run_at);
        if let Err(e) = &result {
            error!(
                stage = %e.stage,
                error = %e.source,
                "Cluster inference failed, local artifacts kept"
            );
        }
        result
    }

    fn execute(&self, run_id: Uuid, run_at: NaiveDateTime) -> Result<RunSummary, RunError> {
        let mut metrics = RunMetrics::new();
        let artifacts = &self.config.artifacts;

        let keys = ModelKeys::from_config(&self.config.storage, artifacts);
        let fetcher = ArtifactFetcher::new(&self.store, &artifacts.models_dir);
        let fetched = metrics
            .time(Stage::Fetch, || fetcher.fetch_model(&keys))
            .stage(Stage::Fetch)?;

        let model = metrics
            .time(Stage::LoadModel, || {
                self.loader.load(&fetched.model_path, &fetched.metadata_path)
            })
            .stage(Stage::LoadModel)?;

        let batch = metrics
            .time(Stage::LoadDataset, || {
                self.dataset_loader.load_csv(&artifacts.data_path)
            })
            .stage(Stage::LoadDataset)?;

        let table = metrics
            .time(Stage::Rank, || self.engine.score(&model, &batch, run_at))
            .stage(Stage::Rank)?;
        metrics.record_table(&table);

        let file_name = output_file_name(run_at);
        let output_path = metrics
            .time(Stage::WriteOutput, || {
                self.writer.write(&table, &artifacts.output_dir, &file_name)
            })
            .stage(Stage::WriteOutput)?;

        let publisher = ArtifactPublisher::new(&self.store, &self.config.storage.output_prefix);
        let output_key = metrics
            .time(Stage::Publish, || publisher.publish(&output_path))
            .stage(Stage::Publish)?;

        let transient: Vec<PathBuf> = vec![output_path, fetched.model_path, fetched.metadata_path];
        metrics
            .time(Stage::Cleanup, || cleanup_local(&transient))
            .stage(Stage::Cleanup)?;
        info!(files = transient.len(), "Removed local artifacts");

        metrics.log_summary();

        Ok(RunSummary {
            run_id,
            output_key,
            rows: table.len(),
            metrics,
        })
    }
}
