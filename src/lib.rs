//! Cluster Inference Pipeline Library
//!
//! Scores a batch of customer records against a pre-trained clustering model
//! and publishes the top-k ranked cluster assignments per record.

pub mod config;
pub mod dataset;
pub mod error;
pub mod fetcher;
pub mod metrics;
pub mod models;
pub mod output;
pub mod pipeline;
pub mod publisher;
pub mod storage;
pub mod types;

pub use config::AppConfig;
pub use dataset::{DatasetLoader, RecordBatch};
pub use error::{PipelineError, RunError, Stage};
pub use models::{build_result_rows, rank_top_k, LoadedModel, ModelLoader, RankingEngine};
pub use pipeline::{InferencePipeline, RunSummary};
pub use storage::{FsObjectStore, ObjectStore};
pub use types::{OutputTable, RankedResultRow};
