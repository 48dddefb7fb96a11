//! Cluster model components

pub mod classifier;
pub mod loader;
pub mod metadata;
#[cfg(feature = "onnx")]
pub mod onnx;
pub mod ranking;

pub use classifier::{Classifier, ClusterModelArtifact, NativeClassifier};
pub use loader::{LoadedModel, ModelFormat, ModelLoader};
pub use metadata::ModelMetadata;
pub use ranking::{build_result_rows, rank_top_k, RankingEngine};
