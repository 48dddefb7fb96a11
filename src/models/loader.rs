//! Model and metadata loader

use crate::error::{PipelineError, Result};
use crate::models::classifier::{Classifier, ClusterModelArtifact, NativeClassifier};
use crate::models::metadata::ModelMetadata;
use std::path::Path;
use tracing::info;

/// On-disk model encodings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelFormat {
    /// JSON [`ClusterModelArtifact`]
    Native,
    /// ONNX graph scored through ONNX Runtime
    Onnx,
}

impl ModelFormat {
    /// Pick the format from the file extension
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("onnx") => ModelFormat::Onnx,
            _ => ModelFormat::Native,
        }
    }
}

/// A deserialized model together with its metadata
pub struct LoadedModel {
    /// Model name, from metadata or the file stem
    pub name: String,
    pub classifier: Box<dyn Classifier>,
    pub metadata: ModelMetadata,
}

impl LoadedModel {
    pub fn classes(&self) -> &[String] {
        self.classifier.classes()
    }

    /// Feature columns in model input order
    pub fn features(&self) -> &[String] {
        &self.metadata.features
    }
}

impl std::fmt::Debug for LoadedModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadedModel")
            .field("name", &self.name)
            .field("classes", &self.classes())
            .field("features", &self.features())
            .finish()
    }
}

/// Loader for cluster models
pub struct ModelLoader {
    /// Intra-op threads for ONNX inference
    onnx_threads: usize,
}

impl ModelLoader {
    pub fn new() -> Self {
        Self::with_threads(1)
    }

    /// Create a loader with a specific ONNX thread count
    pub fn with_threads(onnx_threads: usize) -> Self {
        Self {
            onnx_threads: onnx_threads.max(1),
        }
    }

    /// Load a model and its metadata from local files
    pub fn load<P: AsRef<Path>, Q: AsRef<Path>>(
        &self,
        model_path: P,
        metadata_path: Q,
    ) -> Result<LoadedModel> {
        let model_path = model_path.as_ref();
        let metadata_path = metadata_path.as_ref();

        let metadata = ModelMetadata::from_path(metadata_path)?;
        let format = ModelFormat::from_path(model_path);

        info!(
            path = %model_path.display(),
            format = ?format,
            features = metadata.features.len(),
            "Loading model"
        );

        let classifier: Box<dyn Classifier> = match format {
            ModelFormat::Native => Box::new(self.load_native(model_path)?),
            ModelFormat::Onnx => self.load_onnx(model_path, &metadata)?,
        };

        if let Some(n_features) = classifier.n_features() {
            if n_features != metadata.features.len() {
                return Err(PipelineError::schema(
                    metadata_path,
                    format!(
                        "metadata lists {} features but the model expects {n_features}",
                        metadata.features.len()
                    ),
                ));
            }
        }

        if let Some(declared) = &metadata.classes {
            if declared.as_slice() != classifier.classes() {
                return Err(PipelineError::schema(
                    metadata_path,
                    format!(
                        "metadata classes {declared:?} disagree with model classes {:?}",
                        classifier.classes()
                    ),
                ));
            }
        }

        let name = metadata
            .model_name
            .clone()
            .or_else(|| {
                model_path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .and_then(|n| n.split('.').next())
                    .map(str::to_string)
            })
            .unwrap_or_else(|| "cluster_model".to_string());

        info!(
            model = %name,
            classes = ?classifier.classes(),
            "Model loaded successfully"
        );

        Ok(LoadedModel {
            name,
            classifier,
            metadata,
        })
    }

    fn load_native(&self, path: &Path) -> Result<NativeClassifier> {
        let text = std::fs::read_to_string(path).map_err(|e| PipelineError::load(path, e))?;
        let artifact: ClusterModelArtifact = serde_json::from_str(&text)
            .map_err(|e| PipelineError::load(path, format!("corrupt model artifact: {e}")))?;
        NativeClassifier::from_artifact(artifact, path)
    }

    #[cfg(feature = "onnx")]
    fn load_onnx(&self, path: &Path, metadata: &ModelMetadata) -> Result<Box<dyn Classifier>> {
        let classes = metadata.classes.clone().ok_or_else(|| {
            PipelineError::schema(path, "ONNX models need a 'classes' list in their metadata")
        })?;
        let model = crate::models::onnx::OnnxClassifier::load(path, classes, self.onnx_threads)?;
        Ok(Box::new(model))
    }

    #[cfg(not(feature = "onnx"))]
    fn load_onnx(&self, path: &Path, _metadata: &ModelMetadata) -> Result<Box<dyn Classifier>> {
        tracing::warn!(
            path = %path.display(),
            threads = self.onnx_threads,
            "ONNX model requested but support is not compiled in"
        );
        Err(PipelineError::load(
            path,
            "ONNX models require the 'onnx' feature",
        ))
    }
}

impl Default for ModelLoader {
    fn default() -> Self {
        Self::new()
    }
}
