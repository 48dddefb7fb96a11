//! ONNX Runtime backed classifier

use crate::error::{PipelineError, Result};
use crate::models::classifier::Classifier;
use ndarray::{Array2, ArrayView2};
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::Tensor;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use tracing::{debug, info};

/// Classifier exported to ONNX with a `(records, classes)` probability output
pub struct OnnxClassifier {
    path: PathBuf,
    session: RwLock<Session>,
    input_name: String,
    output_name: String,
    classes: Vec<String>,
}

impl OnnxClassifier {
    /// Load an ONNX model; `classes` label its probability columns
    pub fn load(path: &Path, classes: Vec<String>, threads: usize) -> Result<Self> {
        ort::init().commit().map_err(load_err(path))?;
        let session = Session::builder()
            .map_err(load_err(path))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(load_err(path))?
            .with_intra_threads(threads)
            .map_err(load_err(path))?
            .commit_from_file(path)
            .map_err(load_err(path))?;

        let input_name = session
            .inputs
            .first()
            .map(|i| i.name.clone())
            .unwrap_or_else(|| "float_input".to_string());

        let output_name = session
            .outputs
            .iter()
            .find(|o| o.name.contains("prob"))
            .map(|o| o.name.clone())
            .ok_or_else(|| PipelineError::schema(path, "model has no probability output"))?;

        info!(
            path = %path.display(),
            input = %input_name,
            output = %output_name,
            classes = classes.len(),
            "ONNX model loaded"
        );

        Ok(Self {
            path: path.to_path_buf(),
            session: RwLock::new(session),
            input_name,
            output_name,
            classes,
        })
    }
}

fn load_err<E: fmt::Display>(path: &Path) -> impl Fn(E) -> PipelineError + '_ {
    move |e| PipelineError::load(path, e)
}

fn infer_err<E: fmt::Display>(path: &Path) -> impl Fn(E) -> PipelineError + '_ {
    move |e| PipelineError::load(path, format!("inference failed: {e}"))
}

impl Classifier for OnnxClassifier {
    fn classes(&self) -> &[String] {
        &self.classes
    }

    fn n_features(&self) -> Option<usize> {
        None
    }

    fn predict_proba(&self, features: ArrayView2<'_, f64>) -> Result<Array2<f64>> {
        let (rows, cols) = features.dim();
        let data: Vec<f32> = features.iter().map(|&v| v as f32).collect();
        let input = Tensor::from_array((vec![rows as i64, cols as i64], data))
            .map_err(infer_err(&self.path))?;

        let mut session = self
            .session
            .write()
            .map_err(|e| PipelineError::load(&self.path, format!("lock error: {e}")))?;
        let outputs = session
            .run(ort::inputs![&self.input_name => input])
            .map_err(infer_err(&self.path))?;

        let output = outputs.get(&self.output_name).ok_or_else(|| {
            PipelineError::load(&self.path, format!("missing output '{}'", self.output_name))
        })?;
        let (shape, values) = output.try_extract_tensor::<f32>().map_err(infer_err(&self.path))?;
        let dims: Vec<i64> = shape.iter().copied().collect();

        let expected = [rows as i64, self.classes.len() as i64];
        if dims != expected {
            return Err(PipelineError::shape(
                format!("{expected:?} probability tensor"),
                format!("{dims:?}"),
            ));
        }

        debug!(rows = rows, classes = self.classes.len(), "ONNX inference complete");

        let values: Vec<f64> = values.iter().map(|&v| v as f64).collect();
        Array2::from_shape_vec((rows, self.classes.len()), values)
            .map_err(|e| PipelineError::shape(format!("{expected:?}"), e))
    }
}
