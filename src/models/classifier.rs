//! Probabilistic cluster classifiers

use crate::error::{PipelineError, Result};
use ndarray::{Array1, Array2, ArrayView2, Axis};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

/// A pre-trained model that assigns class probabilities to records.
pub trait Classifier {
    /// Class labels, in the order of the probability matrix columns
    fn classes(&self) -> &[String];

    /// Number of input features, when the model declares it
    fn n_features(&self) -> Option<usize>;

    /// Score a `(records, features)` matrix into a `(records, classes)` matrix
    fn predict_proba(&self, features: ArrayView2<'_, f64>) -> Result<Array2<f64>>;
}

/// Serialized form of a native cluster model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterModelArtifact {
    #[serde(default = "default_format_version")]
    pub format_version: u32,
    pub classes: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scaler: Option<ScalerArtifact>,
    pub estimator: EstimatorArtifact,
}

fn default_format_version() -> u32 {
    1
}

/// Standard scaling applied before the estimator: `(x - mean) / scale`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScalerArtifact {
    pub mean: Vec<f64>,
    pub scale: Vec<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EstimatorArtifact {
    /// Soft assignment by softmax over negative squared centroid distances
    CentroidSoftmax {
        centroids: Vec<Vec<f64>>,
        #[serde(default = "default_temperature")]
        temperature: f64,
    },
    /// Softmax over per-class linear scores
    MultinomialLogistic {
        coefficients: Vec<Vec<f64>>,
        intercepts: Vec<f64>,
    },
}

fn default_temperature() -> f64 {
    1.0
}

#[derive(Debug, Clone)]
struct StandardScaler {
    mean: Array1<f64>,
    scale: Array1<f64>,
}

#[derive(Debug, Clone)]
enum Estimator {
    CentroidSoftmax {
        centroids: Array2<f64>,
        temperature: f64,
    },
    MultinomialLogistic {
        coefficients: Array2<f64>,
        intercepts: Array1<f64>,
    },
}

/// Validated, ready-to-score native model
#[derive(Debug, Clone)]
pub struct NativeClassifier {
    classes: Vec<String>,
    n_features: usize,
    scaler: Option<StandardScaler>,
    estimator: Estimator,
}

impl NativeClassifier {
    /// Validate an artifact read from `path`
    pub fn from_artifact(artifact: ClusterModelArtifact, path: &Path) -> Result<Self> {
        let schema = |reason: String| PipelineError::schema(path, reason);

        if artifact.format_version != 1 {
            return Err(schema(format!(
                "unsupported model format version {}",
                artifact.format_version
            )));
        }
        if artifact.classes.is_empty() {
            return Err(schema("model declares no classes".to_string()));
        }
        let mut seen = HashSet::new();
        if let Some(duplicate) = artifact.classes.iter().find(|c| !seen.insert(c.as_str())) {
            return Err(schema(format!("duplicate class label '{duplicate}'")));
        }
        let n_classes = artifact.classes.len();

        let (estimator, n_features) = match artifact.estimator {
            EstimatorArtifact::CentroidSoftmax {
                centroids,
                temperature,
            } => {
                if !(temperature.is_finite() && temperature > 0.0) {
                    return Err(schema(format!("temperature must be positive, got {temperature}")));
                }
                let centroids = to_matrix(centroids, n_classes, "centroids").map_err(schema)?;
                let n_features = centroids.ncols();
                (
                    Estimator::CentroidSoftmax {
                        centroids,
                        temperature,
                    },
                    n_features,
                )
            }
            EstimatorArtifact::MultinomialLogistic {
                coefficients,
                intercepts,
            } => {
                let coefficients =
                    to_matrix(coefficients, n_classes, "coefficients").map_err(schema)?;
                if intercepts.len() != n_classes {
                    return Err(schema(format!(
                        "expected {n_classes} intercepts, got {}",
                        intercepts.len()
                    )));
                }
                let n_features = coefficients.ncols();
                (
                    Estimator::MultinomialLogistic {
                        coefficients,
                        intercepts: Array1::from(intercepts),
                    },
                    n_features,
                )
            }
        };

        let scaler = match artifact.scaler {
            Some(scaler) => {
                if scaler.mean.len() != n_features || scaler.scale.len() != n_features {
                    return Err(schema(format!(
                        "scaler expects {} features, estimator expects {n_features}",
                        scaler.mean.len()
                    )));
                }
                // zero-variance features are left unscaled
                let scale = scaler
                    .scale
                    .into_iter()
                    .map(|s| if s == 0.0 { 1.0 } else { s })
                    .collect::<Array1<f64>>();
                Some(StandardScaler {
                    mean: Array1::from(scaler.mean),
                    scale,
                })
            }
            None => None,
        };

        Ok(Self {
            classes: artifact.classes,
            n_features,
            scaler,
            estimator,
        })
    }

    fn scores(&self, features: ArrayView2<'_, f64>) -> Array2<f64> {
        let scaled = match &self.scaler {
            Some(scaler) => (&features - &scaler.mean) / &scaler.scale,
            None => features.to_owned(),
        };

        match &self.estimator {
            Estimator::CentroidSoftmax {
                centroids,
                temperature,
            } => {
                let mut scores = Array2::zeros((scaled.nrows(), centroids.nrows()));
                for (record, mut out) in scaled.outer_iter().zip(scores.outer_iter_mut()) {
                    for (centroid, score) in centroids.outer_iter().zip(out.iter_mut()) {
                        let distance_sq: f64 = record
                            .iter()
                            .zip(centroid.iter())
                            .map(|(a, b)| (a - b).powi(2))
                            .sum();
                        *score = -distance_sq / temperature;
                    }
                }
                scores
            }
            Estimator::MultinomialLogistic {
                coefficients,
                intercepts,
            } => scaled.dot(&coefficients.t()) + intercepts,
        }
    }
}

impl Classifier for NativeClassifier {
    fn classes(&self) -> &[String] {
        &self.classes
    }

    fn n_features(&self) -> Option<usize> {
        Some(self.n_features)
    }

    fn predict_proba(&self, features: ArrayView2<'_, f64>) -> Result<Array2<f64>> {
        if features.ncols() != self.n_features {
            return Err(PipelineError::shape(
                format!("{} feature columns", self.n_features),
                format!("{} feature columns", features.ncols()),
            ));
        }
        let mut probabilities = self.scores(features);
        softmax_rows(&mut probabilities);
        Ok(probabilities)
    }
}

/// Row-wise softmax, shifted by the row maximum for numerical stability
pub fn softmax_rows(scores: &mut Array2<f64>) {
    for mut row in scores.axis_iter_mut(Axis(0)) {
        let max = row.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        row.mapv_inplace(|s| (s - max).exp());
        let total = row.sum();
        if total > 0.0 {
            row.mapv_inplace(|p| p / total);
        }
    }
}

fn to_matrix(rows: Vec<Vec<f64>>, n_classes: usize, name: &str) -> std::result::Result<Array2<f64>, String> {
    if rows.len() != n_classes {
        return Err(format!("expected {n_classes} {name} rows, got {}", rows.len()));
    }
    let width = rows.first().map(Vec::len).unwrap_or(0);
    if width == 0 {
        return Err(format!("{name} rows must not be empty"));
    }
    if rows.iter().any(|row| row.len() != width) {
        return Err(format!("{name} rows have inconsistent lengths"));
    }
    let flat: Vec<f64> = rows.into_iter().flatten().collect();
    Array2::from_shape_vec((n_classes, width), flat).map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn centroid_artifact() -> ClusterModelArtifact {
        ClusterModelArtifact {
            format_version: 1,
            classes: vec!["0".to_string(), "1".to_string(), "2".to_string()],
            scaler: None,
            estimator: EstimatorArtifact::CentroidSoftmax {
                centroids: vec![vec![0.0, 0.0], vec![5.0, 5.0], vec![10.0, 0.0]],
                temperature: 1.0,
            },
        }
    }

    #[test]
    fn test_centroid_probabilities() {
        let model = NativeClassifier::from_artifact(centroid_artifact(), Path::new("m.json")).unwrap();
        let probs = model
            .predict_proba(array![[0.1, 0.0], [9.0, 0.5]].view())
            .unwrap();

        assert_eq!(probs.shape(), &[2, 3]);
        for row in probs.outer_iter() {
            assert!((row.sum() - 1.0).abs() < 1e-9);
        }
        assert!(probs[[0, 0]] > probs[[0, 1]]);
        assert!(probs[[1, 2]] > probs[[1, 0]]);
    }

    #[test]
    fn test_logistic_with_scaler() {
        let artifact = ClusterModelArtifact {
            format_version: 1,
            classes: vec!["low".to_string(), "high".to_string()],
            scaler: Some(ScalerArtifact {
                mean: vec![10.0],
                scale: vec![0.0],
            }),
            estimator: EstimatorArtifact::MultinomialLogistic {
                coefficients: vec![vec![-1.0], vec![1.0]],
                intercepts: vec![0.0, 0.0],
            },
        };
        let model = NativeClassifier::from_artifact(artifact, Path::new("m.json")).unwrap();
        let probs = model.predict_proba(array![[12.0], [10.0]].view()).unwrap();

        assert!(probs[[0, 1]] > 0.95);
        assert!((probs[[1, 0]] - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_rejects_wrong_feature_count() {
        let model = NativeClassifier::from_artifact(centroid_artifact(), Path::new("m.json")).unwrap();
        let err = model.predict_proba(array![[1.0, 2.0, 3.0]].view()).unwrap_err();
        assert!(matches!(err, PipelineError::ShapeMismatch { .. }));
    }

    #[test]
    fn test_rejects_malformed_artifacts() {
        let mut ragged = centroid_artifact();
        ragged.estimator = EstimatorArtifact::CentroidSoftmax {
            centroids: vec![vec![0.0, 0.0], vec![1.0], vec![2.0, 2.0]],
            temperature: 1.0,
        };
        assert!(matches!(
            NativeClassifier::from_artifact(ragged, Path::new("m.json")),
            Err(PipelineError::Schema { .. })
        ));

        let mut duplicate = centroid_artifact();
        duplicate.classes[2] = "0".to_string();
        assert!(NativeClassifier::from_artifact(duplicate, Path::new("m.json")).is_err());

        let mut cold = centroid_artifact();
        cold.estimator = EstimatorArtifact::CentroidSoftmax {
            centroids: vec![vec![0.0], vec![1.0], vec![2.0]],
            temperature: 0.0,
        };
        assert!(NativeClassifier::from_artifact(cold, Path::new("m.json")).is_err());
    }

    #[test]
    fn test_softmax_is_stable_for_large_scores() {
        let mut scores = array![[1000.0, 1000.0], [-1000.0, 0.0]];
        softmax_rows(&mut scores);
        assert!((scores[[0, 0]] - 0.5).abs() < 1e-12);
        assert!(scores[[1, 1]] > 0.999);
    }
}
