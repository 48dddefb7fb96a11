//! Model metadata: the feature list and labels a model was trained with

use crate::error::{PipelineError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::path::Path;

/// Metadata shipped next to a model artifact
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelMetadata {
    /// Feature columns in the order the model expects them
    pub features: Vec<String>,

    /// Class labels, required by models that do not carry their own
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub classes: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_version: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trained_at: Option<String>,

    /// Fields this pipeline does not interpret
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

impl ModelMetadata {
    /// Metadata with only a feature list
    pub fn with_features<I, S>(features: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            features: features.into_iter().map(Into::into).collect(),
            classes: None,
            model_name: None,
            model_version: None,
            trained_at: None,
            extra: serde_json::Map::new(),
        }
    }

    /// Parse and validate metadata from a local JSON file
    pub fn from_path(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| PipelineError::load(path, e))?;
        Self::from_json(&text, path)
    }

    /// Parse and validate metadata; `path` is only used for error context
    pub fn from_json(text: &str, path: &Path) -> Result<Self> {
        let value: Value = serde_json::from_str(text)
            .map_err(|e| PipelineError::load(path, format!("invalid JSON: {e}")))?;

        match value.get("features") {
            Some(Value::Array(_)) => {}
            Some(_) => {
                return Err(PipelineError::schema(path, "'features' must be a list of column names"))
            }
            None => return Err(PipelineError::schema(path, "missing required field 'features'")),
        }

        let metadata: Self =
            serde_json::from_value(value).map_err(|e| PipelineError::schema(path, e))?;
        metadata.validate(path)?;
        Ok(metadata)
    }

    fn validate(&self, path: &Path) -> Result<()> {
        if self.features.is_empty() {
            return Err(PipelineError::schema(path, "feature list is empty"));
        }
        let mut seen = HashSet::new();
        for feature in &self.features {
            if !seen.insert(feature.as_str()) {
                return Err(PipelineError::schema(
                    path,
                    format!("feature '{feature}' is listed more than once"),
                ));
            }
        }
        if matches!(&self.classes, Some(classes) if classes.is_empty()) {
            return Err(PipelineError::schema(path, "class list is empty"));
        }
        Ok(())
    }
}
