//! Record batch loading and feature alignment.
//!
//! The batch is read with Polars; feature columns are pulled out in the
//! exact order the model metadata lists them, regardless of their order in
//! the file.

use crate::error::{PipelineError, Result};
use ndarray::Array2;
use polars::prelude::*;
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::info;

/// Batch of customer records to score
#[derive(Debug, Clone)]
pub struct RecordBatch {
    frame: DataFrame,
    id_column: String,
    source: PathBuf,
}

impl RecordBatch {
    /// Wrap an in-memory frame; `id_column` must name a column of `frame`
    pub fn from_frame(frame: DataFrame, id_column: &str, source: impl Into<PathBuf>) -> Result<Self> {
        let source = source.into();
        if frame.column(id_column).is_err() {
            return Err(PipelineError::schema(
                &source,
                format!("id column '{id_column}' not found"),
            ));
        }
        Ok(Self {
            frame,
            id_column: id_column.to_string(),
            source,
        })
    }

    /// Number of records
    pub fn len(&self) -> usize {
        self.frame.height()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// File the batch was read from
    pub fn source(&self) -> &Path {
        &self.source
    }

    /// Record identifiers, rendered as strings, in row order
    pub fn ids(&self) -> Result<Vec<String>> {
        let column = self
            .frame
            .column(&self.id_column)
            .and_then(|c| c.cast(&DataType::String))
            .map_err(|e| PipelineError::load(&self.source, e))?;
        let values = column.str().map_err(|e| PipelineError::load(&self.source, e))?;

        values
            .into_iter()
            .enumerate()
            .map(|(row, id)| {
                id.map(str::to_string).ok_or_else(|| {
                    PipelineError::load(
                        &self.source,
                        format!("row {row} has no value in id column '{}'", self.id_column),
                    )
                })
            })
            .collect()
    }

    /// Feature columns the batch lacks, in the order they were requested
    pub fn missing_features(&self, features: &[String]) -> Vec<String> {
        features
            .iter()
            .filter(|name| self.frame.column(name.as_str()).is_err())
            .cloned()
            .collect()
    }

    /// Build the `(records, features)` matrix in `features` order.
    ///
    /// Fails with [`PipelineError::FeatureMismatch`] naming every absent
    /// column before any value is read.
    pub fn feature_matrix(&self, features: &[String]) -> Result<Array2<f64>> {
        let missing = self.missing_features(features);
        if !missing.is_empty() {
            return Err(PipelineError::FeatureMismatch { missing });
        }

        let rows = self.len();
        let mut matrix = Array2::zeros((rows, features.len()));
        for (col_idx, name) in features.iter().enumerate() {
            let column = self
                .frame
                .column(name)
                .and_then(|c| c.cast(&DataType::Float64))
                .map_err(|e| PipelineError::load(&self.source, e))?;
            let values = column.f64().map_err(|e| PipelineError::load(&self.source, e))?;

            for (row, value) in values.into_iter().enumerate() {
                matrix[[row, col_idx]] = value.ok_or_else(|| {
                    PipelineError::load(
                        &self.source,
                        format!("row {row} has a missing or non-numeric value in feature '{name}'"),
                    )
                })?;
            }
        }
        Ok(matrix)
    }
}

/// Reads record batches from CSV files
pub struct DatasetLoader {
    id_column: String,
    /// Rows used for schema inference; `None` scans the whole file
    infer_schema_length: Option<usize>,
}

impl DatasetLoader {
    pub fn new(id_column: impl Into<String>) -> Self {
        Self {
            id_column: id_column.into(),
            infer_schema_length: None,
        }
    }

    /// Limit how many rows Polars samples to infer column types.
    ///
    /// A sampled prefix can settle on `i64` for a column that holds a decimal
    /// or a text id further down, which then fails the whole load.
    pub fn with_infer_schema_length(mut self, rows: Option<usize>) -> Self {
        self.infer_schema_length = rows.map(|n| n.max(1));
        self
    }

    /// Load a CSV file with a header row
    pub fn load_csv<P: AsRef<Path>>(&self, path: P) -> Result<RecordBatch> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| PipelineError::load(path, e))?;

        let frame = CsvReadOptions::default()
            .with_has_header(true)
            .with_infer_schema_length(self.infer_schema_length)
            .into_reader_with_file_handle(file)
            .finish()
            .map_err(|e| PipelineError::load(path, e))?;

        info!(
            path = %path.display(),
            rows = frame.height(),
            columns = frame.width(),
            "Record batch loaded"
        );

        RecordBatch::from_frame(frame, &self.id_column, path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_test_csv(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{contents}").unwrap();
        file
    }

    fn features(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_load_and_align_features() {
        let file = create_test_csv("monetary,id,recency,segment\n500.5,c1,10,a\n20.0,c2,3,b\n");
        let batch = DatasetLoader::new("id").load_csv(file.path()).unwrap();

        assert_eq!(batch.len(), 2);
        assert_eq!(batch.ids().unwrap(), vec!["c1", "c2"]);

        let matrix = batch.feature_matrix(&features(&["recency", "monetary"])).unwrap();
        assert_eq!(matrix.shape(), &[2, 2]);
        assert_eq!(matrix[[0, 0]], 10.0);
        assert_eq!(matrix[[0, 1]], 500.5);
        assert_eq!(matrix[[1, 0]], 3.0);
    }

    #[test]
    fn test_numeric_ids_are_rendered_as_strings() {
        let file = create_test_csv("id,x\n17850,1.0\n13047,2.0\n");
        let batch = DatasetLoader::new("id").load_csv(file.path()).unwrap();
        assert_eq!(batch.ids().unwrap(), vec!["17850", "13047"]);
    }

    #[test]
    fn test_missing_features_reported_together() {
        let file = create_test_csv("id,recency\nc1,1\n");
        let batch = DatasetLoader::new("id").load_csv(file.path()).unwrap();

        let err = batch
            .feature_matrix(&features(&["frequency", "recency", "monetary"]))
            .unwrap_err();
        match err {
            PipelineError::FeatureMismatch { missing } => {
                assert_eq!(missing, vec!["frequency", "monetary"]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_missing_id_column() {
        let file = create_test_csv("customer,recency\nc1,1\n");
        let err = DatasetLoader::new("id").load_csv(file.path()).unwrap_err();
        assert!(matches!(err, PipelineError::Schema { .. }));
    }

    #[test]
    fn test_non_numeric_feature_is_load_error() {
        let file = create_test_csv("id,recency\nc1,1\nc2,\n");
        let batch = DatasetLoader::new("id").load_csv(file.path()).unwrap();

        let err = batch.feature_matrix(&features(&["recency"])).unwrap_err();
        assert!(matches!(err, PipelineError::Load { .. }));
    }

    #[test]
    fn test_unreadable_file() {
        let err = DatasetLoader::new("id")
            .load_csv("/nonexistent/processed_data.csv")
            .unwrap_err();
        assert!(matches!(err, PipelineError::Load { .. }));
    }

    #[test]
    fn test_header_only_file_is_empty() {
        let file = create_test_csv("id,recency\n");
        let batch = DatasetLoader::new("id").load_csv(file.path()).unwrap();
        assert!(batch.is_empty());
    }

    fn late_typed_csv() -> NamedTempFile {
        let mut contents = String::from("id,monetary\n");
        for row in 0..150 {
            contents.push_str(&format!("{row},100\n"));
        }
        contents.push_str("cust_x,250.75\n");
        create_test_csv(&contents)
    }

    #[test]
    fn test_late_decimal_and_text_id_are_inferred() {
        let file = late_typed_csv();
        let batch = DatasetLoader::new("id").load_csv(file.path()).unwrap();
        assert_eq!(batch.len(), 151);
        assert_eq!(batch.source(), file.path());

        let ids = batch.ids().unwrap();
        assert_eq!(ids[0], "0");
        assert_eq!(ids[150], "cust_x");

        let matrix = batch.feature_matrix(&features(&["monetary"])).unwrap();
        assert_eq!(matrix[[0, 0]], 100.0);
        assert_eq!(matrix[[150, 0]], 250.75);
    }

    #[test]
    fn test_short_inference_sample_is_load_error() {
        let file = late_typed_csv();
        let err = DatasetLoader::new("id")
            .with_infer_schema_length(Some(10))
            .load_csv(file.path())
            .unwrap_err();
        assert!(matches!(err, PipelineError::Load { .. }));
    }
}
