//! Output table serialization

use crate::error::{PipelineError, Result};
use crate::types::OutputTable;
use chrono::NaiveDateTime;
use polars::prelude::*;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use tracing::info;

/// Timestamp format embedded in output file names
pub const FILE_STAMP_FORMAT: &str = "%d%m%Y%Hh%Mm%Ss";

/// `cluster_inference_<DDMMYYYYHHhMMmSSs>.csv`
pub fn output_file_name(run_at: NaiveDateTime) -> String {
    format!("cluster_inference_{}.csv", run_at.format(FILE_STAMP_FORMAT))
}

/// Writes output tables as CSV
#[derive(Debug, Clone)]
pub struct OutputWriter {
    /// Write the 0-based row index as a leading unnamed column
    include_index: bool,
}

impl OutputWriter {
    pub fn new(include_index: bool) -> Self {
        Self { include_index }
    }

    /// Convert the table into a frame with the table's header as column names
    pub fn to_frame(&self, table: &OutputTable) -> Result<DataFrame> {
        let header = table.header();
        let mut columns = Vec::with_capacity(header.len() + 1);

        if self.include_index {
            let index: Vec<u64> = (0..table.len() as u64).collect();
            columns.push(Series::new("", index));
        }

        for (col_idx, name) in header.iter().enumerate() {
            let values: Vec<&str> = table
                .rows()
                .iter()
                .map(|row| match col_idx {
                    0 => row.date.as_str(),
                    1 => row.id.as_str(),
                    n => row.clusters[n - 2].as_str(),
                })
                .collect();
            columns.push(Series::new(name.as_str(), values));
        }

        DataFrame::new(columns)
            .map_err(|e| PipelineError::shape("equal-length output columns", e))
    }

    /// Write `table` to `dir/file_name`, creating `dir` if needed
    pub fn write(&self, table: &OutputTable, dir: &Path, file_name: &str) -> Result<PathBuf> {
        fs::create_dir_all(dir).map_err(|e| PipelineError::load(dir, e))?;
        let path = dir.join(file_name);

        let mut frame = self.to_frame(table)?;
        let mut file = File::create(&path).map_err(|e| PipelineError::load(&path, e))?;
        CsvWriter::new(&mut file)
            .include_header(true)
            .finish(&mut frame)
            .map_err(|e| PipelineError::load(&path, e))?;

        info!(
            path = %path.display(),
            rows = table.len(),
            "Output saved locally"
        );
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RankedResultRow;
    use chrono::NaiveDate;
    use tempfile::TempDir;

    fn run_at() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 7)
            .unwrap()
            .and_hms_opt(14, 5, 9)
            .unwrap()
    }

    fn table() -> OutputTable {
        let clusters = |names: &[&str]| -> Vec<String> { names.iter().map(|s| s.to_string()).collect() };
        OutputTable::new(
            2,
            vec![
                RankedResultRow::new(run_at(), "c1", clusters(&["X", "Y"])),
                RankedResultRow::new(run_at(), "c2", clusters(&["Z", "X"])),
            ],
        )
    }

    #[test]
    fn test_output_file_name() {
        assert_eq!(
            output_file_name(run_at()),
            "cluster_inference_0703202414h05m09s.csv"
        );
    }

    #[test]
    fn test_write_with_index() {
        let dir = TempDir::new().unwrap();
        let path = OutputWriter::new(true)
            .write(&table(), &dir.path().join("output"), "out.csv")
            .unwrap();

        let contents = fs::read_to_string(path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert!(lines[0].ends_with(",Date,ID,Main Cluster,Alternative Cluster 1"));
        assert_eq!(lines[1], "0,07/03/2024,c1,X,Y");
        assert_eq!(lines[2], "1,07/03/2024,c2,Z,X");
    }

    #[test]
    fn test_index_column_is_unsigned_64_bit() {
        let frame = OutputWriter::new(true).to_frame(&table()).unwrap();
        let index = &frame.get_columns()[0];
        assert_eq!(index.dtype(), &DataType::UInt64);
        assert_eq!(frame.width(), 5);
    }

    #[test]
    fn test_write_without_index() {
        let dir = TempDir::new().unwrap();
        let path = OutputWriter::new(false)
            .write(&table(), dir.path(), "out.csv")
            .unwrap();

        let contents = fs::read_to_string(path).unwrap();
        assert!(contents.starts_with("Date,ID,Main Cluster,Alternative Cluster 1\n"));
    }

    #[test]
    fn test_identical_tables_write_identical_bytes() {
        let dir = TempDir::new().unwrap();
        let writer = OutputWriter::new(true);
        let first = writer.write(&table(), dir.path(), "a.csv").unwrap();
        let second = writer.write(&table(), dir.path(), "b.csv").unwrap();
        assert_eq!(fs::read(first).unwrap(), fs::read(second).unwrap());
    }
}
