//! Ranked cluster assignment rows and the output table

use chrono::NaiveDateTime;

/// Run date format written into every result row
pub const DATE_FORMAT: &str = "%d/%m/%Y";

/// One scored record: run date, record id and clusters by descending probability
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RankedResultRow {
    pub date: String,
    pub id: String,
    /// `clusters[0]` is the main cluster, the rest are alternatives
    pub clusters: Vec<String>,
}

impl RankedResultRow {
    pub fn new(run_at: NaiveDateTime, id: impl Into<String>, clusters: Vec<String>) -> Self {
        Self {
            date: run_at.format(DATE_FORMAT).to_string(),
            id: id.into(),
            clusters,
        }
    }

    pub fn main_cluster(&self) -> Option<&str> {
        self.clusters.first().map(String::as_str)
    }

    /// Row values in header order
    pub fn values(&self) -> Vec<&str> {
        let mut values = Vec::with_capacity(self.clusters.len() + 2);
        values.push(self.date.as_str());
        values.push(self.id.as_str());
        values.extend(self.clusters.iter().map(String::as_str));
        values
    }
}

/// Header for a table with `clusters` ranked columns:
/// `Date, ID, Main Cluster, Alternative Cluster 1, ...`
pub fn result_header(clusters: usize) -> Vec<String> {
    let mut header = vec!["Date".to_string(), "ID".to_string()];
    if clusters > 0 {
        header.push("Main Cluster".to_string());
    }
    header.extend((1..clusters).map(|i| format!("Alternative Cluster {i}")));
    header
}

/// Ranked rows in input order plus their header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputTable {
    header: Vec<String>,
    rows: Vec<RankedResultRow>,
}

impl OutputTable {
    /// Build a table whose rows carry `clusters` ranked columns each
    pub fn new(clusters: usize, rows: Vec<RankedResultRow>) -> Self {
        debug_assert!(rows.iter().all(|row| row.clusters.len() == clusters));
        Self {
            header: result_header(clusters),
            rows,
        }
    }

    pub fn header(&self) -> &[String] {
        &self.header
    }

    pub fn rows(&self) -> &[RankedResultRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Number of ranked cluster columns
    pub fn cluster_columns(&self) -> usize {
        self.header.len().saturating_sub(2)
    }
}
