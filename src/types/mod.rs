//! Type definitions for the cluster inference pipeline

pub mod ranked;

pub use ranked::{result_header, OutputTable, RankedResultRow, DATE_FORMAT};
