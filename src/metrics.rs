//! Per-run timing and assignment statistics.

use crate::error::Stage;
use crate::types::OutputTable;
use std::collections::BTreeMap;
use std::time::{Duration, Instant};
use tracing::info;

/// Metrics collected over a single inference run
#[derive(Debug, Clone)]
pub struct RunMetrics {
    /// Wall-clock time spent in each completed stage, in execution order
    stage_times: Vec<(Stage, Duration)>,
    /// Records scored
    rows_scored: u64,
    /// Main-cluster assignment counts by label
    main_cluster_counts: BTreeMap<String, u64>,
    start_time: Instant,
}

impl RunMetrics {
    pub fn new() -> Self {
        Self {
            stage_times: Vec::new(),
            rows_scored: 0,
            main_cluster_counts: BTreeMap::new(),
            start_time: Instant::now(),
        }
    }

    /// Run `f` and record its duration under `stage`
    pub fn time<T, E>(&mut self, stage: Stage, f: impl FnOnce() -> Result<T, E>) -> Result<T, E> {
        let started = Instant::now();
        let result = f();
        self.record_stage(stage, started.elapsed());
        result
    }

    pub fn record_stage(&mut self, stage: Stage, duration: Duration) {
        match self.stage_times.iter_mut().find(|(s, _)| *s == stage) {
            Some((_, total)) => *total += duration,
            None => self.stage_times.push((stage, duration)),
        }
    }

    /// Record the rows and main-cluster distribution of a scored table
    pub fn record_table(&mut self, table: &OutputTable) {
        self.rows_scored += table.len() as u64;
        for main in table.rows().iter().filter_map(|row| row.main_cluster()) {
            *self.main_cluster_counts.entry(main.to_string()).or_insert(0) += 1;
        }
    }

    pub fn stage_time(&self, stage: Stage) -> Option<Duration> {
        self.stage_times
            .iter()
            .find(|(s, _)| *s == stage)
            .map(|(_, d)| *d)
    }

    pub fn rows_scored(&self) -> u64 {
        self.rows_scored
    }

    pub fn main_cluster_counts(&self) -> &BTreeMap<String, u64> {
        &self.main_cluster_counts
    }

    /// Time since the run started
    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Log summary statistics
    pub fn log_summary(&self) {
        info!("╔══════════════════════════════════════════════════════╗");
        info!("║         CLUSTER INFERENCE - RUN SUMMARY              ║");
        info!("╠══════════════════════════════════════════════════════╣");
        info!(
            "║ Rows Scored: {:>8}  │  Total Time: {:>8.1} ms     ║",
            self.rows_scored,
            self.elapsed().as_secs_f64() * 1000.0
        );
        info!("╠══════════════════════════════════════════════════════╣");
        for (stage, duration) in &self.stage_times {
            info!(
                "║   {:<14}: {:>10.2} ms                         ║",
                stage.to_string(),
                duration.as_secs_f64() * 1000.0
            );
        }
        info!("╠══════════════════════════════════════════════════════╣");
        info!("║ Main Cluster Distribution:                           ║");
        for (label, count) in &self.main_cluster_counts {
            let pct = if self.rows_scored > 0 {
                (*count as f64 / self.rows_scored as f64) * 100.0
            } else {
                0.0
            };
            let bar: String = "█".repeat(((pct / 5.0) as usize).min(20));
            info!("║   {:>10}: {:>8} ({:>5.1}%) {}", label, count, pct, bar);
        }
        info!("╚══════════════════════════════════════════════════════╝");
    }
}

impl Default for RunMetrics {
    fn default() -> Self {
        Self::new()
    }
}
