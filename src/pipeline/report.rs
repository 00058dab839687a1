//! End-of-run report

use crate::error::{EnrichError, Result};
use crate::lookup::LookupStats;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Counters and timings for one pipeline run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub started_at: DateTime<Utc>,
    pub elapsed_ms: u64,
    pub worker_count: usize,
    /// Identifiers the producer pushed onto the work queue
    pub identifiers_read: u64,
    /// Input records the source dropped (blank or malformed)
    pub records_skipped: u64,
    pub stops_sent: usize,
    pub lookups_succeeded: u64,
    pub lookups_failed: u64,
    pub retries: u64,
    /// Lines in the records sink from this run
    pub records_written: u64,
    /// Lines in the failures sink from this run
    pub failures_written: u64,
    pub distinct_categories: usize,
    pub avg_latency_us: f64,
    /// 0 when no lookup completed
    pub min_latency_us: u64,
    pub max_latency_us: u64,
    /// Latency spread over the most recent lookups
    pub jitter_us: u64,
    /// Percentage of completed lookups that found a category
    pub success_rate: f64,
    pub cancelled: bool,
}

impl RunReport {
    /// Empty report for a run starting now
    pub fn started(worker_count: usize) -> Self {
        Self {
            started_at: Utc::now(),
            elapsed_ms: 0,
            worker_count,
            identifiers_read: 0,
            records_skipped: 0,
            stops_sent: 0,
            lookups_succeeded: 0,
            lookups_failed: 0,
            retries: 0,
            records_written: 0,
            failures_written: 0,
            distinct_categories: 0,
            avg_latency_us: 0.0,
            min_latency_us: 0,
            max_latency_us: 0,
            jitter_us: 0,
            success_rate: 100.0,
            cancelled: false,
        }
    }

    /// Copy the merged worker statistics into the report
    pub fn record_lookups(&mut self, stats: &LookupStats) {
        self.lookups_succeeded = stats.succeeded;
        self.lookups_failed = stats.failed;
        self.retries = stats.retries;
        self.avg_latency_us = stats.avg_latency_us();
        self.min_latency_us = if stats.completed() == 0 {
            0
        } else {
            stats.min_latency_us
        };
        self.max_latency_us = stats.max_latency_us;
        self.jitter_us = stats.jitter_us();
        self.success_rate = stats.success_rate();
    }

    /// Lookups per second over the whole run
    pub fn throughput(&self) -> f64 {
        if self.elapsed_ms == 0 {
            return 0.0;
        }
        (self.lookups_succeeded + self.lookups_failed) as f64 * 1000.0 / self.elapsed_ms as f64
    }

    /// Emit the report as a single info event
    pub fn log_summary(&self) {
        tracing::info!(
            "Run {}: {} read ({} skipped), {} found, {} failed ({:.1}% ok), {} retries, {} categories in {} ms ({:.1}/s)",
            if self.cancelled { "cancelled" } else { "complete" },
            self.identifiers_read,
            self.records_skipped,
            self.lookups_succeeded,
            self.lookups_failed,
            self.success_rate,
            self.retries,
            self.distinct_categories,
            self.elapsed_ms,
            self.throughput()
        );
        tracing::info!(
            "Lookup latency: avg {:.0} us, min {} us, max {} us, jitter {} us",
            self.avg_latency_us,
            self.min_latency_us,
            self.max_latency_us,
            self.jitter_us
        );
    }

    /// Write the report as pretty JSON
    pub fn save_json(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| EnrichError::Serialization(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| {
            EnrichError::SinkWrite(format!("Failed to write report {:?}: {}", path, e))
        })
    }
}

/// A finished run: the report, plus the error if the run failed
///
/// The report is filled in as far as the run got, so it can be saved even
/// when the run was cancelled or a stage failed.
#[derive(Debug)]
pub struct RunOutcome {
    pub report: RunReport,
    pub error: Option<EnrichError>,
}

impl RunOutcome {
    pub fn succeeded(report: RunReport) -> Self {
        Self {
            report,
            error: None,
        }
    }

    pub fn failed(report: RunReport, error: EnrichError) -> Self {
        Self {
            report,
            error: Some(error),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }

    /// Drop the report if the run failed
    pub fn into_result(self) -> Result<RunReport> {
        match self.error {
            None => Ok(self.report),
            Some(err) => Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_throughput() {
        let mut report = RunReport::started(4);
        assert_eq!(report.throughput(), 0.0);

        report.elapsed_ms = 500;
        report.lookups_succeeded = 40;
        report.lookups_failed = 10;
        assert_eq!(report.throughput(), 100.0);
    }

    #[test]
    fn test_save_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.json");

        let mut report = RunReport::started(2);
        report.distinct_categories = 3;
        report.save_json(&path).unwrap();

        let loaded: RunReport =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(loaded.worker_count, 2);
        assert_eq!(loaded.distinct_categories, 3);
    }

    #[test]
    fn test_record_lookups_copies_latency_stats() {
        let mut stats = LookupStats::default();
        stats.record_success(Duration::from_micros(100), 0);
        stats.record_success(Duration::from_micros(400), 1);
        stats.record_failure(Duration::from_micros(250), 2);

        let mut report = RunReport::started(2);
        report.record_lookups(&stats);

        assert_eq!(report.lookups_succeeded, 2);
        assert_eq!(report.lookups_failed, 1);
        assert_eq!(report.retries, 3);
        assert_eq!(report.min_latency_us, 100);
        assert_eq!(report.max_latency_us, 400);
        assert_eq!(report.jitter_us, 300);
        assert!((report.success_rate - 200.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_record_lookups_without_lookups() {
        let mut report = RunReport::started(1);
        report.record_lookups(&LookupStats::default());

        assert_eq!(report.min_latency_us, 0);
        assert_eq!(report.max_latency_us, 0);
        assert_eq!(report.success_rate, 100.0);
    }

    #[test]
    fn test_failed_outcome_keeps_report() {
        let mut report = RunReport::started(2);
        report.identifiers_read = 7;
        report.cancelled = true;

        let outcome = RunOutcome::failed(report, EnrichError::Cancelled);
        assert!(!outcome.is_ok());
        assert_eq!(outcome.report.identifiers_read, 7);
        assert!(matches!(outcome.into_result(), Err(EnrichError::Cancelled)));
    }
}
