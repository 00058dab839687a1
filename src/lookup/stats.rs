//! Per-worker lookup statistics
//!
//! Each worker owns one [`LookupStats`] (no sharing, no locking) and hands
//! it back when it exits; the driver merges them into the run report.

use std::collections::VecDeque;
use std::time::Duration;

/// Size of the rolling window for recent lookup latencies
const RECENT_WINDOW_SIZE: usize = 100;

/// Statistics for lookup operations
#[derive(Debug, Clone)]
pub struct LookupStats {
    /// Lookups that produced a category
    pub succeeded: u64,
    /// Lookups that failed permanently or exhausted their retries
    pub failed: u64,
    /// Retries beyond the first attempt
    pub retries: u64,
    /// Total latency of completed lookups in microseconds (retries included)
    pub total_latency_us: u64,
    /// Minimum latency observed (microseconds)
    pub min_latency_us: u64,
    /// Maximum latency observed (microseconds)
    pub max_latency_us: u64,
    /// Rolling window of recent latencies
    recent_latencies: VecDeque<u64>,
}

impl Default for LookupStats {
    fn default() -> Self {
        Self {
            succeeded: 0,
            failed: 0,
            retries: 0,
            total_latency_us: 0,
            min_latency_us: u64::MAX,
            max_latency_us: 0,
            recent_latencies: VecDeque::with_capacity(RECENT_WINDOW_SIZE),
        }
    }
}

impl LookupStats {
    /// Total lookups completed, successful or not
    pub fn completed(&self) -> u64 {
        self.succeeded + self.failed
    }

    /// Average latency per completed lookup in microseconds
    pub fn avg_latency_us(&self) -> f64 {
        let completed = self.completed();
        if completed == 0 {
            0.0
        } else {
            self.total_latency_us as f64 / completed as f64
        }
    }

    /// Success rate as a percentage
    pub fn success_rate(&self) -> f64 {
        let completed = self.completed();
        if completed == 0 {
            100.0
        } else {
            (self.succeeded as f64 / completed as f64) * 100.0
        }
    }

    /// Record a successful lookup
    pub fn record_success(&mut self, latency: Duration, retries: u32) {
        self.succeeded += 1;
        self.record_common(latency, retries);
    }

    /// Record a failed lookup
    pub fn record_failure(&mut self, latency: Duration, retries: u32) {
        self.failed += 1;
        self.record_common(latency, retries);
    }

    fn record_common(&mut self, latency: Duration, retries: u32) {
        let latency_us = latency.as_micros().min(u64::MAX as u128) as u64;
        self.retries += retries as u64;
        self.total_latency_us = self.total_latency_us.saturating_add(latency_us);
        self.min_latency_us = self.min_latency_us.min(latency_us);
        self.max_latency_us = self.max_latency_us.max(latency_us);

        self.recent_latencies.push_back(latency_us);
        if self.recent_latencies.len() > RECENT_WINDOW_SIZE {
            self.recent_latencies.pop_front();
        }
    }

    /// Calculate jitter (max - min) over the recent window in microseconds
    pub fn jitter_us(&self) -> u64 {
        let min = self.recent_latencies.iter().min().copied().unwrap_or(0);
        let max = self.recent_latencies.iter().max().copied().unwrap_or(0);
        max.saturating_sub(min)
    }

    /// Fold another worker's statistics into this one
    pub fn merge(&mut self, other: &LookupStats) {
        self.succeeded += other.succeeded;
        self.failed += other.failed;
        self.retries += other.retries;
        self.total_latency_us = self.total_latency_us.saturating_add(other.total_latency_us);
        self.min_latency_us = self.min_latency_us.min(other.min_latency_us);
        self.max_latency_us = self.max_latency_us.max(other.max_latency_us);
        for &latency in &other.recent_latencies {
            self.recent_latencies.push_back(latency);
            if self.recent_latencies.len() > RECENT_WINDOW_SIZE {
                self.recent_latencies.pop_front();
            }
        }
    }
}
