//! Running latency statistics
//!
//! `StatCollector` folds per-operation latencies into count, sum, min and
//! max without storing samples. A snapshot is only taken once measurement
//! is over.

use crate::models::{OperationOutcome, OperationResult};

/// Accumulates latency statistics for one run
#[derive(Debug, Clone, PartialEq)]
pub struct StatCollector {
    count: u64,
    sum_us: f64,
    min_us: f64,
    max_us: f64,
    not_found: u64,
    failed: u64,
}

/// Finalised statistics of a collector
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StatsSnapshot {
    /// Nothing was measured
    Empty,
    Measured {
        count: u64,
        total_us: f64,
        min_us: f64,
        max_us: f64,
        avg_us: f64,
        throughput_ops_per_sec: f64,
    },
}

impl Default for StatCollector {
    fn default() -> Self {
        Self {
            count: 0,
            sum_us: 0.0,
            min_us: f64::INFINITY,
            max_us: 0.0,
            not_found: 0,
            failed: 0,
        }
    }
}

impl StatCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one latency sample in microseconds
    #[inline]
    pub fn record(&mut self, micros: f64) {
        self.count += 1;
        self.sum_us += micros;
        self.min_us = self.min_us.min(micros);
        self.max_us = self.max_us.max(micros);
    }

    /// Fold one operation result. Failed operations are tallied only.
    pub fn observe(&mut self, result: &OperationResult) {
        match result.outcome {
            OperationOutcome::Success => self.record(result.latency_us),
            OperationOutcome::NotFound => {
                self.not_found += 1;
                self.record(result.latency_us);
            }
            OperationOutcome::Error => self.failed += 1,
        }
    }

    /// Combine another collector's measurements into this one
    pub fn merge(&mut self, other: &StatCollector) {
        self.count += other.count;
        self.sum_us += other.sum_us;
        self.min_us = self.min_us.min(other.min_us);
        self.max_us = self.max_us.max(other.max_us);
        self.not_found += other.not_found;
        self.failed += other.failed;
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn not_found(&self) -> u64 {
        self.not_found
    }

    pub fn failed(&self) -> u64 {
        self.failed
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        if self.count == 0 {
            return StatsSnapshot::Empty;
        }

        let avg_us = self.sum_us / self.count as f64;
        // A run faster than the clock resolution measures as zero time.
        let throughput_ops_per_sec = if avg_us > 0.0 { 1_000_000.0 / avg_us } else { 0.0 };

        StatsSnapshot::Measured {
            count: self.count,
            total_us: self.sum_us,
            min_us: self.min_us,
            max_us: self.max_us,
            avg_us,
            throughput_ops_per_sec,
        }
    }
}

impl StatsSnapshot {
    pub fn count(&self) -> u64 {
        match self {
            StatsSnapshot::Empty => 0,
            StatsSnapshot::Measured { count, .. } => *count,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, StatsSnapshot::Empty)
    }

    pub fn total_us(&self) -> Option<f64> {
        match self {
            StatsSnapshot::Empty => None,
            StatsSnapshot::Measured { total_us, .. } => Some(*total_us),
        }
    }
}
