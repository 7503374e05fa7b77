//! Benchmark result data models
//!
//! Contains the per-benchmark report produced at the end of a run and the
//! history record persisted across invocations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::operation::{MixCounts, OperationKind};
use crate::store::BackendInfo;

/// Final state of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Completed,
    Failed,
}

/// Summary of one benchmark run.
///
/// Latency figures are microseconds. Statistics fields are `None` when no
/// operation was measured.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkReport {
    pub name: String,
    pub kind: OperationKind,
    /// Seed the run's generator actually used
    pub seed: u64,
    pub batch_size: usize,
    /// Measured operations
    pub op_count: u64,
    pub total_time_us: Option<f64>,
    pub avg_us: Option<f64>,
    pub min_us: Option<f64>,
    pub max_us: Option<f64>,
    pub throughput_ops_per_sec: Option<f64>,
    /// Measured operations whose key was absent
    pub not_found: u64,
    /// Operations that failed in the backend
    pub failed: u64,
    pub commits: u64,
    pub rollbacks: u64,
    /// Wall-clock duration of the whole run, transaction brackets included
    pub wall_time_us: f64,
    pub bytes_processed: u64,
    /// Bytes moved per second of measured time, in MiB/s
    pub throughput_mbps: Option<f64>,
    pub status: RunStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mix: Option<MixCounts>,
}

impl BenchmarkReport {
    pub fn is_failed(&self) -> bool {
        self.status == RunStatus::Failed
    }

    /// Relative change in mean latency against `baseline`, in percent.
    /// Positive means slower. `None` unless both runs measured something.
    pub fn avg_latency_change(&self, baseline: &BenchmarkReport) -> Option<f64> {
        match (self.avg_us, baseline.avg_us) {
            (Some(current), Some(previous)) if previous > 0.0 => {
                Some((current - previous) / previous * 100.0)
            }
            _ => None,
        }
    }
}

/// Persisted history record: one report plus the context it ran in
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchmarkResult {
    /// Timestamp when the benchmark was executed
    pub timestamp: DateTime<Utc>,
    pub report: BenchmarkReport,
    pub backend: BackendInfo,
    /// System information at time of benchmark
    pub system_info: SystemInfo,
}

impl BenchmarkResult {
    /// Create a new benchmark result with detected system info
    pub fn new(report: BenchmarkReport, backend: BackendInfo) -> Self {
        Self {
            timestamp: Utc::now(),
            report,
            backend,
            system_info: SystemInfo::detect(),
        }
    }
}

/// System information captured at benchmark time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemInfo {
    pub os: String,
    pub arch: String,
    /// Logical CPUs available to the process
    pub cpu_count: usize,
}

impl Default for SystemInfo {
    fn default() -> Self {
        Self {
            os: std::env::consts::OS.to_string(),
            arch: std::env::consts::ARCH.to_string(),
            cpu_count: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
        }
    }
}

impl SystemInfo {
    /// Create system info by detecting current system
    pub fn detect() -> Self {
        Self::default()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn sample_report(name: &str) -> BenchmarkReport {
        BenchmarkReport {
            name: name.to_string(),
            kind: OperationKind::Insert,
            seed: 42,
            batch_size: 1000,
            op_count: 1000,
            total_time_us: Some(2000.0),
            avg_us: Some(2.0),
            min_us: Some(1.0),
            max_us: Some(10.0),
            throughput_ops_per_sec: Some(500_000.0),
            not_found: 0,
            failed: 0,
            commits: 1,
            rollbacks: 0,
            wall_time_us: 2500.0,
            bytes_processed: 160_000,
            throughput_mbps: Some(76.29),
            status: RunStatus::Completed,
            error: None,
            mix: None,
        }
    }

    #[test]
    fn test_avg_latency_change() {
        let baseline = sample_report("GET");
        let mut slower = sample_report("GET");
        slower.avg_us = Some(3.0);

        let change = slower.avg_latency_change(&baseline).unwrap();
        assert!((change - 50.0).abs() < 1e-9);
        assert!(baseline.avg_latency_change(&slower).unwrap() < 0.0);
    }

    #[test]
    fn test_avg_latency_change_needs_measurements() {
        let baseline = sample_report("GET");
        let mut empty = sample_report("GET");
        empty.avg_us = None;

        assert_eq!(empty.avg_latency_change(&baseline), None);
        assert_eq!(baseline.avg_latency_change(&empty), None);
    }

    #[test]
    fn test_result_json_round_trip() {
        let result = BenchmarkResult::new(
            sample_report("Get"),
            BackendInfo {
                name: "sqlite".to_string(),
                version: Some("3.46.0".to_string()),
            },
        );
        let json = serde_json::to_string(&result).unwrap();
        assert!(!json.contains("\"error\""));

        let back: BenchmarkResult = serde_json::from_str(&json).unwrap();
        assert_eq!(back.report, result.report);
        assert_eq!(back.backend, result.backend);
        assert_eq!(back.system_info, result.system_info);
    }

    #[test]
    fn test_system_info_detect() {
        let info = SystemInfo::detect();
        assert!(!info.os.is_empty());
        assert!(info.cpu_count >= 1);
    }
}
