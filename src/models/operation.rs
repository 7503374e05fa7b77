//! Per-operation data models

use serde::{Deserialize, Serialize};
use std::fmt;

/// The operation a benchmark run repeats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    /// Write fresh keys
    Insert,
    /// Read keys written earlier in the run
    Get,
    /// Replace values of existing keys (key must exist)
    Update,
    /// Remove existing keys
    Delete,
    /// Write existing keys with insert-or-replace semantics
    Upsert,
    /// Draw get/insert/update/delete per operation from the workload mix
    MixedTransaction,
    /// Iterate every stored record once
    Scan,
}

impl OperationKind {
    /// Kinds that target keys already present in the run's key set
    pub fn needs_existing_keys(&self) -> bool {
        matches!(
            self,
            OperationKind::Get | OperationKind::Update | OperationKind::Delete | OperationKind::Upsert
        )
    }

    pub fn description(&self) -> &'static str {
        match self {
            OperationKind::Insert => "insert",
            OperationKind::Get => "get",
            OperationKind::Update => "update",
            OperationKind::Delete => "delete",
            OperationKind::Upsert => "upsert",
            OperationKind::MixedTransaction => "mixed transaction",
            OperationKind::Scan => "scan",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

/// How a single operation ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationOutcome {
    Success,
    /// The targeted key was absent; still a measured operation
    NotFound,
    /// The backend failed; not folded into latency statistics
    Error,
}

/// Outcome and timing of one timed operation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OperationResult {
    pub outcome: OperationOutcome,
    /// Elapsed time in microseconds
    pub latency_us: f64,
    /// Key and value bytes moved by the operation
    pub bytes: u64,
}

impl OperationResult {
    pub fn success(latency_us: f64, bytes: u64) -> Self {
        Self {
            outcome: OperationOutcome::Success,
            latency_us,
            bytes,
        }
    }

    pub fn not_found(latency_us: f64, bytes: u64) -> Self {
        Self {
            outcome: OperationOutcome::NotFound,
            latency_us,
            bytes,
        }
    }

    pub fn error(latency_us: f64) -> Self {
        Self {
            outcome: OperationOutcome::Error,
            latency_us,
            bytes: 0,
        }
    }
}

/// Operations drawn per kind during a mixed run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MixCounts {
    pub get: u64,
    pub insert: u64,
    pub update: u64,
    pub delete: u64,
}

impl MixCounts {
    pub fn total(&self) -> u64 {
        self.get + self.insert + self.update + self.delete
    }
}
