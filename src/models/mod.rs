//! Data models module
//!
//! Contains per-operation types, run reports, and the persisted
//! result records.

pub mod operation;
pub mod result;

// Re-export commonly used types
pub use operation::{
    MixCounts,
    OperationKind,
    OperationOutcome,
    OperationResult,
};
pub use result::{
    BenchmarkReport,
    BenchmarkResult,
    RunStatus,
    SystemInfo,
};
