//! Benchmark engine module
//!
//! Contains workload generation, latency statistics, the per-run state
//! machine and the standard suite.

pub mod runner;
pub mod stats;
pub mod suite;
pub mod workload;

// Re-export commonly used types
pub use runner::{BenchmarkRunner, RunOutcome, RunState};
pub use stats::{StatCollector, StatsSnapshot};
pub use suite::{Suite, SuiteStep};
pub use workload::{index_key, KeySet, MixOp, WorkloadGenerator};
