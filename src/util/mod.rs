//! Utility functions module
//!
//! Contains the monotonic clock used for timing and helpers for
//! human-readable formatting of sizes, latencies and rates.

pub mod clock;
pub mod units;

// Re-export commonly used functions
pub use clock::Clock;
pub use units::{format_bytes, format_latency, format_mib_rate, mib_per_sec};
