//! KVORB - Key-Value Rust Bench
//!
//! A single-threaded benchmark harness that drives a key-value storage
//! backend through a uniform operation protocol and reports per-operation
//! latency and throughput.

use thiserror::Error;

pub mod bench;
pub mod config;
pub mod models;
pub mod report;
pub mod store;
pub mod util;

use store::StoreError;

// Common error types
#[derive(Debug, Error)]
pub enum KVOrbError {
    /// I/O operation failed outside the storage backend
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
    /// Configuration validation or parsing error
    #[error("Configuration error: {0}")]
    ConfigError(String),
    /// Storage backend failure surfaced by a benchmark run
    #[error("Backend error: {0}")]
    BackendError(#[from] StoreError),
    /// Workload generation defect
    #[error("Generator error: {0}")]
    GeneratorError(String),
    /// Results persistence error
    #[error("Results persistence error: {0}")]
    PersistenceError(String),
}

impl From<serde_json::Error> for KVOrbError {
    fn from(err: serde_json::Error) -> Self {
        KVOrbError::PersistenceError(format!("JSON serialization error: {}", err))
    }
}

impl From<toml::de::Error> for KVOrbError {
    fn from(err: toml::de::Error) -> Self {
        KVOrbError::ConfigError(format!("TOML parsing error: {}", err))
    }
}

impl From<toml::ser::Error> for KVOrbError {
    fn from(err: toml::ser::Error) -> Self {
        KVOrbError::ConfigError(format!("TOML serialization error: {}", err))
    }
}

/// Result type alias for KVORB operations
pub type Result<T> = std::result::Result<T, KVOrbError>;

/// Error handling utilities
pub mod error {
    use super::KVOrbError;
    use crate::store::StoreError;

    /// Whether an error should stop the remaining suite.
    ///
    /// Backend failures and runs that cannot start are scoped to their run;
    /// anything else is a harness defect.
    pub fn aborts_suite(error: &KVOrbError) -> bool {
        !matches!(
            error,
            KVOrbError::BackendError(_) | KVOrbError::ConfigError(_)
        )
    }

    /// Convert error to user-friendly message with suggestions
    pub fn user_friendly_message(error: &KVOrbError) -> String {
        match error {
            KVOrbError::ConfigError(msg) => {
                format!("Configuration error: {}. Check your kvorb.toml settings.", msg)
            }
            KVOrbError::BackendError(StoreError::Io(msg)) => format!(
                "Storage I/O failed ({}). Check the database path, permissions and free space.",
                msg
            ),
            KVOrbError::BackendError(StoreError::Corruption(msg)) => format!(
                "The database file looks corrupt ({}). Point the benchmark at a fresh file.",
                msg
            ),
            KVOrbError::PersistenceError(msg) => format!(
                "Results history unavailable ({}). Check disk space and permissions, or remove the history file.",
                msg
            ),
            KVOrbError::GeneratorError(msg) => {
                format!("Internal workload generator defect: {}", msg)
            }
            _ => error.to_string(),
        }
    }
}

// Common types and constants
pub const APP_NAME: &str = "kvorb";
pub const CONFIG_FILE: &str = "kvorb.toml";
pub const CONFIG_ENV: &str = "KVORB_CONFIG";
pub const LOG_ENV: &str = "KVORB_LOG";
pub const RESULTS_FILE: &str = "results.jsonl";
pub const MAX_RESULTS_HISTORY: usize = 100;
