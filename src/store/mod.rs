//! Storage backend abstraction
//!
//! Contains the `KeyValueStore` contract the benchmark harness drives, the
//! backend error taxonomy, and the bundled backend implementations.

pub mod instrumented;
pub mod memory;
pub mod sqlite;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use instrumented::{InstrumentedStore, StoreCounters};
pub use memory::MemoryStore;
pub use sqlite::{JournalMode, SqliteOptions, SqliteStore, SynchronousMode, TempStore};

/// A single key/value pair as stored by a backend.
pub type Record = (Vec<u8>, Vec<u8>);

/// Lazy, finite, single-pass sequence of records produced by [`KeyValueStore::scan`].
pub type ScanIter<'a> = Box<dyn Iterator<Item = Result<Record, StoreError>> + 'a>;

/// Failures reported by a storage backend.
///
/// The harness records these and never interprets, retries or repairs them.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// Open, read or write failure at the file-system level
    #[error("storage I/O failure: {0}")]
    Io(String),
    /// Constraint violation (uniqueness, NOT NULL, ...)
    #[error("constraint violation: {0}")]
    Constraint(String),
    /// The backend detected corrupt or foreign data
    #[error("storage corruption: {0}")]
    Corruption(String),
    /// Misuse or failure of the transaction bracket
    #[error("transaction failure: {0}")]
    Transaction(String),
    /// Any other backend failure (prepare, bind, step, ...)
    #[error("backend failure: {0}")]
    Backend(String),
}

/// Backend identification for reports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendInfo {
    pub name: String,
    pub version: Option<String>,
}

/// Key-value storage contract consumed by the benchmark runner.
///
/// Implementations own their connection; the runner holds `&mut` access for
/// the whole run, so no method needs internal locking.
pub trait KeyValueStore {
    /// Returns the backend name (e.g., "sqlite", "memory").
    fn name(&self) -> &str;

    /// Returns the backend version, if available.
    fn version(&self) -> Option<String> {
        None
    }

    /// Insert or replace the value stored under `key`.
    fn put(&mut self, key: &[u8], value: &[u8]) -> Result<(), StoreError>;

    /// Fetch the value stored under `key`.
    fn get(&mut self, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError>;

    /// Remove `key`. Returns whether it existed.
    fn delete(&mut self, key: &[u8]) -> Result<bool, StoreError>;

    /// Replace the value under `key` only if the key already exists.
    /// Returns whether a record was updated.
    fn update(&mut self, key: &[u8], value: &[u8]) -> Result<bool, StoreError> {
        if self.get(key)?.is_some() {
            self.put(key, value)?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    /// Visit every record once. The sequence is finite and cannot be restarted.
    fn scan(&mut self) -> Result<ScanIter<'_>, StoreError>;

    /// Remove every record.
    fn clear(&mut self) -> Result<(), StoreError>;

    /// Open a transaction bracket.
    fn begin_batch(&mut self) -> Result<(), StoreError>;

    /// Commit the open transaction bracket.
    fn commit_batch(&mut self) -> Result<(), StoreError>;

    /// Discard the open transaction bracket.
    fn rollback_batch(&mut self) -> Result<(), StoreError>;

    /// Whether a transaction bracket is currently open.
    fn in_batch(&self) -> bool;

    fn info(&self) -> BackendInfo {
        BackendInfo {
            name: self.name().to_string(),
            version: self.version(),
        }
    }
}
