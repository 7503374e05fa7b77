//! Counting and fault-injecting store wrapper
//!
//! Wraps any backend to count data operations and transaction brackets, and
//! optionally fail a chosen operation so failure handling can be exercised
//! against a real backend.

use tracing::warn;

use super::{KeyValueStore, ScanIter, StoreError};

/// Counters collected by [`InstrumentedStore`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreCounters {
    /// put/get/delete/update calls attempted
    pub operations: u64,
    pub begins: u64,
    pub commits: u64,
    pub rollbacks: u64,
}

pub struct InstrumentedStore<S> {
    inner: S,
    counters: StoreCounters,
    fail_at: Option<u64>,
}

impl<S: KeyValueStore> InstrumentedStore<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            counters: StoreCounters::default(),
            fail_at: None,
        }
    }

    /// Fail the `n`-th data operation (1-based) with a backend error.
    pub fn fail_at_operation(mut self, n: u64) -> Self {
        self.fail_at = Some(n);
        self
    }

    pub fn counters(&self) -> StoreCounters {
        self.counters
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    fn tick(&mut self) -> Result<(), StoreError> {
        self.counters.operations += 1;
        if self.fail_at == Some(self.counters.operations) {
            warn!(operation = self.counters.operations, "injecting backend failure");
            return Err(StoreError::Backend(format!(
                "injected failure at operation {}",
                self.counters.operations
            )));
        }
        Ok(())
    }
}

impl<S: KeyValueStore> KeyValueStore for InstrumentedStore<S> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn version(&self) -> Option<String> {
        self.inner.version()
    }

    fn put(&mut self, key: &[u8], value: &[u8]) -> Result<(), StoreError> {
        self.tick()?;
        self.inner.put(key, value)
    }

    fn get(&mut self, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
        self.tick()?;
        self.inner.get(key)
    }

    fn delete(&mut self, key: &[u8]) -> Result<bool, StoreError> {
        self.tick()?;
        self.inner.delete(key)
    }

    fn update(&mut self, key: &[u8], value: &[u8]) -> Result<bool, StoreError> {
        self.tick()?;
        self.inner.update(key, value)
    }

    fn scan(&mut self) -> Result<ScanIter<'_>, StoreError> {
        self.inner.scan()
    }

    fn clear(&mut self) -> Result<(), StoreError> {
        self.inner.clear()
    }

    fn begin_batch(&mut self) -> Result<(), StoreError> {
        self.inner.begin_batch()?;
        self.counters.begins += 1;
        Ok(())
    }

    fn commit_batch(&mut self) -> Result<(), StoreError> {
        self.inner.commit_batch()?;
        self.counters.commits += 1;
        Ok(())
    }

    fn rollback_batch(&mut self) -> Result<(), StoreError> {
        self.inner.rollback_batch()?;
        self.counters.rollbacks += 1;
        Ok(())
    }

    fn in_batch(&self) -> bool {
        self.inner.in_batch()
    }
}
