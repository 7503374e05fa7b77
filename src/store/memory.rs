//! In-memory key-value backend
//!
//! An ordered map with a write overlay for the transaction bracket: writes
//! inside a batch land in the overlay, commit folds it into the base map and
//! rollback discards it.

use std::cmp::Ordering;
use std::collections::btree_map;
use std::collections::BTreeMap;
use std::iter::Peekable;

use super::{KeyValueStore, Record, ScanIter, StoreError};

/// `KeyValueStore` kept entirely in process memory
#[derive(Debug, Default)]
pub struct MemoryStore {
    data: BTreeMap<Vec<u8>, Vec<u8>>,
    /// Pending writes of the open batch; `None` marks a deletion
    pending: BTreeMap<Vec<u8>, Option<Vec<u8>>>,
    in_batch: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of committed records
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    fn lookup(&self, key: &[u8]) -> Option<&Vec<u8>> {
        match self.pending.get(key) {
            Some(staged) => staged.as_ref(),
            None => self.data.get(key),
        }
    }

    fn write(&mut self, key: &[u8], value: Option<Vec<u8>>) {
        if self.in_batch {
            self.pending.insert(key.to_vec(), value);
        } else {
            match value {
                Some(value) => {
                    self.data.insert(key.to_vec(), value);
                }
                None => {
                    self.data.remove(key);
                }
            }
        }
    }
}

impl KeyValueStore for MemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    fn put(&mut self, key: &[u8], value: &[u8]) -> Result<(), StoreError> {
        self.write(key, Some(value.to_vec()));
        Ok(())
    }

    fn get(&mut self, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self.lookup(key).cloned())
    }

    fn delete(&mut self, key: &[u8]) -> Result<bool, StoreError> {
        let existed = self.lookup(key).is_some();
        if existed {
            self.write(key, None);
        }
        Ok(existed)
    }

    fn update(&mut self, key: &[u8], value: &[u8]) -> Result<bool, StoreError> {
        let existed = self.lookup(key).is_some();
        if existed {
            self.write(key, Some(value.to_vec()));
        }
        Ok(existed)
    }

    fn scan(&mut self) -> Result<ScanIter<'_>, StoreError> {
        Ok(Box::new(MergedScan {
            base: self.data.iter().peekable(),
            overlay: self.pending.iter().peekable(),
        }))
    }

    fn clear(&mut self) -> Result<(), StoreError> {
        if self.in_batch {
            let keys: Vec<Vec<u8>> = self.data.keys().cloned().collect();
            for key in keys {
                self.pending.insert(key, None);
            }
            for staged in self.pending.values_mut() {
                *staged = None;
            }
        } else {
            self.data.clear();
        }
        Ok(())
    }

    fn begin_batch(&mut self) -> Result<(), StoreError> {
        if self.in_batch {
            return Err(StoreError::Transaction(
                "a batch is already open".to_string(),
            ));
        }
        self.in_batch = true;
        Ok(())
    }

    fn commit_batch(&mut self) -> Result<(), StoreError> {
        if !self.in_batch {
            return Err(StoreError::Transaction("no batch to commit".to_string()));
        }
        for (key, staged) in std::mem::take(&mut self.pending) {
            match staged {
                Some(value) => {
                    self.data.insert(key, value);
                }
                None => {
                    self.data.remove(&key);
                }
            }
        }
        self.in_batch = false;
        Ok(())
    }

    fn rollback_batch(&mut self) -> Result<(), StoreError> {
        if !self.in_batch {
            return Err(StoreError::Transaction(
                "no batch to roll back".to_string(),
            ));
        }
        self.pending.clear();
        self.in_batch = false;
        Ok(())
    }

    fn in_batch(&self) -> bool {
        self.in_batch
    }
}

/// Ordered merge of committed data with the pending overlay
struct MergedScan<'a> {
    base: Peekable<btree_map::Iter<'a, Vec<u8>, Vec<u8>>>,
    overlay: Peekable<btree_map::Iter<'a, Vec<u8>, Option<Vec<u8>>>>,
}

impl Iterator for MergedScan<'_> {
    type Item = Result<Record, StoreError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let order = match (self.base.peek(), self.overlay.peek()) {
                (None, None) => return None,
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (Some((base_key, _)), Some((staged_key, _))) => base_key.cmp(staged_key),
            };

            if order == Ordering::Less {
                let (key, value) = self.base.next()?;
                return Some(Ok((key.clone(), value.clone())));
            }
            if order == Ordering::Equal {
                // Shadowed by the overlay entry.
                self.base.next();
            }
            if let Some((key, Some(value))) = self.overlay.next() {
                return Some(Ok((key.clone(), value.clone())));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scan_keys(store: &mut MemoryStore) -> Vec<Vec<u8>> {
        store.scan().unwrap().map(|r| r.unwrap().0).collect()
    }

    #[test]
    fn test_round_trip_and_delete() {
        let mut store = MemoryStore::new();
        store.put(b"a\x00b", b"").unwrap();
        assert_eq!(store.get(b"a\x00b").unwrap(), Some(Vec::new()));

        assert!(store.delete(b"a\x00b").unwrap());
        assert_eq!(store.get(b"a\x00b").unwrap(), None);
        assert!(!store.delete(b"a\x00b").unwrap());
    }

    #[test]
    fn test_batch_is_visible_inside_and_discarded_on_rollback() {
        let mut store = MemoryStore::new();
        store.put(b"base", b"1").unwrap();

        store.begin_batch().unwrap();
        store.put(b"staged", b"2").unwrap();
        assert!(store.delete(b"base").unwrap());
        assert_eq!(store.get(b"staged").unwrap(), Some(b"2".to_vec()));
        assert_eq!(store.get(b"base").unwrap(), None);
        assert_eq!(scan_keys(&mut store), vec![b"staged".to_vec()]);

        store.rollback_batch().unwrap();
        assert_eq!(store.get(b"staged").unwrap(), None);
        assert_eq!(store.get(b"base").unwrap(), Some(b"1".to_vec()));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_commit_applies_overlay() {
        let mut store = MemoryStore::new();
        store.put(b"a", b"old").unwrap();
        store.put(b"c", b"gone").unwrap();

        store.begin_batch().unwrap();
        store.put(b"a", b"new").unwrap();
        store.put(b"b", b"added").unwrap();
        store.delete(b"c").unwrap();
        assert_eq!(store.len(), 2);
        store.commit_batch().unwrap();

        assert!(!store.in_batch());
        assert_eq!(scan_keys(&mut store), vec![b"a".to_vec(), b"b".to_vec()]);
        assert_eq!(store.get(b"a").unwrap(), Some(b"new".to_vec()));
    }

    #[test]
    fn test_clear_inside_batch_is_transactional() {
        let mut store = MemoryStore::new();
        store.put(b"a", b"1").unwrap();
        store.begin_batch().unwrap();
        store.put(b"b", b"2").unwrap();
        store.clear().unwrap();
        assert!(scan_keys(&mut store).is_empty());
        store.rollback_batch().unwrap();
        assert_eq!(scan_keys(&mut store), vec![b"a".to_vec()]);
    }
}
