//! Workload generation
//!
//! Produces keys, values and mixed-operation choices from a single seedable
//! generator, so a fixed seed replays the whole operation sequence. Also
//! holds the key set shared by the runs of one suite.

use std::collections::HashMap;

use rand::distributions::{Alphanumeric, Distribution, WeightedIndex};
use rand::{rngs::SmallRng, Rng, SeedableRng};

use crate::config::{BenchmarkConfig, KeyMode, ValueMode};
use crate::{KVOrbError, Result};

/// Operation drawn for one iteration of a mixed workload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MixOp {
    Get,
    Insert,
    Update,
    Delete,
}

const MIX_OPS: [MixOp; 4] = [MixOp::Get, MixOp::Insert, MixOp::Update, MixOp::Delete];

/// Seeded source of keys, values and operation choices
pub struct WorkloadGenerator {
    rng: SmallRng,
    seed: u64,
    key_mode: KeyMode,
    value_mode: ValueMode,
    key_size: usize,
    key_space: usize,
    mix: WeightedIndex<u32>,
}

impl WorkloadGenerator {
    /// Build a generator for `config`, drawing a seed from entropy when the
    /// config leaves it unset.
    pub fn new(config: &BenchmarkConfig) -> Result<Self> {
        let seed = config
            .seed
            .unwrap_or_else(|| SmallRng::from_entropy().gen());

        let weights = [config.mix.get, config.mix.insert, config.mix.update, config.mix.delete];
        let mix = WeightedIndex::new(weights).map_err(|e| {
            KVOrbError::GeneratorError(format!("invalid workload mix {:?}: {}", weights, e))
        })?;

        Ok(Self {
            rng: SmallRng::seed_from_u64(seed),
            seed,
            key_mode: config.key_mode,
            value_mode: config.value_mode,
            key_size: config.key_size,
            key_space: config.op_count.max(1),
            mix,
        })
    }

    /// Seed actually in use
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Key for the `i`-th operation of the run
    pub fn next_key(&mut self, i: usize) -> Vec<u8> {
        match self.key_mode {
            KeyMode::Sequential => index_key(i),
            KeyMode::RandomIndex => {
                let index = self.rng.gen_range(0..self.key_space);
                index_key(index)
            }
            KeyMode::RandomBytes => self.random_bytes(self.key_size),
        }
    }

    /// Value of exactly `size` bytes
    pub fn next_value(&mut self, size: usize) -> Vec<u8> {
        match self.value_mode {
            ValueMode::RandomBytes => self.random_bytes(size),
            ValueMode::Printable => (&mut self.rng)
                .sample_iter(Alphanumeric)
                .take(size)
                .collect(),
        }
    }

    /// Uniform index into a collection of `len` elements
    pub fn pick_index(&mut self, len: usize) -> Option<usize> {
        if len == 0 {
            None
        } else {
            Some(self.rng.gen_range(0..len))
        }
    }

    /// Draw the next mixed-workload operation from the configured weights
    pub fn choose_op(&mut self) -> MixOp {
        MIX_OPS[self.mix.sample(&mut self.rng)]
    }

    fn random_bytes(&mut self, size: usize) -> Vec<u8> {
        let mut bytes = vec![0u8; size];
        self.rng.fill(&mut bytes[..]);
        bytes
    }
}

/// `"key_"` followed by the zero-padded 8-digit index
pub fn index_key(index: usize) -> Vec<u8> {
    format!("key_{:08}", index).into_bytes()
}

#[derive(Debug, Clone)]
enum KeyChange {
    Added,
    Removed { index: usize, key: Vec<u8> },
}

/// Distinct keys known to be stored, carried from run to run.
///
/// Changes made while a batch is open are journaled; `rollback` undoes them
/// so the set matches the store again after the backend discards the batch.
#[derive(Debug, Clone, Default)]
pub struct KeySet {
    keys: Vec<Vec<u8>>,
    positions: HashMap<Vec<u8>, usize>,
    journal: Option<Vec<KeyChange>>,
}

impl KeySet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn contains(&self, key: &[u8]) -> bool {
        self.positions.contains_key(key)
    }

    pub fn get(&self, index: usize) -> Option<&[u8]> {
        self.keys.get(index).map(Vec::as_slice)
    }

    pub fn iter(&self) -> impl Iterator<Item = &[u8]> {
        self.keys.iter().map(Vec::as_slice)
    }

    /// Track `key`. Returns false when it was already known.
    pub fn push(&mut self, key: Vec<u8>) -> bool {
        if self.positions.contains_key(&key) {
            return false;
        }
        self.append(key);
        if let Some(journal) = self.journal.as_mut() {
            journal.push(KeyChange::Added);
        }
        true
    }

    /// Remove the key at `index`, moving the last key into its slot
    pub fn swap_remove(&mut self, index: usize) -> Option<Vec<u8>> {
        if index >= self.keys.len() {
            return None;
        }
        let key = self.keys.swap_remove(index);
        self.positions.remove(&key);
        if let Some(moved) = self.keys.get(index) {
            self.positions.insert(moved.clone(), index);
        }
        if let Some(journal) = self.journal.as_mut() {
            journal.push(KeyChange::Removed { index, key: key.clone() });
        }
        Some(key)
    }

    /// Forget every key
    pub fn clear(&mut self) {
        while let Some(key) = self.keys.pop() {
            self.positions.remove(&key);
            if let Some(journal) = self.journal.as_mut() {
                journal.push(KeyChange::Removed { index: self.keys.len(), key });
            }
        }
    }

    /// Start journaling changes. A no-op while a journal is already open.
    pub fn begin(&mut self) {
        if self.journal.is_none() {
            self.journal = Some(Vec::new());
        }
    }

    /// Keep every change since `begin` and stop journaling
    pub fn commit(&mut self) {
        self.journal = None;
    }

    /// Undo every change since `begin` and stop journaling
    pub fn rollback(&mut self) {
        let Some(journal) = self.journal.take() else {
            return;
        };
        for change in journal.into_iter().rev() {
            match change {
                KeyChange::Added => {
                    if let Some(key) = self.keys.pop() {
                        self.positions.remove(&key);
                    }
                }
                KeyChange::Removed { index, key } => {
                    if index == self.keys.len() {
                        self.append(key);
                    } else {
                        self.positions.insert(key.clone(), index);
                        let displaced = std::mem::replace(&mut self.keys[index], key);
                        self.append(displaced);
                    }
                }
            }
        }
    }

    fn append(&mut self, key: Vec<u8>) {
        self.positions.insert(key.clone(), self.keys.len());
        self.keys.push(key);
    }
}
