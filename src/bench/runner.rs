//! Benchmark runner
//!
//! Drives one store through `op_count` operations of a single kind, timing
//! each store call and folding the results into a [`StatCollector`].
//! Input generation and transaction brackets stay outside the timed region.

use std::time::Duration;
use tracing::{debug, info, warn};

use crate::bench::stats::{StatCollector, StatsSnapshot};
use crate::bench::workload::{KeySet, MixOp, WorkloadGenerator};
use crate::config::BenchmarkConfig;
use crate::models::{MixCounts, OperationKind, OperationResult, RunStatus};
use crate::store::{KeyValueStore, StoreError};
use crate::util::Clock;
use crate::{KVOrbError, Result};

/// Lifecycle of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Preparing,
    Running,
    Finalizing,
    Done,
    Failed,
}

/// Everything a finished (or failed) run measured
#[derive(Debug, Clone, PartialEq)]
pub struct RunOutcome {
    pub name: String,
    pub kind: OperationKind,
    pub seed: u64,
    pub batch_size: usize,
    pub status: RunStatus,
    /// Backend failure that ended the run
    pub error: Option<StoreError>,
    pub snapshot: StatsSnapshot,
    pub commits: u64,
    pub rollbacks: u64,
    pub not_found: u64,
    pub failed: u64,
    pub wall_time: Duration,
    pub bytes_processed: u64,
    /// Drawn operation counts, for mixed runs only
    pub mix: Option<MixCounts>,
}

impl RunOutcome {
    pub fn is_failed(&self) -> bool {
        self.status == RunStatus::Failed
    }

    /// Measured operations
    pub fn op_count(&self) -> u64 {
        self.snapshot.count()
    }

    /// Turn a failed run into its backend error
    pub fn into_result(mut self) -> Result<RunOutcome> {
        match self.error.take() {
            Some(error) => Err(KVOrbError::BackendError(error)),
            None => Ok(self),
        }
    }
}

#[derive(Default)]
struct RunCounters {
    stats: StatCollector,
    commits: u64,
    rollbacks: u64,
    bytes: u64,
    mix: MixCounts,
}

impl RunCounters {
    fn observe(&mut self, result: OperationResult) {
        self.stats.observe(&result);
        self.bytes += result.bytes;
    }
}

/// Executes benchmark runs against a borrowed store
pub struct BenchmarkRunner<'s, S: KeyValueStore + ?Sized> {
    store: &'s mut S,
    state: RunState,
}

impl<'s, S: KeyValueStore + ?Sized> BenchmarkRunner<'s, S> {
    pub fn new(store: &'s mut S) -> Self {
        Self {
            store,
            state: RunState::Idle,
        }
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    /// Run `kind` under `config`, reading and updating `keys`.
    ///
    /// A configuration problem is returned as `Err` before any operation
    /// runs. A backend failure ends the run with a rollback and is reported
    /// in the returned outcome together with the partial statistics.
    pub fn run(
        &mut self,
        name: &str,
        kind: OperationKind,
        config: &BenchmarkConfig,
        keys: &mut KeySet,
    ) -> Result<RunOutcome> {
        self.state = RunState::Preparing;
        let mut generator = match self.prepare(kind, config, keys) {
            Ok(generator) => generator,
            Err(e) => {
                self.state = RunState::Failed;
                return Err(e);
            }
        };

        let op_count = match kind {
            OperationKind::Delete if config.op_count > keys.len() => {
                warn!(
                    benchmark = name,
                    requested = config.op_count,
                    available = keys.len(),
                    "capping deletes at the number of known keys"
                );
                keys.len()
            }
            _ => config.op_count,
        };

        info!(
            benchmark = name,
            kind = %kind,
            seed = generator.seed(),
            ops = op_count,
            batch_size = config.batch_size,
            "starting benchmark"
        );

        let mut counters = RunCounters::default();
        let wall_start = Clock::now();
        let result = match kind {
            OperationKind::Scan => self.execute_scan(config, keys, &mut counters),
            _ => self.execute(kind, op_count, config, &mut generator, keys, &mut counters),
        };
        let wall_time = wall_start.elapsed();

        let error = match result {
            Ok(()) => {
                self.state = RunState::Done;
                None
            }
            Err(e) => {
                warn!(benchmark = name, error = %e, "benchmark failed, rolling back");
                self.abort(keys, &mut counters);
                self.state = RunState::Failed;
                Some(e)
            }
        };

        let outcome = RunOutcome {
            name: name.to_string(),
            kind,
            seed: generator.seed(),
            batch_size: config.batch_size,
            status: if error.is_some() { RunStatus::Failed } else { RunStatus::Completed },
            error,
            snapshot: counters.stats.snapshot(),
            commits: counters.commits,
            rollbacks: counters.rollbacks,
            not_found: counters.stats.not_found(),
            failed: counters.stats.failed(),
            wall_time,
            bytes_processed: counters.bytes,
            mix: (kind == OperationKind::MixedTransaction).then_some(counters.mix),
        };

        info!(
            benchmark = name,
            ops = outcome.op_count(),
            commits = outcome.commits,
            wall_ms = wall_time.as_secs_f64() * 1000.0,
            "benchmark finished"
        );

        Ok(outcome)
    }

    fn prepare(
        &mut self,
        kind: OperationKind,
        config: &BenchmarkConfig,
        keys: &KeySet,
    ) -> Result<WorkloadGenerator> {
        config.validate()?;

        if kind.needs_existing_keys() && keys.is_empty() {
            return Err(KVOrbError::ConfigError(format!(
                "{} benchmark needs keys written by an earlier run",
                kind
            )));
        }

        if self.store.in_batch() {
            return Err(KVOrbError::ConfigError(
                "store already has an open batch".to_string(),
            ));
        }

        WorkloadGenerator::new(config)
    }

    fn execute(
        &mut self,
        kind: OperationKind,
        op_count: usize,
        config: &BenchmarkConfig,
        generator: &mut WorkloadGenerator,
        keys: &mut KeySet,
        counters: &mut RunCounters,
    ) -> std::result::Result<(), StoreError> {
        let batched = config.is_batched();
        if batched {
            self.begin(keys)?;
        }

        self.state = RunState::Running;
        for i in 0..op_count {
            match kind {
                OperationKind::MixedTransaction => {
                    let op = generator.choose_op();
                    match op {
                        MixOp::Get => counters.mix.get += 1,
                        MixOp::Insert => counters.mix.insert += 1,
                        MixOp::Update => counters.mix.update += 1,
                        MixOp::Delete => counters.mix.delete += 1,
                    }
                    self.step(op, i, config, generator, keys, counters)?;
                }
                OperationKind::Insert => self.step(MixOp::Insert, i, config, generator, keys, counters)?,
                OperationKind::Get => self.step(MixOp::Get, i, config, generator, keys, counters)?,
                OperationKind::Update => self.step(MixOp::Update, i, config, generator, keys, counters)?,
                OperationKind::Delete => self.step(MixOp::Delete, i, config, generator, keys, counters)?,
                OperationKind::Upsert => self.upsert(config, generator, keys, counters)?,
                // Not per-operation; see execute_scan.
                OperationKind::Scan => break,
            }
            self.maybe_rotate_batch(i, op_count, config, keys, counters)?;
        }

        self.state = RunState::Finalizing;
        if batched {
            self.commit(keys, counters)?;
        }
        Ok(())
    }

    fn step(
        &mut self,
        op: MixOp,
        i: usize,
        config: &BenchmarkConfig,
        generator: &mut WorkloadGenerator,
        keys: &mut KeySet,
        counters: &mut RunCounters,
    ) -> std::result::Result<(), StoreError> {
        if op == MixOp::Insert {
            let key = generator.next_key(i);
            let value = generator.next_value(config.value_size);

            let start = Clock::now();
            let result = self.store.put(&key, &value);
            let micros = Clock::elapsed_micros(start);

            record(counters, micros, result.map(|()| true), (key.len() + value.len()) as u64)?;
            keys.push(key);
            return Ok(());
        }

        // With no known keys a mixed run still issues the call against a
        // fresh key, which the store reports as absent.
        let index = generator.pick_index(keys.len());
        let fresh_key;
        let key: &[u8] = match index.and_then(|index| keys.get(index)) {
            Some(key) => key,
            None => {
                fresh_key = generator.next_key(i);
                &fresh_key
            }
        };

        match op {
            MixOp::Get => {
                let start = Clock::now();
                let result = self.store.get(key);
                let micros = Clock::elapsed_micros(start);

                let bytes = match &result {
                    Ok(Some(value)) => (key.len() + value.len()) as u64,
                    _ => key.len() as u64,
                };
                record(counters, micros, result.map(|value| value.is_some()), bytes)?;
            }
            MixOp::Update => {
                let value = generator.next_value(config.value_size);

                let start = Clock::now();
                let result = self.store.update(key, &value);
                let micros = Clock::elapsed_micros(start);

                record(counters, micros, result, (key.len() + value.len()) as u64)?;
            }
            MixOp::Delete => {
                let start = Clock::now();
                let result = self.store.delete(key);
                let micros = Clock::elapsed_micros(start);

                record(counters, micros, result, key.len() as u64)?;
                // Gone either way; an absent key was a stale entry.
                if let Some(index) = index {
                    keys.swap_remove(index);
                }
            }
            MixOp::Insert => {}
        }
        Ok(())
    }

    fn upsert(
        &mut self,
        config: &BenchmarkConfig,
        generator: &mut WorkloadGenerator,
        keys: &KeySet,
        counters: &mut RunCounters,
    ) -> std::result::Result<(), StoreError> {
        let Some(key) = generator.pick_index(keys.len()).and_then(|index| keys.get(index)) else {
            return Ok(());
        };
        let value = generator.next_value(config.value_size);

        let start = Clock::now();
        let result = self.store.put(key, &value);
        let micros = Clock::elapsed_micros(start);

        record(counters, micros, result.map(|()| true), (key.len() + value.len()) as u64)?;
        Ok(())
    }

    fn execute_scan(
        &mut self,
        config: &BenchmarkConfig,
        keys: &mut KeySet,
        counters: &mut RunCounters,
    ) -> std::result::Result<(), StoreError> {
        let batched = config.is_batched();
        if batched {
            self.begin(keys)?;
        }

        self.state = RunState::Running;
        {
            let mut records = self.store.scan()?;
            loop {
                let start = Clock::now();
                let next = records.next();
                let micros = Clock::elapsed_micros(start);

                match next {
                    None => break,
                    Some(Ok((key, value))) => counters.observe(OperationResult::success(
                        micros,
                        (key.len() + value.len()) as u64,
                    )),
                    Some(Err(e)) => {
                        counters.observe(OperationResult::error(micros));
                        return Err(e);
                    }
                }
            }
        }

        self.state = RunState::Finalizing;
        if batched {
            self.commit(keys, counters)?;
        }
        Ok(())
    }

    /// Commit after every `batch_size`-th operation except the last, which
    /// commits at finalization.
    fn maybe_rotate_batch(
        &mut self,
        i: usize,
        op_count: usize,
        config: &BenchmarkConfig,
        keys: &mut KeySet,
        counters: &mut RunCounters,
    ) -> std::result::Result<(), StoreError> {
        if config.is_batched() && (i + 1) % config.batch_size == 0 && i + 1 < op_count {
            self.commit(keys, counters)?;
            self.begin(keys)?;
        }
        Ok(())
    }

    fn begin(&mut self, keys: &mut KeySet) -> std::result::Result<(), StoreError> {
        self.store.begin_batch()?;
        keys.begin();
        Ok(())
    }

    fn commit(
        &mut self,
        keys: &mut KeySet,
        counters: &mut RunCounters,
    ) -> std::result::Result<(), StoreError> {
        self.store.commit_batch()?;
        keys.commit();
        counters.commits += 1;
        debug!(commits = counters.commits, "batch committed");
        Ok(())
    }

    fn abort(&mut self, keys: &mut KeySet, counters: &mut RunCounters) {
        if self.store.in_batch() {
            match self.store.rollback_batch() {
                Ok(()) => counters.rollbacks += 1,
                Err(e) => warn!(error = %e, "rollback failed"),
            }
        }
        keys.rollback();
    }
}

/// Observe a timed store call. `Ok(false)` means the key was absent.
fn record(
    counters: &mut RunCounters,
    micros: f64,
    result: std::result::Result<bool, StoreError>,
    bytes: u64,
) -> std::result::Result<bool, StoreError> {
    match result {
        Ok(true) => {
            counters.observe(OperationResult::success(micros, bytes));
            Ok(true)
        }
        Ok(false) => {
            counters.observe(OperationResult::not_found(micros, bytes));
            Ok(false)
        }
        Err(e) => {
            counters.observe(OperationResult::error(micros));
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bench::workload::index_key;
    use crate::config::{KeyMode, WorkloadMix};
    use crate::store::{InstrumentedStore, MemoryStore};

    fn sequential(op_count: usize, batch_size: usize) -> BenchmarkConfig {
        BenchmarkConfig::batched(op_count, batch_size)
            .with_key_mode(KeyMode::Sequential)
            .with_value_size(16)
            .with_seed(42)
    }

    fn seeded_store(count: usize) -> (MemoryStore, KeySet) {
        let mut store = MemoryStore::new();
        let mut keys = KeySet::new();
        BenchmarkRunner::new(&mut store)
            .run("seed", OperationKind::Insert, &sequential(count, 0), &mut keys)
            .unwrap();
        (store, keys)
    }

    #[test]
    fn test_insert_commits_every_batch() {
        let mut store = InstrumentedStore::new(MemoryStore::new());
        let mut keys = KeySet::new();
        let mut runner = BenchmarkRunner::new(&mut store);

        let outcome = runner
            .run("insert", OperationKind::Insert, &sequential(2500, 1000), &mut keys)
            .unwrap();

        assert_eq!(runner.state(), RunState::Done);
        assert_eq!(outcome.status, RunStatus::Completed);
        assert_eq!(outcome.commits, 3);
        assert_eq!(outcome.op_count(), 2500);
        assert_eq!(outcome.bytes_processed, 2500 * (12 + 16));
        assert_eq!(keys.len(), 2500);
        assert_eq!(store.counters().begins, 3);
        assert_eq!(store.counters().commits, 3);
        assert!(!store.in_batch());
    }

    #[test]
    fn test_exact_multiple_of_batch_size() {
        let mut store = InstrumentedStore::new(MemoryStore::new());
        let mut keys = KeySet::new();
        let outcome = BenchmarkRunner::new(&mut store)
            .run("insert", OperationKind::Insert, &sequential(2000, 1000), &mut keys)
            .unwrap();

        assert_eq!(outcome.commits, 2);
        assert_eq!(store.counters().begins, 2);
    }

    #[test]
    fn test_auto_commit_opens_no_batches() {
        let mut store = InstrumentedStore::new(MemoryStore::new());
        let mut keys = KeySet::new();
        let outcome = BenchmarkRunner::new(&mut store)
            .run("single", OperationKind::Insert, &sequential(100, 0), &mut keys)
            .unwrap();

        assert_eq!(outcome.commits, 0);
        assert_eq!(store.counters().begins, 0);
        assert_eq!(store.inner().len(), 100);
    }

    #[test]
    fn test_failure_rolls_back_open_batch() {
        let mut store = InstrumentedStore::new(MemoryStore::new()).fail_at_operation(1500);
        let mut keys = KeySet::new();
        let mut runner = BenchmarkRunner::new(&mut store);

        let outcome = runner
            .run("insert", OperationKind::Insert, &sequential(2500, 1000), &mut keys)
            .unwrap();

        assert_eq!(runner.state(), RunState::Failed);
        assert!(outcome.is_failed());
        assert_eq!(outcome.op_count(), 1499);
        assert_eq!(outcome.failed, 1);
        assert_eq!(outcome.commits, 1);
        assert_eq!(outcome.rollbacks, 1);
        assert_eq!(keys.len(), 1000);
        assert!(!store.in_batch());
        assert_eq!(store.inner().len(), 1000);
        assert!(matches!(
            outcome.into_result(),
            Err(KVOrbError::BackendError(StoreError::Backend(_)))
        ));
    }

    #[test]
    fn test_get_finds_every_inserted_key() {
        let (mut store, mut keys) = seeded_store(500);
        let outcome = BenchmarkRunner::new(&mut store)
            .run("get", OperationKind::Get, &sequential(1000, 0), &mut keys)
            .unwrap();

        assert_eq!(outcome.op_count(), 1000);
        assert_eq!(outcome.not_found, 0);
    }

    #[test]
    fn test_update_and_upsert_keep_key_count() {
        let (mut store, mut keys) = seeded_store(200);
        let mut runner = BenchmarkRunner::new(&mut store);

        let updated = runner
            .run("update", OperationKind::Update, &sequential(100, 0), &mut keys)
            .unwrap();
        let upserted = runner
            .run("upsert", OperationKind::Upsert, &sequential(100, 100), &mut keys)
            .unwrap();

        assert_eq!(updated.not_found, 0);
        assert_eq!(upserted.commits, 1);
        assert_eq!(keys.len(), 200);
        assert_eq!(store.len(), 200);
    }

    #[test]
    fn test_delete_is_capped_at_known_keys() {
        let (mut store, mut keys) = seeded_store(30);
        let outcome = BenchmarkRunner::new(&mut store)
            .run("delete", OperationKind::Delete, &sequential(50, 0), &mut keys)
            .unwrap();

        assert_eq!(outcome.op_count(), 30);
        assert_eq!(outcome.not_found, 0);
        assert!(keys.is_empty());
        assert!(store.is_empty());
    }

    #[test]
    fn test_colliding_inserts_are_tracked_once() {
        let mut store = MemoryStore::new();
        let mut keys = KeySet::new();
        let mut runner = BenchmarkRunner::new(&mut store);

        let insert = sequential(1000, 0).with_key_mode(KeyMode::RandomIndex);
        runner
            .run("insert", OperationKind::Insert, &insert, &mut keys)
            .unwrap();
        let distinct = keys.len();
        assert!(distinct < 1000);

        let deleted = runner
            .run("delete", OperationKind::Delete, &sequential(distinct, 0), &mut keys)
            .unwrap();

        assert_eq!(deleted.op_count(), distinct as u64);
        assert_eq!(deleted.not_found, 0);
        assert!(keys.is_empty());
        assert!(store.is_empty());
    }

    #[test]
    fn test_sequential_mixed_keeps_keys_in_step_with_store() {
        let (mut store, mut keys) = seeded_store(1000);
        let config = sequential(500, 0).with_mix(WorkloadMix::default());
        let outcome = BenchmarkRunner::new(&mut store)
            .run("mixed", OperationKind::MixedTransaction, &config, &mut keys)
            .unwrap();

        assert_eq!(outcome.not_found, 0);
        assert!(outcome.mix.unwrap().delete > 0);
        assert_eq!(keys.len(), store.len());
    }

    #[test]
    fn test_delete_drops_stale_keys() {
        let (mut store, mut keys) = seeded_store(10);
        keys.push(index_key(500));

        let outcome = BenchmarkRunner::new(&mut store)
            .run("delete", OperationKind::Delete, &sequential(11, 0), &mut keys)
            .unwrap();

        assert_eq!(outcome.op_count(), 11);
        assert_eq!(outcome.not_found, 1);
        assert!(keys.is_empty());
        assert!(store.is_empty());
    }

    #[test]
    fn test_get_without_keys_is_config_error() {
        let mut store = InstrumentedStore::new(MemoryStore::new());
        let mut keys = KeySet::new();
        let mut runner = BenchmarkRunner::new(&mut store);

        let result = runner.run("get", OperationKind::Get, &sequential(10, 0), &mut keys);

        assert!(matches!(result, Err(KVOrbError::ConfigError(_))));
        assert_eq!(runner.state(), RunState::Failed);
        assert_eq!(store.counters().operations, 0);
    }

    #[test]
    fn test_zero_op_count_is_config_error() {
        let mut store = MemoryStore::new();
        let mut keys = KeySet::new();
        let result = BenchmarkRunner::new(&mut store).run(
            "insert",
            OperationKind::Insert,
            &sequential(0, 0),
            &mut keys,
        );
        assert!(matches!(result, Err(KVOrbError::ConfigError(_))));
    }

    #[test]
    fn test_mixed_counts_add_up() {
        let (mut store, mut keys) = seeded_store(1000);
        let config = sequential(2000, 2000)
            .with_key_mode(KeyMode::RandomBytes)
            .with_mix(WorkloadMix::default());
        let outcome = BenchmarkRunner::new(&mut store)
            .run("mixed", OperationKind::MixedTransaction, &config, &mut keys)
            .unwrap();

        let mix = outcome.mix.unwrap();
        assert_eq!(mix.total(), 2000);
        assert_eq!(mix.update, 0);
        assert_eq!(outcome.op_count() + outcome.failed, 2000);
        assert_eq!(keys.len() as u64, 1000 + mix.insert - mix.delete);
        assert_eq!(store.len(), keys.len());
    }

    #[test]
    fn test_mixed_on_empty_store_reports_not_found() {
        let mut store = MemoryStore::new();
        let mut keys = KeySet::new();
        let config = sequential(50, 0).with_mix(WorkloadMix::new(1, 0, 0, 0));
        let outcome = BenchmarkRunner::new(&mut store)
            .run("mixed", OperationKind::MixedTransaction, &config, &mut keys)
            .unwrap();

        assert_eq!(outcome.op_count(), 50);
        assert_eq!(outcome.not_found, 50);
    }

    #[test]
    fn test_scan_visits_every_record() {
        let (mut store, mut keys) = seeded_store(300);
        let outcome = BenchmarkRunner::new(&mut store)
            .run("scan", OperationKind::Scan, &sequential(1, 0), &mut keys)
            .unwrap();

        assert_eq!(outcome.op_count(), 300);
        assert_eq!(outcome.bytes_processed, 300 * (12 + 16));
    }

    #[test]
    fn test_runs_replay_with_same_seed() {
        let (mut first, mut first_keys) = seeded_store(10);
        let (mut second, mut second_keys) = seeded_store(10);
        let config = sequential(100, 0)
            .with_key_mode(KeyMode::RandomIndex)
            .with_mix(WorkloadMix::uniform_read_write());

        let a = BenchmarkRunner::new(&mut first)
            .run("mixed", OperationKind::MixedTransaction, &config, &mut first_keys)
            .unwrap();
        let b = BenchmarkRunner::new(&mut second)
            .run("mixed", OperationKind::MixedTransaction, &config, &mut second_keys)
            .unwrap();

        assert_eq!(a.mix, b.mix);
        assert_eq!(a.seed, 42);
        assert_eq!(
            first.scan().unwrap().collect::<Vec<_>>(),
            second.scan().unwrap().collect::<Vec<_>>()
        );
        assert!(first_keys.iter().any(|key| key == index_key(0).as_slice()));
    }
}
