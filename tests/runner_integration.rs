use kvorb::bench::{index_key, BenchmarkRunner, KeySet, RunState, WorkloadGenerator};
use kvorb::config::{BenchmarkConfig, KeyMode, WorkloadMix};
use kvorb::models::{OperationKind, RunStatus};
use kvorb::report::{OutputFormat, Reporter};
use kvorb::store::{InstrumentedStore, KeyValueStore, SqliteOptions, SqliteStore};

fn sqlite() -> SqliteStore {
    SqliteStore::open_in_memory().expect("open in-memory sqlite")
}

fn sequential(op_count: usize, batch_size: usize) -> BenchmarkConfig {
    BenchmarkConfig::batched(op_count, batch_size)
        .with_key_mode(KeyMode::Sequential)
        .with_value_size(100)
        .with_seed(42)
}

fn stored_keys(store: &mut impl KeyValueStore) -> Vec<Vec<u8>> {
    store
        .scan()
        .unwrap()
        .map(|record| record.unwrap().0)
        .collect()
}

#[test]
fn test_batched_insert_commits_three_times() {
    let mut store = InstrumentedStore::new(sqlite());
    let mut keys = KeySet::new();

    let outcome = BenchmarkRunner::new(&mut store)
        .run("Batch INSERT", OperationKind::Insert, &sequential(2500, 1000), &mut keys)
        .unwrap();

    assert_eq!(outcome.commits, 3);
    assert_eq!(store.counters().commits, 3);
    assert_eq!(store.counters().rollbacks, 0);
    assert_eq!(outcome.op_count(), 2500);
    assert_eq!(stored_keys(&mut store).len(), 2500);
}

#[test]
fn test_failure_at_operation_1500_rolls_back_second_batch() {
    let mut store = InstrumentedStore::new(sqlite()).fail_at_operation(1500);
    let mut keys = KeySet::new();
    let mut runner = BenchmarkRunner::new(&mut store);

    let outcome = runner
        .run("Batch INSERT", OperationKind::Insert, &sequential(2500, 1000), &mut keys)
        .unwrap();

    assert_eq!(runner.state(), RunState::Failed);
    assert_eq!(outcome.status, RunStatus::Failed);
    assert_eq!(outcome.op_count(), 1499);
    assert_eq!(outcome.commits, 1);
    assert_eq!(outcome.rollbacks, 1);
    assert!(!store.in_batch());

    // Only the first committed batch survives, in store and key set alike.
    let expected: Vec<Vec<u8>> = (0..1000).map(index_key).collect();
    assert_eq!(stored_keys(&mut store), expected);
    assert_eq!(keys.len(), 1000);

    let report = Reporter::report(&outcome);
    assert!(report.is_failed());
    assert_eq!(report.op_count, 1499);
    assert!(report.error.unwrap().contains("injected failure at operation 1500"));
}

#[test]
fn test_sequential_keys_read_back_exactly() {
    let mut store = sqlite();
    let mut keys = KeySet::new();
    let config = sequential(10_000, 1000).with_value_size(128);

    BenchmarkRunner::new(&mut store)
        .run("Batch INSERT", OperationKind::Insert, &config, &mut keys)
        .unwrap();

    // Same seed, same draw order as the insert loop: key, then value.
    let mut replay = WorkloadGenerator::new(&config).unwrap();
    for i in 0..10_000 {
        let key = replay.next_key(i);
        let expected = replay.next_value(128);
        assert_eq!(key, index_key(i));
        assert_eq!(store.get(&key).unwrap(), Some(expected), "key {}", i);
    }
    assert_eq!(store.get(b"key_00010000").unwrap(), None);

    let outcome = BenchmarkRunner::new(&mut store)
        .run("GET", OperationKind::Get, &sequential(10_000, 0), &mut keys)
        .unwrap();
    assert_eq!(outcome.not_found, 0);
    assert_eq!(outcome.op_count(), 10_000);
}

#[test]
fn test_random_index_inserts_then_delete_everything() {
    let mut store = sqlite();
    let mut keys = KeySet::new();
    let mut runner = BenchmarkRunner::new(&mut store);

    let insert = sequential(1000, 250).with_key_mode(KeyMode::RandomIndex);
    runner
        .run("insert", OperationKind::Insert, &insert, &mut keys)
        .unwrap();
    let distinct = keys.len();

    let outcome = runner
        .run("delete", OperationKind::Delete, &sequential(distinct, 0), &mut keys)
        .unwrap();

    assert_eq!(outcome.not_found, 0);
    assert_eq!(outcome.op_count(), distinct as u64);
    assert!(keys.is_empty());
    assert!(stored_keys(&mut store).is_empty());
}

#[test]
fn test_same_seed_writes_same_values() {
    let mut first = sqlite();
    let mut second = sqlite();
    let config = BenchmarkConfig::batched(200, 50).with_seed(42);

    BenchmarkRunner::new(&mut first)
        .run("insert", OperationKind::Insert, &config, &mut KeySet::new())
        .unwrap();
    BenchmarkRunner::new(&mut second)
        .run("insert", OperationKind::Insert, &config, &mut KeySet::new())
        .unwrap();

    let a: Vec<_> = first.scan().unwrap().map(Result::unwrap).collect();
    let b: Vec<_> = second.scan().unwrap().map(Result::unwrap).collect();
    assert_eq!(a.len(), 200);
    assert_eq!(a, b);
}

#[test]
fn test_delete_removes_known_keys() {
    let mut store = sqlite();
    let mut keys = KeySet::new();
    let mut runner = BenchmarkRunner::new(&mut store);

    runner
        .run("insert", OperationKind::Insert, &sequential(1000, 500), &mut keys)
        .unwrap();
    let outcome = runner
        .run("delete", OperationKind::Delete, &sequential(400, 0), &mut keys)
        .unwrap();

    assert_eq!(outcome.op_count(), 400);
    assert_eq!(outcome.not_found, 0);
    assert_eq!(keys.len(), 600);

    let mut remaining = stored_keys(&mut store);
    let mut known: Vec<Vec<u8>> = keys.iter().map(<[u8]>::to_vec).collect();
    remaining.sort();
    known.sort();
    assert_eq!(remaining, known);
}

#[test]
fn test_mixed_transaction_counts() {
    let mut store = InstrumentedStore::new(sqlite());
    let mut keys = KeySet::new();
    let mut runner = BenchmarkRunner::new(&mut store);

    runner
        .run("insert", OperationKind::Insert, &sequential(2000, 1000), &mut keys)
        .unwrap();
    let config = BenchmarkConfig::batched(5000, 5000)
        .with_seed(42)
        .with_mix(WorkloadMix::default());
    let outcome = runner
        .run("mixed", OperationKind::MixedTransaction, &config, &mut keys)
        .unwrap();

    let mix = outcome.mix.expect("mixed runs report their draws");
    assert_eq!(mix.total(), 5000);
    assert_eq!(mix.update, 0);
    assert!(mix.get > mix.insert && mix.insert > mix.delete);
    assert_eq!(outcome.commits, 1);
    assert_eq!(store.counters().operations, 2000 + 5000);
    assert_eq!(stored_keys(&mut store).len(), keys.len());
}

#[test]
fn test_scan_reports_rows_and_bytes() {
    let mut store = sqlite();
    let mut keys = KeySet::new();
    let mut runner = BenchmarkRunner::new(&mut store);

    runner
        .run("insert", OperationKind::Insert, &sequential(700, 700), &mut keys)
        .unwrap();
    let outcome = runner
        .run("scan", OperationKind::Scan, &sequential(1, 0), &mut keys)
        .unwrap();

    assert_eq!(outcome.op_count(), 700);
    assert_eq!(outcome.bytes_processed, 700 * (12 + 100));

    let line = Reporter::new(OutputFormat::Json)
        .render(&Reporter::report(&outcome))
        .unwrap();
    let value: serde_json::Value = serde_json::from_str(&line).unwrap();
    assert_eq!(value["kind"], "scan");
    assert_eq!(value["op_count"], 700);
}

#[test]
fn test_on_disk_database_survives_reopen() {
    let temp_dir = tempfile::TempDir::new().unwrap();
    let options = SqliteOptions::with_path(temp_dir.path().join("bench.db"));
    let mut keys = KeySet::new();

    {
        let mut store = SqliteStore::open(&options).unwrap();
        BenchmarkRunner::new(&mut store)
            .run("insert", OperationKind::Insert, &sequential(300, 100), &mut keys)
            .unwrap();
    }

    let mut reopened = SqliteStore::open(&options).unwrap();
    assert_eq!(stored_keys(&mut reopened).len(), 300);
    let outcome = BenchmarkRunner::new(&mut reopened)
        .run("get", OperationKind::Get, &sequential(300, 0), &mut keys)
        .unwrap();
    assert_eq!(outcome.not_found, 0);
}
