//! Standard benchmark suite
//!
//! The fixed sequence of runs executed against one store: inserts that
//! populate the key set, reads and writes over those keys, a full scan, then
//! a value-size sweep over an emptied store.

use tracing::{info, warn};

use crate::bench::runner::{BenchmarkRunner, RunOutcome};
use crate::bench::workload::KeySet;
use crate::config::{BenchmarkConfig, SuiteConfig};
use crate::models::OperationKind;
use crate::store::KeyValueStore;
use crate::{error, Result};

/// Operations in the auto-commit insert run
const SINGLE_INSERT_OPS: usize = 1_000;

/// One entry of a suite
#[derive(Debug, Clone, PartialEq)]
pub enum SuiteStep {
    Run {
        name: String,
        kind: OperationKind,
        config: BenchmarkConfig,
        /// Whether keys written by this run join the shared key set
        capture_keys: bool,
    },
    /// Empty the store and the shared key set
    Clear,
}

/// An ordered list of benchmark runs sharing one key set
#[derive(Debug, Clone)]
pub struct Suite {
    steps: Vec<SuiteStep>,
}

impl Suite {
    pub fn new(steps: Vec<SuiteStep>) -> Self {
        Self { steps }
    }

    /// The standard sequence derived from `config`
    pub fn standard(config: &SuiteConfig) -> Result<Self> {
        config.validate()?;

        let base = &config.benchmark;
        let ops = base.op_count;
        let half = (ops / 2).max(1);
        let mut steps = Vec::new();
        let mut next_seed = {
            let mut index = 0u64;
            let seed = base.seed;
            move || {
                index += 1;
                seed.map(|seed| seed.wrapping_add(index))
            }
        };

        let mut push = |name: String, kind, op_count: usize, batch_size: usize, capture_keys| {
            let mut run_config = base
                .clone()
                .with_op_count(op_count)
                .with_batch_size(batch_size.min(op_count));
            run_config.seed = next_seed();
            steps.push(SuiteStep::Run {
                name,
                kind,
                config: run_config,
                capture_keys,
            });
        };

        push("Single INSERT".into(), OperationKind::Insert, SINGLE_INSERT_OPS.min(ops), 0, false);
        push("Batch INSERT".into(), OperationKind::Insert, ops, base.batch_size, true);
        push("GET".into(), OperationKind::Get, ops, 0, true);
        push("UPDATE".into(), OperationKind::Update, half, 0, true);
        push("UPSERT".into(), OperationKind::Upsert, half, half, true);
        push("DELETE".into(), OperationKind::Delete, half, 0, true);
        push("Mixed Transaction".into(), OperationKind::MixedTransaction, half, half, true);
        push("Read Transaction".into(), OperationKind::Get, half, half, true);
        push("Full SCAN".into(), OperationKind::Scan, ops, 0, true);

        let mut sweep = Vec::new();
        for &size in &config.value_sizes {
            let mut run_config = base
                .clone()
                .with_op_count(config.sweep_ops)
                .with_batch_size(config.sweep_ops)
                .with_value_size(size);
            run_config.seed = next_seed();
            sweep.push(SuiteStep::Run {
                name: format!("INSERT {} byte values", size),
                kind: OperationKind::Insert,
                config: run_config,
                capture_keys: false,
            });
            sweep.push(SuiteStep::Clear);
        }

        steps.push(SuiteStep::Clear);
        steps.extend(sweep);

        Ok(Self { steps })
    }

    pub fn steps(&self) -> &[SuiteStep] {
        &self.steps
    }

    /// Execute every step against `store`, handing each outcome to
    /// `on_outcome` as soon as its run ends.
    ///
    /// Failed runs are reported and the suite moves on; a run that cannot
    /// start is skipped. Only harness defects abort the suite.
    pub fn run<S, F>(&self, store: &mut S, mut on_outcome: F) -> Result<Vec<RunOutcome>>
    where
        S: KeyValueStore + ?Sized,
        F: FnMut(&RunOutcome),
    {
        let mut keys = KeySet::new();
        let mut outcomes = Vec::new();

        info!(backend = store.name(), steps = self.steps.len(), "running suite");

        for step in &self.steps {
            match step {
                SuiteStep::Run { name, kind, config, capture_keys } => {
                    let mut scratch = KeySet::new();
                    let run_keys = if *capture_keys { &mut keys } else { &mut scratch };

                    match BenchmarkRunner::new(&mut *store).run(name, *kind, config, run_keys) {
                        Ok(outcome) => {
                            on_outcome(&outcome);
                            outcomes.push(outcome);
                        }
                        Err(e) if error::aborts_suite(&e) => return Err(e),
                        Err(e) => warn!(benchmark = name.as_str(), error = %e, "skipping benchmark"),
                    }
                }
                SuiteStep::Clear => {
                    if let Err(e) = store.clear() {
                        warn!(error = %e, "failed to clear store");
                    }
                    keys.clear();
                }
            }
        }

        Ok(outcomes)
    }
}
