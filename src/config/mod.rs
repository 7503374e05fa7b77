//! Configuration management module
//!
//! Handles loading, saving, and validation of benchmark configuration:
//! per-run workload parameters, SQLite adapter tuning and suite settings.

use std::path::{Path, PathBuf};
use std::fs;
use serde::{Deserialize, Serialize};
use crate::{KVOrbError, Result, APP_NAME, CONFIG_ENV, CONFIG_FILE};
use crate::report::OutputFormat;
use crate::store::SqliteOptions;

pub mod history;

use crate::models::BenchmarkResult;
use history::ReportHistory;

/// Upper bound on operations per run; sequential keys stay distinct below it
pub const MAX_OP_COUNT: usize = 100_000_000;
pub const MAX_KEY_SIZE: usize = 1024;
pub const MAX_VALUE_SIZE: usize = 16 * 1024 * 1024; // 16 MiB

/// Parameters of a single benchmark run. Immutable while the run executes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BenchmarkConfig {
    /// Operations to execute
    pub op_count: usize,
    /// Operations per transaction; 0 runs every operation in auto-commit
    pub batch_size: usize,
    /// Key length in bytes for `random_bytes` keys
    pub key_size: usize,
    /// Value length in bytes
    pub value_size: usize,
    /// How keys are produced
    pub key_mode: KeyMode,
    /// How values are produced
    pub value_mode: ValueMode,
    /// Generator seed; drawn from entropy (and reported) when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    /// Operation weights for mixed workloads
    pub mix: WorkloadMix,
}

/// Key generation policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyMode {
    /// `"key_" + 8-digit index`, distinct across `[0, op_count)`
    Sequential,
    /// Same printable form built from a random index; collisions overwrite
    RandomIndex,
    /// `key_size` uniformly random bytes
    RandomBytes,
}

/// Value generation policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueMode {
    /// Uniformly random bytes
    RandomBytes,
    /// Random alphanumeric characters
    Printable,
}

/// Relative weights of the operations a mixed workload draws from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkloadMix {
    pub get: u32,
    pub insert: u32,
    pub update: u32,
    pub delete: u32,
}

impl Default for WorkloadMix {
    /// 70% reads, 20% writes of new keys, 10% deletes
    fn default() -> Self {
        Self {
            get: 70,
            insert: 20,
            update: 0,
            delete: 10,
        }
    }
}

impl WorkloadMix {
    pub fn new(get: u32, insert: u32, update: u32, delete: u32) -> Self {
        Self { get, insert, update, delete }
    }

    /// Equal thirds of insert, update and get
    pub fn uniform_read_write() -> Self {
        Self::new(1, 1, 1, 0)
    }

    pub fn total(&self) -> u64 {
        self.get as u64 + self.insert as u64 + self.update as u64 + self.delete as u64
    }
}

impl Default for BenchmarkConfig {
    fn default() -> Self {
        Self {
            op_count: 10_000,
            batch_size: 1_000,
            key_size: 32,
            value_size: 128,
            key_mode: KeyMode::RandomBytes,
            value_mode: ValueMode::RandomBytes,
            seed: None,
            mix: WorkloadMix::default(),
        }
    }
}

impl BenchmarkConfig {
    /// Create a new benchmark configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Every operation in its own implicit transaction
    pub fn auto_commit(op_count: usize) -> Self {
        Self {
            op_count,
            batch_size: 0,
            ..Self::default()
        }
    }

    /// Operations grouped into transactions of `batch_size`
    pub fn batched(op_count: usize, batch_size: usize) -> Self {
        Self {
            op_count,
            batch_size,
            ..Self::default()
        }
    }

    /// Validate the configuration parameters
    pub fn validate(&self) -> Result<()> {
        if self.op_count == 0 {
            return Err(KVOrbError::ConfigError(
                "Operation count must be greater than 0".to_string()
            ));
        }

        if self.op_count > MAX_OP_COUNT {
            return Err(KVOrbError::ConfigError(
                format!("Operation count too large: {} (max: {})",
                    self.op_count, MAX_OP_COUNT)
            ));
        }

        if self.batch_size > self.op_count {
            return Err(KVOrbError::ConfigError(
                format!("Batch size {} exceeds operation count {}",
                    self.batch_size, self.op_count)
            ));
        }

        if self.key_mode == KeyMode::RandomBytes
            && (self.key_size == 0 || self.key_size > MAX_KEY_SIZE)
        {
            return Err(KVOrbError::ConfigError(
                format!("Key size must be between 1 and {} bytes", MAX_KEY_SIZE)
            ));
        }

        if self.value_size > MAX_VALUE_SIZE {
            return Err(KVOrbError::ConfigError(
                format!("Value size too large: {} bytes (max: {} bytes)",
                    self.value_size, MAX_VALUE_SIZE)
            ));
        }

        if self.mix.total() == 0 {
            return Err(KVOrbError::ConfigError(
                "Workload mix weights must not all be zero".to_string()
            ));
        }

        Ok(())
    }

    /// Set the number of operations
    pub fn with_op_count(mut self, count: usize) -> Self {
        self.op_count = count;
        self
    }

    /// Set the transaction batch size (0 = auto-commit)
    pub fn with_batch_size(mut self, size: usize) -> Self {
        self.batch_size = size;
        self
    }

    /// Set the key length for random byte keys
    pub fn with_key_size(mut self, size: usize) -> Self {
        self.key_size = size;
        self
    }

    /// Set the value length
    pub fn with_value_size(mut self, size: usize) -> Self {
        self.value_size = size;
        self
    }

    pub fn with_key_mode(mut self, mode: KeyMode) -> Self {
        self.key_mode = mode;
        self
    }

    pub fn with_value_mode(mut self, mode: ValueMode) -> Self {
        self.value_mode = mode;
        self
    }

    /// Fix the generator seed
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_mix(mut self, mix: WorkloadMix) -> Self {
        self.mix = mix;
        self
    }

    pub fn is_batched(&self) -> bool {
        self.batch_size > 0
    }
}

/// Settings for a full suite invocation, stored as `kvorb.toml`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SuiteConfig {
    /// Report rendering
    pub output: OutputFormat,
    /// Value sizes for the size sweep
    pub value_sizes: Vec<usize>,
    /// Inserts per size in the sweep
    pub sweep_ops: usize,
    /// Append every report to the results history
    pub keep_history: bool,
    /// Baseline parameters for every benchmark of the suite
    pub benchmark: BenchmarkConfig,
    /// SQLite adapter tuning
    pub sqlite: SqliteOptions,
}

impl Default for SuiteConfig {
    fn default() -> Self {
        Self {
            output: OutputFormat::Text,
            value_sizes: vec![16, 64, 256, 1024, 4096, 16384, 65536],
            sweep_ops: 1_000,
            keep_history: true,
            benchmark: BenchmarkConfig::default(),
            sqlite: SqliteOptions::default(),
        }
    }
}

impl SuiteConfig {
    /// Validate the suite and its baseline benchmark configuration
    pub fn validate(&self) -> Result<()> {
        self.benchmark.validate()?;

        if self.value_sizes.is_empty() {
            return Err(KVOrbError::ConfigError(
                "At least one sweep value size is required".to_string()
            ));
        }

        if let Some(size) = self
            .value_sizes
            .iter()
            .find(|&&size| size == 0 || size > MAX_VALUE_SIZE)
        {
            return Err(KVOrbError::ConfigError(
                format!("Sweep value size must be between 1 and {} bytes, got {}",
                    MAX_VALUE_SIZE, size)
            ));
        }

        if self.sweep_ops == 0 {
            return Err(KVOrbError::ConfigError(
                "Sweep operation count must be greater than 0".to_string()
            ));
        }

        Ok(())
    }

    /// Load configuration from `config_path`.
    /// Returns default configuration if the file doesn't exist
    pub fn load_from(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(config_path)
            .map_err(|e| KVOrbError::ConfigError(
                format!("Failed to read config file {}: {}", config_path.display(), e)
            ))?;

        let config: Self = toml::from_str(&content)
            .map_err(|e| KVOrbError::ConfigError(
                format!("Failed to parse config file {}: {}", config_path.display(), e)
            ))?;

        config.validate()?;

        Ok(config)
    }

    /// Save configuration to an explicit path
    pub fn save_to(&self, config_path: &Path) -> Result<()> {
        self.validate()?;

        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| KVOrbError::ConfigError(
                    format!("Failed to create config directory {}: {}", parent.display(), e)
                ))?;
        }

        let content = toml::to_string_pretty(self)?;

        fs::write(config_path, content)
            .map_err(|e| KVOrbError::ConfigError(
                format!("Failed to write config file {}: {}", config_path.display(), e)
            ))?;

        Ok(())
    }

    /// `$KVORB_CONFIG` when set, the standard path otherwise
    pub fn resolve_path() -> Result<PathBuf> {
        match std::env::var_os(CONFIG_ENV) {
            Some(path) => Ok(PathBuf::from(path)),
            None => Self::config_file_path(),
        }
    }

    /// Get the standard configuration file path
    /// Uses $CONFIG_HOME/kvorb/kvorb.toml or falls back to $HOME/.config/kvorb/kvorb.toml
    pub fn config_file_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| KVOrbError::ConfigError(
                "Unable to determine config directory".to_string()
            ))?;

        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }
}

/// Configuration manager for the config file and the report history
pub struct ConfigManager {
    config_path: PathBuf,
    history: ReportHistory,
}

impl ConfigManager {
    /// Create a new configuration manager at the standard locations
    pub fn new() -> Result<Self> {
        Ok(Self {
            config_path: SuiteConfig::resolve_path()?,
            history: ReportHistory::open_default()?,
        })
    }

    /// Create a configuration manager over explicit file locations
    pub fn with_paths(config_path: PathBuf, results_path: PathBuf) -> Self {
        Self {
            config_path,
            history: ReportHistory::at(results_path),
        }
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn results_path(&self) -> &Path {
        self.history.path()
    }

    /// Load configuration from file or return default
    pub fn load_config(&self) -> Result<SuiteConfig> {
        SuiteConfig::load_from(&self.config_path)
    }

    /// Save configuration to file
    pub fn save_config(&self, config: &SuiteConfig) -> Result<()> {
        config.save_to(&self.config_path)
    }

    /// Append reports to the history; returns the number of stored records
    pub fn save_results(&self, results: &[BenchmarkResult]) -> Result<usize> {
        self.history.append(results)
    }

    /// Stored reports, oldest first
    pub fn load_results(&self) -> Result<Vec<BenchmarkResult>> {
        self.history.load()
    }
}
