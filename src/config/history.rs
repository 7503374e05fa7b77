//! Report history
//!
//! Saved reports live in `results.jsonl`, one JSON record per line, oldest
//! first. Writes trim the file to the newest `MAX_RESULTS_HISTORY` records.

use std::fs::{self, File};
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};

use crate::models::BenchmarkResult;
use crate::{KVOrbError, Result, APP_NAME, MAX_RESULTS_HISTORY, RESULTS_FILE};

#[derive(Debug, Clone)]
pub struct ReportHistory {
    path: PathBuf,
}

impl ReportHistory {
    /// History under the platform data directory
    pub fn open_default() -> Result<Self> {
        let data_dir = dirs::data_dir().ok_or_else(|| {
            KVOrbError::PersistenceError("no data directory on this platform".to_string())
        })?;
        Ok(Self::at(data_dir.join(APP_NAME).join(RESULTS_FILE)))
    }

    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Every stored record, oldest first. A missing file is an empty history.
    pub fn load(&self) -> Result<Vec<BenchmarkResult>> {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(self.failure("read", e)),
        };

        let mut results = Vec::new();
        for (number, line) in BufReader::new(file).lines().enumerate() {
            let line = line.map_err(|e| self.failure("read", e))?;
            if line.trim().is_empty() {
                continue;
            }
            let result = serde_json::from_str(&line).map_err(|e| {
                KVOrbError::PersistenceError(format!(
                    "{} line {}: {}",
                    self.path.display(),
                    number + 1,
                    e
                ))
            })?;
            results.push(result);
        }
        Ok(results)
    }

    /// Append `new` after the stored records and return how many are kept
    pub fn append(&self, new: &[BenchmarkResult]) -> Result<usize> {
        let mut results = self.load()?;
        results.extend_from_slice(new);

        let excess = results.len().saturating_sub(MAX_RESULTS_HISTORY);
        let kept = &results[excess..];
        self.rewrite(kept)?;
        Ok(kept.len())
    }

    fn rewrite(&self, results: &[BenchmarkResult]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| self.failure("create directory for", e))?;
        }

        let mut buffer = Vec::new();
        for result in results {
            serde_json::to_writer(&mut buffer, result)?;
            buffer.push(b'\n');
        }

        // Readers see either the old file or the complete new one.
        let staging = self.path.with_extension("jsonl.tmp");
        fs::write(&staging, &buffer).map_err(|e| self.failure("write", e))?;
        fs::rename(&staging, &self.path).map_err(|e| self.failure("replace", e))?;
        Ok(())
    }

    fn failure(&self, action: &str, err: io::Error) -> KVOrbError {
        KVOrbError::PersistenceError(format!(
            "failed to {} {}: {}",
            action,
            self.path.display(),
            err
        ))
    }
}

/// Newest record of benchmark `name` run against `backend`
pub fn latest_for<'a>(
    history: &'a [BenchmarkResult],
    name: &str,
    backend: &str,
) -> Option<&'a BenchmarkResult> {
    history
        .iter()
        .rev()
        .find(|result| result.report.name == name && result.backend.name == backend)
}
