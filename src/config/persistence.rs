//! Results persistence module
//!
//! Keeps a JSON history of sweep entries, rotated to the most recent
//! `MAX_RESULTS_HISTORY`.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::models::SweepEntry;
use crate::{DocBenchError, Result, APP_NAME, MAX_RESULTS_HISTORY, RESULTS_FILE};

/// Results storage manager
#[derive(Debug)]
pub struct ResultsStorage {
    results_path: PathBuf,
}

#[derive(Debug, Serialize, Deserialize)]
struct ResultsFile {
    version: u32,
    results: Vec<SweepEntry>,
}

impl ResultsStorage {
    /// Storage at the standard location
    pub fn new() -> Result<Self> {
        Ok(Self::with_path(Self::results_file_path()?))
    }

    /// Storage backed by an explicit file
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            results_path: path.into(),
        }
    }

    /// `$DATA_HOME/docbench/results.json`
    pub fn results_file_path() -> Result<PathBuf> {
        let data_dir = dirs::data_dir().ok_or_else(|| {
            DocBenchError::PersistenceError("Unable to determine data directory".to_string())
        })?;

        Ok(data_dir.join(APP_NAME).join(RESULTS_FILE))
    }

    pub fn path(&self) -> &Path {
        &self.results_path
    }

    /// Load every stored entry, oldest first
    pub fn load_results(&self) -> Result<Vec<SweepEntry>> {
        if !self.results_path.exists() {
            return Ok(Vec::new());
        }

        let content = fs::read_to_string(&self.results_path).map_err(|e| {
            DocBenchError::PersistenceError(format!(
                "Failed to read results file {}: {}",
                self.results_path.display(),
                e
            ))
        })?;

        let file: ResultsFile = serde_json::from_str(&content).map_err(|e| {
            DocBenchError::PersistenceError(format!(
                "Failed to parse results file {}: {}",
                self.results_path.display(),
                e
            ))
        })?;

        Ok(file.results)
    }

    /// Append entries, dropping the oldest beyond `MAX_RESULTS_HISTORY`
    pub fn append_results(&self, entries: &[SweepEntry]) -> Result<()> {
        let mut results = self.load_results()?;
        results.extend_from_slice(entries);

        if results.len() > MAX_RESULTS_HISTORY {
            let excess = results.len() - MAX_RESULTS_HISTORY;
            results.drain(..excess);
        }

        self.save_results(results)
    }

    fn save_results(&self, results: Vec<SweepEntry>) -> Result<()> {
        if let Some(parent) = self.results_path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                DocBenchError::PersistenceError(format!(
                    "Failed to create results directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let count = results.len();
        let content = serde_json::to_string_pretty(&ResultsFile { version: 1, results })
            .map_err(|e| DocBenchError::PersistenceError(format!("Failed to serialize results: {}", e)))?;

        fs::write(&self.results_path, content).map_err(|e| {
            DocBenchError::PersistenceError(format!(
                "Failed to write results file {}: {}",
                self.results_path.display(),
                e
            ))
        })?;

        debug!(path = %self.results_path.display(), count, "Saved results history");
        Ok(())
    }
}
