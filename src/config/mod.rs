//! Configuration management module
//!
//! Typed run and sweep configuration, loaded from TOML and validated
//! before any worker is started.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{DocBenchError, Result, APP_NAME, CONFIG_FILE};

pub mod persistence;

/// Streams kept in flight per worker unless configured otherwise
pub const DEFAULT_CONCURRENCY_LEVEL: usize = 4;
/// Unmeasured phase before throughput is recorded
pub const DEFAULT_WARM_UP_DURATION: Duration = Duration::from_secs(5);
/// Phase whose completions determine the reported throughput
pub const DEFAULT_MEASUREMENT_DURATION: Duration = Duration::from_secs(15);
/// Worker process counts swept by default
pub const DEFAULT_PROCESS_COUNTS: [usize; 3] = [1, 2, 4];
/// How long the coordinator waits for each worker reply
pub const DEFAULT_REPLY_TIMEOUT: Duration = Duration::from_secs(300);
/// Size of the payload document inserted by the write workload
pub const DEFAULT_DOCUMENT_SIZE: u64 = 1024;
pub const DEFAULT_COLLECTION: &str = "test";

pub const MAX_CONCURRENCY_LEVEL: usize = 1024;
pub const MAX_PROCESS_COUNT: usize = 256;
pub const MAX_DOCUMENT_SIZE: u64 = 16 * 1024 * 1024;
const MAX_PHASE_DURATION: Duration = Duration::from_secs(3600);

/// Parameters of a single warm-up/measure run
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RunConfiguration {
    /// Closed-loop streams kept in flight during each phase
    pub concurrency_level: usize,
    #[serde(with = "duration_str")]
    pub warm_up_duration: Duration,
    #[serde(with = "duration_str")]
    pub measurement_duration: Duration,
}

impl Default for RunConfiguration {
    fn default() -> Self {
        Self::new(DEFAULT_CONCURRENCY_LEVEL)
    }
}

impl RunConfiguration {
    /// Run configuration with the default phase durations
    pub fn new(concurrency_level: usize) -> Self {
        Self {
            concurrency_level,
            warm_up_duration: DEFAULT_WARM_UP_DURATION,
            measurement_duration: DEFAULT_MEASUREMENT_DURATION,
        }
    }

    pub fn with_warm_up_duration(mut self, duration: Duration) -> Self {
        self.warm_up_duration = duration;
        self
    }

    pub fn with_measurement_duration(mut self, duration: Duration) -> Self {
        self.measurement_duration = duration;
        self
    }

    /// Validate the run parameters
    pub fn validate(&self) -> Result<()> {
        if self.concurrency_level == 0 {
            return Err(DocBenchError::UnsupportedConfiguration(
                "Concurrency level must be at least 1".to_string(),
            ));
        }

        if self.concurrency_level > MAX_CONCURRENCY_LEVEL {
            return Err(DocBenchError::UnsupportedConfiguration(format!(
                "Concurrency level too high: {} (max: {})",
                self.concurrency_level, MAX_CONCURRENCY_LEVEL
            )));
        }

        if self.measurement_duration.is_zero() {
            return Err(DocBenchError::UnsupportedConfiguration(
                "Measurement duration must be greater than 0".to_string(),
            ));
        }

        if self.warm_up_duration > MAX_PHASE_DURATION || self.measurement_duration > MAX_PHASE_DURATION {
            return Err(DocBenchError::UnsupportedConfiguration(format!(
                "Phase duration too long (max: {}s)",
                MAX_PHASE_DURATION.as_secs()
            )));
        }

        Ok(())
    }

    /// Time one worker needs for a WRITE and a READ run, excluding set-up
    pub fn worker_run_time(&self) -> Duration {
        (self.warm_up_duration + self.measurement_duration) * 2
    }
}

/// Configuration of a sweep over worker process counts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SweepConfig {
    /// Worker process counts, run in order
    pub process_counts: Vec<usize>,
    pub concurrency_level: usize,
    #[serde(with = "duration_str")]
    pub warm_up_duration: Duration,
    #[serde(with = "duration_str")]
    pub measurement_duration: Duration,
    #[serde(with = "duration_str")]
    pub reply_timeout: Duration,
    /// Directory of the document store
    pub store_path: PathBuf,
    /// Collection name prefix; each worker appends its index
    pub collection: String,
    /// Payload size of written documents (in bytes)
    pub document_size: u64,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            process_counts: DEFAULT_PROCESS_COUNTS.to_vec(),
            concurrency_level: DEFAULT_CONCURRENCY_LEVEL,
            warm_up_duration: DEFAULT_WARM_UP_DURATION,
            measurement_duration: DEFAULT_MEASUREMENT_DURATION,
            reply_timeout: DEFAULT_REPLY_TIMEOUT,
            store_path: std::env::temp_dir().join(format!("{}-store", APP_NAME)),
            collection: DEFAULT_COLLECTION.to_string(),
            document_size: DEFAULT_DOCUMENT_SIZE,
        }
    }
}

impl SweepConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// The per-run configuration every worker uses
    pub fn run_configuration(&self) -> RunConfiguration {
        RunConfiguration::new(self.concurrency_level)
            .with_warm_up_duration(self.warm_up_duration)
            .with_measurement_duration(self.measurement_duration)
    }

    /// Validate the sweep parameters
    pub fn validate(&self) -> Result<()> {
        self.run_configuration().validate()?;

        if self.process_counts.is_empty() {
            return Err(DocBenchError::UnsupportedConfiguration(
                "At least one process count is required".to_string(),
            ));
        }

        if let Some(count) = self
            .process_counts
            .iter()
            .find(|&&count| count == 0 || count > MAX_PROCESS_COUNT)
        {
            return Err(DocBenchError::UnsupportedConfiguration(format!(
                "Process count must be between 1 and {}, got {}",
                MAX_PROCESS_COUNT, count
            )));
        }

        if self.reply_timeout.is_zero() {
            return Err(DocBenchError::UnsupportedConfiguration(
                "Reply timeout must be greater than 0".to_string(),
            ));
        }

        // Each worker runs WRITE and READ back to back before it can reply
        let worker_run_time = self.run_configuration().worker_run_time();
        if self.reply_timeout <= worker_run_time {
            return Err(DocBenchError::UnsupportedConfiguration(format!(
                "Reply timeout {} must exceed the {} each worker needs for its runs",
                humantime::format_duration(self.reply_timeout),
                humantime::format_duration(worker_run_time)
            )));
        }

        if self.document_size == 0 || self.document_size > MAX_DOCUMENT_SIZE {
            return Err(DocBenchError::UnsupportedConfiguration(format!(
                "Document size must be between 1 and {} bytes",
                MAX_DOCUMENT_SIZE
            )));
        }

        // Collection names become file names
        let valid_name = !self.collection.is_empty()
            && self
                .collection
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid_name {
            return Err(DocBenchError::ConfigError(format!(
                "Invalid collection name: '{}'",
                self.collection
            )));
        }

        Ok(())
    }

    pub fn with_process_counts(mut self, counts: Vec<usize>) -> Self {
        self.process_counts = counts;
        self
    }

    pub fn with_concurrency_level(mut self, level: usize) -> Self {
        self.concurrency_level = level;
        self
    }

    pub fn with_warm_up_duration(mut self, duration: Duration) -> Self {
        self.warm_up_duration = duration;
        self
    }

    pub fn with_measurement_duration(mut self, duration: Duration) -> Self {
        self.measurement_duration = duration;
        self
    }

    pub fn with_reply_timeout(mut self, timeout: Duration) -> Self {
        self.reply_timeout = timeout;
        self
    }

    pub fn with_store_path(mut self, path: PathBuf) -> Self {
        self.store_path = path;
        self
    }

    pub fn with_collection(mut self, collection: impl Into<String>) -> Self {
        self.collection = collection.into();
        self
    }

    pub fn with_document_size(mut self, size: u64) -> Self {
        self.document_size = size;
        self
    }

    /// Load configuration from the standard config file location
    /// Returns default configuration if file doesn't exist
    pub fn load() -> Result<Self> {
        let config_path = Self::config_file_path()?;

        if !config_path.exists() {
            return Ok(Self::default());
        }

        Self::load_from(&config_path)
    }

    /// Load and validate configuration from an explicit file
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            DocBenchError::ConfigError(format!("Failed to read config file {}: {}", path.display(), e))
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| {
            DocBenchError::ConfigError(format!("Failed to parse config file {}: {}", path.display(), e))
        })?;

        config.validate()?;

        Ok(config)
    }

    /// Save configuration to an explicit file
    pub fn save_to(&self, path: &Path) -> Result<()> {
        self.validate()?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                DocBenchError::ConfigError(format!(
                    "Failed to create config directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let content = toml::to_string_pretty(self)?;

        fs::write(path, content).map_err(|e| {
            DocBenchError::ConfigError(format!("Failed to write config file {}: {}", path.display(), e))
        })
    }

    /// Get the standard configuration file path
    /// Uses $CONFIG_HOME/docbench/docbench.toml
    pub fn config_file_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir().ok_or_else(|| {
            DocBenchError::ConfigError("Unable to determine config directory".to_string())
        })?;

        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }
}

/// Durations as human-readable strings ("15s", "5 seconds")
pub mod duration_str {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    use crate::util::units;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&units::format_duration(*duration))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let text = String::deserialize(deserializer)?;
        units::parse_duration(&text).map_err(serde::de::Error::custom)
    }
}
