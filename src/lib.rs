//! docbench - Document store throughput bench
//!
//! Measures sustained write/read throughput of a pluggable workload under a
//! fixed number of closed-loop streams, replicated across isolated worker
//! processes and summed into one figure per metric.

use std::time::Duration;
use thiserror::Error;

pub mod bench;
pub mod config;
pub mod models;
pub mod pool;
pub mod report;
pub mod store;
pub mod util;

use bench::Phase;

// Common error types
#[derive(Debug, Error)]
pub enum DocBenchError {
    /// Workload could not acquire its resources
    #[error("Setup failed: {0}")]
    SetupFailure(String),
    /// A unit of work failed while a phase was running
    #[error("Iteration failed during {phase}: {message}")]
    IterationFailure { phase: Phase, message: String },
    /// Workload could not release its resources
    #[error("Teardown failed: {0}")]
    TeardownFailure(String),
    /// Worker did not answer a broadcast in time
    #[error("Worker {index} did not reply within {timeout:?}")]
    WorkerUnresponsive { index: usize, timeout: Duration },
    /// Worker answered with an error or went away
    #[error("Worker {index} failed: {message}")]
    WorkerError { index: usize, message: String },
    /// Configuration value the engine cannot run with
    #[error("Unsupported configuration: {0}")]
    UnsupportedConfiguration(String),
    /// Configuration file loading or validation error
    #[error("Configuration error: {0}")]
    ConfigError(String),
    /// Malformed worker message
    #[error("Protocol error: {0}")]
    ProtocolError(String),
    /// Results that cannot be combined
    #[error("Result mismatch: {0}")]
    ResultMismatch(String),
    /// Document store error
    #[error("Store error: {0}")]
    StoreError(String),
    /// Results history error
    #[error("Results persistence error: {0}")]
    PersistenceError(String),
    /// I/O operation failed
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

impl From<serde_json::Error> for DocBenchError {
    fn from(err: serde_json::Error) -> Self {
        DocBenchError::ProtocolError(format!("JSON error: {}", err))
    }
}

impl From<toml::de::Error> for DocBenchError {
    fn from(err: toml::de::Error) -> Self {
        DocBenchError::ConfigError(format!("TOML parsing error: {}", err))
    }
}

impl From<toml::ser::Error> for DocBenchError {
    fn from(err: toml::ser::Error) -> Self {
        DocBenchError::ConfigError(format!("TOML serialization error: {}", err))
    }
}

/// Result type alias for docbench operations
pub type Result<T> = std::result::Result<T, DocBenchError>;

/// Error reporting helpers
pub mod error {
    use super::DocBenchError;

    /// Convert error to user-friendly message with a hint
    pub fn user_friendly_message(error: &DocBenchError) -> String {
        match error {
            DocBenchError::SetupFailure(msg) => {
                format!("Could not prepare the workload ({}). Check the store path and permissions.", msg)
            }
            DocBenchError::WorkerUnresponsive { index, timeout } => format!(
                "Worker {} did not answer within {}. Increase --reply-timeout or shorten the phases.",
                index,
                humantime::format_duration(*timeout)
            ),
            DocBenchError::UnsupportedConfiguration(msg) | DocBenchError::ConfigError(msg) => {
                format!("Configuration error: {}. Check your settings.", msg)
            }
            DocBenchError::PersistenceError(_) => {
                "Failed to save results. Check disk space and permissions.".to_string()
            }
            _ => error.to_string(),
        }
    }

    /// Whether the error was raised before any worker ran
    pub fn is_configuration_error(error: &DocBenchError) -> bool {
        matches!(
            error,
            DocBenchError::UnsupportedConfiguration(_) | DocBenchError::ConfigError(_)
        )
    }
}

// Common types and constants
pub const APP_NAME: &str = "docbench";
pub const CONFIG_FILE: &str = "docbench.toml";
pub const RESULTS_FILE: &str = "results.json";
pub const MAX_RESULTS_HISTORY: usize = 100;
/// Hidden subcommand a worker process is started with
pub const WORKER_SUBCOMMAND: &str = "worker";
