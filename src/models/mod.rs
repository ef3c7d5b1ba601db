//! Data models module
//!
//! Contains benchmark results, worker aggregates and sweep entries.

pub mod result;

// Re-export commonly used types
pub use result::{AggregateResult, BenchmarkResult, BenchmarkType, SweepEntry, ThroughputSample};
