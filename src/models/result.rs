//! Benchmark result data models
//!
//! Per-benchmark results, the write/read aggregate a worker reports, and
//! the reduction the coordinator applies across workers.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::util::units::calculate_throughput;
use crate::{DocBenchError, Result};

/// Kind of operation a benchmark measures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum BenchmarkType {
    /// Document inserts
    Write,
    /// Document lookups
    Read,
}

impl BenchmarkType {
    pub fn label(&self) -> &'static str {
        match self {
            BenchmarkType::Write => "WRITE",
            BenchmarkType::Read => "READ",
        }
    }
}

impl fmt::Display for BenchmarkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Throughput of one benchmark run, tagged with what produced it.
///
/// Fields are read-only once constructed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkResult {
    benchmark_type: BenchmarkType,
    concurrency_level: usize,
    /// Requests per second
    average_throughput: f64,
}

impl BenchmarkResult {
    pub fn new(benchmark_type: BenchmarkType, concurrency_level: usize, average_throughput: f64) -> Self {
        Self {
            benchmark_type,
            concurrency_level,
            average_throughput,
        }
    }

    pub fn benchmark_type(&self) -> BenchmarkType {
        self.benchmark_type
    }

    pub fn concurrency_level(&self) -> usize {
        self.concurrency_level
    }

    pub fn average_throughput(&self) -> f64 {
        self.average_throughput
    }

    /// Sum the throughput of two results of the same kind and level
    pub fn combine(&self, other: &BenchmarkResult) -> Result<BenchmarkResult> {
        if self.benchmark_type != other.benchmark_type {
            return Err(DocBenchError::ResultMismatch(format!(
                "cannot combine {} with {}",
                self.benchmark_type, other.benchmark_type
            )));
        }

        if self.concurrency_level != other.concurrency_level {
            return Err(DocBenchError::ResultMismatch(format!(
                "cannot combine concurrency level {} with {}",
                self.concurrency_level, other.concurrency_level
            )));
        }

        Ok(BenchmarkResult {
            average_throughput: self.average_throughput + other.average_throughput,
            ..self.clone()
        })
    }
}

/// WRITE and READ results of one worker, or the sum over several workers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateResult {
    write: BenchmarkResult,
    read: BenchmarkResult,
}

impl AggregateResult {
    /// Pair a WRITE and a READ result
    pub fn new(write: BenchmarkResult, read: BenchmarkResult) -> Result<Self> {
        if write.benchmark_type != BenchmarkType::Write || read.benchmark_type != BenchmarkType::Read {
            return Err(DocBenchError::ResultMismatch(format!(
                "expected WRITE and READ results, got {} and {}",
                write.benchmark_type, read.benchmark_type
            )));
        }

        Ok(Self { write, read })
    }

    /// Build an aggregate from raw throughput figures
    pub fn from_throughputs(concurrency_level: usize, write_throughput: f64, read_throughput: f64) -> Self {
        Self {
            write: BenchmarkResult::new(BenchmarkType::Write, concurrency_level, write_throughput),
            read: BenchmarkResult::new(BenchmarkType::Read, concurrency_level, read_throughput),
        }
    }

    pub fn write(&self) -> &BenchmarkResult {
        &self.write
    }

    pub fn read(&self) -> &BenchmarkResult {
        &self.read
    }

    /// Field-wise sum of two aggregates
    pub fn combine(&self, other: &AggregateResult) -> Result<AggregateResult> {
        Ok(AggregateResult {
            write: self.write.combine(&other.write)?,
            read: self.read.combine(&other.read)?,
        })
    }

    /// Fold worker results into one aggregate.
    ///
    /// A single input comes back unchanged.
    pub fn reduce<I>(results: I) -> Result<AggregateResult>
    where
        I: IntoIterator<Item = AggregateResult>,
    {
        let mut results = results.into_iter();
        let first = results
            .next()
            .ok_or_else(|| DocBenchError::ResultMismatch("no results to reduce".to_string()))?;

        results.try_fold(first, |memo, result| memo.combine(&result))
    }
}

/// Outcome of one warm-up/measure run of the engine
#[derive(Debug, Clone, PartialEq)]
pub struct ThroughputSample {
    /// Completed iterations per second of measurement
    pub average_throughput: f64,
    /// Iterations completed across all streams during measurement
    pub completed_iterations: u64,
    /// Wall-clock length of the measurement phase
    pub elapsed: Duration,
    /// Mean latency of a measured iteration, in milliseconds
    pub mean_iteration_latency_ms: f64,
}

impl ThroughputSample {
    pub fn new(completed_iterations: u64, elapsed: Duration, mean_iteration_latency_ms: f64) -> Self {
        Self {
            average_throughput: calculate_throughput(completed_iterations, elapsed),
            completed_iterations,
            elapsed,
            mean_iteration_latency_ms,
        }
    }
}

/// Aggregate result of one sweep step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepEntry {
    pub timestamp: DateTime<Utc>,
    pub process_count: usize,
    pub concurrency_level: usize,
    pub result: AggregateResult,
}

impl SweepEntry {
    pub fn new(process_count: usize, result: AggregateResult) -> Self {
        Self {
            timestamp: Utc::now(),
            process_count,
            concurrency_level: result.write().concurrency_level(),
            result,
        }
    }

    /// Write plus read throughput
    pub fn total_throughput(&self) -> f64 {
        self.result.write().average_throughput() + self.result.read().average_throughput()
    }
}
