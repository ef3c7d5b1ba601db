//! Per-process benchmark runner
//!
//! Runs the WRITE benchmark and then the READ benchmark at one concurrency
//! level and packages both results for the coordinator.

use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::bench::throughput::{run_with_warm_up, ThroughputBenchmark};
use crate::config::{RunConfiguration, DEFAULT_MEASUREMENT_DURATION, DEFAULT_WARM_UP_DURATION};
use crate::models::{AggregateResult, BenchmarkResult, BenchmarkType};
use crate::Result;

/// Creates fresh workload instances for a worker
pub trait WorkloadFactory: Send + Sync {
    /// Build the workload measuring `benchmark_type` for worker `worker_index`
    fn create(&self, benchmark_type: BenchmarkType, worker_index: usize) -> Box<dyn ThroughputBenchmark>;
}

/// Benchmark runner living inside one worker
pub struct WorkerRunner {
    index: usize,
    factory: Arc<dyn WorkloadFactory>,
    warm_up_duration: Duration,
    measurement_duration: Duration,
}

impl WorkerRunner {
    /// Create a runner with the default phase durations
    pub fn new(index: usize, factory: Arc<dyn WorkloadFactory>) -> Self {
        Self {
            index,
            factory,
            warm_up_duration: DEFAULT_WARM_UP_DURATION,
            measurement_duration: DEFAULT_MEASUREMENT_DURATION,
        }
    }

    /// Set the warm-up and measurement durations
    pub fn with_durations(mut self, warm_up: Duration, measurement: Duration) -> Self {
        self.warm_up_duration = warm_up;
        self.measurement_duration = measurement;
        self
    }

    pub fn index(&self) -> usize {
        self.index
    }

    /// Run WRITE then READ at `concurrency_level`
    pub async fn run(&self, concurrency_level: usize) -> Result<AggregateResult> {
        let write = self.run_benchmark(BenchmarkType::Write, concurrency_level).await?;
        let read = self.run_benchmark(BenchmarkType::Read, concurrency_level).await?;

        AggregateResult::new(write, read)
    }

    async fn run_benchmark(&self, benchmark_type: BenchmarkType, concurrency_level: usize) -> Result<BenchmarkResult> {
        let config = RunConfiguration::new(concurrency_level)
            .with_warm_up_duration(self.warm_up_duration)
            .with_measurement_duration(self.measurement_duration);

        let mut benchmark = self.factory.create(benchmark_type, self.index);
        let sample = run_with_warm_up(benchmark.as_mut(), &config).await?;

        info!(
            worker = self.index,
            benchmark_type = %benchmark_type,
            concurrency_level,
            average_throughput = sample.average_throughput,
            completed = sample.completed_iterations,
            "Results for {} throughput benchmark",
            benchmark_type
        );

        Ok(BenchmarkResult::new(benchmark_type, concurrency_level, sample.average_throughput))
    }
}
