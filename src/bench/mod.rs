//! Benchmark engine module
//!
//! Contains the throughput engine, the per-worker runner, the multi-worker
//! coordinator and the process-count sweep.

pub mod average;
pub mod coordinator;
pub mod sweep;
pub mod throughput;
pub mod worker;

// Re-export commonly used types
pub use average::CumulativeAverage;
pub use coordinator::CoordinatorRunner;
pub use sweep::Sweep;
pub use throughput::{run_with_warm_up, Phase, ThroughputBenchmark};
pub use worker::{WorkerRunner, WorkloadFactory};
