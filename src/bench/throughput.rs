//! Throughput benchmark engine
//!
//! Drives a workload through set-up, a warm-up phase, a measurement phase
//! and tear-down. Each phase keeps `concurrency_level` closed-loop streams
//! in flight until its deadline; the measurement phase turns the number of
//! completed iterations into requests per second.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures::future::try_join_all;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::bench::average::CumulativeAverage;
use crate::config::RunConfiguration;
use crate::models::ThroughputSample;
use crate::{DocBenchError, Result};

/// A workload the engine can measure
#[async_trait]
pub trait ThroughputBenchmark: Send + Sync {
    /// Acquire resources (connections, files) used by every iteration
    async fn set_up(&mut self) -> Result<()>;

    /// Perform one unit of work
    async fn iteration(&self) -> Result<()>;

    /// Release everything `set_up` acquired
    async fn tear_down(&mut self) -> Result<()>;
}

/// Timed phase of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    WarmUp,
    Measurement,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::WarmUp => f.write_str("warm-up"),
            Phase::Measurement => f.write_str("measurement"),
        }
    }
}

/// Completion count and wall-clock length of one phase
#[derive(Debug, Clone, Copy)]
struct PhaseStats {
    completed: u64,
    elapsed: Duration,
}

/// Run `benchmark` through warm-up and measurement and report its throughput.
///
/// `tear_down` runs exactly once whenever `set_up` succeeded. If both a phase
/// and the tear-down fail, the phase error is returned and the tear-down
/// error is only logged.
pub async fn run_with_warm_up<B>(benchmark: &mut B, config: &RunConfiguration) -> Result<ThroughputSample>
where
    B: ThroughputBenchmark + ?Sized,
{
    config.validate()?;

    benchmark
        .set_up()
        .await
        .map_err(|e| DocBenchError::SetupFailure(e.to_string()))?;

    let outcome = measure(&*benchmark, config).await;
    let teardown = benchmark.tear_down().await;

    match (outcome, teardown) {
        (Ok(sample), Ok(())) => Ok(sample),
        (Ok(_), Err(e)) => Err(DocBenchError::TeardownFailure(e.to_string())),
        (Err(e), Ok(())) => Err(e),
        (Err(e), Err(teardown_err)) => {
            warn!(error = %teardown_err, "Teardown failed after an aborted run");
            Err(e)
        }
    }
}

async fn measure<B>(benchmark: &B, config: &RunConfiguration) -> Result<ThroughputSample>
where
    B: ThroughputBenchmark + ?Sized,
{
    let warm_up = run_phase(
        benchmark,
        Phase::WarmUp,
        config.concurrency_level,
        config.warm_up_duration,
        None,
    )
    .await?;
    debug!(completed = warm_up.completed, elapsed = ?warm_up.elapsed, "Warm-up finished");

    let latency = CumulativeAverage::with_precision(3);
    let measured = run_phase(
        benchmark,
        Phase::Measurement,
        config.concurrency_level,
        config.measurement_duration,
        Some(&latency),
    )
    .await?;

    let sample = ThroughputSample::new(measured.completed, measured.elapsed, latency.get_and_reset());
    debug!(
        completed = sample.completed_iterations,
        elapsed = ?sample.elapsed,
        throughput = sample.average_throughput,
        mean_latency_ms = sample.mean_iteration_latency_ms,
        "Measurement finished"
    );

    Ok(sample)
}

/// Run `concurrency_level` streams until `duration` has passed.
///
/// The first failing stream drops the others, so no further iterations
/// start once a phase has failed.
async fn run_phase<B>(
    benchmark: &B,
    phase: Phase,
    concurrency_level: usize,
    duration: Duration,
    latency: Option<&CumulativeAverage>,
) -> Result<PhaseStats>
where
    B: ThroughputBenchmark + ?Sized,
{
    let completed = AtomicU64::new(0);
    let started = Instant::now();
    let deadline = started + duration;

    let streams = (0..concurrency_level)
        .map(|_| run_stream(benchmark, phase, deadline, &completed, latency));
    try_join_all(streams).await?;

    Ok(PhaseStats {
        completed: completed.load(Ordering::Acquire),
        elapsed: started.elapsed(),
    })
}

async fn run_stream<B>(
    benchmark: &B,
    phase: Phase,
    deadline: Instant,
    completed: &AtomicU64,
    latency: Option<&CumulativeAverage>,
) -> Result<()>
where
    B: ThroughputBenchmark + ?Sized,
{
    while Instant::now() < deadline {
        let issued = Instant::now();

        benchmark
            .iteration()
            .await
            .map_err(|e| DocBenchError::IterationFailure {
                phase,
                message: e.to_string(),
            })?;

        completed.fetch_add(1, Ordering::AcqRel);
        if let Some(latency) = latency {
            latency.add(issued.elapsed().as_secs_f64() * 1000.0);
        }

        // Iterations that complete without suspending would otherwise starve sibling streams
        tokio::task::yield_now().await;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    #[derive(Debug, Default)]
    struct CallCounts {
        set_up: AtomicUsize,
        iterations: AtomicUsize,
        tear_down: AtomicUsize,
    }

    /// Workload that sleeps per iteration and can be told to fail
    struct SleepyWorkload {
        latency: Duration,
        fail_setup: bool,
        fail_after: Option<usize>,
        fail_teardown: bool,
        counts: Arc<CallCounts>,
    }

    impl SleepyWorkload {
        fn new(latency: Duration) -> Self {
            Self {
                latency,
                fail_setup: false,
                fail_after: None,
                fail_teardown: false,
                counts: Arc::new(CallCounts::default()),
            }
        }
    }

    #[async_trait]
    impl ThroughputBenchmark for SleepyWorkload {
        async fn set_up(&mut self) -> Result<()> {
            self.counts.set_up.fetch_add(1, Ordering::SeqCst);
            if self.fail_setup {
                return Err(DocBenchError::StoreError("connection refused".to_string()));
            }
            Ok(())
        }

        async fn iteration(&self) -> Result<()> {
            let call = self.counts.iterations.fetch_add(1, Ordering::SeqCst);
            if let Some(limit) = self.fail_after {
                if call >= limit {
                    return Err(DocBenchError::StoreError("insert rejected".to_string()));
                }
            }
            tokio::time::sleep(self.latency).await;
            Ok(())
        }

        async fn tear_down(&mut self) -> Result<()> {
            self.counts.tear_down.fetch_add(1, Ordering::SeqCst);
            if self.fail_teardown {
                return Err(DocBenchError::StoreError("close failed".to_string()));
            }
            Ok(())
        }
    }

    fn short_run(concurrency_level: usize) -> RunConfiguration {
        RunConfiguration::new(concurrency_level)
            .with_warm_up_duration(Duration::from_millis(20))
            .with_measurement_duration(Duration::from_millis(300))
    }

    #[tokio::test]
    async fn test_throughput_is_positive() {
        let mut workload = SleepyWorkload::new(Duration::from_millis(1));
        let sample = run_with_warm_up(&mut workload, &short_run(2)).await.unwrap();

        assert!(sample.average_throughput > 0.0);
        assert!(sample.completed_iterations > 0);
        assert!(sample.elapsed >= Duration::from_millis(300));
        assert!(sample.mean_iteration_latency_ms > 0.0);
    }

    #[tokio::test]
    async fn test_throughput_scales_with_concurrency() {
        let mut single = SleepyWorkload::new(Duration::from_millis(2));
        let one = run_with_warm_up(&mut single, &short_run(1)).await.unwrap();

        let mut quad = SleepyWorkload::new(Duration::from_millis(2));
        let four = run_with_warm_up(&mut quad, &short_run(4)).await.unwrap();

        let ratio = four.average_throughput / one.average_throughput;
        assert!(ratio > 2.0 && ratio < 6.0, "unexpected scaling ratio {}", ratio);
    }

    #[tokio::test]
    async fn test_throughput_uses_total_completions_over_elapsed() {
        let mut workload = SleepyWorkload::new(Duration::from_millis(1));
        let sample = run_with_warm_up(&mut workload, &short_run(3)).await.unwrap();

        let expected = sample.completed_iterations as f64 / sample.elapsed.as_secs_f64();
        assert!((sample.average_throughput - expected).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_teardown_once_on_success() {
        let mut workload = SleepyWorkload::new(Duration::from_millis(1));
        let counts = workload.counts.clone();
        run_with_warm_up(&mut workload, &short_run(4)).await.unwrap();

        assert_eq!(counts.set_up.load(Ordering::SeqCst), 1);
        assert_eq!(counts.tear_down.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_iteration_failure_aborts_and_tears_down_once() {
        let mut workload = SleepyWorkload::new(Duration::from_millis(1));
        workload.fail_after = Some(25);
        let counts = workload.counts.clone();

        let err = run_with_warm_up(&mut workload, &short_run(4)).await.unwrap_err();
        assert!(matches!(err, DocBenchError::IterationFailure { .. }));
        assert_eq!(counts.set_up.load(Ordering::SeqCst), 1);
        assert_eq!(counts.tear_down.load(Ordering::SeqCst), 1);

        // The failing stream cancels its siblings
        let calls = counts.iterations.load(Ordering::SeqCst);
        assert!(calls <= 25 + 4, "iterations kept running after failure: {}", calls);
    }

    #[tokio::test]
    async fn test_failure_in_warm_up_is_tagged() {
        let mut workload = SleepyWorkload::new(Duration::from_millis(1));
        workload.fail_after = Some(0);

        match run_with_warm_up(&mut workload, &short_run(2)).await {
            Err(DocBenchError::IterationFailure { phase, message }) => {
                assert_eq!(phase, Phase::WarmUp);
                assert!(message.contains("insert rejected"));
            }
            other => panic!("expected iteration failure, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_setup_failure_skips_teardown() {
        let mut workload = SleepyWorkload::new(Duration::from_millis(1));
        workload.fail_setup = true;
        let counts = workload.counts.clone();

        let err = run_with_warm_up(&mut workload, &short_run(2)).await.unwrap_err();
        assert!(matches!(err, DocBenchError::SetupFailure(_)));
        assert_eq!(counts.iterations.load(Ordering::SeqCst), 0);
        assert_eq!(counts.tear_down.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_teardown_failure_after_success() {
        let mut workload = SleepyWorkload::new(Duration::from_millis(1));
        workload.fail_teardown = true;

        let err = run_with_warm_up(&mut workload, &short_run(1)).await.unwrap_err();
        assert!(matches!(err, DocBenchError::TeardownFailure(_)));
    }

    #[tokio::test]
    async fn test_teardown_failure_keeps_primary_error() {
        let mut workload = SleepyWorkload::new(Duration::from_millis(1));
        workload.fail_after = Some(3);
        workload.fail_teardown = true;
        let counts = workload.counts.clone();

        let err = run_with_warm_up(&mut workload, &short_run(2)).await.unwrap_err();
        assert!(matches!(err, DocBenchError::IterationFailure { .. }));
        assert_eq!(counts.tear_down.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_invalid_configuration_runs_nothing() {
        let mut workload = SleepyWorkload::new(Duration::from_millis(1));
        let counts = workload.counts.clone();

        let err = run_with_warm_up(&mut workload, &RunConfiguration::new(0)).await.unwrap_err();
        assert!(matches!(err, DocBenchError::UnsupportedConfiguration(_)));
        assert_eq!(counts.set_up.load(Ordering::SeqCst), 0);
    }

    /// Records when every iteration starts
    struct StampingWorkload {
        starts: std::sync::Mutex<Vec<Instant>>,
    }

    #[async_trait]
    impl ThroughputBenchmark for StampingWorkload {
        async fn set_up(&mut self) -> Result<()> {
            Ok(())
        }

        async fn iteration(&self) -> Result<()> {
            self.starts.lock().unwrap().push(Instant::now());
            tokio::time::sleep(Duration::from_millis(7)).await;
            Ok(())
        }

        async fn tear_down(&mut self) -> Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_no_iteration_starts_after_deadline() {
        let workload = StampingWorkload {
            starts: std::sync::Mutex::new(Vec::new()),
        };
        let duration = Duration::from_millis(100);

        let stats = run_phase(&workload, Phase::Measurement, 3, duration, None).await.unwrap();
        let returned = Instant::now();

        // The phase started no later than this, so its deadline is no later than `latest_deadline`
        let latest_deadline = returned - stats.elapsed + duration;
        let starts = workload.starts.lock().unwrap();

        assert!(!starts.is_empty());
        assert_eq!(starts.len() as u64, stats.completed);
        assert!(
            starts.iter().all(|start| *start < latest_deadline),
            "an iteration started after the deadline"
        );
        // In-flight iterations finish past the deadline instead of being cut off
        assert!(stats.elapsed >= duration);
    }

    #[tokio::test]
    async fn test_boxed_workload() {
        let mut workload: Box<dyn ThroughputBenchmark> = Box::new(SleepyWorkload::new(Duration::from_millis(1)));
        let sample = run_with_warm_up(workload.as_mut(), &short_run(1)).await.unwrap();
        assert!(sample.average_throughput >= 0.0);
    }
}
