//! Multi-worker coordinator
//!
//! Spawns a pool of workers, asks all of them to run at the same
//! concurrency level and sums what they report.

use tracing::{debug, info, warn};

use crate::models::AggregateResult;
use crate::pool::{WorkerCommand, WorkerPool, WorkerStatus};
use crate::{DocBenchError, Result};

/// Drives one pool through spawn, broadcast and destroy
pub struct CoordinatorRunner<P: WorkerPool> {
    pool: P,
    concurrency_level: usize,
}

impl<P: WorkerPool> CoordinatorRunner<P> {
    pub fn new(pool: P, concurrency_level: usize) -> Self {
        Self {
            pool,
            concurrency_level,
        }
    }

    pub fn concurrency_level(&self) -> usize {
        self.concurrency_level
    }

    pub fn pool(&self) -> &P {
        &self.pool
    }

    pub fn into_pool(self) -> P {
        self.pool
    }

    /// Run WRITE and READ on `process_count` workers and sum their throughput.
    ///
    /// Every worker runs at the full concurrency level, so the total number of
    /// streams is `process_count * concurrency_level`. Workers are destroyed
    /// before returning, whether the run succeeded or not.
    pub async fn run(&mut self, process_count: usize) -> Result<AggregateResult> {
        if process_count == 0 {
            return Err(DocBenchError::UnsupportedConfiguration(
                "Process count must be at least 1".to_string(),
            ));
        }

        let outcome = self.spawn_and_collect(process_count).await;
        if outcome.is_err() {
            for (index, status) in self.pool.statuses() {
                if let WorkerStatus::Failed(reason) = status {
                    warn!(worker = index, %reason, "Worker failed");
                }
            }
        }
        let destroyed = self.pool.destroy().await;

        match (outcome, destroyed) {
            (Ok(result), Ok(())) => Ok(result),
            (Ok(_), Err(e)) => Err(e),
            (Err(e), Ok(())) => Err(e),
            (Err(e), Err(destroy_err)) => {
                warn!(error = %destroy_err, "Failed to destroy worker pool after a failed run");
                Err(e)
            }
        }
    }

    async fn spawn_and_collect(&mut self, process_count: usize) -> Result<AggregateResult> {
        self.pool.spawn(process_count).await?;
        debug!(process_count, "Worker pool ready");

        let results = self
            .pool
            .broadcast(WorkerCommand::Run {
                concurrency_level: self.concurrency_level,
            })
            .await?;

        if results.len() != process_count {
            return Err(DocBenchError::ProtocolError(format!(
                "expected {} worker results, got {}",
                process_count,
                results.len()
            )));
        }

        let total = AggregateResult::reduce(results)?;
        info!(
            process_count,
            concurrency_level = self.concurrency_level,
            write = total.write().average_throughput(),
            read = total.read().average_throughput(),
            "Combined worker results"
        );

        Ok(total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::cell::Cell;

    /// Pool returning canned results without running anything
    #[derive(Default)]
    struct ScriptedPool {
        results: Vec<AggregateResult>,
        fail_broadcast: bool,
        spawned: Vec<usize>,
        commands: Vec<WorkerCommand>,
        destroyed: usize,
        live: usize,
        status_queries: Cell<usize>,
    }

    #[async_trait]
    impl WorkerPool for ScriptedPool {
        async fn spawn(&mut self, count: usize) -> Result<()> {
            self.spawned.push(count);
            self.live = count;
            Ok(())
        }

        async fn broadcast(&mut self, command: WorkerCommand) -> Result<Vec<AggregateResult>> {
            self.commands.push(command);
            if self.fail_broadcast {
                return Err(DocBenchError::WorkerError {
                    index: 1,
                    message: "Iteration failed".to_string(),
                });
            }
            Ok(self.results.iter().take(self.live).cloned().collect())
        }

        async fn destroy(&mut self) -> Result<()> {
            self.destroyed += 1;
            self.live = 0;
            Ok(())
        }

        fn size(&self) -> usize {
            self.live
        }

        fn statuses(&self) -> Vec<(usize, WorkerStatus)> {
            self.status_queries.set(self.status_queries.get() + 1);
            (0..self.live)
                .map(|i| (i, WorkerStatus::Failed("Iteration failed".to_string())))
                .collect()
        }
    }

    #[tokio::test]
    async fn test_sums_worker_results() {
        let pool = ScriptedPool {
            results: vec![
                AggregateResult::from_throughputs(4, 10.0, 5.0),
                AggregateResult::from_throughputs(4, 20.0, 15.0),
            ],
            ..ScriptedPool::default()
        };
        let mut coordinator = CoordinatorRunner::new(pool, 4);

        let total = coordinator.run(2).await.unwrap();
        assert_eq!(total, AggregateResult::from_throughputs(4, 30.0, 20.0));

        let pool = coordinator.into_pool();
        assert_eq!(pool.spawned, vec![2]);
        assert_eq!(pool.commands, vec![WorkerCommand::Run { concurrency_level: 4 }]);
        assert_eq!(pool.destroyed, 1);
        assert_eq!(pool.status_queries.get(), 0);
    }

    #[tokio::test]
    async fn test_single_worker_result_unchanged() {
        let single = AggregateResult::from_throughputs(8, 123.5, 456.25);
        let pool = ScriptedPool {
            results: vec![single.clone()],
            ..ScriptedPool::default()
        };
        let mut coordinator = CoordinatorRunner::new(pool, 8);

        assert_eq!(coordinator.run(1).await.unwrap(), single);
    }

    #[tokio::test]
    async fn test_worker_failure_still_destroys_pool() {
        let pool = ScriptedPool {
            fail_broadcast: true,
            ..ScriptedPool::default()
        };
        let mut coordinator = CoordinatorRunner::new(pool, 4);

        let err = coordinator.run(3).await.unwrap_err();
        assert!(matches!(err, DocBenchError::WorkerError { index: 1, .. }));
        assert_eq!(coordinator.pool().destroyed, 1);
        assert_eq!(coordinator.pool().size(), 0);
        // Failed worker statuses are read before the pool is torn down
        assert_eq!(coordinator.pool().status_queries.get(), 1);
    }

    #[tokio::test]
    async fn test_missing_replies_rejected() {
        let pool = ScriptedPool {
            results: vec![AggregateResult::from_throughputs(4, 1.0, 1.0)],
            ..ScriptedPool::default()
        };
        let mut coordinator = CoordinatorRunner::new(pool, 4);

        let err = coordinator.run(2).await.unwrap_err();
        assert!(matches!(err, DocBenchError::ProtocolError(_)));
        assert_eq!(coordinator.pool().destroyed, 1);
    }

    #[tokio::test]
    async fn test_zero_processes_rejected() {
        let mut coordinator = CoordinatorRunner::new(ScriptedPool::default(), 4);

        let err = coordinator.run(0).await.unwrap_err();
        assert!(matches!(err, DocBenchError::UnsupportedConfiguration(_)));
        assert!(coordinator.pool().spawned.is_empty());
    }
}
