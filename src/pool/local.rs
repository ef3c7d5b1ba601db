//! In-process worker pool
//!
//! Each worker is a tokio task owning its own [`WorkerRunner`]. Useful for
//! tests and for hosts where spawning the benchmark binary is not possible.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::try_join_all;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, info};

use crate::bench::{WorkerRunner, WorkloadFactory};
use crate::models::AggregateResult;
use crate::pool::{WorkerCommand, WorkerPool, WorkerReply, WorkerStatus};
use crate::{DocBenchError, Result};

type Envelope = (WorkerCommand, Option<oneshot::Sender<WorkerReply>>);

struct TaskWorker {
    index: usize,
    status: WorkerStatus,
    sender: mpsc::Sender<Envelope>,
    handle: JoinHandle<()>,
}

/// Worker pool running each worker as a tokio task
pub struct InProcessWorkerPool {
    factory: Arc<dyn WorkloadFactory>,
    warm_up_duration: Duration,
    measurement_duration: Duration,
    reply_timeout: Duration,
    workers: Vec<TaskWorker>,
}

impl InProcessWorkerPool {
    pub fn new(
        factory: Arc<dyn WorkloadFactory>,
        warm_up_duration: Duration,
        measurement_duration: Duration,
        reply_timeout: Duration,
    ) -> Self {
        Self {
            factory,
            warm_up_duration,
            measurement_duration,
            reply_timeout,
            workers: Vec::new(),
        }
    }

    fn spawn_task(&self, index: usize) -> TaskWorker {
        let runner = WorkerRunner::new(index, self.factory.clone())
            .with_durations(self.warm_up_duration, self.measurement_duration);
        let (sender, mut receiver) = mpsc::channel::<Envelope>(4);

        let handle = tokio::spawn(async move {
            while let Some((command, reply_to)) = receiver.recv().await {
                match command {
                    WorkerCommand::Run { concurrency_level } => {
                        let reply = match runner.run(concurrency_level).await {
                            Ok(result) => WorkerReply::Ok { result },
                            Err(e) => WorkerReply::Error { message: e.to_string() },
                        };
                        if let Some(reply_to) = reply_to {
                            let _ = reply_to.send(reply);
                        }
                    }
                    WorkerCommand::Shutdown => break,
                }
            }
            debug!(worker = runner.index(), "Worker task finished");
        });

        TaskWorker {
            index,
            status: WorkerStatus::Idle,
            sender,
            handle,
        }
    }
}

impl TaskWorker {
    async fn request(&mut self, command: WorkerCommand, reply_timeout: Duration) -> Result<AggregateResult> {
        let index = self.index;
        let (reply_to, reply) = oneshot::channel();

        let outcome = match self.sender.send((command, Some(reply_to))).await {
            Err(_) => Err(DocBenchError::WorkerError {
                index,
                message: "worker task is gone".to_string(),
            }),
            Ok(()) => {
                self.status = WorkerStatus::Running;
                match timeout(reply_timeout, reply).await {
                    Err(_) => Err(DocBenchError::WorkerUnresponsive {
                        index,
                        timeout: reply_timeout,
                    }),
                    Ok(Err(_)) => Err(DocBenchError::WorkerError {
                        index,
                        message: "worker exited without replying".to_string(),
                    }),
                    Ok(Ok(WorkerReply::Error { message })) => Err(DocBenchError::WorkerError { index, message }),
                    Ok(Ok(WorkerReply::Ok { result })) => Ok(result),
                }
            }
        };

        self.status = match &outcome {
            Ok(_) => WorkerStatus::Completed,
            Err(e) => WorkerStatus::Failed(e.to_string()),
        };
        outcome
    }
}

#[async_trait]
impl WorkerPool for InProcessWorkerPool {
    async fn spawn(&mut self, count: usize) -> Result<()> {
        if !self.workers.is_empty() {
            self.destroy().await?;
        }

        self.workers = (0..count).map(|index| self.spawn_task(index)).collect();
        info!(count, "Spawned in-process workers");
        Ok(())
    }

    async fn broadcast(&mut self, command: WorkerCommand) -> Result<Vec<AggregateResult>> {
        if command == WorkerCommand::Shutdown {
            for worker in &self.workers {
                let _ = worker.sender.send((WorkerCommand::Shutdown, None)).await;
            }
            return Ok(Vec::new());
        }

        let reply_timeout = self.reply_timeout;
        try_join_all(
            self.workers
                .iter_mut()
                .map(|worker| worker.request(command, reply_timeout)),
        )
        .await
    }

    async fn destroy(&mut self) -> Result<()> {
        for worker in self.workers.drain(..) {
            drop(worker.sender);
            worker.handle.abort();
            // A cancelled task reports a JoinError, which is the expected outcome here
            let _ = worker.handle.await;
        }
        Ok(())
    }

    fn size(&self) -> usize {
        self.workers.len()
    }

    fn statuses(&self) -> Vec<(usize, WorkerStatus)> {
        self.workers.iter().map(|w| (w.index, w.status.clone())).collect()
    }
}
