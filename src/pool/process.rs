//! Child-process worker pool
//!
//! Every worker is a separate OS process started from a [`WorkerEntry`].
//! Commands go to the child's stdin and replies come back on its stdout,
//! one JSON line each. The child's stderr is inherited so its logs show up
//! next to the coordinator's.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::try_join_all;
use tokio::io::{AsyncBufReadExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::models::AggregateResult;
use crate::pool::protocol::{read_message, write_message};
use crate::pool::{WorkerCommand, WorkerPool, WorkerReply, WorkerStatus};
use crate::{DocBenchError, Result};

/// How long a child gets to exit on its own after `Shutdown`
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

/// Program and arguments a worker process is started with.
///
/// The pool appends `--index <n>` for each worker.
#[derive(Debug, Clone)]
pub struct WorkerEntry {
    pub program: PathBuf,
    pub args: Vec<String>,
}

impl WorkerEntry {
    pub fn new(program: impl Into<PathBuf>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// Entry point re-running the current executable with `args`
    pub fn current_exe(args: Vec<String>) -> Result<Self> {
        Ok(Self::new(std::env::current_exe()?, args))
    }
}

struct ChildWorker {
    index: usize,
    status: WorkerStatus,
    child: Child,
    stdin: Option<ChildStdin>,
    stdout: Lines<BufReader<ChildStdout>>,
}

impl ChildWorker {
    async fn send(&mut self, command: &WorkerCommand) -> Result<()> {
        let index = self.index;
        let stdin = self.stdin.as_mut().ok_or_else(|| DocBenchError::WorkerError {
            index,
            message: "worker input is closed".to_string(),
        })?;

        write_message(stdin, command).await.map_err(|e| DocBenchError::WorkerError {
            index,
            message: format!("failed to send command: {}", e),
        })
    }

    async fn receive(&mut self, reply_timeout: Duration) -> Result<AggregateResult> {
        let index = self.index;

        let reply = match timeout(reply_timeout, read_message::<_, WorkerReply>(&mut self.stdout)).await {
            Err(_) => Err(DocBenchError::WorkerUnresponsive {
                index,
                timeout: reply_timeout,
            }),
            Ok(Err(e)) => Err(e),
            Ok(Ok(None)) => Err(DocBenchError::WorkerError {
                index,
                message: "worker exited without replying".to_string(),
            }),
            Ok(Ok(Some(WorkerReply::Error { message }))) => Err(DocBenchError::WorkerError { index, message }),
            Ok(Ok(Some(WorkerReply::Ok { result }))) => Ok(result),
        };

        self.status = match &reply {
            Ok(_) => WorkerStatus::Completed,
            Err(e) => WorkerStatus::Failed(e.to_string()),
        };
        reply
    }

    async fn stop(mut self) {
        if let Some(mut stdin) = self.stdin.take() {
            let _ = write_message(&mut stdin, &WorkerCommand::Shutdown).await;
        }

        match timeout(SHUTDOWN_GRACE, self.child.wait()).await {
            Ok(Ok(status)) => debug!(worker = self.index, %status, "Worker exited"),
            _ => {
                warn!(worker = self.index, "Worker did not exit, killing it");
                if let Err(e) = self.child.kill().await {
                    warn!(worker = self.index, error = %e, "Failed to kill worker");
                }
            }
        }
    }
}

/// Worker pool backed by child processes
pub struct ProcessWorkerPool {
    entry: WorkerEntry,
    reply_timeout: Duration,
    workers: Vec<ChildWorker>,
}

impl ProcessWorkerPool {
    pub fn new(entry: WorkerEntry, reply_timeout: Duration) -> Self {
        Self {
            entry,
            reply_timeout,
            workers: Vec::new(),
        }
    }

    fn spawn_child(&self, index: usize) -> Result<ChildWorker> {
        let spawn_error = |message: String| DocBenchError::WorkerError { index, message };

        let mut child = Command::new(&self.entry.program)
            .args(&self.entry.args)
            .arg("--index")
            .arg(index.to_string())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| spawn_error(format!("failed to start {}: {}", self.entry.program.display(), e)))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| spawn_error("worker stdin unavailable".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| spawn_error("worker stdout unavailable".to_string()))?;

        Ok(ChildWorker {
            index,
            status: WorkerStatus::Idle,
            child,
            stdin: Some(stdin),
            stdout: BufReader::new(stdout).lines(),
        })
    }
}

#[async_trait]
impl WorkerPool for ProcessWorkerPool {
    async fn spawn(&mut self, count: usize) -> Result<()> {
        if !self.workers.is_empty() {
            self.destroy().await?;
        }

        for index in 0..count {
            let worker = self.spawn_child(index)?;
            debug!(worker = index, pid = ?worker.child.id(), "Worker process started");
            self.workers.push(worker);
        }

        info!(count, program = %self.entry.program.display(), "Spawned worker processes");
        Ok(())
    }

    async fn broadcast(&mut self, command: WorkerCommand) -> Result<Vec<AggregateResult>> {
        for worker in self.workers.iter_mut() {
            if let Err(e) = worker.send(&command).await {
                worker.status = WorkerStatus::Failed(e.to_string());
                return Err(e);
            }
            if matches!(command, WorkerCommand::Run { .. }) {
                worker.status = WorkerStatus::Running;
            }
        }

        if command == WorkerCommand::Shutdown {
            return Ok(Vec::new());
        }

        let reply_timeout = self.reply_timeout;
        try_join_all(self.workers.iter_mut().map(|worker| worker.receive(reply_timeout))).await
    }

    async fn destroy(&mut self) -> Result<()> {
        let workers: Vec<ChildWorker> = self.workers.drain(..).collect();
        if workers.is_empty() {
            return Ok(());
        }

        let count = workers.len();
        futures::future::join_all(workers.into_iter().map(ChildWorker::stop)).await;
        debug!(count, "Worker processes destroyed");

        Ok(())
    }

    fn size(&self) -> usize {
        self.workers.len()
    }

    fn statuses(&self) -> Vec<(usize, WorkerStatus)> {
        self.workers.iter().map(|w| (w.index, w.status.clone())).collect()
    }
}
