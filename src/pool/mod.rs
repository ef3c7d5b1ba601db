//! Worker pool module
//!
//! A worker pool spawns isolated workers running the benchmark entry point,
//! broadcasts a command to all of them and collects one reply per worker.
//! The coordinator only talks to the [`WorkerPool`] trait; child processes
//! and in-process tasks are two runtimes behind it.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::models::AggregateResult;
use crate::Result;

pub mod local;
pub mod process;
pub mod protocol;

// Re-export commonly used types
pub use local::InProcessWorkerPool;
pub use process::{ProcessWorkerPool, WorkerEntry};
pub use protocol::serve_worker;

/// Command sent to every worker of a pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum WorkerCommand {
    /// Run WRITE then READ at the given concurrency level
    Run { concurrency_level: usize },
    /// Stop serving; no reply is sent
    Shutdown,
}

/// Reply to a `Run` command
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum WorkerReply {
    Ok { result: AggregateResult },
    Error { message: String },
}

/// Worker status for tracking individual worker states
#[derive(Debug, Clone, PartialEq)]
pub enum WorkerStatus {
    /// Worker is idle and ready to accept work
    Idle,
    /// Worker is currently running a benchmark
    Running,
    /// Worker has replied with a result
    Completed,
    /// Worker failed, timed out or went away
    Failed(String),
}

impl WorkerStatus {
    pub fn is_failed(&self) -> bool {
        matches!(self, WorkerStatus::Failed(_))
    }
}

/// Group of isolated benchmark workers
#[async_trait]
pub trait WorkerPool: Send {
    /// Start `count` workers. A pool that still holds workers destroys them first.
    async fn spawn(&mut self, count: usize) -> Result<()>;

    /// Send `command` to every worker and collect the replies in worker order.
    ///
    /// Fails as a whole if any worker fails or does not reply in time.
    /// `Shutdown` is not answered and yields an empty list.
    async fn broadcast(&mut self, command: WorkerCommand) -> Result<Vec<AggregateResult>>;

    /// Stop every worker and release its resources. Safe to call repeatedly.
    async fn destroy(&mut self) -> Result<()>;

    /// Number of live workers
    fn size(&self) -> usize;

    /// Current status of every live worker
    fn statuses(&self) -> Vec<(usize, WorkerStatus)>;
}
