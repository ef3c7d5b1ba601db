//! Process-count sweep
//!
//! Runs the coordinator once per configured process count, in order, and
//! stops at the first failure.

use tracing::info;

use crate::bench::coordinator::CoordinatorRunner;
use crate::config::DEFAULT_PROCESS_COUNTS;
use crate::models::SweepEntry;
use crate::pool::WorkerPool;
use crate::{DocBenchError, Result};

pub struct Sweep {
    process_counts: Vec<usize>,
}

impl Default for Sweep {
    fn default() -> Self {
        Self::new(DEFAULT_PROCESS_COUNTS.to_vec())
    }
}

impl Sweep {
    pub fn new(process_counts: Vec<usize>) -> Self {
        Self { process_counts }
    }

    /// Run every process count through `coordinator`.
    ///
    /// `on_result` sees each entry as soon as it is available, so reports can
    /// be printed while later counts are still running. The first error ends
    /// the sweep; entries reported before it stay reported.
    pub async fn run<P, F>(&self, coordinator: &mut CoordinatorRunner<P>, mut on_result: F) -> Result<Vec<SweepEntry>>
    where
        P: WorkerPool,
        F: FnMut(&SweepEntry) -> Result<()>,
    {
        if self.process_counts.is_empty() {
            return Err(DocBenchError::UnsupportedConfiguration(
                "No process counts to run".to_string(),
            ));
        }

        let mut entries = Vec::with_capacity(self.process_counts.len());

        for &process_count in &self.process_counts {
            info!(
                "========== {} process(es), concurrency level {} ==========",
                process_count,
                coordinator.concurrency_level()
            );

            let result = coordinator.run(process_count).await?;
            let entry = SweepEntry::new(process_count, result);
            on_result(&entry)?;
            entries.push(entry);
        }

        Ok(entries)
    }
}
