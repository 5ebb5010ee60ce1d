//! Process-wide state shared by all execution units of a worker.

use tokio::sync::Mutex;

/// Aggregate job counts of the whole worker process.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunTotals {
    pub succeeded: u64,
    pub failed: u64,
}

/// Shared context handed to every execution unit.
///
/// Counters start at zero with the process and are never reset; every
/// access goes through the mutex.
#[derive(Debug)]
pub struct WorkerContext {
    worker_index: usize,
    totals: Mutex<RunTotals>,
}

impl WorkerContext {
    pub fn new(worker_index: usize) -> Self {
        Self {
            worker_index,
            totals: Mutex::new(RunTotals::default()),
        }
    }

    pub fn worker_index(&self) -> usize {
        self.worker_index
    }

    /// Counts a successful job. Returns the new process-wide total.
    pub async fn record_success(&self) -> u64 {
        let mut totals = self.totals.lock().await;
        totals.succeeded += 1;
        totals.succeeded
    }

    /// Counts a failed job. Returns the new process-wide total.
    pub async fn record_failure(&self) -> u64 {
        let mut totals = self.totals.lock().await;
        totals.failed += 1;
        totals.failed
    }

    pub async fn totals(&self) -> RunTotals {
        *self.totals.lock().await
    }
}
