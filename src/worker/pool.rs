//! Worker pool coordinator.
//!
//! Starts one execution unit per assigned credential, staggering the starts,
//! waits for all of them and aggregates their reports.
//!
//! # Features
//!
//! - One tokio task per credential, no job sharing between units
//! - Staggered start to avoid a burst against the job server
//! - Process-wide success/failure counters behind a mutex
//! - Run summary with per-unit exit reasons

use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{error, info};

use super::context::WorkerContext;
use super::unit::{ExecutionUnit, UnitReport};
use crate::config::WorkerConfig;
use crate::error::ConfigError;
use crate::jobs::JobSource;
use crate::llm::TextGenerator;

/// Errors that can occur when setting up the pool.
#[derive(Debug, Error)]
pub enum PoolError {
    /// The configuration is unusable.
    #[error("Invalid pool configuration: {0}")]
    Config(#[from] ConfigError),

    /// No generator was supplied.
    #[error("Pool has no execution units")]
    NoUnits,
}

/// Aggregate outcome of a worker run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
    /// Worker index this run served.
    pub worker_index: usize,
    /// Number of units started.
    pub units: usize,
    /// Jobs submitted as done.
    pub succeeded: u64,
    /// Jobs submitted as failed.
    pub failed: u64,
    /// Generation requests issued across all units.
    pub requests: u64,
    /// Per-unit reports of the units that stopped normally.
    pub reports: Vec<UnitReport>,
    /// Units whose task panicked.
    pub panicked_units: usize,
}

impl RunSummary {
    /// Returns the total number of jobs processed (succeeded + failed).
    pub fn total_processed(&self) -> u64 {
        self.succeeded + self.failed
    }

    /// Returns the success rate as a percentage.
    pub fn success_rate(&self) -> f64 {
        let total = self.total_processed();
        if total == 0 {
            return 0.0;
        }
        (self.succeeded as f64 / total as f64) * 100.0
    }
}

/// Coordinator owning the execution units of one worker instance.
pub struct WorkerPool {
    config: Arc<WorkerConfig>,
    jobs: Arc<dyn JobSource>,
    generators: Vec<Arc<dyn TextGenerator>>,
    context: Arc<WorkerContext>,
}

impl WorkerPool {
    /// Creates a pool with one unit per generator.
    ///
    /// # Errors
    ///
    /// Returns `PoolError::Config` if the configuration is invalid and
    /// `PoolError::NoUnits` if `generators` is empty.
    pub fn new(
        config: WorkerConfig,
        jobs: Arc<dyn JobSource>,
        generators: Vec<Arc<dyn TextGenerator>>,
    ) -> Result<Self, PoolError> {
        config.validate()?;
        if generators.is_empty() {
            return Err(PoolError::NoUnits);
        }

        let context = Arc::new(WorkerContext::new(config.worker_index));

        Ok(Self {
            config: Arc::new(config),
            jobs,
            generators,
            context,
        })
    }

    /// Returns the number of units this pool will start.
    pub fn num_units(&self) -> usize {
        self.generators.len()
    }

    /// Returns the shared context.
    pub fn context(&self) -> &Arc<WorkerContext> {
        &self.context
    }

    /// Starts all units and waits until every one of them has stopped.
    pub async fn run(self) -> RunSummary {
        let started = Instant::now();
        let num_units = self.generators.len();
        let mut handles: Vec<JoinHandle<UnitReport>> = Vec::with_capacity(num_units);

        for (idx, llm) in self.generators.into_iter().enumerate() {
            if idx > 0 && !self.config.unit_stagger.is_zero() {
                tokio::time::sleep(self.config.unit_stagger).await;
            }

            let unit = ExecutionUnit::new(
                idx,
                Arc::clone(&self.jobs),
                llm,
                Arc::clone(&self.config),
                Arc::clone(&self.context),
            );
            handles.push(tokio::spawn(unit.run()));
        }

        info!(
            worker_index = self.config.worker_index,
            units = num_units,
            "Worker pool started"
        );

        let mut reports = Vec::with_capacity(num_units);
        let mut panicked_units = 0;
        for handle in handles {
            match handle.await {
                Ok(report) => reports.push(report),
                Err(e) => {
                    panicked_units += 1;
                    error!(
                        worker_index = self.config.worker_index,
                        error = %e,
                        "Unit task panicked"
                    );
                }
            }
        }

        let totals = self.context.totals().await;
        let summary = RunSummary {
            worker_index: self.config.worker_index,
            units: num_units,
            succeeded: totals.succeeded,
            failed: totals.failed,
            requests: reports.iter().map(|r| u64::from(r.requests)).sum(),
            reports,
            panicked_units,
        };

        info!(
            worker_index = summary.worker_index,
            succeeded = summary.succeeded,
            failed = summary.failed,
            requests = summary.requests,
            duration_ms = started.elapsed().as_millis() as u64,
            "All units finished"
        );

        summary
    }
}
