//! Job server integration.
//!
//! The queue server is the single source of truth for job state. This module
//! exposes it through the [`JobSource`] trait so execution units can be
//! driven by the HTTP client in production and by in-memory fakes in tests.

pub mod client;
pub mod types;

use async_trait::async_trait;

pub use client::{JobClient, JobClientConfig};
pub use types::{Article, FetchOutcome, Job, JobId, JobOutcome};

/// Source of jobs and sink of their outcomes.
#[async_trait]
pub trait JobSource: Send + Sync {
    /// Claims the next pending job.
    ///
    /// Never fails: connectivity problems surface as
    /// [`FetchOutcome::TransientFailure`] after internal retries.
    async fn fetch_next(&self) -> FetchOutcome;

    /// Reports the outcome of a job. Best effort: errors are logged, not returned.
    async fn submit(&self, job_id: &JobId, outcome: JobOutcome);
}
