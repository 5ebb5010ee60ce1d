//! Concurrent article workers.
//!
//! This module provides the local execution machinery of a worker instance:
//!
//! - **WorkerPool**: starts one execution unit per credential and joins them
//! - **ExecutionUnit**: fetch / generate / submit loop bound to one credential
//! - **RetryPolicy**: per-job retry and backoff decisions
//! - **RateLimiter** and **RequestBudget**: per-credential pacing and ceiling
//! - **WorkerContext**: the only state shared between units
//!
//! # Architecture
//!
//! ```text
//!                      ┌──────────────┐
//!                      │  Job server  │
//!                      └──────┬───────┘
//!                             │ fetch / submit
//!         ┌───────────────────┼───────────────────┐
//!         │                   │                   │
//!         ▼                   ▼                   ▼
//!    ┌─────────┐         ┌─────────┐         ┌─────────┐
//!    │ Unit 0  │         │ Unit 1  │         │ Unit N  │
//!    │ key #0  │         │ key #1  │         │ key #N  │
//!    └────┬────┘         └────┬────┘         └────┬────┘
//!         │                   │                   │
//!         └──────────► WorkerContext ◄────────────┘
//!                    (success counter)
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use article_forge::worker::WorkerPool;
//!
//! let pool = WorkerPool::new(config, job_client, generators)?;
//! let summary = pool.run().await;
//! println!("{} articles written", summary.succeeded);
//! ```

pub mod budget;
pub mod context;
pub mod pool;
pub mod rate_limiter;
pub mod retry;
pub mod unit;

pub use budget::RequestBudget;
pub use context::{RunTotals, WorkerContext};
pub use pool::{PoolError, RunSummary, WorkerPool};
pub use rate_limiter::RateLimiter;
pub use retry::{RetryDecision, RetryPolicy};
pub use unit::{ExecutionUnit, ExitReason, UnitReport};
