//! article-forge: distributed SEO article generation worker.
//!
//! A worker instance pulls article jobs from a shared queue server, writes
//! each article with a generative language model using its own slice of a
//! credential pool, and reports the result back to the server.

pub mod cli;
pub mod config;
pub mod content;
pub mod credentials;
pub mod error;
pub mod jobs;
pub mod llm;
pub mod worker;

// Re-export commonly used types
pub use config::WorkerConfig;
pub use credentials::Credential;
pub use error::{ConfigError, GenerationError, JobError};
pub use worker::{RunSummary, WorkerPool};
