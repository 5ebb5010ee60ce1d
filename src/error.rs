//! Error types for article-forge.
//!
//! Defines the error taxonomy used across the worker:
//! - Startup configuration and credential allocation
//! - Job server communication
//! - Generative API calls and their classification

use std::time::Duration;

use thiserror::Error;

/// Errors detected while assembling the worker configuration.
///
/// All of these are fatal: the process does not start any execution unit.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("Credential pool is empty: {0}")]
    EmptyCredentialPool(String),

    #[error(
        "Worker index {worker_index} with {per_worker} units per worker needs credentials \
         {start}..{end}, but only {available} are configured"
    )]
    InsufficientCredentials {
        worker_index: usize,
        per_worker: usize,
        start: usize,
        end: usize,
        available: usize,
    },

    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),
}

/// Errors that can occur while talking to the job server.
///
/// These never leave the job client: fetch failures are folded into
/// [`crate::jobs::FetchOutcome::TransientFailure`] and submit failures are logged.
#[derive(Debug, Error)]
pub enum JobError {
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    #[error("Job server returned HTTP {0}")]
    HttpStatus(u16),

    #[error("Malformed job server response: {0}")]
    Malformed(String),

    #[error("Invalid job server endpoint: {0}")]
    InvalidEndpoint(String),
}

/// Errors raised by a generation call, already classified by how the
/// worker must react to them.
#[derive(Debug, Error)]
pub enum GenerationError {
    /// The credential was revoked, reported as leaked, or lacks permission.
    /// Fatal for the owning execution unit.
    #[error("Credential rejected: {0}")]
    CredentialRejected(String),

    /// Quota or rate limit hit. `retry_after` carries the server hint, if any.
    #[error("Quota exceeded: {message}")]
    QuotaExceeded {
        message: String,
        retry_after: Option<Duration>,
    },

    /// The API answered successfully but with no text.
    #[error("Empty response from model")]
    EmptyResponse,

    /// Anything else: network errors, 5xx, unparseable bodies.
    #[error("Generation failed: {0}")]
    Transient(String),
}

impl GenerationError {
    /// Returns true if this error disables the credential for the rest of the run.
    pub fn is_fatal_for_unit(&self) -> bool {
        matches!(self, GenerationError::CredentialRejected(_))
    }
}
