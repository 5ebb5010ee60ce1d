//! Retry and backoff policy for a single job.
//!
//! A job moves through `Attempting(1..=max_attempts)` and ends in Done or
//! Failed. The policy decides, for every failed attempt, what happens next:
//!
//! | failure                 | next state            | delay                         |
//! |-------------------------|-----------------------|-------------------------------|
//! | credential rejected     | unit stops            | none                          |
//! | quota / limit           | same attempt again    | server hint or default wait   |
//! | empty output            | next attempt / Failed | none                          |
//! | anything else           | next attempt / Failed | fixed transient backoff       |
//!
//! Quota waits never consume an attempt; they are bounded by the unit's
//! request budget instead.

use std::time::Duration;

use crate::config::WorkerConfig;
use crate::error::GenerationError;

/// What the unit should do after a failed attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    /// Report the job as failed and stop the whole unit.
    AbandonUnit,
    /// Sleep, then retry without consuming an attempt.
    RetrySameAttempt(Duration),
    /// Sleep, then move on to the next attempt.
    RetryNextAttempt(Duration),
    /// Attempts exhausted: report the job as failed.
    GiveUp,
}

/// Retry policy parameters.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub default_quota_wait: Duration,
    pub transient_backoff: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, default_quota_wait: Duration, transient_backoff: Duration) -> Self {
        Self {
            max_attempts,
            default_quota_wait,
            transient_backoff,
        }
    }

    pub fn from_config(config: &WorkerConfig) -> Self {
        Self::new(
            config.max_attempts_per_job,
            config.default_quota_wait,
            config.transient_backoff,
        )
    }

    /// Decides the transition after `error` happened on `attempt` (1-based).
    pub fn decide(&self, error: &GenerationError, attempt: u32) -> RetryDecision {
        let has_next = attempt < self.max_attempts;

        match error {
            GenerationError::CredentialRejected(_) => RetryDecision::AbandonUnit,
            GenerationError::QuotaExceeded { retry_after, .. } => {
                RetryDecision::RetrySameAttempt(retry_after.unwrap_or(self.default_quota_wait))
            }
            GenerationError::EmptyResponse if has_next => {
                RetryDecision::RetryNextAttempt(Duration::ZERO)
            }
            GenerationError::Transient(_) if has_next => {
                RetryDecision::RetryNextAttempt(self.transient_backoff)
            }
            GenerationError::EmptyResponse | GenerationError::Transient(_) => {
                RetryDecision::GiveUp
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&WorkerConfig::default())
    }
}
