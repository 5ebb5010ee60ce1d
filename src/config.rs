//! Worker configuration.
//!
//! Tunables default to the values the worker has always run with and can be
//! overridden from the command line or environment (see `cli`).

use std::time::Duration;

use crate::error::ConfigError;
use crate::jobs::JobClientConfig;

/// Default job server endpoint.
pub const DEFAULT_JOBS_API_URL: &str = "https://leamarie-yoga.de/jobs_api.php";

/// Default generative model identifier.
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";

/// Minimum seconds between two generation requests of one unit.
pub const DEFAULT_MIN_SECONDS_PER_REQUEST: u64 = 10;

/// Generation attempts per job before it is reported as failed.
pub const DEFAULT_MAX_ATTEMPTS_PER_JOB: u32 = 3;

/// Wait applied to quota errors that carry no retry hint.
pub const DEFAULT_QUOTA_SLEEP_SECONDS: u64 = 120;

/// Generation requests a single credential may issue per run.
pub const DEFAULT_MAX_REQUESTS_PER_CREDENTIAL: u32 = 250;

/// Execution units (and therefore credentials) per worker instance.
pub const DEFAULT_UNITS_PER_WORKER: usize = 3;

/// Configuration shared by the coordinator and all of its execution units.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Index of this worker instance; selects its credential slice.
    pub worker_index: usize,
    /// Number of execution units started by this instance.
    pub units_per_worker: usize,
    /// Generative model identifier.
    pub model: String,
    /// Timeout applied to a single generation call.
    pub generation_timeout: Duration,

    // Per-unit pacing
    /// Minimum interval between generation requests of one unit.
    pub min_request_interval: Duration,
    /// Hard ceiling of generation requests per credential.
    pub max_requests_per_credential: u32,
    /// Delay between starting consecutive units.
    pub unit_stagger: Duration,
    /// Extra pause taken by a unit after the job client gave up fetching.
    pub fetch_retry_pause: Duration,

    // Retry policy
    /// Attempts per job, not counting quota waits.
    pub max_attempts_per_job: u32,
    /// Quota wait when the API gives no hint.
    pub default_quota_wait: Duration,
    /// Delay after an unclassified generation error.
    pub transient_backoff: Duration,

    /// Job server client settings.
    pub jobs: JobClientConfig,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            worker_index: 0,
            units_per_worker: DEFAULT_UNITS_PER_WORKER,
            model: DEFAULT_MODEL.to_string(),
            generation_timeout: Duration::from_secs(300),

            min_request_interval: Duration::from_secs(DEFAULT_MIN_SECONDS_PER_REQUEST),
            max_requests_per_credential: DEFAULT_MAX_REQUESTS_PER_CREDENTIAL,
            unit_stagger: Duration::from_millis(200),
            fetch_retry_pause: Duration::from_secs(5),

            max_attempts_per_job: DEFAULT_MAX_ATTEMPTS_PER_JOB,
            default_quota_wait: Duration::from_secs(DEFAULT_QUOTA_SLEEP_SECONDS),
            transient_backoff: Duration::from_secs(10),

            jobs: JobClientConfig::default(),
        }
    }
}

impl WorkerConfig {
    /// Creates a configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the worker index.
    pub fn with_worker_index(mut self, worker_index: usize) -> Self {
        self.worker_index = worker_index;
        self
    }

    /// Sets the number of units per worker.
    pub fn with_units_per_worker(mut self, units: usize) -> Self {
        self.units_per_worker = units;
        self
    }

    /// Sets the model identifier.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Sets the minimum interval between requests of one unit.
    pub fn with_min_request_interval(mut self, interval: Duration) -> Self {
        self.min_request_interval = interval;
        self
    }

    /// Sets the per-credential request ceiling.
    pub fn with_max_requests_per_credential(mut self, max: u32) -> Self {
        self.max_requests_per_credential = max;
        self
    }

    /// Sets the number of attempts per job.
    pub fn with_max_attempts_per_job(mut self, attempts: u32) -> Self {
        self.max_attempts_per_job = attempts;
        self
    }

    /// Sets the default quota wait.
    pub fn with_default_quota_wait(mut self, wait: Duration) -> Self {
        self.default_quota_wait = wait;
        self
    }

    /// Sets the delay after unclassified errors.
    pub fn with_transient_backoff(mut self, backoff: Duration) -> Self {
        self.transient_backoff = backoff;
        self
    }

    /// Sets the delay between unit starts.
    pub fn with_unit_stagger(mut self, stagger: Duration) -> Self {
        self.unit_stagger = stagger;
        self
    }

    /// Sets the pause after a transient fetch failure.
    pub fn with_fetch_retry_pause(mut self, pause: Duration) -> Self {
        self.fetch_retry_pause = pause;
        self
    }

    /// Sets the job client configuration.
    pub fn with_jobs(mut self, jobs: JobClientConfig) -> Self {
        self.jobs = jobs;
        self
    }

    /// Validates the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationFailed` if any value would make the
    /// worker unable to process a single job.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.units_per_worker == 0 {
            return Err(ConfigError::ValidationFailed(
                "units_per_worker must be greater than 0".to_string(),
            ));
        }

        if self.max_attempts_per_job == 0 {
            return Err(ConfigError::ValidationFailed(
                "max_attempts_per_job must be greater than 0".to_string(),
            ));
        }

        if self.max_requests_per_credential == 0 {
            return Err(ConfigError::ValidationFailed(
                "max_requests_per_credential must be greater than 0".to_string(),
            ));
        }

        if self.model.trim().is_empty() {
            return Err(ConfigError::ValidationFailed(
                "model cannot be empty".to_string(),
            ));
        }

        if self.jobs.endpoint.trim().is_empty() {
            return Err(ConfigError::ValidationFailed(
                "job server endpoint cannot be empty".to_string(),
            ));
        }

        if self.jobs.max_fetch_attempts == 0 {
            return Err(ConfigError::ValidationFailed(
                "max_fetch_attempts must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

/// Parses the `WORKER_INDEX` value.
///
/// # Errors
///
/// Returns `ConfigError::InvalidValue` for anything that is not a
/// non-negative integer.
pub fn parse_worker_index(raw: &str) -> Result<usize, ConfigError> {
    raw.trim()
        .parse::<usize>()
        .map_err(|e| ConfigError::InvalidValue {
            key: "WORKER_INDEX".to_string(),
            message: format!("'{}' is not a valid worker index: {}", raw, e),
        })
}
