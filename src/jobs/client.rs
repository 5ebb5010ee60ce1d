//! HTTP client for the remote job server.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Url};
use tracing::{debug, error, info, warn};

use super::types::{interpret_next_response, FetchOutcome, Job, JobId, JobOutcome, SubmitPayload};
use super::JobSource;
use crate::config::DEFAULT_JOBS_API_URL;
use crate::error::JobError;

/// Settings for [`JobClient`].
#[derive(Debug, Clone)]
pub struct JobClientConfig {
    /// Job server endpoint (`GET ?action=next`, `POST` results).
    pub endpoint: String,
    /// Fetch attempts before reporting a transient failure.
    pub max_fetch_attempts: u32,
    /// Delay after each failed fetch attempt.
    pub fetch_retry_delay: Duration,
    /// Delay taken after the last fetch attempt failed.
    pub exhausted_retry_delay: Duration,
    /// Timeout of a single fetch request.
    pub fetch_timeout: Duration,
    /// Timeout of a single submit request.
    pub submit_timeout: Duration,
}

impl Default for JobClientConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_JOBS_API_URL.to_string(),
            max_fetch_attempts: 5,
            fetch_retry_delay: Duration::from_secs(5),
            exhausted_retry_delay: Duration::from_secs(60),
            fetch_timeout: Duration::from_secs(30),
            submit_timeout: Duration::from_secs(60),
        }
    }
}

impl JobClientConfig {
    /// Creates a configuration for the given endpoint with default timings.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            ..Default::default()
        }
    }

    /// Sets the number of fetch attempts.
    pub fn with_max_fetch_attempts(mut self, attempts: u32) -> Self {
        self.max_fetch_attempts = attempts;
        self
    }

    /// Sets the delay between fetch attempts.
    pub fn with_fetch_retry_delay(mut self, delay: Duration) -> Self {
        self.fetch_retry_delay = delay;
        self
    }

    /// Sets the delay after all fetch attempts failed.
    pub fn with_exhausted_retry_delay(mut self, delay: Duration) -> Self {
        self.exhausted_retry_delay = delay;
        self
    }
}

/// Job server client shared by all execution units of a worker.
pub struct JobClient {
    http_client: Client,
    next_url: Url,
    config: JobClientConfig,
}

impl JobClient {
    /// Creates a new client.
    ///
    /// # Errors
    ///
    /// Returns `JobError::InvalidEndpoint` if the endpoint is not a URL and
    /// `JobError::RequestFailed` if the HTTP client cannot be built.
    pub fn new(config: JobClientConfig) -> Result<Self, JobError> {
        let mut next_url = Url::parse(&config.endpoint)
            .map_err(|e| JobError::InvalidEndpoint(format!("{}: {}", config.endpoint, e)))?;
        next_url.query_pairs_mut().append_pair("action", "next");

        let http_client = Client::builder().build()?;
        Ok(Self {
            http_client,
            next_url,
            config,
        })
    }

    /// Returns the configured endpoint.
    pub fn endpoint(&self) -> &str {
        &self.config.endpoint
    }

    /// Issues one `next` request.
    async fn request_next(&self) -> Result<Option<Job>, JobError> {
        let response = self
            .http_client
            .get(self.next_url.clone())
            .timeout(self.config.fetch_timeout)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(JobError::HttpStatus(status.as_u16()));
        }

        let body = response.text().await?;
        interpret_next_response(&body)
    }

    /// Issues one result `POST` and returns the server acknowledgement.
    async fn post_result(
        &self,
        job_id: &JobId,
        outcome: &JobOutcome,
    ) -> Result<serde_json::Value, JobError> {
        let payload = SubmitPayload::new(job_id, outcome);

        let response = self
            .http_client
            .post(&self.config.endpoint)
            .json(&payload)
            .timeout(self.config.submit_timeout)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(JobError::HttpStatus(status.as_u16()));
        }

        let body = response.text().await?;
        Ok(serde_json::from_str(&body).unwrap_or(serde_json::Value::String(body)))
    }
}

#[async_trait]
impl JobSource for JobClient {
    async fn fetch_next(&self) -> FetchOutcome {
        let max_attempts = self.config.max_fetch_attempts;

        for attempt in 1..=max_attempts {
            match self.request_next().await {
                Ok(Some(job)) => {
                    debug!(job_id = %job.id, attempt, "Fetched job");
                    return FetchOutcome::Job(job);
                }
                Ok(None) => {
                    info!("Job server reports no pending jobs");
                    return FetchOutcome::Exhausted;
                }
                Err(e) => {
                    warn!(
                        attempt,
                        max_attempts,
                        error = %e,
                        "Failed to fetch job"
                    );
                    tokio::time::sleep(self.config.fetch_retry_delay).await;
                }
            }
        }

        error!(
            delay_secs = self.config.exhausted_retry_delay.as_secs_f64(),
            "Giving up on fetching a job for now"
        );
        tokio::time::sleep(self.config.exhausted_retry_delay).await;
        FetchOutcome::TransientFailure
    }

    async fn submit(&self, job_id: &JobId, outcome: JobOutcome) {
        match self.post_result(job_id, &outcome).await {
            Ok(ack) => {
                info!(job_id = %job_id, status = outcome.status(), ack = %ack, "Result submitted");
            }
            Err(e) => {
                error!(
                    job_id = %job_id,
                    status = outcome.status(),
                    error = %e,
                    "Failed to submit result, outcome is lost"
                );
            }
        }
    }
}
