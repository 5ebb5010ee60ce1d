//! A single execution unit: one credential, one sequential job loop.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use tracing::{error, info, warn};

use super::budget::RequestBudget;
use super::context::WorkerContext;
use super::rate_limiter::RateLimiter;
use super::retry::{RetryDecision, RetryPolicy};
use crate::config::WorkerConfig;
use crate::content::{parse_response, slugify, ArticleGenerator};
use crate::error::GenerationError;
use crate::jobs::{Article, FetchOutcome, Job, JobOutcome, JobSource};
use crate::llm::TextGenerator;

/// Why an execution unit stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitReason {
    /// The credential's request budget was used up.
    BudgetExhausted,
    /// The job server reported no more pending jobs.
    QueueExhausted,
    /// The credential was rejected (leaked, revoked, no permission).
    CredentialRejected,
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ExitReason::BudgetExhausted => "budget_exhausted",
            ExitReason::QueueExhausted => "queue_exhausted",
            ExitReason::CredentialRejected => "credential_rejected",
        };
        f.write_str(s)
    }
}

/// Final state of one unit, returned when it stops.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnitReport {
    pub unit: usize,
    pub succeeded: u64,
    pub failed: u64,
    pub requests: u32,
    pub exit_reason: ExitReason,
}

/// Result of running one job to a terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum JobVerdict {
    Done,
    Failed,
    /// The job was reported as failed and the unit must stop.
    StopUnit(ExitReason),
}

/// One concurrent worker bound to exactly one credential.
pub struct ExecutionUnit {
    unit: usize,
    worker_index: usize,
    jobs: Arc<dyn JobSource>,
    generator: ArticleGenerator,
    limiter: RateLimiter,
    budget: RequestBudget,
    policy: RetryPolicy,
    config: Arc<WorkerConfig>,
    context: Arc<WorkerContext>,
    succeeded: u64,
    failed: u64,
}

impl ExecutionUnit {
    pub fn new(
        unit: usize,
        jobs: Arc<dyn JobSource>,
        llm: Arc<dyn TextGenerator>,
        config: Arc<WorkerConfig>,
        context: Arc<WorkerContext>,
    ) -> Self {
        Self {
            unit,
            worker_index: context.worker_index(),
            jobs,
            generator: ArticleGenerator::new(llm),
            limiter: RateLimiter::new(config.min_request_interval),
            budget: RequestBudget::new(config.max_requests_per_credential),
            policy: RetryPolicy::from_config(&config),
            config,
            context,
            succeeded: 0,
            failed: 0,
        }
    }

    /// Main unit loop.
    ///
    /// Fetches and processes jobs one at a time until the budget is spent,
    /// the queue is empty, or the credential is rejected.
    pub async fn run(mut self) -> UnitReport {
        info!(worker_index = self.worker_index, unit = self.unit, "Unit started");

        let exit_reason = loop {
            if self.budget.is_exhausted() {
                info!(
                    worker_index = self.worker_index,
                    unit = self.unit,
                    max = self.budget.max(),
                    "Request budget reached for this credential"
                );
                break ExitReason::BudgetExhausted;
            }

            let job = match self.jobs.fetch_next().await {
                FetchOutcome::Job(job) => job,
                FetchOutcome::Exhausted => {
                    info!(
                        worker_index = self.worker_index,
                        unit = self.unit,
                        "No jobs left"
                    );
                    break ExitReason::QueueExhausted;
                }
                FetchOutcome::TransientFailure => {
                    tokio::time::sleep(self.config.fetch_retry_pause).await;
                    continue;
                }
            };

            info!(
                worker_index = self.worker_index,
                unit = self.unit,
                job_id = %job.id,
                keyword = %job.keyword,
                "Claimed job"
            );

            match self.process_job(&job).await {
                JobVerdict::Done | JobVerdict::Failed => {}
                JobVerdict::StopUnit(reason) => break reason,
            }
        };

        info!(
            worker_index = self.worker_index,
            unit = self.unit,
            succeeded = self.succeeded,
            failed = self.failed,
            requests = self.budget.used(),
            reason = %exit_reason,
            "Unit stopped"
        );

        UnitReport {
            unit: self.unit,
            succeeded: self.succeeded,
            failed: self.failed,
            requests: self.budget.used(),
            exit_reason,
        }
    }

    /// Runs the retry state machine for one job and submits its outcome.
    async fn process_job(&mut self, job: &Job) -> JobVerdict {
        let mut attempt: u32 = 1;

        loop {
            if !self.budget.try_acquire() {
                warn!(
                    worker_index = self.worker_index,
                    unit = self.unit,
                    job_id = %job.id,
                    "Request budget ran out mid-job"
                );
                self.fail_job(job).await;
                return JobVerdict::StopUnit(ExitReason::BudgetExhausted);
            }

            let waited = self.limiter.wait().await;
            info!(
                worker_index = self.worker_index,
                unit = self.unit,
                job_id = %job.id,
                attempt,
                requests = %format!("{}/{}", self.budget.used(), self.budget.max()),
                waited_secs = waited.as_secs_f64(),
                "Generation request"
            );

            let result = self.generator.generate(&job.keyword).await;
            self.limiter.mark();

            let err = match result {
                Ok(raw) => {
                    let parsed = parse_response(&raw);
                    if !parsed.meta_from_marker {
                        warn!(
                            worker_index = self.worker_index,
                            unit = self.unit,
                            job_id = %job.id,
                            "No meta description marker, synthesized from article"
                        );
                    }
                    if parsed.article_html.is_empty() {
                        GenerationError::EmptyResponse
                    } else {
                        let article = Article {
                            slug: slugify(&job.keyword),
                            title: job.keyword.clone(),
                            meta_description: parsed.meta_description,
                            body_html: parsed.article_html,
                        };
                        self.jobs.submit(&job.id, JobOutcome::Done(article)).await;
                        self.succeeded += 1;
                        let total = self.context.record_success().await;
                        info!(
                            worker_index = self.worker_index,
                            unit = self.unit,
                            job_id = %job.id,
                            local_succeeded = self.succeeded,
                            total_succeeded = total,
                            "Job done"
                        );
                        return JobVerdict::Done;
                    }
                }
                Err(err) => err,
            };

            warn!(
                worker_index = self.worker_index,
                unit = self.unit,
                job_id = %job.id,
                attempt,
                error = %err,
                "Generation attempt failed"
            );

            match self.policy.decide(&err, attempt) {
                RetryDecision::AbandonUnit => {
                    error!(
                        worker_index = self.worker_index,
                        unit = self.unit,
                        "Credential rejected, stopping unit"
                    );
                    self.fail_job(job).await;
                    return JobVerdict::StopUnit(ExitReason::CredentialRejected);
                }
                RetryDecision::RetrySameAttempt(delay) => {
                    warn!(
                        worker_index = self.worker_index,
                        unit = self.unit,
                        delay_secs = delay.as_secs_f64(),
                        "Quota or rate limit hit, waiting"
                    );
                    tokio::time::sleep(delay).await;
                }
                RetryDecision::RetryNextAttempt(delay) => {
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                    attempt += 1;
                }
                RetryDecision::GiveUp => {
                    error!(
                        worker_index = self.worker_index,
                        unit = self.unit,
                        job_id = %job.id,
                        attempts = attempt,
                        "Job failed permanently"
                    );
                    self.fail_job(job).await;
                    return JobVerdict::Failed;
                }
            }
        }
    }

    async fn fail_job(&mut self, job: &Job) {
        self.jobs.submit(&job.id, JobOutcome::Failed).await;
        self.failed += 1;
        self.context.record_failure().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::JobId;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio::time::Instant;

    /// Job source that hands out a fixed list of fetch outcomes and records submits.
    struct MockJobSource {
        fetches: Mutex<VecDeque<FetchOutcome>>,
        fetch_calls: Mutex<usize>,
        submitted: Mutex<Vec<(JobId, JobOutcome)>>,
    }

    impl MockJobSource {
        fn new(fetches: Vec<FetchOutcome>) -> Self {
            Self {
                fetches: Mutex::new(fetches.into()),
                fetch_calls: Mutex::new(0),
                submitted: Mutex::new(Vec::new()),
            }
        }

        fn fetch_calls(&self) -> usize {
            *self.fetch_calls.lock().expect("lock poisoned")
        }

        fn submitted(&self) -> Vec<(JobId, JobOutcome)> {
            self.submitted.lock().expect("lock poisoned").clone()
        }
    }

    #[async_trait]
    impl JobSource for MockJobSource {
        async fn fetch_next(&self) -> FetchOutcome {
            *self.fetch_calls.lock().expect("lock poisoned") += 1;
            self.fetches
                .lock()
                .expect("lock poisoned")
                .pop_front()
                .unwrap_or(FetchOutcome::Exhausted)
        }

        async fn submit(&self, job_id: &JobId, outcome: JobOutcome) {
            self.submitted
                .lock()
                .expect("lock poisoned")
                .push((job_id.clone(), outcome));
        }
    }

    /// Model that replays scripted results and records call times.
    struct MockTextGenerator {
        script: Mutex<VecDeque<Result<String, GenerationError>>>,
        calls: Mutex<Vec<Instant>>,
    }

    impl MockTextGenerator {
        fn new(script: Vec<Result<String, GenerationError>>) -> Self {
            Self {
                script: Mutex::new(script.into()),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> Vec<Instant> {
            self.calls.lock().expect("lock poisoned").clone()
        }
    }

    #[async_trait]
    impl TextGenerator for MockTextGenerator {
        async fn generate(&self, _prompt: &str) -> Result<String, GenerationError> {
            self.calls.lock().expect("lock poisoned").push(Instant::now());
            self.script
                .lock()
                .expect("lock poisoned")
                .pop_front()
                .unwrap_or_else(|| Ok("<p>Default</p>\n\nMETA_DESC: Default meta".to_string()))
        }
    }

    fn test_config() -> WorkerConfig {
        WorkerConfig::new()
            .with_min_request_interval(Duration::from_secs(10))
            .with_max_requests_per_credential(250)
            .with_max_attempts_per_job(3)
            .with_default_quota_wait(Duration::from_secs(120))
            .with_transient_backoff(Duration::from_secs(10))
            .with_fetch_retry_pause(Duration::from_secs(5))
    }

    fn unit(
        jobs: Arc<MockJobSource>,
        llm: Arc<MockTextGenerator>,
        config: WorkerConfig,
    ) -> ExecutionUnit {
        ExecutionUnit::new(
            0,
            jobs,
            llm,
            Arc::new(config),
            Arc::new(WorkerContext::new(0)),
        )
    }

    fn job(id: i64, keyword: &str) -> FetchOutcome {
        FetchOutcome::Job(Job::new(id, keyword))
    }

    fn quota(secs: u64) -> GenerationError {
        GenerationError::QuotaExceeded {
            message: format!("quota exceeded, retry in {}s", secs),
            retry_after: Some(Duration::from_secs(secs)),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_queue_stops_without_processing() {
        let jobs = Arc::new(MockJobSource::new(vec![FetchOutcome::Exhausted]));
        let llm = Arc::new(MockTextGenerator::new(vec![]));

        let report = unit(jobs.clone(), llm.clone(), test_config()).run().await;

        assert_eq!(report.exit_reason, ExitReason::QueueExhausted);
        assert_eq!(report.requests, 0);
        assert_eq!(jobs.fetch_calls(), 1);
        assert!(jobs.submitted().is_empty());
        assert!(llm.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_successful_job_submits_done() {
        let jobs = Arc::new(MockJobSource::new(vec![job(1, "Best Yoga Mats")]));
        let llm = Arc::new(MockTextGenerator::new(vec![Ok(
            "<p>Great mats</p>\n\nMETA_DESC: The best mats reviewed.".to_string(),
        )]));

        let report = unit(jobs.clone(), llm, test_config()).run().await;

        assert_eq!(report.succeeded, 1);
        assert_eq!(report.failed, 0);
        assert_eq!(report.requests, 1);

        let submitted = jobs.submitted();
        assert_eq!(submitted.len(), 1);
        assert_eq!(submitted[0].0, JobId::new(1));
        match &submitted[0].1 {
            JobOutcome::Done(article) => {
                assert_eq!(article.title, "Best Yoga Mats");
                assert_eq!(article.slug, "best-yoga-mats");
                assert_eq!(article.meta_description, "The best mats reviewed.");
                assert_eq!(article.body_html, "<p>Great mats</p>");
            }
            JobOutcome::Failed => panic!("expected done"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_permission_denied_stops_unit() {
        let jobs = Arc::new(MockJobSource::new(vec![job(7, "a"), job(8, "b")]));
        let llm = Arc::new(MockTextGenerator::new(vec![Err(
            GenerationError::CredentialRejected("permission_denied".into()),
        )]));

        let report = unit(jobs.clone(), llm, test_config()).run().await;

        assert_eq!(report.exit_reason, ExitReason::CredentialRejected);
        assert_eq!(report.failed, 1);
        assert_eq!(jobs.fetch_calls(), 1);
        assert_eq!(jobs.submitted(), vec![(JobId::new(7), JobOutcome::Failed)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_quota_wait_honors_hint_and_keeps_attempt() {
        let jobs = Arc::new(MockJobSource::new(vec![job(1, "t")]));
        // Three quota errors would exhaust 3 attempts if they were counted.
        let llm = Arc::new(MockTextGenerator::new(vec![
            Err(quota(45)),
            Err(quota(45)),
            Err(GenerationError::Transient("boom".into())),
            Err(GenerationError::Transient("boom".into())),
            Ok("<p>Body</p>\n\nMETA_DESC: Meta".to_string()),
        ]));

        let report = unit(jobs.clone(), llm.clone(), test_config()).run().await;

        assert_eq!(report.succeeded, 1);
        assert_eq!(report.requests, 5);

        let calls = llm.calls();
        assert!(calls[1] - calls[0] >= Duration::from_secs(45));
        assert!(calls[1] - calls[0] < Duration::from_secs(46));
        assert!(matches!(jobs.submitted()[0].1, JobOutcome::Done(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_quota_without_hint_uses_default_wait() {
        let jobs = Arc::new(MockJobSource::new(vec![job(1, "t")]));
        let llm = Arc::new(MockTextGenerator::new(vec![Err(
            GenerationError::QuotaExceeded {
                message: "quota".into(),
                retry_after: None,
            },
        )]));

        unit(jobs, llm.clone(), test_config()).run().await;

        let calls = llm.calls();
        assert!(calls[1] - calls[0] >= Duration::from_secs(120));
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_errors_exhaust_attempts() {
        let jobs = Arc::new(MockJobSource::new(vec![job(3, "t")]));
        let llm = Arc::new(MockTextGenerator::new(vec![
            Err(GenerationError::Transient("a".into())),
            Err(GenerationError::Transient("b".into())),
            Err(GenerationError::Transient("c".into())),
        ]));

        let report = unit(jobs.clone(), llm.clone(), test_config()).run().await;

        assert_eq!(report.failed, 1);
        assert_eq!(report.requests, 3);
        assert_eq!(llm.calls().len(), 3);
        assert_eq!(jobs.submitted(), vec![(JobId::new(3), JobOutcome::Failed)]);
        assert_eq!(report.exit_reason, ExitReason::QueueExhausted);
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_output_retries_then_fails() {
        let jobs = Arc::new(MockJobSource::new(vec![job(4, "t")]));
        let llm = Arc::new(MockTextGenerator::new(vec![
            Ok(String::new()),
            Ok("META_DESC: only meta".to_string()),
            Ok("   ".to_string()),
        ]));

        let report = unit(jobs.clone(), llm, test_config()).run().await;

        assert_eq!(report.requests, 3);
        assert_eq!(jobs.submitted(), vec![(JobId::new(4), JobOutcome::Failed)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_output_then_success() {
        let jobs = Arc::new(MockJobSource::new(vec![job(4, "t")]));
        let llm = Arc::new(MockTextGenerator::new(vec![
            Ok(String::new()),
            Ok("<p>Second try</p>".to_string()),
        ]));

        let report = unit(jobs.clone(), llm, test_config()).run().await;

        assert_eq!(report.succeeded, 1);
        match &jobs.submitted()[0].1 {
            JobOutcome::Done(article) => {
                assert_eq!(article.body_html, "<p>Second try</p>");
                assert_eq!(article.meta_description, "Second try");
            }
            JobOutcome::Failed => panic!("expected done"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_requests_are_spaced_by_min_interval() {
        let jobs = Arc::new(MockJobSource::new(vec![job(1, "a"), job(2, "b"), job(3, "c")]));
        let llm = Arc::new(MockTextGenerator::new(vec![]));

        unit(jobs, llm.clone(), test_config()).run().await;

        let calls = llm.calls();
        assert_eq!(calls.len(), 3);
        for pair in calls.windows(2) {
            assert!(pair[1] - pair[0] >= Duration::from_secs(10));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_budget_is_never_exceeded() {
        let fetches = (0..10).map(|i| job(i, "t")).collect();
        let jobs = Arc::new(MockJobSource::new(fetches));
        // Every request hits the quota: only the budget can stop this unit.
        let script = (0..100).map(|_| Err(quota(1))).collect();
        let llm = Arc::new(MockTextGenerator::new(script));

        let config = test_config().with_max_requests_per_credential(4);
        let report = unit(jobs.clone(), llm.clone(), config).run().await;

        assert_eq!(report.exit_reason, ExitReason::BudgetExhausted);
        assert_eq!(report.requests, 4);
        assert_eq!(llm.calls().len(), 4);
        assert_eq!(jobs.submitted(), vec![(JobId::new(0), JobOutcome::Failed)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_budget_checked_before_fetching() {
        let jobs = Arc::new(MockJobSource::new(vec![job(1, "a"), job(2, "b")]));
        let llm = Arc::new(MockTextGenerator::new(vec![]));

        let config = test_config().with_max_requests_per_credential(1);
        let report = unit(jobs.clone(), llm, config).run().await;

        assert_eq!(report.exit_reason, ExitReason::BudgetExhausted);
        assert_eq!(report.succeeded, 1);
        assert_eq!(jobs.fetch_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_fetch_failure_pauses_and_retries() {
        let jobs = Arc::new(MockJobSource::new(vec![
            FetchOutcome::TransientFailure,
            job(1, "a"),
        ]));
        let llm = Arc::new(MockTextGenerator::new(vec![]));

        let start = Instant::now();
        let report = unit(jobs.clone(), llm.clone(), test_config()).run().await;

        assert_eq!(report.succeeded, 1);
        assert_eq!(jobs.fetch_calls(), 3);
        assert!(llm.calls()[0] - start >= Duration::from_secs(5));
    }

    #[test]
    fn test_exit_reason_display() {
        assert_eq!(ExitReason::BudgetExhausted.to_string(), "budget_exhausted");
        assert_eq!(ExitReason::QueueExhausted.to_string(), "queue_exhausted");
        assert_eq!(
            ExitReason::CredentialRejected.to_string(),
            "credential_rejected"
        );
    }
}
