//! Job definitions and the job server wire format.
//!
//! - `Job`: a claimed unit of work (id + keyword)
//! - `FetchOutcome`: result of asking the server for the next job
//! - `JobOutcome`: what the worker reports back for a job

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::JobError;

/// Server-assigned job identifier.
///
/// The worker never interprets it, it only echoes it back on submit, so the
/// JSON value is kept exactly as received (number or string).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(serde_json::Value);

impl JobId {
    pub fn new(value: impl Into<serde_json::Value>) -> Self {
        Self(value.into())
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            serde_json::Value::String(s) => f.write_str(s),
            other => write!(f, "{}", other),
        }
    }
}

/// A job claimed from the queue server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    /// Server-side identifier.
    pub id: JobId,
    /// Article title / topic.
    pub keyword: String,
}

impl Job {
    pub fn new(id: impl Into<serde_json::Value>, keyword: impl Into<String>) -> Self {
        Self {
            id: JobId::new(id),
            keyword: keyword.into(),
        }
    }
}

/// Result of a `fetch_next` call.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    /// A job was claimed.
    Job(Job),
    /// The server reported an empty queue. Terminal for the caller.
    Exhausted,
    /// The server could not be reached or answered nonsense; try again later.
    TransientFailure,
}

/// A finished article, ready for submission.
#[derive(Debug, Clone, PartialEq)]
pub struct Article {
    pub title: String,
    pub slug: String,
    pub meta_description: String,
    pub body_html: String,
}

/// Outcome reported to the server for one job.
#[derive(Debug, Clone, PartialEq)]
pub enum JobOutcome {
    Done(Article),
    Failed,
}

impl JobOutcome {
    pub fn status(&self) -> &'static str {
        match self {
            JobOutcome::Done(_) => "done",
            JobOutcome::Failed => "failed",
        }
    }
}

/// Body of `GET ?action=next`.
#[derive(Debug, Deserialize)]
pub(crate) struct NextJobResponse {
    #[serde(default)]
    pub ok: bool,
    #[serde(default)]
    pub job: Option<Job>,
    #[serde(default)]
    pub reason: Option<String>,
}

/// Reason string the server uses for an empty queue.
pub(crate) const NO_JOB_REASON: &str = "no_job";

/// Interprets a `next` response body.
///
/// Returns `Ok(Some(job))` for a claimed job, `Ok(None)` for a well-formed
/// "no work" answer and `Err` for every other shape.
pub(crate) fn interpret_next_response(body: &str) -> Result<Option<Job>, JobError> {
    let parsed: NextJobResponse = serde_json::from_str(body)
        .map_err(|e| JobError::Malformed(format!("invalid JSON: {}", e)))?;

    if !parsed.ok {
        return match parsed.reason.as_deref() {
            Some(NO_JOB_REASON) => Ok(None),
            Some(reason) => Err(JobError::Malformed(format!("server not ok: {}", reason))),
            None => Err(JobError::Malformed("server not ok, no reason given".to_string())),
        };
    }

    parsed
        .job
        .map(Some)
        .ok_or_else(|| JobError::Malformed("ok response without job".to_string()))
}

/// Body of the result `POST`. Field names are fixed by the job server.
#[derive(Debug, Serialize)]
pub(crate) struct SubmitPayload<'a> {
    pub job_id: &'a JobId,
    pub status: &'static str,
    #[serde(rename = "judul", skip_serializing_if = "Option::is_none")]
    pub title: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slug: Option<&'a str>,
    #[serde(rename = "metadesc", skip_serializing_if = "Option::is_none")]
    pub meta_description: Option<&'a str>,
    #[serde(rename = "artikel", skip_serializing_if = "Option::is_none")]
    pub body_html: Option<&'a str>,
}

impl<'a> SubmitPayload<'a> {
    pub fn new(job_id: &'a JobId, outcome: &'a JobOutcome) -> Self {
        match outcome {
            JobOutcome::Done(article) => Self {
                job_id,
                status: outcome.status(),
                title: Some(&article.title),
                slug: Some(&article.slug),
                meta_description: Some(&article.meta_description),
                body_html: Some(&article.body_html),
            },
            JobOutcome::Failed => Self {
                job_id,
                status: outcome.status(),
                title: None,
                slug: None,
                meta_description: None,
                body_html: None,
            },
        }
    }
}
