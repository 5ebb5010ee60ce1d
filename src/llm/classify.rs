//! Classification of generative API failures.
//!
//! The structured API status (`PERMISSION_DENIED`, `RESOURCE_EXHAUSTED`), the
//! `ErrorInfo` reason and the HTTP status code are authoritative. Message text
//! matching is only a compatibility shim: with a structured status it may only
//! detect rejected credentials, without one it applies in full. The wording it
//! relies on is owned by the API provider.

use std::sync::OnceLock;
use std::time::Duration;

use regex::Regex;

use crate::error::GenerationError;

/// Regex extracting the server-suggested delay, e.g. "Please retry in 45.2s."
fn retry_hint_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)retry in ([0-9]+(?:\.[0-9]+)?)s").expect("retry hint pattern is valid")
    })
}

/// Parses a "retry in <seconds>s" hint out of an error message.
pub fn parse_retry_delay(text: &str) -> Option<Duration> {
    let captures = retry_hint_pattern().captures(text)?;
    let secs: f64 = captures.get(1)?.as_str().parse().ok()?;
    Duration::try_from_secs_f64(secs).ok()
}

/// Parses a protobuf-style duration such as "45s" or "12.5s".
pub fn parse_duration_literal(text: &str) -> Option<Duration> {
    let secs: f64 = text.trim().strip_suffix('s')?.parse().ok()?;
    Duration::try_from_secs_f64(secs).ok()
}

/// `ErrorInfo` reasons that mean the key itself is unusable.
const REJECTED_KEY_REASONS: &[&str] = &["API_KEY_INVALID", "API_KEY_EXPIRED"];

fn is_credential_message(lower: &str) -> bool {
    lower.contains("reported as leaked")
        || lower.contains("permission_denied")
        || lower.contains("api key not valid")
        || lower.contains("api key expired")
}

fn is_quota_message(lower: &str) -> bool {
    lower.contains("quota") || lower.contains("limit") || lower.contains("exceeded")
}

/// Classifies an error from its message text alone.
pub fn classify_message(message: &str) -> GenerationError {
    let lower = message.to_lowercase();

    if is_credential_message(&lower) {
        return GenerationError::CredentialRejected(message.to_string());
    }

    if is_quota_message(&lower) {
        return GenerationError::QuotaExceeded {
            message: message.to_string(),
            retry_after: parse_retry_delay(message),
        };
    }

    GenerationError::Transient(message.to_string())
}

/// Classifies an error response of the generative API.
///
/// * `http_status` - HTTP status code of the response
/// * `api_status` - the `error.status` field, if the body was structured
/// * `reason` - the `ErrorInfo.reason` from the error details, if any
/// * `message` - the `error.message` field or the raw body
/// * `retry_after` - a retry delay found in structured error details
pub fn classify_api_error(
    http_status: u16,
    api_status: Option<&str>,
    reason: Option<&str>,
    message: &str,
    retry_after: Option<Duration>,
) -> GenerationError {
    if reason.is_some_and(|r| REJECTED_KEY_REASONS.contains(&r)) {
        return GenerationError::CredentialRejected(message.to_string());
    }

    match api_status {
        Some("PERMISSION_DENIED") | Some("UNAUTHENTICATED") => {
            return GenerationError::CredentialRejected(message.to_string());
        }
        Some("RESOURCE_EXHAUSTED") => {
            return GenerationError::QuotaExceeded {
                message: message.to_string(),
                retry_after: retry_after.or_else(|| parse_retry_delay(message)),
            };
        }
        _ => {}
    }

    match http_status {
        401 | 403 => return GenerationError::CredentialRejected(message.to_string()),
        429 => {
            return GenerationError::QuotaExceeded {
                message: message.to_string(),
                retry_after: retry_after.or_else(|| parse_retry_delay(message)),
            }
        }
        _ => {}
    }

    if api_status.is_some() {
        // Leaked keys arrive as 400 INVALID_ARGUMENT; only the text tells.
        if is_credential_message(&message.to_lowercase()) {
            return GenerationError::CredentialRejected(message.to_string());
        }
        return GenerationError::Transient(message.to_string());
    }

    match classify_message(message) {
        GenerationError::QuotaExceeded {
            message,
            retry_after: hinted,
        } => GenerationError::QuotaExceeded {
            message,
            retry_after: retry_after.or(hinted),
        },
        other => other,
    }
}
