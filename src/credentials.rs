//! Credential pool parsing and per-worker allocation.
//!
//! Every worker instance receives a contiguous, non-overlapping slice of the
//! global credential list: worker `i` with `c` units per worker owns
//! `[i * c, i * c + c)`. Worker indices are assigned by whoever launches the
//! instances; as long as they do not collide, no credential is ever shared.

use std::fmt;

use crate::error::ConfigError;

/// A single generative-API key.
///
/// `Debug` and `Display` only ever show the masked form.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// The raw key, for building authenticated requests.
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Masked form for logging (`AIza...x9Qk`).
    pub fn masked(&self) -> String {
        let chars: Vec<char> = self.0.chars().collect();
        if chars.len() <= 8 {
            "*".repeat(chars.len())
        } else {
            let head: String = chars[..4].iter().collect();
            let tail: String = chars[chars.len() - 4..].iter().collect();
            format!("{}...{}", head, tail)
        }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Credential").field(&self.masked()).finish()
    }
}

impl fmt::Display for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.masked())
    }
}

/// Splits a multi-line secret into credentials, one per non-blank line.
///
/// # Errors
///
/// Returns `ConfigError::EmptyCredentialPool` if no usable line remains.
pub fn parse_pool(raw: &str) -> Result<Vec<Credential>, ConfigError> {
    let pool: Vec<Credential> = raw
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(Credential::new)
        .collect();

    if pool.is_empty() {
        return Err(ConfigError::EmptyCredentialPool(
            "the credential source is set but contains no keys".to_string(),
        ));
    }

    Ok(pool)
}

/// Selects the credentials owned by `worker_index`.
///
/// Either the full slice of `per_worker` credentials is returned or nothing
/// is: a pool that is too short fails without partial allocation.
pub fn allocate(
    pool: &[Credential],
    worker_index: usize,
    per_worker: usize,
) -> Result<Vec<Credential>, ConfigError> {
    if pool.is_empty() {
        return Err(ConfigError::EmptyCredentialPool(
            "no credentials configured".to_string(),
        ));
    }
    if per_worker == 0 {
        return Err(ConfigError::ValidationFailed(
            "units per worker must be greater than 0".to_string(),
        ));
    }

    let start = worker_index.checked_mul(per_worker);
    let end = start.and_then(|s| s.checked_add(per_worker));

    match (start, end) {
        (Some(start), Some(end)) if end <= pool.len() => Ok(pool[start..end].to_vec()),
        _ => Err(ConfigError::InsufficientCredentials {
            worker_index,
            per_worker,
            start: start.unwrap_or(usize::MAX),
            end: end.unwrap_or(usize::MAX),
            available: pool.len(),
        }),
    }
}
