//! Per-unit request pacing.

use std::time::Duration;

use tokio::time::Instant;

/// Enforces a minimum interval between consecutive requests of one unit.
///
/// Each execution unit owns its own limiter; nothing is negotiated with the
/// other units.
#[derive(Debug)]
pub struct RateLimiter {
    min_interval: Duration,
    last_request: Option<Instant>,
}

impl RateLimiter {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_request: None,
        }
    }

    /// Time left before the next request may start.
    pub fn remaining(&self) -> Duration {
        match self.last_request {
            Some(last) => self.min_interval.saturating_sub(last.elapsed()),
            None => Duration::ZERO,
        }
    }

    /// Sleeps until the next request may start. Returns the time slept.
    pub async fn wait(&self) -> Duration {
        let remaining = self.remaining();
        if !remaining.is_zero() {
            tokio::time::sleep(remaining).await;
        }
        remaining
    }

    /// Records that a request just completed.
    pub fn mark(&mut self) {
        self.last_request = Some(Instant::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_first_request_does_not_wait() {
        let limiter = RateLimiter::new(Duration::from_secs(10));
        assert_eq!(limiter.remaining(), Duration::ZERO);
        assert_eq!(limiter.wait().await, Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_consecutive_requests_respect_interval() {
        let mut limiter = RateLimiter::new(Duration::from_secs(10));

        limiter.wait().await;
        let first_start = Instant::now();
        tokio::time::sleep(Duration::from_secs(3)).await; // the request itself
        limiter.mark();

        limiter.wait().await;
        let second_start = Instant::now();

        assert!(second_start - first_start >= Duration::from_secs(10));
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_wait_after_interval_elapsed() {
        let mut limiter = RateLimiter::new(Duration::from_secs(10));
        limiter.mark();

        tokio::time::sleep(Duration::from_secs(15)).await;
        assert_eq!(limiter.remaining(), Duration::ZERO);

        let before = Instant::now();
        limiter.wait().await;
        assert_eq!(Instant::now(), before);
    }
}
