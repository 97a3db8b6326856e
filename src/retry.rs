//! Bounded exponential backoff for retried remote calls.

use std::time::Duration;

use tracing::warn;

/// Initial delay before the first retry.
const BASE_DELAY: Duration = Duration::from_millis(500);

/// Delay ceiling; doubling stops here.
const MAX_DELAY: Duration = Duration::from_secs(8);

/// Tracks retry budget and sleeps with exponential backoff.
///
/// `max_attempts` counts total attempts, so `Backoff::new(5)` allows
/// four retries after the initial call. Used for transient embedding
/// failures and idempotent store writes; queries get a deliberately
/// small budget so latency problems are surfaced rather than masked.
#[derive(Debug)]
pub(crate) struct Backoff {
    remaining: usize,
    delay: Duration,
}

impl Backoff {
    pub(crate) fn new(max_attempts: usize) -> Self {
        Self { remaining: max_attempts.saturating_sub(1), delay: BASE_DELAY }
    }

    /// Sleep before the next attempt. Returns `false` once the retry
    /// budget is exhausted, in which case the caller must surface the
    /// last error.
    pub(crate) async fn wait(&mut self, operation: &str) -> bool {
        if self.remaining == 0 {
            return false;
        }
        warn!(operation, delay_ms = self.delay.as_millis() as u64, "transient failure, backing off");
        tokio::time::sleep(self.delay).await;
        self.remaining -= 1;
        self.delay = (self.delay * 2).min(MAX_DELAY);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn budget_counts_total_attempts() {
        let mut backoff = Backoff::new(3);
        assert!(backoff.wait("op").await);
        assert!(backoff.wait("op").await);
        assert!(!backoff.wait("op").await);
    }

    #[tokio::test(start_paused = true)]
    async fn single_attempt_never_waits() {
        let mut backoff = Backoff::new(1);
        assert!(!backoff.wait("op").await);
    }
}
