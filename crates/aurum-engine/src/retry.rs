//! # Conflict Retry
//!
//! Runs a whole unit of work again when SQLite reports lock contention.
//!
//! ```text
//! attempt 1 ──► Busy ──► sleep(backoff) ──► attempt 2 ──► Busy ──► ...
//!                                                  │
//!                                                  └──► Ok / domain error: returned as-is
//! ```
//!
//! Each attempt opens its own transaction, so a failed attempt has already
//! been rolled back by the time the next one starts.

use std::future::Future;
use std::time::Duration;

use backoff::backoff::Backoff;
use backoff::ExponentialBackoff;
use tracing::{debug, warn};

use crate::error::EngineResult;

/// Bounded retry policy for write conflicts.
#[derive(Debug, Clone, Copy)]
pub struct ConflictRetry {
    /// Extra attempts after the first one.
    pub max_retries: u32,

    /// First delay.
    pub initial_backoff: Duration,

    /// Delay ceiling.
    pub max_backoff: Duration,
}

impl Default for ConflictRetry {
    fn default() -> Self {
        ConflictRetry {
            max_retries: 3,
            initial_backoff: Duration::from_millis(50),
            max_backoff: Duration::from_secs(2),
        }
    }
}

impl ConflictRetry {
    /// Policy with `max_retries` extra attempts and default delays.
    pub fn new(max_retries: u32, initial_backoff: Duration) -> Self {
        ConflictRetry {
            max_retries,
            initial_backoff,
            ..Default::default()
        }
    }

    /// Runs `op` until it succeeds, fails with a non-conflict error, or the
    /// retry budget is spent.
    pub async fn run<T, F, Fut>(&self, label: &str, mut op: F) -> EngineResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = EngineResult<T>>,
    {
        let mut backoff = self.create_backoff();
        let mut retry_count = 0u32;

        loop {
            let err = match op().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable_conflict() => e,
                Err(e) => return Err(e),
            };

            if retry_count >= self.max_retries {
                warn!(
                    operation = label,
                    attempts = retry_count + 1,
                    error = %err,
                    "Giving up after repeated write conflicts"
                );
                return Err(err);
            }
            retry_count += 1;

            let Some(duration) = backoff.next_backoff() else {
                return Err(err);
            };

            debug!(
                operation = label,
                ?duration,
                attempt = retry_count,
                "Write conflict, retrying"
            );
            tokio::time::sleep(duration).await;
        }
    }

    fn create_backoff(&self) -> ExponentialBackoff {
        ExponentialBackoff {
            initial_interval: self.initial_backoff,
            max_interval: self.max_backoff,
            multiplier: 2.0,
            max_elapsed_time: None,
            ..Default::default()
        }
    }
}
