//! Bounded-or-unbounded retry with a fixed delay, cancellation-aware.
//!
//! Used for both the outbound connect and the server bind. Every attempt and
//! every wait races the caller's [`CancellationToken`], so an unbounded retry
//! never holds up shutdown.

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::error::{KiwiError, Result};

/// Retry schedule: a fixed delay between attempts and an optional cap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Wait between a failed attempt and the next one.
    pub delay: Duration,
    /// `None` retries forever. `Some(n)` gives up after `n` failed attempts.
    pub max_attempts: Option<u32>,
}

impl RetryPolicy {
    pub fn new(delay: Duration, max_attempts: Option<u32>) -> Self {
        Self { delay, max_attempts }
    }

    /// Build from the configuration convention: any negative count means
    /// unbounded.
    pub fn from_config(delay: Duration, max_attempts: i64) -> Self {
        let max_attempts = if max_attempts < 0 {
            None
        } else {
            Some(u32::try_from(max_attempts).unwrap_or(u32::MAX))
        };
        Self { delay, max_attempts }
    }

    /// Whether another attempt is allowed after `failures` failed ones.
    #[inline]
    pub fn allows(&self, failures: u32) -> bool {
        self.max_attempts.is_none_or(|max| failures < max)
    }

    /// Run `attempt` until it succeeds, the budget is used up, or `cancel` fires.
    ///
    /// `attempt` receives the 1-based attempt number. `label` is the target
    /// address, used in logs and in [`KiwiError::ConnectionExhausted`].
    pub async fn run<T, F, Fut>(&self, label: &str, cancel: &CancellationToken, mut attempt: F) -> Result<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = std::io::Result<T>>,
    {
        let mut failures: u32 = 0;

        loop {
            let n = failures.saturating_add(1);
            info!("[{label}] attempt {n}");

            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(KiwiError::Cancelled),
                res = attempt(n) => res,
            };

            let err = match outcome {
                Ok(value) => return Ok(value),
                Err(e) => e,
            };

            failures = n;
            warn!("[{label}] attempt {n} failed: {err}");

            if !self.allows(failures) {
                return Err(KiwiError::ConnectionExhausted {
                    addr: label.to_string(),
                    attempts: failures,
                    source: err,
                });
            }

            info!("[{label}] retrying in {:?}", self.delay);
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(KiwiError::Cancelled),
                _ = tokio::time::sleep(self.delay) => {}
            }
        }
    }
}

impl Default for RetryPolicy {
    /// Two seconds between attempts, forever.
    fn default() -> Self {
        Self { delay: Duration::from_secs(2), max_attempts: None }
    }
}
