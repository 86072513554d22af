//! Retry policy for model calls
//!
//! Only overload responses are retried, with a fixed delay between attempts.
//! Any other failure ends the attempt immediately.

use super::vision::VisionError;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;

/// Retry configuration
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts including the first one
    pub max_attempts: u32,
    /// Fixed delay before each retry
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }

    /// Run `operation` until it succeeds, fails with a non-overload error, or
    /// attempts run out. Returns the final result with the attempt count.
    pub async fn run<F, Fut, T>(&self, mut operation: F) -> (Result<T, VisionError>, u32)
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, VisionError>>,
    {
        let mut attempt = 1;
        loop {
            match operation(attempt).await {
                Ok(value) => return (Ok(value), attempt),
                Err(e) if e.is_overloaded() && attempt < self.max_attempts => {
                    log::warn!(
                        "Model overloaded (attempt {}/{}), retrying in {:?}",
                        attempt,
                        self.max_attempts,
                        self.delay
                    );
                    sleep(self.delay).await;
                    attempt += 1;
                }
                Err(e) => return (Err(e), attempt),
            }
        }
    }
}
