//! Caller-side retries for start-up connections.
//!
//! The stores and services never retry on their own; only the binary wraps
//! its initial database and cache connections with [`with_retry`].

use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

/// Exponential backoff schedule.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, the first one included. Never below 1.
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: f64,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, initial_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_delay,
            max_delay: Duration::from_secs(10),
            multiplier: 2.0,
        }
    }

    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    /// Preset for connecting to the database and cache at start-up.
    /// Delays: 500ms, 1s, 2s, 4s
    pub fn startup() -> Self {
        Self::new(5, Duration::from_millis(500)).with_max_delay(Duration::from_secs(4))
    }

    /// Wait before retry number `retry` (1-based).
    fn backoff(&self, retry: u32) -> Duration {
        let factor = self.multiplier.powi(retry.saturating_sub(1) as i32);
        let millis = self.initial_delay.as_millis() as f64 * factor;
        Duration::from_millis(millis as u64).min(self.max_delay)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::startup()
    }
}

/// Run `operation` until it succeeds or the policy's attempts run out,
/// returning the last error in that case.
pub async fn with_retry<T, E, F, Fut>(policy: &RetryPolicy, what: &str, mut operation: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut attempt = 1;
    loop {
        match operation().await {
            Ok(value) => {
                if attempt > 1 {
                    debug!("{}: succeeded on attempt {}", what, attempt);
                }
                return Ok(value);
            }
            Err(e) if attempt >= policy.max_attempts => {
                warn!("{}: giving up after {} attempts: {}", what, attempt, e);
                return Err(e);
            }
            Err(e) => {
                let delay = policy.backoff(attempt);
                warn!(
                    "{}: attempt {}/{} failed ({}), retrying in {:?}",
                    what, attempt, policy.max_attempts, e, delay
                );
                sleep(delay).await;
                attempt += 1;
            }
        }
    }
}
