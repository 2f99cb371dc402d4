use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use tracing::{info, warn};

/// Errors that may succeed if the same call is simply repeated.
pub trait Transient {
    fn is_transient(&self) -> bool;
}

/// Bounded exponential backoff.
///
/// With the defaults a call is attempted at most 3 times, sleeping 1s after
/// the first failure and 2s after the second.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first. Values below 1 behave as 1.
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub multiplier: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_secs(1),
            multiplier: 2,
        }
    }
}

impl RetryPolicy {
    /// Delay to wait after the failed attempt with zero-based index `attempt`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.initial_delay
            .saturating_mul(self.multiplier.saturating_pow(attempt))
    }
}

/// Run `op` under `policy`.
///
/// `op` receives the zero-based attempt index. Transient errors are retried
/// until attempts run out; any other error is returned immediately. No lock
/// may be held by the caller across this call: it sleeps between attempts.
pub async fn retry<T, E, F, Fut>(policy: &RetryPolicy, label: &str, mut op: F) -> Result<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Transient + Display,
{
    let attempts = policy.max_attempts.max(1);
    let mut attempt = 0;
    loop {
        info!(call = label, attempt = attempt + 1, attempts, "calling upstream");
        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_transient() && attempt + 1 < attempts => {
                let delay = policy.delay_for(attempt);
                warn!(
                    call = label,
                    attempt = attempt + 1,
                    error = %e,
                    delay_ms = delay.as_millis() as u64,
                    "transient failure; retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => {
                warn!(call = label, attempt = attempt + 1, error = %e, "giving up");
                return Err(e);
            }
        }
    }
}
