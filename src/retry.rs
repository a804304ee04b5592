/// Bounded retry with backoff for operations that wait on slow-to-appear external state
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// Delay growth between attempts
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Backoff {
    /// `base_delay * attempt`
    Linear,
    /// `base_delay * 2^(attempt - 1)`
    Exponential,
}

/// Retry policy: attempt cap plus delay schedule
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Maximum number of attempts, including the first one
    pub max_attempts: u32,
    /// Base delay in milliseconds
    pub base_delay_ms: u64,
    /// Delay growth
    pub backoff: Backoff,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay_ms: 300,
            backoff: Backoff::Linear,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration, backoff: Backoff) -> Self {
        Self {
            max_attempts,
            base_delay_ms: base_delay.as_millis() as u64,
            backoff,
        }
    }

    /// Delay to wait after the given failed attempt (1-based)
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let base = Duration::from_millis(self.base_delay_ms);
        match self.backoff {
            Backoff::Linear => base.saturating_mul(attempt.max(1)),
            Backoff::Exponential => {
                let factor = 2u32.saturating_pow(attempt.saturating_sub(1).min(16));
                base.saturating_mul(factor)
            }
        }
    }
}

/// Run `op` until it succeeds or the policy's attempt cap is reached.
///
/// Each failure is logged; the error of the last attempt is returned. A policy
/// with `max_attempts == 0` still runs the operation once.
pub async fn with_retry<T, E, F, Fut>(policy: &RetryPolicy, label: &str, mut op: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        match op().await {
            Ok(value) => {
                if attempt > 1 {
                    debug!("{} succeeded on attempt {}/{}", label, attempt, max_attempts);
                }
                return Ok(value);
            }
            Err(e) => {
                warn!("🔁 {} attempt {}/{} failed: {}", label, attempt, max_attempts, e);
                if attempt >= max_attempts {
                    return Err(e);
                }
                let delay = policy.delay_after(attempt);
                debug!("Waiting {:?} before next {} attempt", delay, label);
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy::new(max_attempts, Duration::from_millis(1), Backoff::Linear)
    }

    #[test]
    fn test_delay_schedules() {
        let linear = RetryPolicy::new(5, Duration::from_millis(100), Backoff::Linear);
        assert_eq!(linear.delay_after(1), Duration::from_millis(100));
        assert_eq!(linear.delay_after(3), Duration::from_millis(300));

        let exponential = RetryPolicy::new(5, Duration::from_millis(100), Backoff::Exponential);
        assert_eq!(exponential.delay_after(1), Duration::from_millis(100));
        assert_eq!(exponential.delay_after(2), Duration::from_millis(200));
        assert_eq!(exponential.delay_after(4), Duration::from_millis(800));
    }

    #[tokio::test]
    async fn test_succeeds_after_transient_failures() {
        let calls = Cell::new(0);
        let result: Result<&str, String> = with_retry(&fast_policy(5), "panel", || {
            calls.set(calls.get() + 1);
            let n = calls.get();
            async move {
                if n < 3 {
                    Err(format!("not ready ({})", n))
                } else {
                    Ok("ready")
                }
            }
        })
        .await;

        assert_eq!(result, Ok("ready"));
        assert_eq!(calls.get(), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let calls = Cell::new(0);
        let result: Result<(), String> = with_retry(&fast_policy(3), "panel", || {
            calls.set(calls.get() + 1);
            let n = calls.get();
            async move { Err(format!("missing element ({})", n)) }
        })
        .await;

        assert_eq!(result, Err("missing element (3)".to_string()));
        assert_eq!(calls.get(), 3);
    }

    #[tokio::test]
    async fn test_zero_attempts_still_runs_once() {
        let calls = Cell::new(0);
        let _: Result<(), String> = with_retry(&fast_policy(0), "once", || {
            calls.set(calls.get() + 1);
            async { Err("nope".to_string()) }
        })
        .await;
        assert_eq!(calls.get(), 1);
    }
}
