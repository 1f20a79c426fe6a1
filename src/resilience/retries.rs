//! Retry loop for backend calls.
//!
//! # Responsibilities
//! - Run a fallible async operation up to `max_attempts` times
//! - Bound every attempt with a deadline
//! - Sleep with jittered exponential backoff between attempts
//!
//! # Design Decisions
//! - Every failure is retryable; the backend contract has no permanent errors
//! - The caller gets the last error and the attempt count, never a panic

use std::fmt;
use std::future::Future;
use std::time::Duration;

use crate::config::schema::ProvisioningConfig;
use crate::resilience::backoff::calculate_backoff;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub attempt_timeout: Duration,
}

impl RetryPolicy {
    /// Single attempt, no waiting. Handy in tests.
    pub fn once() -> Self {
        Self {
            max_attempts: 1,
            base_delay_ms: 0,
            max_delay_ms: 0,
            attempt_timeout: Duration::from_secs(10),
        }
    }
}

impl From<&ProvisioningConfig> for RetryPolicy {
    fn from(cfg: &ProvisioningConfig) -> Self {
        Self {
            max_attempts: cfg.max_attempts.max(1),
            base_delay_ms: cfg.base_delay_ms,
            max_delay_ms: cfg.max_delay_ms,
            attempt_timeout: Duration::from_secs(cfg.attempt_timeout_secs),
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&ProvisioningConfig::default())
    }
}

/// Why the last attempt failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptError<E> {
    Failed(E),
    TimedOut(Duration),
}

impl<E: fmt::Display> fmt::Display for AttemptError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttemptError::Failed(e) => e.fmt(f),
            AttemptError::TimedOut(after) => write!(f, "timed out after {:?}", after),
        }
    }
}

/// All attempts failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exhausted<E> {
    pub attempts: u32,
    pub last: AttemptError<E>,
}

/// Run `op` until it succeeds or the policy gives up.
pub async fn retry<T, E, F, Fut>(policy: &RetryPolicy, mut op: F) -> Result<T, Exhausted<E>>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: fmt::Display,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        let last = match tokio::time::timeout(policy.attempt_timeout, op(attempt)).await {
            Ok(Ok(value)) => return Ok(value),
            Ok(Err(e)) => AttemptError::Failed(e),
            Err(_) => AttemptError::TimedOut(policy.attempt_timeout),
        };

        if attempt >= max_attempts {
            return Err(Exhausted { attempts: attempt, last });
        }

        let delay = calculate_backoff(attempt, policy.base_delay_ms, policy.max_delay_ms);
        tracing::debug!(attempt, delay_ms = delay.as_millis() as u64, error = %last, "attempt failed, retrying");
        tokio::time::sleep(delay).await;
        attempt += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            base_delay_ms: 1,
            max_delay_ms: 5,
            attempt_timeout: Duration::from_millis(200),
        }
    }

    #[tokio::test]
    async fn test_succeeds_after_transient_failures() {
        let result = retry(&policy(3), |attempt| async move {
            if attempt < 3 {
                Err(format!("attempt {attempt} failed"))
            } else {
                Ok(attempt)
            }
        })
        .await;
        assert_eq!(result, Ok(3));
    }

    #[tokio::test]
    async fn test_reports_last_error_and_attempts() {
        let result: Result<(), _> = retry(&policy(2), |attempt| async move { Err(format!("boom {attempt}")) }).await;
        let exhausted = result.unwrap_err();
        assert_eq!(exhausted.attempts, 2);
        assert_eq!(exhausted.last, AttemptError::Failed("boom 2".to_string()));
    }

    #[tokio::test]
    async fn test_slow_attempt_times_out() {
        let mut p = policy(1);
        p.attempt_timeout = Duration::from_millis(10);
        let result: Result<(), Exhausted<String>> = retry(&p, |_| async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        })
        .await;
        assert!(matches!(result.unwrap_err().last, AttemptError::TimedOut(_)));
    }
}
