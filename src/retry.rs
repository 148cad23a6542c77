use std::time::Duration;

use tracing::debug;

use crate::error::Result;

/// How an operation should be retried: an attempt bound, a base delay, and a
/// multiplier applied per attempt (factor 1 keeps the delay fixed).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
    pub backoff_factor: u32,
}

impl RetryPolicy {
    /// Policy with a constant delay between attempts.
    pub fn fixed(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            delay,
            backoff_factor: 1,
        }
    }

    /// Multiply the delay by `factor` after every failed attempt.
    pub fn with_backoff(mut self, factor: u32) -> Self {
        self.backoff_factor = factor.max(1);
        self
    }

    /// Delay to sleep after the given 1-based attempt fails.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = self
            .backoff_factor
            .max(1)
            .saturating_pow(attempt.saturating_sub(1));
        self.delay * factor
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::fixed(3, Duration::from_secs(1))
    }
}

/// Run `op` until it succeeds or the policy's attempts are exhausted,
/// sleeping between tries. The closure receives the 1-based attempt number
/// and the last error is re-raised unchanged. A zero-attempt policy still
/// runs the operation once.
pub async fn attempt<T, F, Fut>(policy: RetryPolicy, mut op: F) -> Result<T>
where
    F: FnMut(u32) -> Fut,
    Fut: std::future::Future<Output = Result<T>>,
{
    let max = policy.max_attempts.max(1);
    let mut attempt_no = 1;
    loop {
        match op(attempt_no).await {
            Ok(value) => return Ok(value),
            Err(err) if attempt_no < max => {
                let delay = policy.delay_for(attempt_no);
                debug!("attempt {attempt_no}/{max} failed: {err}; retrying in {delay:?}");
                tokio::time::sleep(delay).await;
                attempt_no += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn tiny(max_attempts: u32) -> RetryPolicy {
        RetryPolicy::fixed(max_attempts, Duration::from_millis(1))
    }

    #[test]
    fn fixed_policy_keeps_delay_constant() {
        let policy = RetryPolicy::fixed(5, Duration::from_millis(200));
        assert_eq!(policy.delay_for(1), Duration::from_millis(200));
        assert_eq!(policy.delay_for(4), Duration::from_millis(200));
    }

    #[test]
    fn backoff_scales_delay_per_attempt() {
        let policy = RetryPolicy::fixed(4, Duration::from_millis(100)).with_backoff(2);
        assert_eq!(policy.delay_for(1), Duration::from_millis(100));
        assert_eq!(policy.delay_for(2), Duration::from_millis(200));
        assert_eq!(policy.delay_for(3), Duration::from_millis(400));
    }

    #[test]
    fn default_policy_is_three_one_second_attempts() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.delay, Duration::from_secs(1));
        assert_eq!(policy.backoff_factor, 1);
    }

    #[tokio::test]
    async fn succeeds_once_the_operation_does() {
        let calls = AtomicU32::new(0);
        let result = attempt(tiny(3), |_| {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            async move {
                if n < 3 {
                    Err(Error::FieldFillError(format!("attempt {n}")))
                } else {
                    Ok(n)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn exhaustion_reraises_the_final_error() {
        let calls = AtomicU32::new(0);
        let result: Result<()> = attempt(tiny(3), |n| {
            calls.fetch_add(1, Ordering::SeqCst);
            async move { Err(Error::ValidationError(format!("attempt {n}"))) }
        })
        .await;
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        match result {
            Err(Error::ValidationError(msg)) => assert_eq!(msg, "attempt 3"),
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[tokio::test]
    async fn zero_attempt_policy_still_runs_once() {
        let calls = AtomicU32::new(0);
        let result = attempt(tiny(0), |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok(()) }
        })
        .await;
        assert!(result.is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
