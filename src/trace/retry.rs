use std::future::Future;
use std::time::Duration;

use log::warn;

use crate::error::Result;

use super::clock::Clock;

/// Bounded exponential backoff for transient provider failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total tries, including the first one.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `retry` (1-based).
    pub fn delay_for(&self, retry: u32) -> Duration {
        let factor = 2u32.saturating_pow(retry.saturating_sub(1));
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }

    /// Runs `op` until it succeeds, fails permanently, or attempts run out.
    pub async fn run<T, F, Fut>(&self, clock: &dyn Clock, what: &str, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 1;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() && attempt < self.max_attempts => {
                    let delay = self.delay_for(attempt);
                    warn!(
                        "{what} failed ({e}), retrying in {}ms ({}/{})...",
                        delay.as_millis(),
                        attempt,
                        self.max_attempts - 1
                    );
                    clock.sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use chrono::Utc;
    use tokio_test::{assert_err, assert_ok};

    use super::*;
    use crate::error::LensError;
    use crate::trace::clock::testing::ManualClock;

    fn throttled() -> LensError {
        LensError::Throttled {
            command: "codepipeline get-pipeline-state".to_string(),
            message: "Rate exceeded".to_string(),
        }
    }

    fn policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 4,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(250),
        }
    }

    #[test]
    fn delays_double_up_to_cap() {
        let policy = policy();
        assert_eq!(policy.delay_for(1), Duration::from_millis(100));
        assert_eq!(policy.delay_for(2), Duration::from_millis(200));
        assert_eq!(policy.delay_for(3), Duration::from_millis(250));
        assert_eq!(policy.delay_for(40), Duration::from_millis(250));
    }

    #[tokio::test]
    async fn recovers_after_transient_failures() {
        let clock = ManualClock::at(Utc::now());
        let calls = Cell::new(0);

        let result = policy()
            .run(&clock, "poll", || {
                calls.set(calls.get() + 1);
                let n = calls.get();
                async move {
                    if n < 3 {
                        Err(throttled())
                    } else {
                        Ok(n)
                    }
                }
            })
            .await;

        assert_eq!(assert_ok!(result), 3);
        assert_eq!(
            clock.sleeps(),
            vec![Duration::from_millis(100), Duration::from_millis(200)]
        );
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let clock = ManualClock::at(Utc::now());
        let calls = Cell::new(0);

        let result: Result<()> = policy()
            .run(&clock, "poll", || {
                calls.set(calls.get() + 1);
                async { Err(throttled()) }
            })
            .await;

        assert!(matches!(assert_err!(result), LensError::Throttled { .. }));
        assert_eq!(calls.get(), 4);
        assert_eq!(clock.sleeps().len(), 3);
    }

    #[tokio::test]
    async fn permanent_errors_are_not_retried() {
        let clock = ManualClock::at(Utc::now());
        let calls = Cell::new(0);

        let result: Result<()> = policy()
            .run(&clock, "poll", || {
                calls.set(calls.get() + 1);
                async { Err(LensError::NoExecutions("web".to_string())) }
            })
            .await;

        assert_err!(result);
        assert_eq!(calls.get(), 1);
        assert!(clock.sleeps().is_empty());
    }
}
