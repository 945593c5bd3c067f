use std::time::Duration;

use dqa_core::error::AppError;
use tracing::warn;

/// Bounded retry with exponential backoff. Only errors flagged `retryable` are retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(250),
        }
    }
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            base_delay: Duration::ZERO,
        }
    }

    pub fn delay_for(&self, attempt: u32) -> Duration {
        // attempt is 1-based; the first retry waits `base_delay`.
        let exp = attempt.saturating_sub(1).min(16);
        self.base_delay.saturating_mul(1u32 << exp)
    }

    pub fn run<T>(
        &self,
        operation: &str,
        mut call: impl FnMut() -> Result<T, AppError>,
    ) -> Result<T, AppError> {
        let max = self.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match call() {
                Ok(v) => return Ok(v),
                Err(e) if e.retryable && attempt < max => {
                    let delay = self.delay_for(attempt);
                    warn!(
                        operation,
                        attempt,
                        max_attempts = max,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "retrying external call"
                    );
                    std::thread::sleep(delay);
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn retries_retryable_errors_until_success() {
        let calls = Cell::new(0);
        let policy = RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::ZERO,
        };
        let out = policy.run("test", || {
            calls.set(calls.get() + 1);
            if calls.get() < 3 {
                Err(AppError::new("EXTERNAL_SERVICE_ERROR", "flaky").with_retryable(true))
            } else {
                Ok(7)
            }
        });
        assert_eq!(out, Ok(7));
        assert_eq!(calls.get(), 3);
    }

    #[test]
    fn does_not_retry_permanent_errors() {
        let calls = Cell::new(0);
        let out: Result<(), AppError> = RetryPolicy::default().run("test", || {
            calls.set(calls.get() + 1);
            Err(AppError::new("CONFIGURATION_ERROR", "bad key"))
        });
        assert_eq!(out.map_err(|e| e.code), Err("CONFIGURATION_ERROR".to_string()));
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn gives_up_after_max_attempts() {
        let calls = Cell::new(0);
        let policy = RetryPolicy {
            max_attempts: 2,
            base_delay: Duration::ZERO,
        };
        let out: Result<(), AppError> = policy.run("test", || {
            calls.set(calls.get() + 1);
            Err(AppError::new("EXTERNAL_SERVICE_ERROR", "down").with_retryable(true))
        });
        assert!(out.is_err());
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn backoff_doubles() {
        let policy = RetryPolicy {
            max_attempts: 5,
            base_delay: Duration::from_millis(100),
        };
        assert_eq!(policy.delay_for(1), Duration::from_millis(100));
        assert_eq!(policy.delay_for(2), Duration::from_millis(200));
        assert_eq!(policy.delay_for(3), Duration::from_millis(400));
    }
}
