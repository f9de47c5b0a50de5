//! Bounded retry for listing requests
//!
//! Attempts are counted in total (the first try included). The delay between
//! attempts is fixed; callers that want spacing configure it, nothing grows
//! exponentially here.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// Configuration for retry behavior
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryConfig {
    /// Total number of attempts, first one included
    pub max_attempts: u32,

    /// Fixed delay between attempts
    pub delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::ZERO,
        }
    }
}

impl RetryConfig {
    /// Create a retry configuration with no delay between attempts
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            ..Default::default()
        }
    }

    /// Create a retry configuration with a fixed delay
    pub fn with_delay(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            delay,
        }
    }
}

/// Outcome of a retried operation that never succeeded
#[derive(Debug)]
pub struct Exhausted<E> {
    /// Number of attempts actually made
    pub attempts: u32,

    /// Error of the final attempt
    pub last_error: E,
}

/// Execute an operation until it succeeds, retrying while `should_retry`
/// holds and attempts remain
///
/// A non-retryable error stops immediately and is reported with the number
/// of attempts made so far.
pub async fn with_retry_if<T, E, F, Fut, P>(
    config: &RetryConfig,
    mut operation: F,
    should_retry: P,
) -> Result<T, Exhausted<E>>
where
    E: Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: Fn(&E) -> bool,
{
    let max_attempts = config.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        attempt += 1;

        match operation().await {
            Ok(result) => {
                if attempt > 1 {
                    debug!(attempt, "Operation succeeded after retry");
                }
                return Ok(result);
            }
            Err(e) => {
                if !should_retry(&e) {
                    warn!(error = %e, "Non-retryable error encountered");
                    return Err(Exhausted {
                        attempts: attempt,
                        last_error: e,
                    });
                }

                warn!(attempt, max_attempts, error = %e, "Attempt failed");

                if attempt >= max_attempts {
                    return Err(Exhausted {
                        attempts: attempt,
                        last_error: e,
                    });
                }
            }
        }

        if !config.delay.is_zero() {
            tokio::time::sleep(config.delay).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn always(_: &String) -> bool {
        true
    }

    #[tokio::test]
    async fn test_retry_success_first_attempt() {
        let config = RetryConfig::new(3);
        let result = with_retry_if(&config, || async { Ok::<_, String>(42) }, always).await;
        assert_eq!(result.unwrap(), 42);
    }

    #[tokio::test]
    async fn test_retry_success_after_failures() {
        let config = RetryConfig::new(3);
        let attempts = Arc::new(AtomicU32::new(0));
        let attempts_clone = Arc::clone(&attempts);

        let result = with_retry_if(
            &config,
            move || {
                let attempts = Arc::clone(&attempts_clone);
                async move {
                    let count = attempts.fetch_add(1, Ordering::SeqCst);
                    if count < 2 {
                        return Err("Simulated failure".to_string());
                    }
                    Ok(42)
                }
            },
            always,
        )
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_exhausted_counts_attempts() {
        let config = RetryConfig::new(3);
        let calls = Arc::new(AtomicU32::new(0));
        let calls_clone = Arc::clone(&calls);

        let result: Result<(), _> = with_retry_if(
            &config,
            move || {
                calls_clone.fetch_add(1, Ordering::SeqCst);
                async { Err("Permanent failure".to_string()) }
            },
            always,
        )
        .await;

        let exhausted = result.unwrap_err();
        assert_eq!(exhausted.attempts, 3);
        assert_eq!(exhausted.last_error, "Permanent failure");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_if_predicate_stops_early() {
        let config = RetryConfig::new(3);

        let result: Result<(), _> = with_retry_if(
            &config,
            || async { Err("validation error".to_string()) },
            |e| !e.contains("validation"),
        )
        .await;

        let exhausted = result.unwrap_err();
        assert_eq!(exhausted.attempts, 1);
    }

    #[tokio::test]
    async fn test_zero_attempts_still_tries_once() {
        let config = RetryConfig::new(0);
        let result = with_retry_if(&config, || async { Ok::<_, String>("once") }, always).await;
        assert_eq!(result.unwrap(), "once");
    }
}
