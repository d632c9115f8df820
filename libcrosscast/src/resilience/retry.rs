//! Per-request timeout and retry with exponential backoff

use std::future::Future;
use std::time::Duration;

use crate::error::PlatformError;

#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Additional attempts after the first failure.
    pub max_retries: u32,
    /// Deadline applied to each individual attempt.
    pub timeout: Duration,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            timeout: Duration::from_secs(15),
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(10),
            backoff_multiplier: 2.0,
        }
    }
}

/// Delay before retrying after the attempt numbered `attempt` (0-based).
pub fn backoff_delay(config: &RetryConfig, attempt: u32) -> Duration {
    let delay = config
        .initial_delay
        .mul_f64(config.backoff_multiplier.powi(attempt as i32));
    delay.min(config.max_delay)
}

/// Run `operation` until it succeeds, returns a permanent error, or the
/// retry budget is spent.
///
/// Each attempt races against `config.timeout`; an elapsed deadline counts
/// as a retryable [`PlatformError::Timeout`]. Permanent errors propagate
/// immediately without consuming the budget.
pub async fn execute_with_retry<T, F, Fut>(
    config: &RetryConfig,
    mut operation: F,
) -> Result<T, PlatformError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, PlatformError>>,
{
    let mut last_error: Option<PlatformError> = None;

    for attempt in 0..=config.max_retries {
        let result = match tokio::time::timeout(config.timeout, operation()).await {
            Ok(result) => result,
            Err(_) => Err(PlatformError::Timeout(config.timeout.as_millis() as u64)),
        };

        match result {
            Ok(value) => return Ok(value),
            Err(e) if !e.is_retryable() => return Err(e),
            Err(e) => {
                tracing::warn!(
                    attempt = attempt + 1,
                    max_attempts = config.max_retries + 1,
                    error = %e,
                    "attempt failed"
                );
                last_error = Some(e);
                if attempt < config.max_retries {
                    tokio::time::sleep(backoff_delay(config, attempt)).await;
                }
            }
        }
    }

    Err(last_error.unwrap_or_else(|| PlatformError::Posting("retry budget spent".to_string())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn fast_config(max_retries: u32) -> RetryConfig {
        RetryConfig {
            max_retries,
            timeout: Duration::from_millis(200),
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(4),
            backoff_multiplier: 2.0,
        }
    }

    #[test]
    fn test_backoff_delay_doubles_and_caps() {
        let config = RetryConfig {
            max_retries: 5,
            timeout: Duration::from_secs(15),
            initial_delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(10000),
            backoff_multiplier: 2.0,
        };

        assert_eq!(backoff_delay(&config, 0), Duration::from_millis(1000));
        assert_eq!(backoff_delay(&config, 1), Duration::from_millis(2000));
        assert_eq!(backoff_delay(&config, 2), Duration::from_millis(4000));
        assert_eq!(backoff_delay(&config, 3), Duration::from_millis(8000));
        // Capped at max_delay from here on
        assert_eq!(backoff_delay(&config, 4), Duration::from_millis(10000));
        assert_eq!(backoff_delay(&config, 10), Duration::from_millis(10000));
    }

    #[tokio::test]
    async fn test_success_on_first_attempt() {
        let calls = Arc::new(AtomicU32::new(0));
        let calls_clone = calls.clone();

        let result = execute_with_retry(&fast_config(3), move || {
            let calls = calls_clone.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok::<_, PlatformError>(42)
            }
        })
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_retries_transient_then_succeeds() {
        let calls = Arc::new(AtomicU32::new(0));
        let calls_clone = calls.clone();

        let result = execute_with_retry(&fast_config(3), move || {
            let calls = calls_clone.clone();
            async move {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                if n < 2 {
                    Err(PlatformError::Network("connection reset".to_string()))
                } else {
                    Ok("done")
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), "done");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_permanent_error_not_retried() {
        let calls = Arc::new(AtomicU32::new(0));
        let calls_clone = calls.clone();

        let result: Result<(), _> = execute_with_retry(&fast_config(3), move || {
            let calls = calls_clone.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(PlatformError::Authentication("bad token".to_string()))
            }
        })
        .await;

        assert!(matches!(result, Err(PlatformError::Authentication(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_budget_exhaustion_returns_last_error() {
        let calls = Arc::new(AtomicU32::new(0));
        let calls_clone = calls.clone();

        let result: Result<(), _> = execute_with_retry(&fast_config(2), move || {
            let calls = calls_clone.clone();
            async move {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                Err(PlatformError::Http {
                    status: 503,
                    message: format!("attempt {}", n),
                })
            }
        })
        .await;

        // 1 initial + 2 retries
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        match result {
            Err(PlatformError::Http { status, message }) => {
                assert_eq!(status, 503);
                assert_eq!(message, "attempt 2");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_timeout_counts_as_retryable() {
        let calls = Arc::new(AtomicU32::new(0));
        let calls_clone = calls.clone();
        let config = RetryConfig {
            timeout: Duration::from_millis(10),
            ..fast_config(1)
        };

        let result: Result<(), _> = execute_with_retry(&config, move || {
            let calls = calls_clone.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok(())
            }
        })
        .await;

        assert!(matches!(result, Err(PlatformError::Timeout(10))));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
