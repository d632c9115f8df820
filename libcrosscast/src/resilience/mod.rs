//! Fault tolerance for platform API calls
//!
//! Three layers compose into [`ResilientClient`]:
//! rate limiter (pacing) -> circuit breaker (fail fast) -> retry with
//! timeout and exponential backoff. The breaker sees one outcome per
//! `execute` call, after the retry layer has settled, so a burst of
//! transient errors inside one call counts as a single failure.

mod circuit;
mod limiter;
mod retry;

pub use circuit::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
pub use limiter::RateLimiter;
pub use retry::{backoff_delay, execute_with_retry, RetryConfig};

use std::future::Future;

use crate::error::PlatformError;

/// Wraps every API call of one platform with the full resilience stack.
///
/// One instance per platform; the breaker and limiter are platform-scoped
/// state, so sharing an instance across platforms would couple their
/// failure domains.
pub struct ResilientClient {
    platform: String,
    retry: RetryConfig,
    breaker: CircuitBreaker,
    limiter: RateLimiter,
}

impl ResilientClient {
    pub fn new(
        platform: impl Into<String>,
        retry: RetryConfig,
        breaker_config: CircuitBreakerConfig,
        calls_per_second: f64,
    ) -> Self {
        let platform = platform.into();
        Self {
            breaker: CircuitBreaker::new(platform.clone(), breaker_config),
            limiter: RateLimiter::new(calls_per_second),
            retry,
            platform,
        }
    }

    pub fn platform(&self) -> &str {
        &self.platform
    }

    pub fn breaker_state(&self) -> CircuitState {
        self.breaker.state()
    }

    /// Run `operation` through the limiter, breaker, and retry layers.
    pub async fn execute<T, F, Fut>(&self, operation: F) -> Result<T, PlatformError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, PlatformError>>,
    {
        self.limiter.acquire().await;
        self.breaker.try_acquire()?;

        match execute_with_retry(&self.retry, operation).await {
            Ok(value) => {
                self.breaker.record_success();
                Ok(value)
            }
            Err(e) => {
                self.breaker.record_failure();
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    fn test_client(failure_threshold: u32) -> ResilientClient {
        ResilientClient::new(
            "mock",
            RetryConfig {
                max_retries: 0,
                timeout: Duration::from_millis(200),
                initial_delay: Duration::from_millis(1),
                max_delay: Duration::from_millis(1),
                backoff_multiplier: 2.0,
            },
            CircuitBreakerConfig {
                failure_threshold,
                reset_timeout: Duration::from_secs(3600),
            },
            1000.0,
        )
    }

    #[tokio::test]
    async fn test_execute_success_path() {
        let client = test_client(5);
        let result = client
            .execute(|| async { Ok::<_, PlatformError>("posted") })
            .await;
        assert_eq!(result.unwrap(), "posted");
        assert_eq!(client.breaker_state(), CircuitState::Closed);
    }

    #[tokio::test]
    async fn test_settled_failures_trip_breaker() {
        let client = test_client(2);

        for _ in 0..2 {
            let result: Result<(), _> = client
                .execute(|| async { Err(PlatformError::Network("reset".to_string())) })
                .await;
            assert!(result.is_err());
        }
        assert_eq!(client.breaker_state(), CircuitState::Open);

        // Calls now fail fast without reaching the operation
        let calls = Arc::new(AtomicU32::new(0));
        let calls_clone = calls.clone();
        let result: Result<(), _> = client
            .execute(move || {
                let calls = calls_clone.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
            })
            .await;
        assert!(matches!(result, Err(PlatformError::CircuitOpen(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_retries_inside_one_call_count_once() {
        let client = ResilientClient::new(
            "mock",
            RetryConfig {
                max_retries: 3,
                timeout: Duration::from_millis(200),
                initial_delay: Duration::from_millis(1),
                max_delay: Duration::from_millis(1),
                backoff_multiplier: 2.0,
            },
            CircuitBreakerConfig {
                failure_threshold: 2,
                reset_timeout: Duration::from_secs(3600),
            },
            1000.0,
        );

        // Four transient failures inside a single execute: the breaker
        // records one settled failure, so it stays closed.
        let result: Result<(), _> = client
            .execute(|| async { Err(PlatformError::Http {
                status: 503,
                message: "unavailable".to_string(),
            }) })
            .await;
        assert!(result.is_err());
        assert_eq!(client.breaker_state(), CircuitState::Closed);
    }

    #[tokio::test]
    async fn test_success_resets_breaker_count() {
        let client = test_client(2);

        let _ = client
            .execute(|| async { Err::<(), _>(PlatformError::Network("reset".to_string())) })
            .await;
        let _ = client
            .execute(|| async { Ok::<_, PlatformError>(()) })
            .await;
        let _ = client
            .execute(|| async { Err::<(), _>(PlatformError::Network("reset".to_string())) })
            .await;
        assert_eq!(client.breaker_state(), CircuitState::Closed);
    }
}
