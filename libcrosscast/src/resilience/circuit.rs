//! Per-platform circuit breaker
//!
//! Closed passes calls through and counts consecutive failures. At the
//! threshold the breaker opens and fails fast until the reset timeout
//! elapses, then a single half-open trial decides between closing and
//! re-opening.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::error::PlatformError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures that trip the breaker.
    pub failure_threshold: u32,
    /// How long the breaker stays open before allowing a trial call.
    pub reset_timeout: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            reset_timeout: Duration::from_secs(60),
        }
    }
}

#[derive(Debug)]
struct BreakerInner {
    state: CircuitState,
    consecutive_failures: u32,
    opened_at: Option<Instant>,
}

#[derive(Debug)]
pub struct CircuitBreaker {
    name: String,
    config: CircuitBreakerConfig,
    inner: Mutex<BreakerInner>,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        Self {
            name: name.into(),
            config,
            inner: Mutex::new(BreakerInner {
                state: CircuitState::Closed,
                consecutive_failures: 0,
                opened_at: None,
            }),
        }
    }

    pub fn state(&self) -> CircuitState {
        self.lock().state
    }

    /// Check whether a call may proceed.
    ///
    /// Transitions `Open -> HalfOpen` once the reset timeout has elapsed;
    /// in half-open state exactly one trial call is admitted.
    pub fn try_acquire(&self) -> Result<(), PlatformError> {
        let mut inner = self.lock();
        match inner.state {
            CircuitState::Closed => Ok(()),
            CircuitState::HalfOpen => Err(PlatformError::CircuitOpen(self.name.clone())),
            CircuitState::Open => {
                let elapsed = inner
                    .opened_at
                    .map(|at| at.elapsed())
                    .unwrap_or(Duration::ZERO);
                if elapsed >= self.config.reset_timeout {
                    tracing::info!(platform = %self.name, "circuit breaker half-open, admitting trial call");
                    inner.state = CircuitState::HalfOpen;
                    Ok(())
                } else {
                    Err(PlatformError::CircuitOpen(self.name.clone()))
                }
            }
        }
    }

    pub fn record_success(&self) {
        let mut inner = self.lock();
        if inner.state != CircuitState::Closed {
            tracing::info!(platform = %self.name, "circuit breaker closed");
        }
        inner.state = CircuitState::Closed;
        inner.consecutive_failures = 0;
        inner.opened_at = None;
    }

    pub fn record_failure(&self) {
        let mut inner = self.lock();
        match inner.state {
            // A failed trial call re-opens and restarts the timer
            CircuitState::HalfOpen => {
                tracing::warn!(platform = %self.name, "trial call failed, circuit breaker re-opened");
                inner.state = CircuitState::Open;
                inner.opened_at = Some(Instant::now());
            }
            CircuitState::Closed => {
                inner.consecutive_failures += 1;
                if inner.consecutive_failures >= self.config.failure_threshold {
                    tracing::warn!(
                        platform = %self.name,
                        failures = inner.consecutive_failures,
                        "circuit breaker opened"
                    );
                    inner.state = CircuitState::Open;
                    inner.opened_at = Some(Instant::now());
                }
            }
            CircuitState::Open => {}
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BreakerInner> {
        // Held only for a few field updates, so a poisoned lock means a
        // panic mid-update; propagating the inner state is still sound.
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn breaker(threshold: u32, reset: Duration) -> CircuitBreaker {
        CircuitBreaker::new(
            "tiktok",
            CircuitBreakerConfig {
                failure_threshold: threshold,
                reset_timeout: reset,
            },
        )
    }

    #[test]
    fn test_starts_closed() {
        let cb = breaker(5, Duration::from_secs(60));
        assert_eq!(cb.state(), CircuitState::Closed);
        assert!(cb.try_acquire().is_ok());
    }

    #[test]
    fn test_opens_at_threshold() {
        let cb = breaker(3, Duration::from_secs(60));
        cb.record_failure();
        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Closed);
        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Open);

        let err = cb.try_acquire().unwrap_err();
        assert!(matches!(err, PlatformError::CircuitOpen(name) if name == "tiktok"));
    }

    #[test]
    fn test_success_resets_failure_count() {
        let cb = breaker(3, Duration::from_secs(60));
        cb.record_failure();
        cb.record_failure();
        cb.record_success();
        cb.record_failure();
        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[test]
    fn test_half_open_after_reset_timeout() {
        let cb = breaker(1, Duration::from_millis(0));
        cb.record_failure();

        // Zero timeout means the next acquire immediately goes half-open
        assert!(cb.try_acquire().is_ok());
        assert_eq!(cb.state(), CircuitState::HalfOpen);

        // Only one trial call is admitted
        assert!(cb.try_acquire().is_err());
    }

    #[test]
    fn test_half_open_success_closes() {
        let cb = breaker(1, Duration::from_millis(0));
        cb.record_failure();
        cb.try_acquire().unwrap();
        cb.record_success();
        assert_eq!(cb.state(), CircuitState::Closed);
        assert!(cb.try_acquire().is_ok());
    }

    #[test]
    fn test_half_open_failure_reopens() {
        let cb = breaker(1, Duration::from_secs(60));
        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Open);

        // Force half-open via a zero-timeout breaker instead of sleeping
        let cb = breaker(1, Duration::from_millis(0));
        cb.record_failure();
        cb.try_acquire().unwrap();
        assert_eq!(cb.state(), CircuitState::HalfOpen);
        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Open);
    }

    #[test]
    fn test_open_blocks_before_timeout() {
        let cb = breaker(1, Duration::from_secs(3600));
        cb.record_failure();
        assert!(cb.try_acquire().is_err());
        assert_eq!(cb.state(), CircuitState::Open);
    }
}
