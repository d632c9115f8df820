//! Minimum-interval rate limiter
//!
//! Spaces calls at least `1 / calls_per_second` apart. The async mutex is
//! held across the pacing sleep so concurrent callers queue up and each
//! gets its own slot.

use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

#[derive(Debug)]
pub struct RateLimiter {
    min_interval: Duration,
    last_call: Mutex<Option<Instant>>,
}

impl RateLimiter {
    pub fn new(calls_per_second: f64) -> Self {
        let min_interval = if calls_per_second > 0.0 {
            Duration::from_secs_f64(1.0 / calls_per_second)
        } else {
            Duration::ZERO
        };
        Self {
            min_interval,
            last_call: Mutex::new(None),
        }
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Wait until the next call slot is available, then claim it.
    pub async fn acquire(&self) {
        let mut last = self.last_call.lock().await;
        if let Some(prev) = *last {
            let elapsed = prev.elapsed();
            if elapsed < self.min_interval {
                tokio::time::sleep(self.min_interval - elapsed).await;
            }
        }
        *last = Some(Instant::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_min_interval_from_rate() {
        assert_eq!(RateLimiter::new(1.0).min_interval(), Duration::from_secs(1));
        assert_eq!(
            RateLimiter::new(4.0).min_interval(),
            Duration::from_millis(250)
        );
        assert_eq!(RateLimiter::new(0.0).min_interval(), Duration::ZERO);
    }

    #[tokio::test]
    async fn test_first_acquire_is_immediate() {
        let limiter = RateLimiter::new(0.1);
        let start = Instant::now();
        limiter.acquire().await;
        assert!(start.elapsed() < Duration::from_millis(100));
    }

    #[tokio::test(start_paused = true)]
    async fn test_acquire_spaces_calls() {
        let limiter = RateLimiter::new(2.0);

        limiter.acquire().await;
        let first = Instant::now();
        limiter.acquire().await;
        assert!(first.elapsed() >= Duration::from_millis(500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_wait_after_interval_passed() {
        let limiter = RateLimiter::new(10.0);
        limiter.acquire().await;

        tokio::time::sleep(Duration::from_millis(200)).await;
        let before = Instant::now();
        limiter.acquire().await;
        assert_eq!(before.elapsed(), Duration::ZERO);
    }
}
