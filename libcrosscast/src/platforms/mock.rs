//! Mock poster implementation for testing
//!
//! A configurable poster that can succeed, fail permanently, or fail a
//! fixed number of times before succeeding. Used by integration tests to
//! exercise the publisher and worker without credentials or network access.

use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::sleep;

use crate::error::PlatformError;
use crate::platforms::{PostSuccess, Poster, PublishRequest};

/// Configuration for mock poster behavior
#[derive(Debug, Clone)]
pub struct MockConfig {
    /// Platform name (e.g., "tiktok", "mock-instagram")
    pub name: String,

    /// Number of publish calls that fail before calls start succeeding.
    /// `0` means every call succeeds.
    pub failures_before_success: usize,

    /// Error returned while failing
    pub error: PlatformError,

    /// When true, every call fails regardless of `failures_before_success`
    pub always_fail: bool,

    /// Delay before completing operations (simulates network latency)
    pub delay: Duration,

    /// Number of times publish has been called
    pub publish_call_count: Arc<Mutex<usize>>,

    /// Requests that have been published (for verification)
    pub published: Arc<Mutex<Vec<PublishRequest>>>,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            name: "mock".to_string(),
            failures_before_success: 0,
            error: PlatformError::Network("simulated failure".to_string()),
            always_fail: false,
            delay: Duration::from_millis(0),
            publish_call_count: Arc::new(Mutex::new(0)),
            published: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

/// Mock poster for testing
pub struct MockPoster {
    config: MockConfig,
}

impl MockPoster {
    pub fn new(config: MockConfig) -> Self {
        Self { config }
    }

    /// A poster whose every call succeeds
    pub fn succeeding(name: &str) -> Self {
        Self::new(MockConfig {
            name: name.to_string(),
            ..Default::default()
        })
    }

    /// A poster whose every call fails with a retryable error
    pub fn failing(name: &str) -> Self {
        Self::new(MockConfig {
            name: name.to_string(),
            always_fail: true,
            ..Default::default()
        })
    }

    /// A poster whose every call fails with a permanent error
    pub fn failing_permanently(name: &str) -> Self {
        Self::new(MockConfig {
            name: name.to_string(),
            always_fail: true,
            error: PlatformError::Validation("simulated rejection".to_string()),
            ..Default::default()
        })
    }

    /// A poster that fails the first `n` calls, then succeeds
    pub fn flaky(name: &str, n: usize) -> Self {
        Self::new(MockConfig {
            name: name.to_string(),
            failures_before_success: n,
            ..Default::default()
        })
    }

    /// Clone of the config; its `Arc` counters stay shared with the
    /// poster, so tests can keep observing after handing the poster off.
    pub fn config_handle(&self) -> MockConfig {
        self.config.clone()
    }

    pub fn publish_count(&self) -> usize {
        *self.config.publish_call_count.lock().unwrap()
    }

    pub fn published_requests(&self) -> Vec<PublishRequest> {
        self.config.published.lock().unwrap().clone()
    }
}

#[async_trait]
impl Poster for MockPoster {
    fn name(&self) -> &str {
        &self.config.name
    }

    async fn publish(&self, request: &PublishRequest) -> Result<PostSuccess, PlatformError> {
        if !self.config.delay.is_zero() {
            sleep(self.config.delay).await;
        }

        let call_number = {
            let mut count = self.config.publish_call_count.lock().unwrap();
            *count += 1;
            *count
        };

        if self.config.always_fail || call_number <= self.config.failures_before_success {
            return Err(self.config.error.clone());
        }

        self.config.published.lock().unwrap().push(request.clone());

        Ok(PostSuccess {
            post_id: format!("{}-post-{}", self.config.name, call_number),
            url: Some(format!(
                "https://example.com/{}/{}",
                self.config.name, request.idempotency_key
            )),
        })
    }
}
