//! Fan-out publishing across platforms
//!
//! One publish cycle delivers a queue item to every platform it targets,
//! sequentially, with a fixed pause between platforms. Failures are
//! isolated per platform: every platform gets its attempt and the cycle
//! settles all outcomes before reporting.

use std::sync::Arc;
use std::time::Duration;

use crate::platforms::{PosterRegistry, PublishRequest};
use crate::types::{PlatformOutcome, PostResults, QueueItem};

/// Result of one publish cycle for one item.
#[derive(Debug, Clone)]
pub struct CycleOutcome {
    pub results: PostResults,
}

impl CycleOutcome {
    /// One platform success is enough for the item to count as posted.
    pub fn any_success(&self) -> bool {
        self.results.values().any(|r| r.success)
    }

    pub fn success_count(&self) -> usize {
        self.results.values().filter(|r| r.success).count()
    }

    pub fn failure_count(&self) -> usize {
        self.results.len() - self.success_count()
    }

    /// Joined failure messages, for the item's error log.
    pub fn failure_summary(&self) -> String {
        let failures: Vec<String> = self
            .results
            .iter()
            .filter(|(_, r)| !r.success)
            .map(|(platform, r)| {
                format!(
                    "{}: {}",
                    platform,
                    r.error.as_deref().unwrap_or("unknown error")
                )
            })
            .collect();
        failures.join("; ")
    }
}

pub struct FanoutPublisher {
    registry: Arc<PosterRegistry>,
    inter_platform_delay: Duration,
}

impl FanoutPublisher {
    pub fn new(registry: Arc<PosterRegistry>, inter_platform_delay: Duration) -> Self {
        Self {
            registry,
            inter_platform_delay,
        }
    }

    /// Deliver `item` to each of its target platforms in order.
    ///
    /// A platform with no registered poster yields a failed outcome rather
    /// than aborting the cycle, so the remaining platforms still publish.
    pub async fn publish(&self, item: &QueueItem) -> CycleOutcome {
        let mut results = PostResults::new();

        for (i, platform) in item.platforms.iter().enumerate() {
            if i > 0 && !self.inter_platform_delay.is_zero() {
                tokio::time::sleep(self.inter_platform_delay).await;
            }

            let outcome = match self.registry.get(platform) {
                Some(poster) => {
                    let request = PublishRequest::new(&item.id, platform.clone(), &item.content);
                    match poster.publish(&request).await {
                        Ok(success) => {
                            tracing::info!(
                                item_id = %item.id,
                                platform = %platform,
                                post_id = %success.post_id,
                                "published"
                            );
                            PlatformOutcome::success(success.post_id, success.url)
                        }
                        Err(e) => {
                            tracing::warn!(
                                item_id = %item.id,
                                platform = %platform,
                                error = %e,
                                "publish failed"
                            );
                            PlatformOutcome::failure(e.to_string())
                        }
                    }
                }
                None => {
                    tracing::warn!(item_id = %item.id, platform = %platform, "no poster registered");
                    PlatformOutcome::failure(format!("no poster registered for '{}'", platform))
                }
            };

            results.insert(platform.clone(), outcome);
        }

        CycleOutcome { results }
    }
}
