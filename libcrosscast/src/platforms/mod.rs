//! Platform abstraction and implementations
//!
//! Each platform implements the [`Poster`] trait; the publisher looks
//! implementations up by name in a [`PosterRegistry`]. Adding a platform
//! means implementing the trait and registering it, nothing else changes.
//!
//! # Examples
//!
//! ```no_run
//! use std::sync::Arc;
//! use libcrosscast::platforms::{PosterRegistry, PublishRequest, mock::MockPoster};
//! use libcrosscast::types::Content;
//!
//! # async fn example() -> Result<(), libcrosscast::error::PlatformError> {
//! let mut registry = PosterRegistry::new();
//! registry.register(Arc::new(MockPoster::succeeding("tiktok")));
//!
//! let content = Content::new("Hello from the pipeline");
//! let request = PublishRequest::new("item-1", "tiktok", &content);
//! if let Some(poster) = registry.get("tiktok") {
//!     let success = poster.publish(&request).await?;
//!     println!("posted: {}", success.post_id);
//! }
//! # Ok(())
//! # }
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::PlatformError;
use crate::types::Content;

pub mod instagram;
pub mod tiktok;

// Mock poster is available for all builds (not just tests) to support integration tests
pub mod mock;

/// One publish attempt to one platform.
#[derive(Debug, Clone)]
pub struct PublishRequest {
    pub item_id: String,
    pub platform: String,
    pub content: Content,
    /// Stable per `(item, platform)` pair, so a platform that honors
    /// idempotency keys deduplicates re-deliveries across retries and
    /// worker restarts.
    pub idempotency_key: String,
}

impl PublishRequest {
    pub fn new(item_id: impl Into<String>, platform: impl Into<String>, content: &Content) -> Self {
        let item_id = item_id.into();
        let platform = platform.into();
        let idempotency_key = format!("{}:{}", item_id, platform);
        Self {
            item_id,
            platform,
            content: content.clone(),
            idempotency_key,
        }
    }
}

/// What a platform returns for a successful publish.
#[derive(Debug, Clone, PartialEq)]
pub struct PostSuccess {
    pub post_id: String,
    pub url: Option<String>,
}

/// A destination that content can be published to.
#[async_trait]
pub trait Poster: Send + Sync {
    /// Lowercase identifier used in queue items and the registry
    /// (e.g. "tiktok", "instagram").
    fn name(&self) -> &str;

    /// Publish the request's content, returning the platform post ID.
    ///
    /// Implementations classify their failures via [`PlatformError`] so
    /// the retry layer can tell transient from permanent.
    async fn publish(&self, request: &PublishRequest) -> Result<PostSuccess, PlatformError>;
}

/// Name-indexed set of posters, shared by the publisher and the daemon.
#[derive(Default)]
pub struct PosterRegistry {
    posters: HashMap<String, Arc<dyn Poster>>,
}

impl PosterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a poster under its own name, replacing any previous one.
    pub fn register(&mut self, poster: Arc<dyn Poster>) {
        self.posters.insert(poster.name().to_string(), poster);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Poster>> {
        self.posters.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.posters.contains_key(name)
    }

    /// Registered platform names, sorted for stable output.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.posters.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn is_empty(&self) -> bool {
        self.posters.is_empty()
    }
}

/// Render the caption the way the platforms expect it: body text, then
/// hashtags, then the link on its own line.
pub(crate) fn compose_caption(content: &Content) -> String {
    let mut caption = content.caption.trim().to_string();

    if !content.hashtags.is_empty() {
        let tags: Vec<String> = content
            .hashtags
            .iter()
            .map(|t| format!("#{}", t.trim_start_matches('#')))
            .collect();
        caption.push_str("\n\n");
        caption.push_str(&tags.join(" "));
    }

    if let Some(link) = &content.link {
        caption.push('\n');
        caption.push_str(link);
    }

    caption
}

/// Map a transport-level reqwest error onto the retry taxonomy.
pub(crate) fn classify_request_error(e: reqwest::Error) -> PlatformError {
    if e.is_timeout() {
        PlatformError::Timeout(0)
    } else if e.is_connect() {
        PlatformError::Network(format!("connection failed: {}", e))
    } else {
        PlatformError::Network(e.to_string())
    }
}

/// Map a non-2xx response onto the retry taxonomy.
pub(crate) fn classify_status(status: reqwest::StatusCode, body: &str) -> PlatformError {
    let message = if body.is_empty() {
        status
            .canonical_reason()
            .unwrap_or("request failed")
            .to_string()
    } else {
        // Keep error bodies short in logs and the error ledger
        body.chars().take(200).collect()
    };

    match status.as_u16() {
        401 | 403 => PlatformError::Authentication(message),
        429 => PlatformError::RateLimited(message),
        code => PlatformError::Http {
            status: code,
            message,
        },
    }
}
