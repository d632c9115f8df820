//! TikTok poster
//!
//! Publishes video content through the Content Posting API's direct-post
//! flow: a single `video/init` call pointing TikTok at the media URL.
//! TikTok pulls the video itself, so no upload pass-through is needed.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use crate::config::TikTokConfig;
use crate::error::PlatformError;
use crate::platforms::{
    classify_request_error, classify_status, compose_caption, PostSuccess, Poster, PublishRequest,
};
use crate::resilience::ResilientClient;

pub struct TikTokPoster {
    config: TikTokConfig,
    http: reqwest::Client,
    resilience: Arc<ResilientClient>,
}

#[derive(Debug, Deserialize)]
struct InitResponse {
    data: InitData,
}

#[derive(Debug, Deserialize)]
struct InitData {
    publish_id: String,
}

impl TikTokPoster {
    pub fn new(
        config: TikTokConfig,
        resilience: Arc<ResilientClient>,
    ) -> Result<Self, PlatformError> {
        // Per-attempt deadlines come from the retry layer; this is a
        // backstop for a wedged connection.
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| PlatformError::Network(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self {
            config,
            http,
            resilience,
        })
    }

    async fn init_video(
        &self,
        request: &PublishRequest,
        video_url: &str,
    ) -> Result<InitResponse, PlatformError> {
        let body = json!({
            "post_info": {
                "title": compose_caption(&request.content),
                "privacy_level": "PUBLIC_TO_EVERYONE",
            },
            "source_info": {
                "source": "PULL_FROM_URL",
                "video_url": video_url,
            },
        });

        let response = self
            .http
            .post(format!("{}/post/publish/video/init/", self.config.api_base))
            .bearer_auth(&self.config.access_token)
            .header("Idempotency-Key", &request.idempotency_key)
            .json(&body)
            .send()
            .await
            .map_err(classify_request_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status, &body));
        }

        response
            .json::<InitResponse>()
            .await
            .map_err(|e| PlatformError::Posting(format!("malformed init response: {}", e)))
    }
}

#[async_trait]
impl Poster for TikTokPoster {
    fn name(&self) -> &str {
        "tiktok"
    }

    async fn publish(&self, request: &PublishRequest) -> Result<PostSuccess, PlatformError> {
        let video_url = request
            .content
            .media_url
            .as_deref()
            .ok_or_else(|| PlatformError::Validation("tiktok requires a media URL".to_string()))?
            .to_string();

        tracing::debug!(item_id = %request.item_id, "publishing to tiktok");

        let init = self
            .resilience
            .execute(|| self.init_video(request, &video_url))
            .await?;

        Ok(PostSuccess {
            post_id: init.data.publish_id.clone(),
            url: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resilience::{CircuitBreakerConfig, RetryConfig};
    use crate::types::Content;

    fn poster() -> TikTokPoster {
        TikTokPoster::new(
            TikTokConfig {
                access_token: "token".to_string(),
                api_base: "http://127.0.0.1:9".to_string(),
            },
            Arc::new(ResilientClient::new(
                "tiktok",
                RetryConfig {
                    max_retries: 0,
                    timeout: Duration::from_millis(200),
                    initial_delay: Duration::from_millis(1),
                    max_delay: Duration::from_millis(1),
                    backoff_multiplier: 2.0,
                },
                CircuitBreakerConfig::default(),
                1000.0,
            )),
        )
        .unwrap()
    }

    #[test]
    fn test_constructor_builds_client() {
        // Constructor failures surface as errors, never panics
        let result = TikTokPoster::new(
            TikTokConfig {
                access_token: "token".to_string(),
                api_base: "https://open.tiktokapis.com/v2".to_string(),
            },
            Arc::new(ResilientClient::new(
                "tiktok",
                RetryConfig::default(),
                CircuitBreakerConfig::default(),
                1.0,
            )),
        );
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_missing_media_url_is_validation_error() {
        let poster = poster();
        let request = PublishRequest::new("item-1", "tiktok", &Content::new("no video"));
        let err = poster.publish(&request).await.unwrap_err();
        assert!(matches!(err, PlatformError::Validation(_)));
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn test_unreachable_host_is_network_error() {
        // Port 9 (discard) refuses connections
        let poster = poster();
        let mut content = Content::new("clip");
        content.media_url = Some("https://cdn.example.com/clip.mp4".to_string());
        let request = PublishRequest::new("item-1", "tiktok", &content);

        let err = poster.publish(&request).await.unwrap_err();
        assert!(
            matches!(err, PlatformError::Network(_) | PlatformError::Timeout(_)),
            "unexpected: {:?}",
            err
        );
    }
}
