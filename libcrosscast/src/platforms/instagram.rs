//! Instagram poster
//!
//! Publishes through the Graph API's two-step flow: create a media
//! container for the business account, then publish the container. Each
//! step goes through the shared resilience stack on its own, so a
//! transient failure on publish does not re-create the container.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use crate::config::InstagramConfig;
use crate::error::PlatformError;
use crate::platforms::{
    classify_request_error, classify_status, compose_caption, PostSuccess, Poster, PublishRequest,
};
use crate::resilience::ResilientClient;

pub struct InstagramPoster {
    config: InstagramConfig,
    http: reqwest::Client,
    resilience: Arc<ResilientClient>,
}

#[derive(Debug, Deserialize)]
struct IdResponse {
    id: String,
}

impl InstagramPoster {
    pub fn new(
        config: InstagramConfig,
        resilience: Arc<ResilientClient>,
    ) -> Result<Self, PlatformError> {
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

    async fn post_form(
        &self,
        url: &str,
        params: &[(&str, &str)],
    ) -> Result<IdResponse, PlatformError> {
        let response = self
            .http
            .post(url)
            .form(params)
            .send()
            .await
            .map_err(classify_request_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status, &body));
        }

        response
            .json::<IdResponse>()
            .await
            .map_err(|e| PlatformError::Posting(format!("malformed graph response: {}", e)))
    }

    async fn create_container(&self, request: &PublishRequest) -> Result<String, PlatformError> {
        let image_url = request
            .content
            .media_url
            .as_deref()
            .ok_or_else(|| PlatformError::Validation("instagram requires a media URL".to_string()))?;
        let caption = compose_caption(&request.content);

        let url = format!(
            "{}/{}/media",
            self.config.api_base, self.config.business_account_id
        );
        let params = [
            ("image_url", image_url),
            ("caption", caption.as_str()),
            ("access_token", self.config.access_token.as_str()),
        ];
        let container = self
            .resilience
            .execute(|| self.post_form(&url, &params))
            .await?;
        Ok(container.id)
    }

    async fn publish_container(&self, container_id: &str) -> Result<String, PlatformError> {
        let url = format!(
            "{}/{}/media_publish",
            self.config.api_base, self.config.business_account_id
        );
        let params = [
            ("creation_id", container_id),
            ("access_token", self.config.access_token.as_str()),
        ];
        let media = self
            .resilience
            .execute(|| self.post_form(&url, &params))
            .await?;
        Ok(media.id)
    }
}

#[async_trait]
impl Poster for InstagramPoster {
    fn name(&self) -> &str {
        "instagram"
    }

    async fn publish(&self, request: &PublishRequest) -> Result<PostSuccess, PlatformError> {
        tracing::debug!(item_id = %request.item_id, "publishing to instagram");

        let container_id = self.create_container(request).await?;
        let media_id = self.publish_container(&container_id).await?;

        Ok(PostSuccess {
            url: Some(format!("https://www.instagram.com/p/{}", media_id)),
            post_id: media_id,
        })
    }
}
