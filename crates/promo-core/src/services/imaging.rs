//! Hosted text-to-image pipeline.
//!
//! A language model first turns the copy and the caller's image prompt into a
//! detailed image prompt. That prompt goes to a hosted inference endpoint
//! (with an optional backup), and the returned picture is stamped with the
//! caller's logo before being handed back as JPEG.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use serde_json::json;
use tracing::{info, instrument, warn};

use crate::runtime::retry::{RetryPolicy, retry};
use crate::runtime::types::MarketingCopy;
use crate::services::{GenerationError, ImageGenerator, LogoPlacement, TextModel};

/// Prepended to every refined prompt so the logo corner stays clear.
const LAYOUT_NOTE: &str = "***Please create a versatile image that works well with the content. \
Avoid unnecessary text, and ensure all text is grammatically correct and free of spelling errors \
for a professional and polished look. Include designated space for the punchline text to be \
overlaid on the image. Ensure the upper 15% of the image, especially the upper right side, \
remains completely blank for logo placement***";

/// A hosted inference endpoint accepting `{"inputs": "<prompt>"}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageEndpoint {
    /// Short label used in logs.
    pub name: String,
    pub url: String,
}

impl ImageEndpoint {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
        }
    }
}

fn refinement_prompt(copy: &MarketingCopy, img_prompt: &str) -> String {
    format!(
        "Create only one detailed and creative prompt for generating a marketing image using the \
following details:

Punchline: {punchline}
Title: {title}
Image prompt: {img_prompt}
Please create an image that works well with this content.
The image should be visually appealing, human-centric or futuristic and technological, and \
suitable for social media marketing.",
        punchline = copy.punchline,
        title = copy.title,
    )
}

/// [`ImageGenerator`] backed by a hosted inference API.
pub struct HostedImageGenerator {
    client: reqwest::Client,
    refiner: Arc<dyn TextModel>,
    primary: ImageEndpoint,
    backup: Option<ImageEndpoint>,
    token: Option<String>,
    retry: RetryPolicy,
    placement: LogoPlacement,
}

impl HostedImageGenerator {
    pub fn new(
        refiner: Arc<dyn TextModel>,
        primary: ImageEndpoint,
        timeout: Duration,
    ) -> Result<Self, GenerationError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("promo/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()?;
        Ok(Self {
            client,
            refiner,
            primary,
            backup: None,
            token: None,
            retry: RetryPolicy::default(),
            placement: LogoPlacement::default(),
        })
    }

    pub fn with_backup(mut self, backup: Option<ImageEndpoint>) -> Self {
        self.backup = backup;
        self
    }

    /// Bearer token sent to both endpoints. Empty tokens are ignored.
    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token.filter(|t| !t.is_empty());
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_placement(mut self, placement: LogoPlacement) -> Self {
        self.placement = placement;
        self
    }

    async fn request_once(
        &self,
        endpoint: &ImageEndpoint,
        prompt: &str,
    ) -> Result<Bytes, GenerationError> {
        let mut request = self
            .client
            .post(&endpoint.url)
            .json(&json!({ "inputs": prompt }));
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }
        let response = request.send().await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(GenerationError::from_status(status.as_u16(), message));
        }
        let body = response.bytes().await?;
        if body.is_empty() {
            return Err(GenerationError::InvalidResponse(format!(
                "{} returned an empty image",
                endpoint.name
            )));
        }
        Ok(body)
    }

    /// Query the primary endpoint under the retry policy, then the backup.
    async fn render(&self, prompt: &str) -> Result<Bytes, GenerationError> {
        let primary = retry(&self.retry, &self.primary.name, |_| {
            self.request_once(&self.primary, prompt)
        })
        .await;

        match (primary, &self.backup) {
            (Ok(image), _) => Ok(image),
            (Err(e), None) => Err(e),
            (Err(e), Some(backup)) => {
                warn!(primary = %self.primary.name, backup = %backup.name, error = %e, "primary image endpoint failed; trying backup");
                retry(&self.retry, &backup.name, |_| self.request_once(backup, prompt)).await
            }
        }
    }
}

#[async_trait]
impl ImageGenerator for HostedImageGenerator {
    #[instrument(skip_all, fields(primary = %self.primary.name))]
    async fn generate_image(
        &self,
        copy: &MarketingCopy,
        img_prompt: &str,
        logo: &str,
    ) -> Result<Bytes, GenerationError> {
        let refined = self
            .refiner
            .complete(&refinement_prompt(copy, img_prompt))
            .await?;
        let prompt = format!("{LAYOUT_NOTE}{refined}");

        let raw = self.render(&prompt).await?;
        info!(bytes = raw.len(), "image received; compositing logo");

        let placement = self.placement;
        let logo = logo.to_owned();
        tokio::task::spawn_blocking(move || placement.compose(&raw, &logo))
            .await
            .map_err(|e| GenerationError::Image(format!("logo compositing task failed: {e}")))?
    }
}
