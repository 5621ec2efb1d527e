//! ClipDrop text-to-image provider.

use crate::error::{sanitize_error_message, RelayError, Result};
use crate::image::provider::ImageProvider;
use crate::image::types::{GenerationOutcome, GenerationRequest, ImageApi, ImageFormat};
use async_trait::async_trait;
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://clipdrop-api.co";

/// Builder for ClipDropProvider.
#[derive(Debug, Clone)]
pub struct ClipDropProviderBuilder {
    api_key: Option<String>,
    base_url: String,
    timeout: Duration,
    client: Option<reqwest::Client>,
}

impl Default for ClipDropProviderBuilder {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_BASE_URL.into(),
            timeout: Duration::from_secs(30),
            client: None,
        }
    }
}

impl ClipDropProviderBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the API key.
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Overrides the API root (default `https://clipdrop-api.co`).
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Sets the per-request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Reuses an existing HTTP client.
    pub fn client(mut self, client: reqwest::Client) -> Self {
        self.client = Some(client);
        self
    }

    /// Builds the provider. Fails if no API key was given.
    pub fn build(self) -> Result<ClipDropProvider> {
        let api_key = self
            .api_key
            .filter(|k| !k.is_empty())
            .ok_or_else(|| ImageApi::Clipdrop.missing_key())?;

        Ok(ClipDropProvider {
            client: self.client.unwrap_or_default(),
            api_key,
            base_url: self.base_url,
            timeout: self.timeout,
        })
    }
}

/// ClipDrop image generation provider.
///
/// ClipDrop renders synchronously and answers with raw PNG bytes.
pub struct ClipDropProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    timeout: Duration,
}

impl ClipDropProvider {
    /// Creates a new `ClipDropProviderBuilder`.
    pub fn builder() -> ClipDropProviderBuilder {
        ClipDropProviderBuilder::new()
    }

    fn parse_error(status: u16, text: &str) -> RelayError {
        let message = serde_json::from_str::<serde_json::Value>(text)
            .ok()
            .and_then(|v| v.get("error").and_then(|e| e.as_str()).map(str::to_owned))
            .unwrap_or_else(|| text.to_string());
        let message = sanitize_error_message(&message);

        if status == 400 && message.to_lowercase().contains("nsfw") {
            return RelayError::ContentBlocked(message);
        }
        RelayError::Api { status, message }
    }
}

#[async_trait]
impl ImageProvider for ClipDropProvider {
    async fn generate(&self, request: &GenerationRequest) -> Result<GenerationOutcome> {
        let url = format!("{}/text-to-image/v1", self.base_url);
        let form = reqwest::multipart::Form::new().text("prompt", request.prompt.clone());

        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .timeout(self.timeout)
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(Self::parse_error(status.as_u16(), &text));
        }

        let data = response.bytes().await?;
        if data.is_empty() {
            return Err(RelayError::UnexpectedResponse(
                "ClipDrop returned an empty image".into(),
            ));
        }
        tracing::debug!(bytes = data.len(), "ClipDrop generation complete");

        Ok(GenerationOutcome::Completed {
            image_url: ImageFormat::Png.encode_data_url(&data),
        })
    }

    fn kind(&self) -> ImageApi {
        ImageApi::Clipdrop
    }
}
