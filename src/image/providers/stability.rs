//! Stability AI text-to-image provider.

use crate::error::{sanitize_error_message, RelayError, Result};
use crate::image::provider::ImageProvider;
use crate::image::types::{GenerationOutcome, GenerationRequest, ImageApi, ImageFormat};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://api.stability.ai";

/// Largest width or height sent to the engine.
const MAX_DIMENSION: u32 = 1024;

/// Stability engine variants.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StabilityModel {
    /// Stable Diffusion XL 1.0 (default).
    #[default]
    SdxlV1,
    /// Stable Diffusion 1.6.
    SdV16,
}

impl StabilityModel {
    /// Returns the engine id used in the endpoint path.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SdxlV1 => "stable-diffusion-xl-1024-v1-0",
            Self::SdV16 => "stable-diffusion-v1-6",
        }
    }
}

/// Builder for StabilityProvider.
#[derive(Debug, Clone)]
pub struct StabilityProviderBuilder {
    api_key: Option<String>,
    base_url: String,
    model: StabilityModel,
    timeout: Duration,
    client: Option<reqwest::Client>,
}

impl Default for StabilityProviderBuilder {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_BASE_URL.into(),
            model: StabilityModel::default(),
            timeout: Duration::from_secs(30),
            client: None,
        }
    }
}

impl StabilityProviderBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the API key.
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Overrides the API root (default `https://api.stability.ai`).
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Sets the engine.
    pub fn model(mut self, model: StabilityModel) -> Self {
        self.model = model;
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
    pub fn build(self) -> Result<StabilityProvider> {
        let api_key = self
            .api_key
            .filter(|k| !k.is_empty())
            .ok_or_else(|| ImageApi::Stability.missing_key())?;

        Ok(StabilityProvider {
            client: self.client.unwrap_or_default(),
            api_key,
            base_url: self.base_url,
            model: self.model,
            timeout: self.timeout,
        })
    }
}

/// Stability AI image generation provider.
pub struct StabilityProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: StabilityModel,
    timeout: Duration,
}

impl StabilityProvider {
    /// Creates a new `StabilityProviderBuilder`.
    pub fn builder() -> StabilityProviderBuilder {
        StabilityProviderBuilder::new()
    }

    fn parse_error(status: u16, text: &str) -> RelayError {
        let message = serde_json::from_str::<StabilityErrorResponse>(text)
            .ok()
            .and_then(|e| e.message)
            .unwrap_or_else(|| text.to_string());

        RelayError::Api {
            status,
            message: sanitize_error_message(&message),
        }
    }
}

#[async_trait]
impl ImageProvider for StabilityProvider {
    async fn generate(&self, request: &GenerationRequest) -> Result<GenerationOutcome> {
        let url = format!(
            "{}/v1/generation/{}/text-to-image",
            self.base_url,
            self.model.as_str()
        );
        let body = StabilityRequest::from_request(request);
        tracing::debug!(
            width = body.width,
            height = body.height,
            engine = self.model.as_str(),
            "sending Stability generation request"
        );

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .header("Accept", "application/json")
            .timeout(self.timeout)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(Self::parse_error(status.as_u16(), &text));
        }

        let result: StabilityResponse = response.json().await?;
        let artifact = result.artifacts.into_iter().next().ok_or_else(|| {
            RelayError::UnexpectedResponse("Stability returned no artifacts".into())
        })?;

        if artifact.finish_reason.as_deref() == Some("CONTENT_FILTERED") {
            return Err(RelayError::ContentBlocked(
                "image blocked by Stability content filter".into(),
            ));
        }
        if artifact.base64.is_empty() {
            return Err(RelayError::UnexpectedResponse(
                "Stability artifact has no image data".into(),
            ));
        }

        Ok(GenerationOutcome::Completed {
            image_url: ImageFormat::Png.data_url(&artifact.base64),
        })
    }

    fn kind(&self) -> ImageApi {
        ImageApi::Stability
    }
}

// Request types
#[derive(Debug, Serialize)]
struct StabilityRequest {
    text_prompts: Vec<TextPrompt>,
    cfg_scale: u32,
    width: u32,
    height: u32,
    steps: u32,
    samples: u32,
}

#[derive(Debug, Serialize)]
struct TextPrompt {
    text: String,
}

impl StabilityRequest {
    fn from_request(req: &GenerationRequest) -> Self {
        let size = req.size().clamped(MAX_DIMENSION);
        Self {
            text_prompts: vec![TextPrompt {
                text: req.prompt.clone(),
            }],
            cfg_scale: 7,
            width: size.width,
            height: size.height,
            steps: 30,
            samples: 1,
        }
    }
}

// Response types
#[derive(Debug, Deserialize)]
struct StabilityResponse {
    #[serde(default)]
    artifacts: Vec<StabilityArtifact>,
}

#[derive(Debug, Deserialize)]
struct StabilityArtifact {
    #[serde(default)]
    base64: String,
    #[serde(default, rename = "finishReason")]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StabilityErrorResponse {
    #[serde(default)]
    message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::ImageSize;

    #[test]
    fn test_model_as_str() {
        assert_eq!(
            StabilityModel::SdxlV1.as_str(),
            "stable-diffusion-xl-1024-v1-0"
        );
        assert_eq!(StabilityModel::default(), StabilityModel::SdxlV1);
    }

    #[test]
    fn test_builder_with_model() {
        let provider = StabilityProviderBuilder::new()
            .api_key("sk-test")
            .model(StabilityModel::SdV16)
            .build()
            .unwrap();
        assert_eq!(provider.model, StabilityModel::SdV16);
    }

    #[test]
    fn test_builder_without_key_fails() {
        let err = StabilityProviderBuilder::new().build().err().unwrap();
        assert!(matches!(
            err,
            RelayError::MissingApiKey {
                provider: "Stability AI",
                ..
            }
        ));
    }

    #[test]
    fn test_request_construction() {
        let req = GenerationRequest::styled("a castle", "oil painting", ImageSize::new(768, 512).unwrap());
        let json = serde_json::to_value(StabilityRequest::from_request(&req)).unwrap();

        assert_eq!(
            json,
            serde_json::json!({
                "text_prompts": [{"text": "a castle, oil painting style"}],
                "cfg_scale": 7,
                "width": 768,
                "height": 512,
                "steps": 30,
                "samples": 1
            })
        );
    }

    #[test]
    fn test_request_clamps_dimensions() {
        let req = GenerationRequest::new("big", ImageSize::new(2048, 2048).unwrap());
        let body = StabilityRequest::from_request(&req);
        assert_eq!(body.width, 1024);
        assert_eq!(body.height, 1024);

        let req = GenerationRequest::new("wide", ImageSize::new(1536, 640).unwrap());
        let body = StabilityRequest::from_request(&req);
        assert_eq!((body.width, body.height), (1024, 640));
    }

    #[test]
    fn test_response_deserialization() {
        let json = r#"{"artifacts": [{"base64": "iVBORw0KGgo=", "seed": 1234, "finishReason": "SUCCESS"}]}"#;
        let resp: StabilityResponse = serde_json::from_str(json).unwrap();
        assert_eq!(resp.artifacts[0].base64, "iVBORw0KGgo=");
        assert_eq!(resp.artifacts[0].finish_reason.as_deref(), Some("SUCCESS"));

        let resp: StabilityResponse = serde_json::from_str("{}").unwrap();
        assert!(resp.artifacts.is_empty());
    }

    #[test]
    fn test_parse_error_reads_message() {
        let err = StabilityProvider::parse_error(
            401,
            r#"{"id": "x", "name": "unauthorized", "message": "missing authorization header"}"#,
        );
        assert_eq!(
            err.to_string(),
            "API error: 401 - missing authorization header"
        );
    }
}
