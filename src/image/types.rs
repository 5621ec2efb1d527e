//! Core types for image generation.

use crate::error::{RelayError, Result};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Supported image formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    /// PNG format (lossless).
    #[default]
    Png,
    /// JPEG format (lossy).
    Jpeg,
    /// WebP format (what the Horde returns inline).
    WebP,
}

impl ImageFormat {
    /// Returns the MIME type for this format.
    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
            Self::WebP => "image/webp",
        }
    }

    /// Wraps an already base64-encoded payload in a data URL.
    pub fn data_url(&self, base64_payload: &str) -> String {
        format!("data:{};base64,{}", self.mime_type(), base64_payload)
    }

    /// Encodes raw bytes as a data URL.
    pub fn encode_data_url(&self, data: &[u8]) -> String {
        use base64::Engine;
        self.data_url(&base64::engine::general_purpose::STANDARD.encode(data))
    }
}

/// Image provider selectable through the `api` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageApi {
    /// AI Horde (asynchronous, job + poll).
    Horde,
    /// ClipDrop text-to-image.
    Clipdrop,
    /// Stability AI (SDXL).
    Stability,
}

impl ImageApi {
    /// All providers, in display order.
    pub const ALL: [ImageApi; 3] = [Self::Horde, Self::Clipdrop, Self::Stability];

    /// Returns the wire name used in the `api` field.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Horde => "horde",
            Self::Clipdrop => "clipdrop",
            Self::Stability => "stability",
        }
    }

    /// Returns the human-readable provider name.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Horde => "AI Horde",
            Self::Clipdrop => "ClipDrop",
            Self::Stability => "Stability AI",
        }
    }

    /// Returns the environment variable carrying this provider's API key.
    pub fn key_env_var(&self) -> &'static str {
        match self {
            Self::Horde => "AI_HORDE_API_KEY",
            Self::Clipdrop => "CLIPDROP_API_KEY",
            Self::Stability => "STABILITY_AI_API_KEY",
        }
    }

    /// Returns true if results arrive as a job to be polled.
    pub fn is_async(&self) -> bool {
        matches!(self, Self::Horde)
    }

    /// The error reported when this provider's key is absent.
    pub fn missing_key(&self) -> RelayError {
        RelayError::MissingApiKey {
            provider: self.display_name(),
            env_var: self.key_env_var(),
        }
    }
}

impl std::fmt::Display for ImageApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ImageApi {
    type Err = RelayError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "horde" => Ok(Self::Horde),
            "clipdrop" => Ok(Self::Clipdrop),
            "stability" => Ok(Self::Stability),
            other => Err(RelayError::UnknownProvider(other.to_string())),
        }
    }
}

/// Image dimensions parsed from a `WxH` string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageSize {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl ImageSize {
    /// Creates a size, rejecting zero on either axis.
    pub fn new(width: u32, height: u32) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(RelayError::InvalidRequest(format!(
                "size must be positive, got {}x{}",
                width, height
            )));
        }
        Ok(Self { width, height })
    }

    /// Caps both axes at `max`.
    pub fn clamped(&self, max: u32) -> Self {
        Self {
            width: self.width.min(max),
            height: self.height.min(max),
        }
    }
}

impl FromStr for ImageSize {
    type Err = RelayError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || {
            RelayError::InvalidRequest(format!(
                "size must look like WIDTHxHEIGHT (e.g. 512x768), got '{}'",
                s
            ))
        };

        let (w, h) = s.trim().split_once(['x', 'X']).ok_or_else(invalid)?;
        let width = w.trim().parse::<u32>().map_err(|_| invalid())?;
        let height = h.trim().parse::<u32>().map_err(|_| invalid())?;
        Self::new(width, height)
    }
}

impl std::fmt::Display for ImageSize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// A validated request handed to a provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    /// The full prompt, style included.
    pub prompt: String,
    /// Desired width in pixels.
    pub width: u32,
    /// Desired height in pixels.
    pub height: u32,
}

impl GenerationRequest {
    /// Creates a request from a ready-made prompt.
    pub fn new(prompt: impl Into<String>, size: ImageSize) -> Self {
        Self {
            prompt: prompt.into(),
            width: size.width,
            height: size.height,
        }
    }

    /// Creates a request whose prompt is `"<prompt>, <style> style"`.
    pub fn styled(prompt: &str, style: &str, size: ImageSize) -> Self {
        Self::new(format!("{}, {} style", prompt, style), size)
    }

    /// Returns the requested dimensions.
    pub fn size(&self) -> ImageSize {
        ImageSize {
            width: self.width,
            height: self.height,
        }
    }
}

/// A generate call as it arrives on the wire.
///
/// Every field is optional so that missing fields surface as one
/// validation error listing all of them.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenerateInput {
    /// User prompt.
    #[serde(default)]
    pub prompt: Option<String>,
    /// Style appended to the prompt.
    #[serde(default)]
    pub style: Option<String>,
    /// Size as `WxH`.
    #[serde(default)]
    pub size: Option<String>,
    /// Provider name.
    #[serde(default)]
    pub api: Option<String>,
}

/// Output of [`GenerateInput::validate`]: a request plus the still
/// unparsed provider name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedInput {
    /// Raw `api` value, parsed later so an unknown provider is reported
    /// separately from missing fields.
    pub api: String,
    /// Request to hand to the provider.
    pub request: GenerationRequest,
}

impl GenerateInput {
    /// Creates an input with every field set.
    pub fn new(
        prompt: impl Into<String>,
        style: impl Into<String>,
        size: impl Into<String>,
        api: impl Into<String>,
    ) -> Self {
        Self {
            prompt: Some(prompt.into()),
            style: Some(style.into()),
            size: Some(size.into()),
            api: Some(api.into()),
        }
    }

    /// Checks required fields and parses the size.
    pub fn validate(self) -> Result<ValidatedInput> {
        fn present(field: Option<String>) -> Option<String> {
            field.filter(|v| !v.trim().is_empty())
        }

        let prompt = present(self.prompt);
        let style = present(self.style);
        let size = present(self.size);
        let api = present(self.api);

        let missing: Vec<&str> = [
            ("prompt", prompt.is_none()),
            ("style", style.is_none()),
            ("size", size.is_none()),
            ("api", api.is_none()),
        ]
        .into_iter()
        .filter_map(|(name, absent)| absent.then_some(name))
        .collect();

        match (prompt, style, size, api) {
            (Some(prompt), Some(style), Some(size), Some(api)) => {
                let size: ImageSize = size.parse()?;
                Ok(ValidatedInput {
                    api: api.trim().to_string(),
                    request: GenerationRequest::styled(&prompt, &style, size),
                })
            }
            _ => Err(RelayError::InvalidRequest(format!(
                "missing required fields: {}",
                missing.join(", ")
            ))),
        }
    }
}

/// What a provider hands back: either a job to poll or a finished image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum GenerationOutcome {
    /// The provider queued a job; poll it through the status endpoint.
    Pending {
        /// Provider job identifier.
        #[serde(rename = "jobId")]
        job_id: String,
    },
    /// The image is ready.
    Completed {
        /// Data URI (or provider URL) of the image.
        #[serde(rename = "imageUrl")]
        image_url: String,
    },
}

impl GenerationOutcome {
    /// Returns the job id for pending outcomes.
    pub fn job_id(&self) -> Option<&str> {
        match self {
            Self::Pending { job_id } => Some(job_id),
            Self::Completed { .. } => None,
        }
    }

    /// Returns the image URL for completed outcomes.
    pub fn image_url(&self) -> Option<&str> {
        match self {
            Self::Pending { .. } => None,
            Self::Completed { image_url } => Some(image_url),
        }
    }
}

/// Body of a successful generate response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationResult {
    /// Always `true`; failures use the error envelope.
    pub success: bool,
    /// Provider that served the request.
    pub api: ImageApi,
    /// Job id or image URL.
    #[serde(flatten)]
    pub outcome: GenerationOutcome,
}

impl GenerationResult {
    /// Creates a successful result.
    pub fn new(api: ImageApi, outcome: GenerationOutcome) -> Self {
        Self {
            success: true,
            api,
            outcome,
        }
    }
}

/// Snapshot of a polled job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum JobStatus {
    /// Still queued or rendering.
    Processing {
        /// Position in the provider queue.
        queue_position: u64,
        /// Estimated seconds until done.
        wait_time: u64,
    },
    /// Finished with an image.
    Completed {
        /// URL or data URI of the image.
        #[serde(rename = "imageUrl")]
        image_url: String,
    },
    /// Finished without an image.
    Failed {
        /// Reason reported to the client.
        error: String,
    },
}

impl JobStatus {
    /// Returns true once polling can stop.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Processing { .. })
    }
}
