//! Error types for the relay.

use crate::image::ImageApi;
use std::time::Duration;

/// Longest upstream error body kept in an error message.
const MAX_ERROR_MESSAGE_CHARS: usize = 500;

/// Errors that can occur while relaying a generation or status request.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    /// The provider's API key is not configured.
    #[error("{provider} API key not configured (set {env_var})")]
    MissingApiKey {
        /// Display name of the provider.
        provider: &'static str,
        /// Environment variable that carries the key.
        env_var: &'static str,
    },

    /// The incoming request failed validation.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The `api` field named no known provider.
    #[error("Invalid API selected: {0}")]
    UnknownProvider(String),

    /// API returned a non-success response.
    #[error("API error: {status} - {message}")]
    Api {
        /// Upstream HTTP status.
        status: u16,
        /// Sanitized upstream body.
        message: String,
    },

    /// API answered with a success status but an unusable body.
    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),

    /// Content was blocked by the provider's safety filters.
    #[error("content blocked: {0}")]
    ContentBlocked(String),

    /// Client-side waiting gave up.
    #[error("operation timed out after {0:?}")]
    Timeout(Duration),

    /// Network or HTTP error, including per-call timeouts.
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid configuration value.
    #[error("configuration error: {0}")]
    Config(String),

    /// I/O error (e.g., binding the listener).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A provider-layer error tagged with the provider that produced it.
    #[error("{}: {source}", .provider.display_name())]
    Provider {
        /// Provider that failed.
        provider: ImageApi,
        /// Underlying failure.
        #[source]
        source: Box<RelayError>,
    },
}

impl RelayError {
    /// Tags provider-layer errors with the provider name.
    ///
    /// Validation and configuration errors pass through untouched, as do
    /// errors that are already tagged.
    pub fn with_provider(self, provider: ImageApi) -> Self {
        match self {
            Self::Api { .. }
            | Self::UnexpectedResponse(_)
            | Self::ContentBlocked(_)
            | Self::Timeout(_)
            | Self::Network(_)
            | Self::Json(_) => Self::Provider {
                provider,
                source: Box::new(self),
            },
            other => other,
        }
    }

    /// Returns true if the error was caused by the caller's input.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::InvalidRequest(_))
    }

    /// Returns true if the provider answered at all (as opposed to a
    /// transport failure).
    pub fn is_upstream(&self) -> bool {
        match self {
            Self::Api { .. } | Self::UnexpectedResponse(_) | Self::ContentBlocked(_) => true,
            Self::Provider { source, .. } => source.is_upstream(),
            _ => false,
        }
    }
}

/// Trims an upstream error body and caps its length.
pub(crate) fn sanitize_error_message(text: &str) -> String {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return "empty response body".into();
    }
    match trimmed.char_indices().nth(MAX_ERROR_MESSAGE_CHARS) {
        Some((idx, _)) => format!("{}...", &trimmed[..idx]),
        None => trimmed.to_string(),
    }
}

/// Result type alias for relay operations.
pub type Result<T> = std::result::Result<T, RelayError>;
