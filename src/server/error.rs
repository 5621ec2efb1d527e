//! Error envelopes returned by the HTTP handlers.

use crate::error::RelayError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

/// Which endpoint's envelope to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Envelope {
    /// `{"success": false, "error": ...}`
    Generate,
    /// `{"status": "failed", "error": ...}`
    Status,
}

/// An error response for one of the endpoints.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    envelope: Envelope,
    message: String,
}

impl ApiError {
    /// Creates an error with an explicit status.
    pub fn new(status: StatusCode, envelope: Envelope, message: impl Into<String>) -> Self {
        Self {
            status,
            envelope,
            message: message.into(),
        }
    }

    /// Maps a relay error onto an HTTP status.
    ///
    /// Caller mistakes are 400; configuration, unknown provider, upstream
    /// and transport failures are all 500.
    pub fn from_relay(envelope: Envelope, err: RelayError) -> Self {
        let status = if err.is_client_error() {
            StatusCode::BAD_REQUEST
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };
        let message = match err {
            RelayError::InvalidRequest(message) => message,
            other => other.to_string(),
        };
        Self::new(status, envelope, message)
    }

    /// 405 for the given endpoint.
    pub fn method_not_allowed(envelope: Envelope) -> Self {
        Self::new(StatusCode::METHOD_NOT_ALLOWED, envelope, "Method not allowed")
    }

    /// Returns the HTTP status.
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Returns the client-facing message.
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::error!(status = %self.status, "request failed: {}", self.message);
        } else {
            tracing::warn!(status = %self.status, "request rejected: {}", self.message);
        }

        let body = match self.envelope {
            Envelope::Generate => json!({ "success": false, "error": self.message }),
            Envelope::Status => json!({ "status": "failed", "error": self.message }),
        };
        (self.status, Json(body)).into_response()
    }
}
