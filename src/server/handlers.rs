//! Route handlers.

use crate::image::{GenerateInput, GenerationResult, ImageApi, JobStatus};
use crate::server::error::{ApiError, Envelope};
use crate::server::AppState;
use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Query, State,
    },
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use serde_json::json;

/// `POST /generate`
pub async fn generate(
    State(state): State<AppState>,
    payload: Result<Json<GenerateInput>, JsonRejection>,
) -> Result<Json<GenerationResult>, ApiError> {
    let Json(input) = payload.map_err(|rejection| {
        ApiError::new(
            StatusCode::BAD_REQUEST,
            Envelope::Generate,
            rejection.body_text(),
        )
    })?;

    let result = state
        .providers
        .dispatch(input)
        .await
        .map_err(|e| ApiError::from_relay(Envelope::Generate, e))?;

    match result.outcome.job_id() {
        Some(job_id) => tracing::info!(api = %result.api, job_id = %job_id, "job submitted"),
        None => tracing::info!(api = %result.api, "image generated"),
    }
    Ok(Json(result))
}

/// Query string of `GET /status`.
#[derive(Debug, Deserialize)]
pub struct StatusQuery {
    #[serde(rename = "jobId", default)]
    job_id: Option<String>,
}

/// `GET /status?jobId=<id>`
pub async fn status(
    State(state): State<AppState>,
    query: Result<Query<StatusQuery>, QueryRejection>,
) -> Result<Json<JobStatus>, ApiError> {
    let Query(query) = query.map_err(|rejection| {
        ApiError::new(
            StatusCode::BAD_REQUEST,
            Envelope::Status,
            rejection.body_text(),
        )
    })?;

    let job_id = query
        .job_id
        .filter(|id| !id.trim().is_empty())
        .ok_or_else(|| ApiError::new(StatusCode::BAD_REQUEST, Envelope::Status, "Job ID required"))?;

    let status = state.tracker.status(job_id.trim()).await.map_err(|e| {
        ApiError::from_relay(Envelope::Status, e.with_provider(state.tracker.kind()))
    })?;

    tracing::debug!(job_id = %job_id, terminal = status.is_terminal(), "job polled");
    Ok(Json(status))
}

/// Fallback for wrong methods on `/generate`.
pub async fn generate_method_not_allowed() -> ApiError {
    ApiError::method_not_allowed(Envelope::Generate)
}

/// Fallback for wrong methods on `/status`.
pub async fn status_method_not_allowed() -> ApiError {
    ApiError::method_not_allowed(Envelope::Status)
}

/// `GET /health`
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let providers: Vec<ImageApi> = state.providers.configured();
    Json(json!({
        "status": "ok",
        "service": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "providers": providers,
    }))
}
