//! AI Horde image generation provider.
//!
//! The Horde is a crowdsourced cluster: a submission returns a job id at
//! once and the image is rendered later by a volunteer worker. Generation
//! therefore yields [`GenerationOutcome::Pending`], and [`HordeJobTracker`]
//! answers the follow-up status polls.

use crate::error::{sanitize_error_message, RelayError, Result};
use crate::image::provider::{ImageProvider, JobTracker};
use crate::image::types::{
    GenerationOutcome, GenerationRequest, ImageApi, ImageFormat, JobStatus,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://aihorde.net/api";

/// Sent as `Client-Agent`, which the Horde asks integrations to set.
const CLIENT_AGENT: &str = concat!(
    env!("CARGO_PKG_NAME"),
    ":",
    env!("CARGO_PKG_VERSION"),
    ":unknown"
);

/// Generation parameters sent with every Horde job.
#[derive(Debug, Clone, PartialEq)]
pub struct HordeParams {
    /// Sampling steps.
    pub steps: u32,
    /// Sampler name, e.g. `k_euler_a`.
    pub sampler_name: String,
    /// Classifier-free guidance scale.
    pub cfg_scale: f32,
    /// Models any of which may serve the job.
    pub models: Vec<String>,
    /// Whether NSFW output is acceptable.
    pub nsfw: bool,
    /// Whether workers should blur NSFW output.
    pub censor_nsfw: bool,
}

impl Default for HordeParams {
    fn default() -> Self {
        Self {
            steps: 20,
            sampler_name: "k_euler_a".into(),
            cfg_scale: 7.5,
            models: vec!["stable_diffusion".into()],
            nsfw: false,
            censor_nsfw: true,
        }
    }
}

/// Builder for HordeProvider.
#[derive(Debug, Clone)]
pub struct HordeProviderBuilder {
    api_key: Option<String>,
    base_url: String,
    params: HordeParams,
    timeout: Duration,
    client: Option<reqwest::Client>,
}

impl Default for HordeProviderBuilder {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_BASE_URL.into(),
            params: HordeParams::default(),
            timeout: Duration::from_secs(30),
            client: None,
        }
    }
}

impl HordeProviderBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the Horde API key.
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Overrides the API root (default `https://aihorde.net/api`).
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Sets the generation parameters.
    pub fn params(mut self, params: HordeParams) -> Self {
        self.params = params;
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
    pub fn build(self) -> Result<HordeProvider> {
        let api_key = self
            .api_key
            .filter(|k| !k.is_empty())
            .ok_or_else(|| ImageApi::Horde.missing_key())?;

        Ok(HordeProvider {
            client: self.client.unwrap_or_default(),
            api_key,
            base_url: self.base_url,
            params: self.params,
            timeout: self.timeout,
        })
    }
}

/// AI Horde image generation provider.
pub struct HordeProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    params: HordeParams,
    timeout: Duration,
}

impl HordeProvider {
    /// Creates a new `HordeProviderBuilder`.
    pub fn builder() -> HordeProviderBuilder {
        HordeProviderBuilder::new()
    }

    /// Returns a tracker for the jobs this provider submits.
    pub fn tracker(&self) -> HordeJobTracker {
        HordeJobTracker {
            client: self.client.clone(),
            api_key: Some(self.api_key.clone()),
            base_url: self.base_url.clone(),
            timeout: self.timeout,
        }
    }

    async fn submit(&self, request: &GenerationRequest) -> Result<String> {
        let url = format!("{}/v2/generate/async", self.base_url);
        let body = HordeAsyncRequest::from_request(request, &self.params);

        let response = self
            .client
            .post(&url)
            .header("apikey", &self.api_key)
            .header("Client-Agent", CLIENT_AGENT)
            .timeout(self.timeout)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(parse_error(status.as_u16(), &text));
        }

        // A 2xx does not guarantee a job: the Horde reports some rejections
        // in the body.
        let submitted: HordeAsyncResponse = serde_json::from_str(&text).map_err(|_| {
            RelayError::UnexpectedResponse(format!(
                "no job id in response: {}",
                sanitize_error_message(&text)
            ))
        })?;

        match submitted.id.filter(|id| !id.is_empty()) {
            Some(id) => Ok(id),
            None => Err(RelayError::UnexpectedResponse(
                submitted
                    .message
                    .map(|m| format!("no job id in response: {}", m))
                    .unwrap_or_else(|| "no job id in response".into()),
            )),
        }
    }
}

#[async_trait]
impl ImageProvider for HordeProvider {
    async fn generate(&self, request: &GenerationRequest) -> Result<GenerationOutcome> {
        let job_id = self.submit(request).await?;
        tracing::debug!(job_id = %job_id, "submitted Horde generation request");
        Ok(GenerationOutcome::Pending { job_id })
    }

    fn kind(&self) -> ImageApi {
        ImageApi::Horde
    }
}

/// Polls Horde jobs through the check and status endpoints.
///
/// The API key is optional: both endpoints answer anonymous requests.
#[derive(Debug, Clone)]
pub struct HordeJobTracker {
    client: reqwest::Client,
    api_key: Option<String>,
    base_url: String,
    timeout: Duration,
}

impl HordeJobTracker {
    /// Creates a tracker against the public Horde.
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            api_key: None,
            base_url: DEFAULT_BASE_URL.into(),
            timeout: Duration::from_secs(10),
        }
    }

    /// Sends the API key with every poll.
    pub fn with_api_key(mut self, key: Option<String>) -> Self {
        self.api_key = key.filter(|k| !k.is_empty());
        self
    }

    /// Overrides the API root.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Sets the per-request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T> {
        let mut request = self
            .client
            .get(url)
            .header("Client-Agent", CLIENT_AGENT)
            .timeout(self.timeout);
        if let Some(key) = &self.api_key {
            request = request.header("apikey", key);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(parse_error(status.as_u16(), &text));
        }

        Ok(response.json().await?)
    }

    async fn check(&self, job_id: &str) -> Result<HordeCheckResponse> {
        self.get_json(&format!("{}/v2/generate/check/{}", self.base_url, job_id))
            .await
    }

    async fn results(&self, job_id: &str) -> Result<HordeStatusResponse> {
        self.get_json(&format!("{}/v2/generate/status/{}", self.base_url, job_id))
            .await
    }
}

#[async_trait]
impl JobTracker for HordeJobTracker {
    async fn status(&self, job_id: &str) -> Result<JobStatus> {
        validate_job_id(job_id)?;

        let check = self.check(job_id).await?;
        if check.faulted {
            tracing::debug!(job_id = %job_id, "Horde job faulted");
            return Ok(JobStatus::Failed {
                error: "Generation faulted on the Horde".into(),
            });
        }
        if !check.done {
            return Ok(JobStatus::Processing {
                queue_position: check.queue_position,
                wait_time: check.wait_time,
            });
        }

        let results = self.results(job_id).await?;
        let image = results
            .generations
            .into_iter()
            .find_map(|g| g.img.filter(|img| !img.is_empty()));

        Ok(match image {
            Some(img) => {
                tracing::debug!(job_id = %job_id, "Horde job complete");
                JobStatus::Completed {
                    image_url: normalize_image(img),
                }
            }
            None => JobStatus::Failed {
                error: "No image generated".into(),
            },
        })
    }

    fn kind(&self) -> ImageApi {
        ImageApi::Horde
    }
}

/// Rejects ids that would not be a single path segment.
fn validate_job_id(job_id: &str) -> Result<()> {
    if job_id.is_empty() {
        return Err(RelayError::InvalidRequest("Job ID required".into()));
    }
    if !job_id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(RelayError::InvalidRequest(format!(
            "malformed job id: {}",
            job_id
        )));
    }
    Ok(())
}

/// R2 uploads come back as URLs; inline results are bare base64 WebP.
fn normalize_image(img: String) -> String {
    if img.starts_with("http://") || img.starts_with("https://") || img.starts_with("data:") {
        img
    } else {
        ImageFormat::WebP.data_url(&img)
    }
}

fn parse_error(status: u16, text: &str) -> RelayError {
    let message = serde_json::from_str::<HordeErrorResponse>(text)
        .ok()
        .and_then(|e| e.message)
        .map(|m| sanitize_error_message(&m))
        .unwrap_or_else(|| sanitize_error_message(text));

    RelayError::Api { status, message }
}

// Request types
#[derive(Debug, Serialize)]
struct HordeAsyncRequest {
    prompt: String,
    params: HordeGenerationParams,
    models: Vec<String>,
    nsfw: bool,
    censor_nsfw: bool,
    trusted_workers: bool,
    r2: bool,
}

#[derive(Debug, Serialize)]
struct HordeGenerationParams {
    width: u32,
    height: u32,
    steps: u32,
    sampler_name: String,
    cfg_scale: f32,
    n: u32,
}

impl HordeAsyncRequest {
    fn from_request(req: &GenerationRequest, params: &HordeParams) -> Self {
        Self {
            prompt: req.prompt.clone(),
            params: HordeGenerationParams {
                width: req.width,
                height: req.height,
                steps: params.steps,
                sampler_name: params.sampler_name.clone(),
                cfg_scale: params.cfg_scale,
                n: 1,
            },
            models: params.models.clone(),
            nsfw: params.nsfw,
            censor_nsfw: params.censor_nsfw,
            trusted_workers: false,
            r2: true,
        }
    }
}

// Response types
#[derive(Debug, Deserialize)]
struct HordeAsyncResponse {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct HordeCheckResponse {
    #[serde(default)]
    done: bool,
    #[serde(default)]
    faulted: bool,
    #[serde(default)]
    queue_position: u64,
    #[serde(default)]
    wait_time: u64,
}

#[derive(Debug, Deserialize)]
struct HordeStatusResponse {
    #[serde(default)]
    generations: Vec<HordeGeneration>,
}

#[derive(Debug, Deserialize)]
struct HordeGeneration {
    #[serde(default)]
    img: Option<String>,
}

#[derive(Debug, Deserialize)]
struct HordeErrorResponse {
    #[serde(default)]
    message: Option<String>,
}
