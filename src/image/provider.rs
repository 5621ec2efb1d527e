//! Provider and job-tracker traits.

use crate::error::{RelayError, Result};
use crate::image::types::{GenerationOutcome, GenerationRequest, ImageApi, JobStatus};
use async_trait::async_trait;
use std::time::{Duration, Instant};

/// Trait for image generation providers.
#[async_trait]
pub trait ImageProvider: Send + Sync {
    /// Generates an image, or queues a job that will produce one.
    async fn generate(&self, request: &GenerationRequest) -> Result<GenerationOutcome>;

    /// Returns the kind of this provider.
    fn kind(&self) -> ImageApi;

    /// Returns the name of this provider for display.
    fn name(&self) -> &str {
        self.kind().display_name()
    }
}

/// Trait for looking up asynchronous jobs.
///
/// Implementations query the provider once per call and keep no state
/// between calls.
#[async_trait]
pub trait JobTracker: Send + Sync {
    /// Returns the current status of a job.
    async fn status(&self, job_id: &str) -> Result<JobStatus>;

    /// Returns the provider that owns the jobs.
    fn kind(&self) -> ImageApi;
}

/// Extension trait for waiting on a job from the client side.
#[async_trait]
pub trait JobTrackerExt: JobTracker {
    /// Polls until the job reaches a terminal status or `timeout` elapses.
    async fn wait_for_completion(
        &self,
        job_id: &str,
        poll_interval: Duration,
        timeout: Duration,
    ) -> Result<JobStatus> {
        let start = Instant::now();

        loop {
            let status = self.status(job_id).await?;
            if status.is_terminal() {
                return Ok(status);
            }

            if start.elapsed() + poll_interval > timeout {
                return Err(RelayError::Timeout(timeout));
            }

            if let JobStatus::Processing {
                queue_position,
                wait_time,
            } = &status
            {
                tracing::debug!(
                    job_id = %job_id,
                    queue_position,
                    wait_time,
                    elapsed_secs = start.elapsed().as_secs(),
                    "job still processing"
                );
            }
            tokio::time::sleep(poll_interval).await;
        }
    }
}

impl<T: JobTracker + ?Sized> JobTrackerExt for T {}
