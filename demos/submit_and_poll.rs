//! Submits a Horde job and polls it to completion.
//!
//! Run with: `cargo run --example submit_and_poll`
//!
//! Requires `AI_HORDE_API_KEY` environment variable.

use pixelrelay::{GenerationRequest, HordeProvider, ImageProvider, ImageSize, JobTrackerExt};
use std::time::Duration;

#[tokio::main]
async fn main() -> pixelrelay::Result<()> {
    let api_key = std::env::var("AI_HORDE_API_KEY").unwrap_or_default();
    let provider = HordeProvider::builder().api_key(api_key).build()?;

    let request = GenerationRequest::styled(
        "A golden retriever puppy playing in snow",
        "watercolor",
        ImageSize::new(512, 512)?,
    );
    let outcome = provider.generate(&request).await?;
    let Some(job_id) = outcome.job_id() else {
        println!("Horde answered inline: {:?}", outcome.image_url());
        return Ok(());
    };
    println!("Submitted job {}", job_id);

    let status = provider
        .tracker()
        .wait_for_completion(job_id, Duration::from_secs(3), Duration::from_secs(300))
        .await?;
    println!("{}", serde_json::to_string_pretty(&status)?);

    Ok(())
}
