//! Sends the same prompt to every provider that has a key.
//!
//! Run with: `cargo run --example multi_provider`
//!
//! Reads `AI_HORDE_API_KEY`, `CLIPDROP_API_KEY` and `STABILITY_AI_API_KEY`
//! (or a `.env` file).

use pixelrelay::{GenerateInput, GenerationOutcome, ImageApi, ProviderRegistry, RelayConfig};

#[tokio::main]
async fn main() -> pixelrelay::Result<()> {
    let config = RelayConfig::from_env()?;
    let registry = ProviderRegistry::from_config(&config);

    let configured = registry.configured();
    if configured.is_empty() {
        eprintln!(
            "Set at least one of: {}",
            ImageApi::ALL.map(|api| api.key_env_var()).join(", ")
        );
        std::process::exit(1);
    }

    for api in configured {
        let input = GenerateInput::new(
            "A serene mountain lake at dawn",
            "impressionist",
            "768x512",
            api.as_str(),
        );
        match registry.dispatch(input).await {
            Ok(result) => match result.outcome {
                GenerationOutcome::Pending { job_id } => {
                    println!("{}: queued as job {}", api.display_name(), job_id)
                }
                GenerationOutcome::Completed { image_url } => println!(
                    "{}: image ready ({} chars of data URI)",
                    api.display_name(),
                    image_url.len()
                ),
            },
            Err(e) => eprintln!("{}", e),
        }
    }

    Ok(())
}
