//! CLI for pixelrelay: serve the HTTP API or run one-off requests.

use clap::{Args, Parser, Subcommand, ValueEnum};
use pixelrelay::image::providers::HordeJobTracker;
use pixelrelay::{
    GenerateInput, GenerationOutcome, ImageApi, JobStatus, JobTracker, JobTrackerExt,
    ProviderRegistry, RelayConfig,
};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "pixelrelay")]
#[command(about = "Relay text-to-image requests to AI Horde, ClipDrop or Stability AI")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP API
    Serve(ServeArgs),

    /// Generate an image from a text prompt
    Generate(GenerateArgs),

    /// Check the status of a Horde job
    Status(StatusArgs),

    /// List providers and whether their API keys are set
    Providers,
}

#[derive(Args)]
struct ServeArgs {
    /// Port to listen on (overrides PORT)
    #[arg(short, long)]
    port: Option<u16>,
}

#[derive(Args)]
struct GenerateArgs {
    /// The text prompt describing the image
    prompt: String,

    /// Style appended to the prompt
    #[arg(short, long, default_value = "photorealistic")]
    style: String,

    /// Image size as WIDTHxHEIGHT
    #[arg(long, default_value = "512x512")]
    size: String,

    /// Provider to use
    #[arg(short, long, value_enum, default_value = "horde")]
    api: ApiArg,

    /// For Horde: poll until the job finishes
    #[arg(short, long)]
    wait: bool,

    /// Seconds between polls when waiting
    #[arg(long, default_value_t = 3)]
    poll_interval: u64,

    /// Give up waiting after this many seconds
    #[arg(long, default_value_t = 300)]
    wait_timeout: u64,
}

#[derive(Args)]
struct StatusArgs {
    /// Job id returned by a Horde generation
    job_id: String,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ApiArg {
    Horde,
    Clipdrop,
    Stability,
}

impl From<ApiArg> for ImageApi {
    fn from(arg: ApiArg) -> Self {
        match arg {
            ApiArg::Horde => ImageApi::Horde,
            ApiArg::Clipdrop => ImageApi::Clipdrop,
            ApiArg::Stability => ImageApi::Stability,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("pixelrelay=info,tower_http=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = RelayConfig::from_env()?;

    match cli.command {
        Commands::Serve(args) => {
            let config = match args.port {
                Some(port) => config.with_port(port),
                None => config,
            };
            pixelrelay::server::serve(config).await?;
        }
        Commands::Generate(args) => {
            generate(&config, args, cli.json).await?;
        }
        Commands::Status(args) => {
            let status = tracker(&config).status(&args.job_id).await?;
            print_status(&status, cli.json)?;
        }
        Commands::Providers => {
            list_providers(&config, cli.json)?;
        }
    }

    Ok(())
}

fn tracker(config: &RelayConfig) -> HordeJobTracker {
    let tracker = HordeJobTracker::new(reqwest::Client::new())
        .with_api_key(config.horde_api_key.clone())
        .with_timeout(config.status_timeout);
    match &config.horde_base_url {
        Some(url) => tracker.with_base_url(url.as_str()),
        None => tracker,
    }
}

async fn generate(config: &RelayConfig, args: GenerateArgs, json_output: bool) -> anyhow::Result<()> {
    let api = ImageApi::from(args.api);
    if args.wait && !api.is_async() {
        anyhow::bail!("--wait only applies to the horde provider");
    }

    let registry = ProviderRegistry::from_config(config);
    let input = GenerateInput::new(args.prompt, args.style, args.size, api.as_str());
    let result = registry.dispatch(input).await?;

    match (&result.outcome, args.wait) {
        (GenerationOutcome::Pending { job_id }, true) => {
            if !json_output {
                println!("Submitted job {} to {}, waiting...", job_id, api.display_name());
            }
            let status = tracker(config)
                .wait_for_completion(
                    job_id,
                    Duration::from_secs(args.poll_interval.max(1)),
                    Duration::from_secs(args.wait_timeout),
                )
                .await?;
            print_status(&status, json_output)?;
        }
        _ if json_output => {
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        (GenerationOutcome::Pending { job_id }, false) => {
            println!("Submitted job {} to {}", job_id, api.display_name());
            println!("Check it with: pixelrelay status {}", job_id);
        }
        (GenerationOutcome::Completed { image_url }, _) => {
            println!(
                "Generated image via {} ({} chars of data URI)",
                api.display_name(),
                image_url.len()
            );
            println!("{}", image_url);
        }
    }

    Ok(())
}

fn print_status(status: &JobStatus, json_output: bool) -> anyhow::Result<()> {
    if json_output {
        println!("{}", serde_json::to_string_pretty(status)?);
        return Ok(());
    }

    match status {
        JobStatus::Processing {
            queue_position,
            wait_time,
        } => println!(
            "Processing: queue position {}, about {}s to go",
            queue_position, wait_time
        ),
        JobStatus::Completed { image_url } => println!("Completed: {}", image_url),
        JobStatus::Failed { error } => println!("Failed: {}", error),
    }
    Ok(())
}

fn list_providers(config: &RelayConfig, json_output: bool) -> anyhow::Result<()> {
    #[derive(serde::Serialize)]
    struct ProviderInfo {
        name: &'static str,
        api: ImageApi,
        mode: &'static str,
        env_var: &'static str,
        configured: bool,
    }

    let providers: Vec<ProviderInfo> = ImageApi::ALL
        .into_iter()
        .map(|api| ProviderInfo {
            name: api.display_name(),
            api,
            mode: if api.is_async() { "async job" } else { "inline image" },
            env_var: api.key_env_var(),
            configured: config.api_key(api).is_some(),
        })
        .collect();

    if json_output {
        println!("{}", serde_json::to_string_pretty(&providers)?);
    } else {
        println!("Available providers:\n");
        for p in &providers {
            let status = if p.configured { "✓" } else { "✗" };
            println!("  {} {} ({}, {})", status, p.name, p.api, p.mode);
            println!("    API key: {}", p.env_var);
        }
    }

    Ok(())
}
