#![warn(missing_docs)]
//! pixelrelay - text-to-image relay for AI Horde, ClipDrop and Stability AI.
//!
//! One request shape goes in, one of three providers does the work, and a
//! normalized result comes back. Horde renders asynchronously, so its
//! generations yield a job id that is polled separately; ClipDrop and
//! Stability answer with the image inline as a data URI.
//!
//! # Quick Start
//!
//! ```no_run
//! use pixelrelay::{GenerateInput, ProviderRegistry, RelayConfig};
//!
//! #[tokio::main]
//! async fn main() -> pixelrelay::Result<()> {
//!     let config = RelayConfig::from_env()?;
//!     let registry = ProviderRegistry::from_config(&config);
//!     let input = GenerateInput::new("A lighthouse at dusk", "watercolor", "512x512", "stability");
//!     let result = registry.dispatch(input).await?;
//!     println!("{}", serde_json::to_string_pretty(&result)?);
//!     Ok(())
//! }
//! ```
//!
//! # Features
//!
//! - `horde`: AI Horde (async jobs + status polling)
//! - `clipdrop`: ClipDrop text-to-image
//! - `stability`: Stability AI (SDXL)
//! - `server`: axum HTTP API (`/generate`, `/status`)
//! - `cli`: the `pixelrelay` binary

pub mod config;
mod error;
pub mod image;

#[cfg(feature = "server")]
pub mod server;

// Re-export error types at crate root
pub use error::{RelayError, Result};

pub use config::RelayConfig;

pub use image::{
    GenerateInput, GenerationOutcome, GenerationRequest, GenerationResult, ImageApi, ImageFormat,
    ImageProvider, ImageSize, JobStatus, JobTracker, JobTrackerExt, ProviderRegistry,
};

#[cfg(feature = "horde")]
pub use image::providers::{HordeJobTracker, HordeParams, HordeProvider, HordeProviderBuilder};

#[cfg(feature = "clipdrop")]
pub use image::providers::{ClipDropProvider, ClipDropProviderBuilder};

#[cfg(feature = "stability")]
pub use image::providers::{StabilityModel, StabilityProvider, StabilityProviderBuilder};

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::error::{RelayError, Result};
    pub use crate::image::{
        GenerateInput, GenerationOutcome, GenerationRequest, GenerationResult, ImageApi,
        ImageProvider, JobStatus, JobTracker, JobTrackerExt, ProviderRegistry,
    };

    #[cfg(feature = "horde")]
    pub use crate::image::providers::{HordeJobTracker, HordeProvider};

    #[cfg(feature = "clipdrop")]
    pub use crate::image::providers::ClipDropProvider;

    #[cfg(feature = "stability")]
    pub use crate::image::providers::StabilityProvider;
}
