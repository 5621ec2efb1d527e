//! Image generation module.

mod provider;
pub mod providers;
mod registry;
mod types;

pub use provider::{ImageProvider, JobTracker, JobTrackerExt};
pub use registry::ProviderRegistry;
pub use types::{
    GenerateInput, GenerationOutcome, GenerationRequest, GenerationResult, ImageApi, ImageFormat,
    ImageSize, JobStatus, ValidatedInput,
};
