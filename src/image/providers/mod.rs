//! Image generation providers.

#[cfg(feature = "clipdrop")]
mod clipdrop;
#[cfg(feature = "horde")]
mod horde;
#[cfg(feature = "stability")]
mod stability;

#[cfg(feature = "clipdrop")]
pub use clipdrop::{ClipDropProvider, ClipDropProviderBuilder};

#[cfg(feature = "horde")]
pub use horde::{HordeJobTracker, HordeParams, HordeProvider, HordeProviderBuilder};

#[cfg(feature = "stability")]
pub use stability::{StabilityModel, StabilityProvider, StabilityProviderBuilder};
