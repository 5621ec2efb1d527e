//! Maps each [`ImageApi`] to a configured provider.

use crate::config::RelayConfig;
use crate::error::Result;
use crate::image::provider::ImageProvider;
use crate::image::types::{GenerateInput, GenerationResult, ImageApi};
use std::collections::HashMap;
use std::sync::Arc;

/// Providers available to the relay, keyed by the `api` field.
///
/// A provider without a configured key is simply absent; asking for it
/// yields a missing-key error before any network call.
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    providers: HashMap<ImageApi, Arc<dyn ImageProvider>>,
}

impl ProviderRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds every provider whose key is configured, sharing one client.
    pub fn from_config(config: &RelayConfig) -> Self {
        Self::from_config_with_client(config, reqwest::Client::new())
    }

    /// Like [`from_config`](Self::from_config) with a caller-supplied client.
    #[allow(unused_mut, unused_variables)]
    pub fn from_config_with_client(config: &RelayConfig, client: reqwest::Client) -> Self {
        let mut registry = Self::new();

        #[cfg(feature = "horde")]
        if let Some(key) = config.api_key(ImageApi::Horde) {
            let mut builder = crate::image::providers::HordeProvider::builder()
                .api_key(key)
                .timeout(config.request_timeout)
                .client(client.clone());
            if let Some(url) = config.base_url(ImageApi::Horde) {
                builder = builder.base_url(url);
            }
            registry.insert_built(builder.build());
        }

        #[cfg(feature = "clipdrop")]
        if let Some(key) = config.api_key(ImageApi::Clipdrop) {
            let mut builder = crate::image::providers::ClipDropProvider::builder()
                .api_key(key)
                .timeout(config.request_timeout)
                .client(client.clone());
            if let Some(url) = config.base_url(ImageApi::Clipdrop) {
                builder = builder.base_url(url);
            }
            registry.insert_built(builder.build());
        }

        #[cfg(feature = "stability")]
        if let Some(key) = config.api_key(ImageApi::Stability) {
            let mut builder = crate::image::providers::StabilityProvider::builder()
                .api_key(key)
                .timeout(config.request_timeout)
                .client(client.clone());
            if let Some(url) = config.base_url(ImageApi::Stability) {
                builder = builder.base_url(url);
            }
            registry.insert_built(builder.build());
        }

        registry
    }

    #[allow(dead_code)]
    fn insert_built<P: ImageProvider + 'static>(&mut self, built: Result<P>) {
        match built {
            Ok(provider) => {
                self.register(Arc::new(provider));
            }
            Err(e) => tracing::warn!("skipping provider: {}", e),
        }
    }

    /// Adds or replaces the provider for its kind.
    pub fn register(&mut self, provider: Arc<dyn ImageProvider>) -> &mut Self {
        self.providers.insert(provider.kind(), provider);
        self
    }

    /// Returns the provider for `api`, or a missing-key error.
    pub fn get(&self, api: ImageApi) -> Result<Arc<dyn ImageProvider>> {
        self.providers
            .get(&api)
            .cloned()
            .ok_or_else(|| api.missing_key())
    }

    /// Returns true if `api` can be served.
    pub fn is_configured(&self, api: ImageApi) -> bool {
        self.providers.contains_key(&api)
    }

    /// Lists the configured providers in display order.
    pub fn configured(&self) -> Vec<ImageApi> {
        ImageApi::ALL
            .into_iter()
            .filter(|api| self.is_configured(*api))
            .collect()
    }

    /// Validates a generate call and routes it to one provider.
    ///
    /// Missing fields and bad sizes fail first, then an unknown `api`, then
    /// a missing key. None of these reach the network.
    pub async fn dispatch(&self, input: GenerateInput) -> Result<GenerationResult> {
        let validated = input.validate()?;
        let api: ImageApi = validated.api.parse()?;
        let provider = self.get(api)?;

        tracing::info!(
            api = %api,
            width = validated.request.width,
            height = validated.request.height,
            "dispatching generation request"
        );

        let outcome = provider
            .generate(&validated.request)
            .await
            .map_err(|e| e.with_provider(api))?;

        Ok(GenerationResult::new(api, outcome))
    }
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("providers", &self.configured())
            .finish()
    }
}
