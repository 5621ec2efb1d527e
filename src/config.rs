//! Process-wide configuration, loaded once at startup.

use crate::error::{RelayError, Result};
use crate::image::ImageApi;
use std::env;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

/// Default port when `PORT` is unset.
pub const DEFAULT_PORT: u16 = 3000;

/// Relay configuration.
///
/// API keys are optional here: a missing key only fails requests routed
/// to that provider.
#[derive(Clone)]
pub struct RelayConfig {
    /// `AI_HORDE_API_KEY`.
    pub horde_api_key: Option<String>,
    /// `CLIPDROP_API_KEY`.
    pub clipdrop_api_key: Option<String>,
    /// `STABILITY_AI_API_KEY`.
    pub stability_api_key: Option<String>,
    /// Endpoint overrides; `None` uses the public APIs.
    pub horde_base_url: Option<String>,
    /// See `horde_base_url`.
    pub clipdrop_base_url: Option<String>,
    /// See `horde_base_url`.
    pub stability_base_url: Option<String>,
    /// Timeout for generation calls.
    pub request_timeout: Duration,
    /// Timeout for each status poll call.
    pub status_timeout: Duration,
    /// Listen address.
    pub bind: IpAddr,
    /// Listen port.
    pub port: u16,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            horde_api_key: None,
            clipdrop_api_key: None,
            stability_api_key: None,
            horde_base_url: None,
            clipdrop_base_url: None,
            stability_base_url: None,
            request_timeout: Duration::from_secs(30),
            status_timeout: Duration::from_secs(10),
            bind: IpAddr::from([0, 0, 0, 0]),
            port: DEFAULT_PORT,
        }
    }
}

// Keys stay out of logs.
impl std::fmt::Debug for RelayConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let redact = |k: &Option<String>| k.as_ref().map(|_| "<redacted>");
        f.debug_struct("RelayConfig")
            .field("horde_api_key", &redact(&self.horde_api_key))
            .field("clipdrop_api_key", &redact(&self.clipdrop_api_key))
            .field("stability_api_key", &redact(&self.stability_api_key))
            .field("horde_base_url", &self.horde_base_url)
            .field("clipdrop_base_url", &self.clipdrop_base_url)
            .field("stability_base_url", &self.stability_base_url)
            .field("request_timeout", &self.request_timeout)
            .field("status_timeout", &self.status_timeout)
            .field("bind", &self.bind)
            .field("port", &self.port)
            .finish()
    }
}

impl RelayConfig {
    /// Creates a configuration with defaults and no keys.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from the environment, reading `.env` if present.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Loads configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        let secs = |key: &str, default: Duration| -> Result<Duration> {
            match get(key) {
                Some(v) => v
                    .trim()
                    .parse::<u64>()
                    .ok()
                    .filter(|s| *s > 0)
                    .map(Duration::from_secs)
                    .ok_or_else(|| {
                        RelayError::Config(format!("{} must be a positive number of seconds", key))
                    }),
                None => Ok(default),
            }
        };

        let port = match get("PORT") {
            Some(v) => v
                .trim()
                .parse::<u16>()
                .map_err(|_| RelayError::Config("PORT is not a valid u16".into()))?,
            None => defaults.port,
        };

        let bind = match get("PIXELRELAY_BIND") {
            Some(v) => v
                .trim()
                .parse::<IpAddr>()
                .map_err(|_| RelayError::Config(format!("PIXELRELAY_BIND is not an IP: {}", v)))?,
            None => defaults.bind,
        };

        Ok(Self {
            horde_api_key: get(ImageApi::Horde.key_env_var()),
            clipdrop_api_key: get(ImageApi::Clipdrop.key_env_var()),
            stability_api_key: get(ImageApi::Stability.key_env_var()),
            horde_base_url: get("AI_HORDE_BASE_URL"),
            clipdrop_base_url: get("CLIPDROP_BASE_URL"),
            stability_base_url: get("STABILITY_BASE_URL"),
            request_timeout: secs("PIXELRELAY_REQUEST_TIMEOUT_SECS", defaults.request_timeout)?,
            status_timeout: secs("PIXELRELAY_STATUS_TIMEOUT_SECS", defaults.status_timeout)?,
            bind,
            port,
        })
    }

    /// Sets the key for one provider.
    pub fn with_api_key(mut self, api: ImageApi, key: impl Into<String>) -> Self {
        let key = Some(key.into());
        match api {
            ImageApi::Horde => self.horde_api_key = key,
            ImageApi::Clipdrop => self.clipdrop_api_key = key,
            ImageApi::Stability => self.stability_api_key = key,
        }
        self
    }

    /// Points one provider at a different API root.
    pub fn with_base_url(mut self, api: ImageApi, url: impl Into<String>) -> Self {
        let url = Some(url.into());
        match api {
            ImageApi::Horde => self.horde_base_url = url,
            ImageApi::Clipdrop => self.clipdrop_base_url = url,
            ImageApi::Stability => self.stability_base_url = url,
        }
        self
    }

    /// Sets the generation and status timeouts.
    pub fn with_timeouts(mut self, request: Duration, status: Duration) -> Self {
        self.request_timeout = request;
        self.status_timeout = status;
        self
    }

    /// Sets the listen port.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Returns the configured key for a provider.
    pub fn api_key(&self, api: ImageApi) -> Option<&str> {
        match api {
            ImageApi::Horde => self.horde_api_key.as_deref(),
            ImageApi::Clipdrop => self.clipdrop_api_key.as_deref(),
            ImageApi::Stability => self.stability_api_key.as_deref(),
        }
    }

    /// Returns the endpoint override for a provider.
    pub fn base_url(&self, api: ImageApi) -> Option<&str> {
        match api {
            ImageApi::Horde => self.horde_base_url.as_deref(),
            ImageApi::Clipdrop => self.clipdrop_base_url.as_deref(),
            ImageApi::Stability => self.stability_base_url.as_deref(),
        }
    }

    /// Returns the address to listen on.
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_without_variables() {
        let config = RelayConfig::from_lookup(lookup(&[])).unwrap();
        assert!(config.horde_api_key.is_none());
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.request_timeout, Duration::from_secs(30));
        assert_eq!(config.status_timeout, Duration::from_secs(10));
        assert_eq!(config.socket_addr().to_string(), "0.0.0.0:3000");
    }

    #[test]
    fn test_reads_keys_and_overrides() {
        let config = RelayConfig::from_lookup(lookup(&[
            ("AI_HORDE_API_KEY", "horde-key"),
            ("CLIPDROP_API_KEY", ""),
            ("STABILITY_AI_API_KEY", "sk-stab"),
            ("STABILITY_BASE_URL", "http://127.0.0.1:9999"),
            ("PORT", "8080"),
            ("PIXELRELAY_BIND", "127.0.0.1"),
            ("PIXELRELAY_STATUS_TIMEOUT_SECS", "15"),
        ]))
        .unwrap();

        assert_eq!(config.api_key(ImageApi::Horde), Some("horde-key"));
        assert_eq!(config.api_key(ImageApi::Clipdrop), None);
        assert_eq!(config.api_key(ImageApi::Stability), Some("sk-stab"));
        assert_eq!(
            config.base_url(ImageApi::Stability),
            Some("http://127.0.0.1:9999")
        );
        assert_eq!(config.socket_addr().to_string(), "127.0.0.1:8080");
        assert_eq!(config.status_timeout, Duration::from_secs(15));
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(RelayConfig::from_lookup(lookup(&[("PORT", "eighty")])).is_err());
        assert!(RelayConfig::from_lookup(lookup(&[("PIXELRELAY_BIND", "localhost")])).is_err());
        assert!(
            RelayConfig::from_lookup(lookup(&[("PIXELRELAY_REQUEST_TIMEOUT_SECS", "0")])).is_err()
        );
    }

    #[test]
    fn test_debug_redacts_keys() {
        let config = RelayConfig::new().with_api_key(ImageApi::Clipdrop, "super-secret");
        let debug = format!("{:?}", config);
        assert!(!debug.contains("super-secret"));
        assert!(debug.contains("<redacted>"));
    }
}
