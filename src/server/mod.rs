//! HTTP API: `POST /generate` and `GET /status`.
//!
//! Both routes are also served under `/api`. Every response carries the
//! same permissive CORS headers and `OPTIONS` always answers 200.

mod cors;
mod error;
mod handlers;

pub use error::{ApiError, Envelope};

use crate::config::RelayConfig;
use crate::error::Result;
use crate::image::providers::HordeJobTracker;
use crate::image::{JobTracker, ProviderRegistry};
use axum::{
    middleware::from_fn,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

/// Shared, immutable handler state.
#[derive(Clone)]
pub struct AppState {
    /// Providers for the generate route.
    pub providers: Arc<ProviderRegistry>,
    /// Job lookups for the status route.
    pub tracker: Arc<dyn JobTracker>,
}

impl AppState {
    /// Builds state from configuration, sharing one HTTP client.
    pub fn from_config(config: &RelayConfig) -> Self {
        let client = reqwest::Client::new();
        let providers = ProviderRegistry::from_config_with_client(config, client.clone());

        let mut tracker = HordeJobTracker::new(client)
            .with_api_key(config.horde_api_key.clone())
            .with_timeout(config.status_timeout);
        if let Some(url) = &config.horde_base_url {
            tracker = tracker.with_base_url(url.as_str());
        }

        Self {
            providers: Arc::new(providers),
            tracker: Arc::new(tracker),
        }
    }
}

/// Builds the router with CORS and request tracing.
pub fn build_router(state: AppState) -> Router {
    let api = Router::new()
        .route(
            "/generate",
            post(handlers::generate).fallback(handlers::generate_method_not_allowed),
        )
        .route(
            "/status",
            get(handlers::status).fallback(handlers::status_method_not_allowed),
        );

    Router::new()
        .route("/health", get(handlers::health))
        .merge(api.clone())
        .nest("/api", api)
        .with_state(state)
        .layer(from_fn(cors::cors_middleware))
        .layer(TraceLayer::new_for_http())
}

/// Binds the configured address and serves until Ctrl-C or SIGTERM.
pub async fn serve(config: RelayConfig) -> Result<()> {
    let state = AppState::from_config(&config);
    let configured = state.providers.configured();
    if configured.is_empty() {
        tracing::warn!("no provider API keys configured; generate requests will fail");
    }
    tracing::info!(providers = ?configured, "providers ready");

    let listener = TcpListener::bind(config.socket_addr()).await.map_err(|e| {
        tracing::error!("Failed to bind {}: {}", config.socket_addr(), e);
        e
    })?;
    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
