//! The HTTP surface.
//!
//! | Method | Path | Upstream |
//! |---|---|---|
//! | `GET` | `/` | none |
//! | `POST` | `/predict-crop` | inference `/api/predict_crop` |
//! | `POST` | `/predict-yield` | inference `/api/predict_yield` |
//! | `POST` | `/predict-disease` | inference `/api/predict_disease` |
//! | `GET` | `/market-prices` | price oracle |
//!
//! Every route is stateless; [`AppState`] only holds immutable clients and
//! settings shared behind `Arc`.

pub mod extract;
pub mod handlers;
pub mod response;

use crate::backend::OracleBackend;
use crate::config::GatewayConfig;
use crate::error::Result;
use crate::inference::{HttpInferenceClient, InferenceService};
use crate::oracle::PriceOracle;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use reqwest::Client;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub inference: Arc<dyn InferenceService>,
    pub oracle: Arc<PriceOracle>,
    pub upload_dir: Arc<PathBuf>,
    pub port: u16,
    pub legacy_price_errors: bool,
    pub max_upload_bytes: usize,
}

impl AppState {
    /// Create a builder from a configuration.
    pub fn builder(config: GatewayConfig) -> AppStateBuilder {
        AppStateBuilder {
            config,
            client: None,
            inference: None,
            oracle_backend: None,
        }
    }

    /// Build state with the HTTP inference client and the Gemini oracle.
    pub fn from_config(config: GatewayConfig) -> Result<Self> {
        Self::builder(config).build()
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("inference", &self.inference.name())
            .field("oracle", &self.oracle)
            .field("upload_dir", &self.upload_dir)
            .field("port", &self.port)
            .field("legacy_price_errors", &self.legacy_price_errors)
            .field("max_upload_bytes", &self.max_upload_bytes)
            .finish()
    }
}

/// Builder for [`AppState`].
pub struct AppStateBuilder {
    config: GatewayConfig,
    client: Option<Client>,
    inference: Option<Arc<dyn InferenceService>>,
    oracle_backend: Option<Arc<dyn OracleBackend>>,
}

impl AppStateBuilder {
    /// Set the HTTP client shared by the upstream clients.
    pub fn client(mut self, client: Client) -> Self {
        self.client = Some(client);
        self
    }

    /// Replace the inference client. Default: [`HttpInferenceClient`].
    pub fn inference(mut self, inference: Arc<dyn InferenceService>) -> Self {
        self.inference = Some(inference);
        self
    }

    /// Replace the oracle backend. Default: [`GeminiBackend`](crate::backend::GeminiBackend).
    pub fn oracle_backend(mut self, backend: Arc<dyn OracleBackend>) -> Self {
        self.oracle_backend = Some(backend);
        self
    }

    /// Build the state, creating the upload directory if needed.
    pub fn build(self) -> Result<AppState> {
        let config = self.config;
        std::fs::create_dir_all(&config.upload_dir)?;

        // Per-call timeouts are set on each request.
        let client = match self.client {
            Some(client) => client,
            None => Client::builder().build()?,
        };

        let inference = self
            .inference
            .unwrap_or_else(|| Arc::new(HttpInferenceClient::from_config(client.clone(), &config)));
        let oracle = match self.oracle_backend {
            Some(backend) => PriceOracle::with_backend(client, &config, backend),
            None => PriceOracle::from_config(client, &config),
        };

        Ok(AppState {
            inference,
            oracle: Arc::new(oracle),
            upload_dir: Arc::new(config.upload_dir),
            port: config.port,
            legacy_price_errors: config.legacy_price_errors,
            max_upload_bytes: config.max_upload_bytes,
        })
    }
}

/// Assemble the gateway routes.
pub fn build_router(state: AppState) -> Router {
    let upload_limit = DefaultBodyLimit::max(state.max_upload_bytes);
    Router::new()
        .route("/", get(handlers::status))
        .route("/predict-crop", post(handlers::predict_crop))
        .route("/predict-yield", post(handlers::predict_yield))
        .route(
            "/predict-disease",
            post(handlers::predict_disease).layer(upload_limit),
        )
        .route("/market-prices", get(handlers::market_prices))
        .fallback(handlers::not_found)
        .with_state(state)
}

/// Bind and serve until Ctrl-C or SIGTERM.
pub async fn serve(config: GatewayConfig) -> Result<()> {
    if !config.has_api_key() {
        warn!("GEMINI_API_KEY is not set; /market-prices will fail until it is configured");
    }

    let bind_address = config.bind_address();
    let state = AppState::from_config(config)?;
    let listener = tokio::net::TcpListener::bind(&bind_address).await?;
    let local_addr = listener.local_addr()?;
    info!(address = %local_addr, ?state, "gateway listening");

    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("gateway stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for Ctrl-C");
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
                warn!(error = %e, "failed to listen for SIGTERM");
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
    info!("shutdown signal received");
}
