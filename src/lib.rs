//! # Agri Gateway
//!
//! A stateless HTTP gateway in front of an agronomy inference service and a
//! generative-language price oracle.
//!
//! ## Core Concepts
//!
//! - **[`InferenceService`]**: forwards crop and yield feature maps as JSON
//!   and leaf images as multipart uploads. [`HttpInferenceClient`] is the
//!   production implementation.
//! - **[`PriceOracle`]**: asks an [`OracleBackend`](backend::OracleBackend)
//!   for a market price and normalizes the free-form answer into a
//!   [`PriceRecord`] or a [`NormalizedError`].
//! - **[`GatewayConfig`]**: everything read from the environment, loaded
//!   once at startup.
//! - **[`build_router`]** / **[`serve`]**: the axum surface.
//!
//! ## Quick Start
//!
//! ```no_run
//! use agri_gateway::GatewayConfig;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = GatewayConfig::builder()
//!         .port(4000)
//!         .inference_url("http://localhost:5000")
//!         .api_key("AIza...")
//!         .build();
//!     agri_gateway::serve(config).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Testing without a provider
//!
//! ```
//! use agri_gateway::backend::MockBackend;
//! use agri_gateway::{AppState, GatewayConfig};
//! use std::sync::Arc;
//!
//! let dir = std::env::temp_dir().join("agri-gateway-doc");
//! let state = AppState::builder(GatewayConfig::builder().upload_dir(&dir).build())
//!     .oracle_backend(Arc::new(MockBackend::fixed("{}")))
//!     .build()
//!     .unwrap();
//! let _router = agri_gateway::build_router(state);
//! ```

pub mod backend;
pub mod config;
pub mod error;
pub mod gateway;
pub mod inference;
pub mod oracle;
pub mod parsing;
pub mod prompt;
pub mod types;

#[cfg(test)]
mod test_support;

pub use backend::{GeminiBackend, MockBackend};
pub use config::{GatewayConfig, GatewayConfigBuilder};
pub use error::{GatewayError, Result};
pub use gateway::{build_router, serve, AppState, AppStateBuilder};
pub use inference::{HttpInferenceClient, InferenceService};
pub use oracle::PriceOracle;
pub use types::{
    ImageUpload, NormalizedError, PredictionKind, PredictionRequest, PriceOutcome, PriceQuery,
    PriceRecord,
};
