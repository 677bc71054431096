//! Market-price lookups through the generative-language oracle.
//!
//! [`PriceOracle`] renders the price prompt, makes exactly one backend call
//! and normalizes the result. Transport and parse failures come back as
//! [`PriceOutcome::Failed`]; only configuration problems surface as `Err`.

use crate::backend::{GeminiBackend, OracleBackend, OracleRequest};
use crate::config::GatewayConfig;
use crate::error::{GatewayError, Result};
use crate::parsing::{self, truncate_for_log};
use crate::prompt::build_price_prompt;
use crate::types::{PriceOutcome, PriceQuery};
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Client for oracle price estimates. No retries, no caching.
pub struct PriceOracle {
    client: Client,
    base_url: String,
    model: String,
    timeout: Duration,
    backend: Arc<dyn OracleBackend>,
}

impl PriceOracle {
    pub fn new(
        client: Client,
        base_url: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
        backend: Arc<dyn OracleBackend>,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            model: model.into(),
            timeout,
            backend,
        }
    }

    /// Build an oracle backed by Gemini from the gateway configuration.
    pub fn from_config(client: Client, config: &GatewayConfig) -> Self {
        Self::with_backend(
            client,
            config,
            Arc::new(GeminiBackend::from_key(config.api_key.clone())),
        )
    }

    /// Build an oracle from the gateway configuration with a custom backend.
    pub fn with_backend(client: Client, config: &GatewayConfig, backend: Arc<dyn OracleBackend>) -> Self {
        Self::new(
            client,
            config.oracle_url.clone(),
            config.oracle_model.clone(),
            config.oracle_timeout,
            backend,
        )
    }

    /// Look up the price for one query.
    pub async fn lookup(&self, query: &PriceQuery) -> Result<PriceOutcome> {
        let request = OracleRequest {
            model: self.model.clone(),
            prompt: build_price_prompt(query),
            timeout: self.timeout,
        };

        match self
            .backend
            .complete(&self.client, &self.base_url, &request)
            .await
        {
            Ok(response) => {
                debug!(
                    backend = self.backend.name(),
                    status = response.status,
                    metadata = ?response.metadata,
                    "oracle responded"
                );
                let outcome = parsing::normalize_price_text(&response.text);
                match &outcome {
                    PriceOutcome::Record(record) => {
                        let missing = record.missing_fields();
                        if !missing.is_empty() {
                            warn!(?missing, "oracle record is incomplete");
                        }
                        info!(
                            commodity = record.commodity().unwrap_or_default(),
                            market = record.market().unwrap_or_default(),
                            price = ?record.price(),
                            unit = record.unit().unwrap_or_default(),
                            "price estimate received"
                        )
                    }
                    PriceOutcome::Failed(_) => warn!(
                        raw = truncate_for_log(&response.text, 200),
                        "failed to parse oracle response"
                    ),
                }
                Ok(outcome)
            }
            Err(err @ (GatewayError::MissingApiKey | GatewayError::InvalidConfig(_))) => Err(err),
            Err(err) => {
                error!(backend = self.backend.name(), error = %err, "oracle request failed");
                Ok(parsing::normalize_transport_error(&err))
            }
        }
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }
}

impl std::fmt::Debug for PriceOracle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PriceOracle")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("timeout", &self.timeout)
            .field("backend", &self.backend.name())
            .finish()
    }
}
