//! Oracle backend trait and normalized request/response types.
//!
//! The [`OracleBackend`] trait abstracts over the generative-language
//! provider used for price estimates, translating a normalized
//! [`OracleRequest`] into the provider's HTTP API and returning the generated
//! text as an [`OracleResponse`].
//!
//! ```text
//! PriceOracle ──► OracleRequest ──► OracleBackend::complete() ──► OracleResponse
//!                                          │
//!                               ┌──────────┴──────────┐
//!                         GeminiBackend           MockBackend
//!                    :generateContent          canned responses
//! ```

pub mod gemini;
pub mod mock;

pub use gemini::GeminiBackend;
pub use mock::MockBackend;

use crate::error::Result;
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

/// A normalized oracle request.
#[derive(Debug, Clone)]
pub struct OracleRequest {
    /// Model identifier (e.g. `"gemini-2.0-flash"`).
    pub model: String,

    /// The full prompt text.
    pub prompt: String,

    /// Upper bound on the whole HTTP exchange.
    pub timeout: Duration,
}

/// A normalized oracle response.
#[derive(Debug)]
pub struct OracleResponse {
    /// The generated text content.
    pub text: String,

    /// HTTP status code (for diagnostics/logging).
    pub status: u16,

    /// Provider-specific metadata (token counts, model version).
    pub metadata: Option<serde_json::Value>,
}

/// Abstraction over generative-language providers.
///
/// This trait is object-safe and designed to be used as `Arc<dyn OracleBackend>`.
#[async_trait]
pub trait OracleBackend: Send + Sync {
    /// Execute one non-streaming completion.
    async fn complete(
        &self,
        client: &Client,
        base_url: &str,
        request: &OracleRequest,
    ) -> Result<OracleResponse>;

    /// Human-readable name for logging and diagnostics.
    fn name(&self) -> &'static str;
}
