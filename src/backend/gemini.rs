//! Backend for Google's Gemini `generateContent` API.
//!
//! Endpoint: `/v1beta/models/{model}:generateContent`.
//! Auth: `x-goog-api-key` header.
//! Response text lives at `candidates[0].content.parts[0].text`.

use super::{OracleBackend, OracleRequest, OracleResponse};
use crate::config::redact_key;
use crate::error::Result;
use crate::GatewayError;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::debug;

/// Header carrying the API key.
pub const API_KEY_HEADER: &str = "x-goog-api-key";

/// Text used when the provider returns no candidate text.
const EMPTY_CANDIDATE: &str = "{}";

/// Backend for the Gemini generative-language API.
///
/// # Example
///
/// ```
/// use agri_gateway::backend::GeminiBackend;
///
/// let backend = GeminiBackend::new().with_api_key("AIza...");
/// assert!(backend.has_api_key());
/// ```
#[derive(Clone, Default)]
pub struct GeminiBackend {
    pub(crate) api_key: Option<String>,
}

impl std::fmt::Debug for GeminiBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiBackend")
            .field("api_key", &self.api_key.as_deref().map(redact_key))
            .finish()
    }
}

impl GeminiBackend {
    /// Create a backend without a key. Calls fail with
    /// [`GatewayError::MissingApiKey`] until one is set.
    pub fn new() -> Self {
        Self { api_key: None }
    }

    /// Set the API key. An empty key counts as unset.
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        let key = key.into();
        self.api_key = if key.is_empty() { None } else { Some(key) };
        self
    }

    /// Create a backend from an optional key.
    pub fn from_key(key: Option<String>) -> Self {
        match key {
            Some(key) => Self::new().with_api_key(key),
            None => Self::new(),
        }
    }

    /// Returns `true` if an API key has been configured.
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    fn endpoint(base_url: &str, model: &str) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            base_url.trim_end_matches('/'),
            model
        )
    }

    /// Build the request body for `:generateContent`.
    fn build_body(request: &OracleRequest) -> Value {
        json!({
            "contents": [{ "parts": [{ "text": request.prompt }] }],
        })
    }

    fn build_http_request(
        client: &Client,
        url: &str,
        key: &str,
        body: &Value,
    ) -> reqwest::RequestBuilder {
        client.post(url).header(API_KEY_HEADER, key).json(body)
    }

    /// Text of the first part of the first candidate.
    fn extract_text(json_resp: &Value) -> String {
        json_resp
            .get("candidates")
            .and_then(|c| c.get(0))
            .and_then(|c| c.get("content"))
            .and_then(|c| c.get("parts"))
            .and_then(|p| p.get(0))
            .and_then(|p| p.get("text"))
            .and_then(|v| v.as_str())
            .filter(|t| !t.is_empty())
            .unwrap_or(EMPTY_CANDIDATE)
            .to_string()
    }

    fn extract_metadata(json_resp: &Value) -> Option<Value> {
        let mut meta = serde_json::Map::new();
        if let Some(v) = json_resp.get("usageMetadata") {
            meta.insert("usage".into(), v.clone());
        }
        if let Some(v) = json_resp.get("modelVersion") {
            meta.insert("model".into(), v.clone());
        }
        if meta.is_empty() {
            None
        } else {
            Some(Value::Object(meta))
        }
    }
}

#[async_trait]
impl OracleBackend for GeminiBackend {
    async fn complete(
        &self,
        client: &Client,
        base_url: &str,
        request: &OracleRequest,
    ) -> Result<OracleResponse> {
        let key = self.api_key.as_deref().ok_or(GatewayError::MissingApiKey)?;
        let url = Self::endpoint(base_url, &request.model);
        let body = Self::build_body(request);

        debug!(url = %url, model = %request.model, "calling gemini");
        let resp = Self::build_http_request(client, &url, key, &body)
            .timeout(request.timeout)
            .send()
            .await
            .map_err(|e| GatewayError::from_transport(e, &url, request.timeout))?;

        let status = resp.status().as_u16();

        if !resp.status().is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(GatewayError::HttpError { status, body: text });
        }

        let json_resp: Value = resp
            .json()
            .await
            .map_err(|e| GatewayError::from_transport(e, &url, request.timeout))?;

        Ok(OracleResponse {
            text: Self::extract_text(&json_resp),
            status,
            metadata: Self::extract_metadata(&json_resp),
        })
    }

    fn name(&self) -> &'static str {
        "gemini"
    }
}
