use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

/// Errors produced by the gateway and its upstream clients.
#[derive(Error, Debug)]
pub enum GatewayError {
    /// Low-level HTTP transport failure (connection refused, reset, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Local file handling failed (upload storage).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// An outbound call exceeded its time budget.
    #[error("request to {url} timed out after {timeout:?}")]
    Timeout { url: String, timeout: Duration },

    /// The inference service answered with a non-success status.
    ///
    /// `body` is the upstream response body (JSON when it parses, otherwise
    /// the raw text) and is forwarded to the caller as-is.
    #[error("upstream returned HTTP {status}")]
    Upstream { status: u16, body: Value },

    /// The oracle provider answered with a non-success status.
    #[error("HTTP {status}: {body}")]
    HttpError { status: u16, body: String },

    /// No generative-language API key is configured.
    #[error("Missing GEMINI_API_KEY in environment variables")]
    MissingApiKey,

    /// Invalid configuration detected at startup.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The client sent an incomplete or malformed request.
    #[error("{0}")]
    BadRequest(String),

    /// Catch-all for other errors.
    #[error("{0}")]
    Other(String),
}

impl GatewayError {
    /// Classify a reqwest failure, promoting timeouts to [`GatewayError::Timeout`].
    pub fn from_transport(err: reqwest::Error, url: &str, timeout: Duration) -> Self {
        if err.is_timeout() {
            GatewayError::Timeout {
                url: url.to_string(),
                timeout,
            }
        } else {
            GatewayError::Request(err)
        }
    }

    /// The value placed under `error` in a response envelope.
    ///
    /// Upstream bodies are forwarded verbatim; everything else becomes its
    /// display message.
    pub fn error_body(&self) -> Value {
        match self {
            GatewayError::Upstream { body, .. } => body.clone(),
            other => Value::String(other.to_string()),
        }
    }

    /// Provider response attached to an error, if there was one.
    pub fn details(&self) -> Option<Value> {
        match self {
            GatewayError::Upstream { body, .. } => Some(body.clone()),
            GatewayError::HttpError { body, .. } => Some(
                serde_json::from_str(body).unwrap_or_else(|_| Value::String(body.clone())),
            ),
            _ => None,
        }
    }

    /// Whether this error was caused by the client rather than an upstream.
    pub fn is_client_error(&self) -> bool {
        matches!(self, GatewayError::BadRequest(_))
    }
}

pub type Result<T> = std::result::Result<T, GatewayError>;
