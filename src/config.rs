//! Gateway configuration.
//!
//! [`GatewayConfig`] is built once at process start, either from the
//! environment ([`GatewayConfig::from_env`], or [`GatewayConfig::load`] to
//! pick up a `.env` file first) or explicitly through
//! [`GatewayConfig::builder`], and handed to every component. Nothing reads
//! the environment after startup.

use crate::error::{GatewayError, Result};
use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 4000;
pub const DEFAULT_INFERENCE_URL: &str = "http://localhost:5000";
pub const DEFAULT_ORACLE_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_ORACLE_MODEL: &str = "gemini-2.0-flash";
pub const DEFAULT_UPLOAD_DIR: &str = "uploads";
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 16 * 1024 * 1024;

const DEFAULT_INFERENCE_TIMEOUT: Duration = Duration::from_secs(20);
const DEFAULT_DISEASE_TIMEOUT: Duration = Duration::from_secs(60);
const DEFAULT_ORACLE_TIMEOUT: Duration = Duration::from_secs(30);

/// Runtime configuration for the gateway and its upstream clients.
///
/// # Example
///
/// ```
/// use agri_gateway::GatewayConfig;
/// use std::time::Duration;
///
/// let config = GatewayConfig::builder()
///     .port(8080)
///     .inference_url("http://ml.internal:5000/")
///     .inference_timeout(Duration::from_secs(10))
///     .build();
/// assert_eq!(config.inference_url, "http://ml.internal:5000");
/// ```
#[derive(Clone)]
pub struct GatewayConfig {
    /// Interface the HTTP server binds to.
    pub host: String,
    /// Port the HTTP server binds to. `0` picks a free port.
    pub port: u16,
    /// Base URL of the inference service (crop, yield, disease).
    pub inference_url: String,
    /// Base URL of the generative-language API.
    pub oracle_url: String,
    /// Model name used for price estimates.
    pub oracle_model: String,
    /// API key for the generative-language API. Sent as `x-goog-api-key`.
    pub api_key: Option<String>,
    /// Time budget for the JSON inference endpoints. Default: 20 seconds.
    pub inference_timeout: Duration,
    /// Time budget for the image inference endpoint. Default: 60 seconds.
    pub disease_timeout: Duration,
    /// Time budget for one oracle call. Default: 30 seconds.
    pub oracle_timeout: Duration,
    /// Directory holding transient uploads.
    pub upload_dir: PathBuf,
    /// Largest accepted disease-detection request body.
    pub max_upload_bytes: usize,
    /// Answer failed price lookups with `200 {record: <error>}` instead of
    /// an error status.
    pub legacy_price_errors: bool,
}

impl GatewayConfig {
    /// Create a builder seeded with the defaults.
    pub fn builder() -> GatewayConfigBuilder {
        GatewayConfigBuilder {
            config: GatewayConfig::default(),
        }
    }

    /// Load a `.env` file from the working directory (or a parent) if one
    /// exists, then read the environment. Variables already set win.
    pub fn load() -> Result<Self> {
        match dotenv::dotenv() {
            Ok(path) => debug!(path = %path.display(), "loaded .env"),
            Err(e) if e.not_found() => {}
            Err(e) => return Err(GatewayError::InvalidConfig(format!(".env: {e}"))),
        }
        Self::from_env()
    }

    /// Like [`load`](Self::load), with an explicit env file that must exist.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        dotenv::from_path(path)
            .map_err(|e| GatewayError::InvalidConfig(format!("{}: {e}", path.display())))?;
        Self::from_env()
    }

    /// Load configuration from process environment variables.
    ///
    /// Unset variables fall back to the defaults; set-but-unparseable numeric
    /// or boolean values are rejected with [`GatewayError::InvalidConfig`].
    pub fn from_env() -> Result<Self> {
        let mut builder = Self::builder();

        if let Some(host) = env_string("HOST") {
            builder = builder.host(host);
        }
        if let Some(port) = env_parse::<u16>("PORT")? {
            builder = builder.port(port);
        }
        if let Some(url) = env_string("INFERENCE_URL") {
            builder = builder.inference_url(url);
        }
        if let Some(url) = env_string("GEMINI_BASE_URL") {
            builder = builder.oracle_url(url);
        }
        if let Some(model) = env_string("GEMINI_MODEL") {
            builder = builder.oracle_model(model);
        }
        if let Some(key) = env_string("GEMINI_API_KEY") {
            builder = builder.api_key(key);
        }
        if let Some(secs) = env_parse::<u64>("INFERENCE_TIMEOUT_SECS")? {
            builder = builder.inference_timeout(Duration::from_secs(secs));
        }
        if let Some(secs) = env_parse::<u64>("DISEASE_TIMEOUT_SECS")? {
            builder = builder.disease_timeout(Duration::from_secs(secs));
        }
        if let Some(secs) = env_parse::<u64>("ORACLE_TIMEOUT_SECS")? {
            builder = builder.oracle_timeout(Duration::from_secs(secs));
        }
        if let Some(dir) = env_string("UPLOAD_DIR") {
            builder = builder.upload_dir(dir);
        }
        if let Some(limit) = env_parse::<usize>("MAX_UPLOAD_BYTES")? {
            builder = builder.max_upload_bytes(limit);
        }
        if let Some(legacy) = env_parse::<bool>("LEGACY_PRICE_ERRORS")? {
            builder = builder.legacy_price_errors(legacy);
        }

        Ok(builder.build())
    }

    /// `host:port` string suitable for binding a listener.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Returns `true` if an oracle API key has been configured.
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            inference_url: DEFAULT_INFERENCE_URL.to_string(),
            oracle_url: DEFAULT_ORACLE_URL.to_string(),
            oracle_model: DEFAULT_ORACLE_MODEL.to_string(),
            api_key: None,
            inference_timeout: DEFAULT_INFERENCE_TIMEOUT,
            disease_timeout: DEFAULT_DISEASE_TIMEOUT,
            oracle_timeout: DEFAULT_ORACLE_TIMEOUT,
            upload_dir: PathBuf::from(DEFAULT_UPLOAD_DIR),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            legacy_price_errors: false,
        }
    }
}

impl std::fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("inference_url", &self.inference_url)
            .field("oracle_url", &self.oracle_url)
            .field("oracle_model", &self.oracle_model)
            .field("api_key", &self.api_key.as_ref().map(|k| redact_key(k)))
            .field("inference_timeout", &self.inference_timeout)
            .field("disease_timeout", &self.disease_timeout)
            .field("oracle_timeout", &self.oracle_timeout)
            .field("upload_dir", &self.upload_dir)
            .field("max_upload_bytes", &self.max_upload_bytes)
            .field("legacy_price_errors", &self.legacy_price_errors)
            .finish()
    }
}

/// Builder for [`GatewayConfig`].
#[derive(Debug, Clone)]
pub struct GatewayConfigBuilder {
    config: GatewayConfig,
}

impl GatewayConfigBuilder {
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.config.host = host.into();
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    pub fn inference_url(mut self, url: impl Into<String>) -> Self {
        self.config.inference_url = url.into();
        self
    }

    pub fn oracle_url(mut self, url: impl Into<String>) -> Self {
        self.config.oracle_url = url.into();
        self
    }

    pub fn oracle_model(mut self, model: impl Into<String>) -> Self {
        self.config.oracle_model = model.into();
        self
    }

    /// Set the oracle API key. An empty key counts as unset.
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        let key = key.into();
        self.config.api_key = if key.is_empty() { None } else { Some(key) };
        self
    }

    pub fn inference_timeout(mut self, timeout: Duration) -> Self {
        self.config.inference_timeout = timeout;
        self
    }

    pub fn disease_timeout(mut self, timeout: Duration) -> Self {
        self.config.disease_timeout = timeout;
        self
    }

    pub fn oracle_timeout(mut self, timeout: Duration) -> Self {
        self.config.oracle_timeout = timeout;
        self
    }

    pub fn upload_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.upload_dir = dir.into();
        self
    }

    pub fn max_upload_bytes(mut self, limit: usize) -> Self {
        self.config.max_upload_bytes = limit;
        self
    }

    pub fn legacy_price_errors(mut self, enabled: bool) -> Self {
        self.config.legacy_price_errors = enabled;
        self
    }

    /// Build the configuration, normalizing the upstream base URLs.
    pub fn build(self) -> GatewayConfig {
        let mut config = self.config;
        config.inference_url = normalize_base_url(&config.inference_url, &["/api"]);
        config.oracle_url = normalize_base_url(&config.oracle_url, &["/v1beta/models", "/v1beta"]);
        config
    }
}

/// Strip trailing slashes and known API path suffixes from a base URL.
/// Clients append their own paths, so a configured `/api` would double up.
fn normalize_base_url(url: &str, suffixes: &[&str]) -> String {
    let trimmed = url.trim().trim_end_matches('/');
    for suffix in suffixes {
        if let Some(stripped) = trimmed.strip_suffix(suffix) {
            return stripped.to_string();
        }
    }
    trimmed.to_string()
}

/// Keep the first few characters of a secret for log lines.
pub(crate) fn redact_key(key: &str) -> String {
    const VISIBLE: usize = 6;
    if key.chars().count() > VISIBLE {
        format!("{}***", key.chars().take(VISIBLE).collect::<String>())
    } else {
        "***".to_string()
    }
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn env_parse<T>(key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: Display,
{
    match env_string(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| GatewayError::InvalidConfig(format!("{key}={raw:?}: {e}"))),
        None => Ok(None),
    }
}
