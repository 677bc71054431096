//! Client for the upstream inference service.
//!
//! Crop and yield predictions are JSON pass-throughs; disease detection
//! re-encodes the uploaded image as multipart field `img`. Upstream bodies
//! come back verbatim on success and inside [`GatewayError::Upstream`] on
//! failure.

use crate::config::GatewayConfig;
use crate::error::{GatewayError, Result};
use crate::types::{ImageUpload, PredictionKind, PredictionRequest};
use async_trait::async_trait;
use futures::Stream;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde_json::Value;
use std::time::{Duration, Instant};
use tokio::io::AsyncReadExt;
use tracing::{debug, info};

/// Path of the disease-detection endpoint.
pub const DISEASE_PATH: &str = "/api/predict_disease";
/// Multipart field the inference service reads the image from.
pub const DISEASE_FIELD: &str = "img";

const UPLOAD_CHUNK_SIZE: usize = 64 * 1024;

/// The inference service as seen by the gateway.
///
/// Object-safe; the gateway holds it as `Arc<dyn InferenceService>` so tests
/// can swap in a fake.
#[async_trait]
pub trait InferenceService: Send + Sync {
    /// Forward a crop or yield prediction request unchanged.
    async fn predict(&self, kind: PredictionKind, request: &PredictionRequest) -> Result<Value>;

    /// Forward an uploaded leaf image for disease classification.
    async fn predict_disease(&self, upload: &ImageUpload) -> Result<Value>;

    /// Human-readable name for logging.
    fn name(&self) -> &'static str;
}

/// HTTP implementation of [`InferenceService`].
#[derive(Debug, Clone)]
pub struct HttpInferenceClient {
    client: Client,
    base_url: String,
    json_timeout: Duration,
    image_timeout: Duration,
}

impl HttpInferenceClient {
    pub fn new(
        client: Client,
        base_url: impl Into<String>,
        json_timeout: Duration,
        image_timeout: Duration,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            json_timeout,
            image_timeout,
        }
    }

    pub fn from_config(client: Client, config: &GatewayConfig) -> Self {
        Self::new(
            client,
            config.inference_url.clone(),
            config.inference_timeout,
            config.disease_timeout,
        )
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    /// Send a prepared request and classify the result.
    async fn send(&self, request: RequestBuilder, url: &str, timeout: Duration) -> Result<Value> {
        let started = Instant::now();
        let resp = request
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| GatewayError::from_transport(e, url, timeout))?;

        let status = resp.status();
        let bytes = resp
            .bytes()
            .await
            .map_err(|e| GatewayError::from_transport(e, url, timeout))?;

        debug!(
            url = %url,
            status = status.as_u16(),
            bytes = bytes.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "inference service responded"
        );

        if !status.is_success() {
            return Err(GatewayError::Upstream {
                status: status.as_u16(),
                body: upstream_error_body(status, &bytes),
            });
        }

        Ok(body_to_value(&bytes))
    }
}

#[async_trait]
impl InferenceService for HttpInferenceClient {
    async fn predict(&self, kind: PredictionKind, request: &PredictionRequest) -> Result<Value> {
        let url = self.url(kind.path());
        info!(kind = kind.name(), fields = request.len(), "forwarding prediction");
        let builder = self.client.post(&url).json(request);
        self.send(builder, &url, self.json_timeout).await
    }

    async fn predict_disease(&self, upload: &ImageUpload) -> Result<Value> {
        let url = self.url(DISEASE_PATH);
        let file = tokio::fs::File::open(upload.path()).await?;
        let length = file.metadata().await?.len();

        info!(
            file_name = %upload.file_name(),
            content_type = %upload.content_type(),
            bytes = length,
            "forwarding disease image"
        );

        let part = Part::stream_with_length(reqwest::Body::wrap_stream(file_chunks(file)), length)
            .file_name(upload.file_name().to_string())
            .mime_str(upload.content_type())?;
        let form = Form::new().part(DISEASE_FIELD, part);

        let builder = self.client.post(&url).multipart(form);
        self.send(builder, &url, self.image_timeout).await
    }

    fn name(&self) -> &'static str {
        "http"
    }
}

/// Read a file as a stream of chunks.
fn file_chunks(file: tokio::fs::File) -> impl Stream<Item = std::io::Result<Vec<u8>>> + Send + 'static {
    futures::stream::try_unfold(file, |mut file| async move {
        let mut buf = vec![0u8; UPLOAD_CHUNK_SIZE];
        let n = file.read(&mut buf).await?;
        if n == 0 {
            return Ok(None);
        }
        buf.truncate(n);
        Ok(Some((buf, file)))
    })
}

/// Interpret a success body: JSON when it parses, otherwise the text.
fn body_to_value(bytes: &[u8]) -> Value {
    serde_json::from_slice(bytes)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(bytes).into_owned()))
}

/// Interpret an error body. Empty bodies are replaced by a status message.
fn upstream_error_body(status: StatusCode, bytes: &[u8]) -> Value {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Value::String(format!(
            "Request failed with status code {}",
            status.as_u16()
        ));
    }
    body_to_value(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{spawn_server, unused_addr};
    use axum::extract::Multipart;
    use axum::{http::StatusCode as AxumStatus, routing::post, Json, Router};
    use serde_json::json;
    use std::io::Write;

    async fn echo_crop(Json(body): Json<Value>) -> Json<Value> {
        Json(json!({"prediction": "Rice", "received": body}))
    }

    async fn failing_yield() -> (AxumStatus, Json<Value>) {
        (AxumStatus::UNPROCESSABLE_ENTITY, Json(json!({"error": "Area must be numeric"})))
    }

    async fn disease(mut multipart: Multipart) -> Json<Value> {
        while let Some(field) = multipart.next_field().await.unwrap() {
            if field.name() == Some(DISEASE_FIELD) {
                let file_name = field.file_name().map(String::from);
                let content_type = field.content_type().map(String::from);
                let bytes = field.bytes().await.unwrap();
                return Json(json!({
                    "file_name": file_name,
                    "content_type": content_type,
                    "size": bytes.len(),
                }));
            }
        }
        Json(json!({"error": "no img"}))
    }

    async fn upstream() -> String {
        let router = Router::new()
            .route("/api/predict_crop", post(echo_crop))
            .route("/api/predict_yield", post(failing_yield))
            .route(DISEASE_PATH, post(disease));
        format!("http://{}", spawn_server(router).await)
    }

    fn client(base: &str) -> HttpInferenceClient {
        HttpInferenceClient::new(Client::new(), base, Duration::from_secs(5), Duration::from_secs(5))
    }

    fn request() -> PredictionRequest {
        let mut fields = serde_json::Map::new();
        fields.insert("Nitrogen".into(), json!(90));
        fields.insert("Ph".into(), json!("6.5"));
        PredictionRequest::new(fields)
    }

    #[tokio::test]
    async fn test_predict_forwards_body_unchanged() {
        let base = upstream().await;
        let value = client(&base)
            .predict(PredictionKind::Crop, &request())
            .await
            .expect("prediction");
        assert_eq!(value["prediction"], "Rice");
        assert_eq!(value["received"], json!({"Nitrogen": 90, "Ph": "6.5"}));
    }

    #[tokio::test]
    async fn test_predict_forwards_upstream_error_body() {
        let base = upstream().await;
        match client(&base).predict(PredictionKind::Yield, &request()).await {
            Err(GatewayError::Upstream { status, body }) => {
                assert_eq!(status, 422);
                assert_eq!(body, json!({"error": "Area must be numeric"}));
            }
            other => panic!("expected upstream error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_predict_connection_refused() {
        let base = format!("http://{}", unused_addr());
        let err = client(&base)
            .predict(PredictionKind::Crop, &request())
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::Request(_)));
    }

    #[tokio::test]
    async fn test_predict_disease_sends_multipart_img() {
        let base = upstream().await;
        let dir = tempfile::tempdir().unwrap();
        let mut file = tempfile::NamedTempFile::new_in(dir.path()).unwrap();
        file.write_all(&[0xFF, 0xD8, 0xFF, 0xE0, 1, 2, 3]).unwrap();
        let upload = ImageUpload::new(file.into_temp_path(), "leaf.jpg".into(), "image/jpeg".into(), 7);

        let value = client(&base).predict_disease(&upload).await.expect("prediction");
        assert_eq!(value["file_name"], "leaf.jpg");
        assert_eq!(value["content_type"], "image/jpeg");
        assert_eq!(value["size"], 7);
    }

    #[test]
    fn test_upstream_error_body_empty_falls_back_to_status() {
        assert_eq!(
            upstream_error_body(StatusCode::BAD_GATEWAY, b""),
            json!("Request failed with status code 502")
        );
        assert_eq!(
            upstream_error_body(StatusCode::INTERNAL_SERVER_ERROR, b"Internal Server Error"),
            json!("Internal Server Error")
        );
    }

    #[test]
    fn test_body_to_value() {
        assert_eq!(body_to_value(br#"{"a": 1}"#), json!({"a": 1}));
        assert_eq!(body_to_value(b"plain"), json!("plain"));
    }
}
