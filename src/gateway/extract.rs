//! Request extraction: prediction bodies and image uploads.

use super::response::ApiError;
use crate::error::{GatewayError, Result};
use crate::types::{ImageUpload, PredictionRequest};
use axum::body::Bytes;
use axum::extract::multipart::MultipartError;
use axum::extract::{FromRequest, Multipart, Request};
use axum::http::header::CONTENT_TYPE;
use axum::{Form, Json};
use serde_json::{Map, Value};
use std::path::Path;
use tokio::io::AsyncWriteExt;

/// Form field carrying the leaf image.
pub const IMAGE_FIELD: &str = "image";
pub const DEFAULT_FILE_NAME: &str = "upload";
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

const UPLOAD_PREFIX: &str = "upload-";

/// Accepts either a JSON object or a urlencoded form. Form values arrive as
/// strings and are forwarded that way. A request without a content type is
/// read as JSON, and an empty one forwards an empty mapping.
impl<S> FromRequest<S> for PredictionRequest
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> std::result::Result<Self, Self::Rejection> {
        let content_type = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);

        match content_type.as_deref() {
            Some(ct) if ct.starts_with("application/x-www-form-urlencoded") => {
                let Form(fields) = Form::<Map<String, Value>>::from_request(req, state)
                    .await
                    .map_err(|e| ApiError::bad_request(e.body_text()))?;
                Ok(PredictionRequest::new(fields))
            }
            Some(_) => {
                let Json(fields) = Json::<Map<String, Value>>::from_request(req, state)
                    .await
                    .map_err(|e| ApiError::bad_request(e.body_text()))?;
                Ok(PredictionRequest::new(fields))
            }
            None => {
                let body = Bytes::from_request(req, state)
                    .await
                    .map_err(|e| ApiError::bad_request(e.body_text()))?;
                if body.iter().all(u8::is_ascii_whitespace) {
                    return Ok(PredictionRequest::default());
                }
                serde_json::from_slice::<Map<String, Value>>(&body)
                    .map(PredictionRequest::new)
                    .map_err(|e| {
                        ApiError::bad_request(format!("Failed to parse the request body as JSON: {e}"))
                    })
            }
        }
    }
}

/// Store the first `image` file field in a fresh temp file under `upload_dir`.
///
/// Returns `Ok(None)` when the form carries no image file. Other fields are
/// skipped. A failure part-way through removes the partial file.
pub async fn receive_image(mut multipart: Multipart, upload_dir: &Path) -> Result<Option<ImageUpload>> {
    while let Some(mut field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some(IMAGE_FIELD) || field.file_name().is_none() {
            continue;
        }

        let file_name = field
            .file_name()
            .filter(|n| !n.is_empty())
            .unwrap_or(DEFAULT_FILE_NAME)
            .to_string();
        let content_type = field
            .content_type()
            .filter(|ct| ct.contains('/'))
            .unwrap_or(DEFAULT_CONTENT_TYPE)
            .to_string();

        let (file, path) = tempfile::Builder::new()
            .prefix(UPLOAD_PREFIX)
            .tempfile_in(upload_dir)?
            .into_parts();
        let mut file = tokio::fs::File::from_std(file);
        let mut size = 0u64;

        while let Some(chunk) = field.chunk().await.map_err(multipart_error)? {
            file.write_all(&chunk).await?;
            size += chunk.len() as u64;
        }
        file.flush().await?;

        return Ok(Some(ImageUpload::new(path, file_name, content_type, size)));
    }

    Ok(None)
}

fn multipart_error(err: MultipartError) -> GatewayError {
    GatewayError::BadRequest(format!("Invalid multipart body: {}", err.body_text()))
}
