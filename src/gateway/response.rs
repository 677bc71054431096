//! Error envelopes returned by the gateway.

use crate::error::GatewayError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::{json, Value};

/// An HTTP error response with a JSON body.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    body: Value,
}

impl ApiError {
    pub fn new(status: StatusCode, body: Value) -> Self {
        Self { status, body }
    }

    /// `400 {error: message}`.
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, json!({ "error": message.into() }))
    }

    /// `<status> {error: <upstream body or message>}`.
    ///
    /// Client errors map to 400, everything else to 500.
    pub fn forward(err: &GatewayError) -> Self {
        let status = if err.is_client_error() {
            StatusCode::BAD_REQUEST
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };
        Self::new(status, json!({ "error": err.error_body() }))
    }

    /// `<status> {error: message, details?}`.
    pub fn with_details(err: &GatewayError) -> Self {
        let status = if err.is_client_error() {
            StatusCode::BAD_REQUEST
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };
        let mut body = json!({ "error": err.to_string() });
        if let Some(details) = err.details() {
            body["details"] = details;
        }
        Self::new(status, body)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}
