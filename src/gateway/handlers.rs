use super::extract::receive_image;
use super::response::ApiError;
use super::AppState;
use crate::types::{
    NormalizedError, PredictionKind, PredictionRequest, PriceOutcome, PriceParams, PriceQuery,
    MISSING_PRICE_PARAMS,
};
use axum::extract::multipart::MultipartRejection;
use axum::extract::rejection::QueryRejection;
use axum::extract::{Multipart, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::{json, Value};
use tracing::{error, info, warn};

pub const NO_IMAGE_MESSAGE: &str = "No image file provided";

/// `GET /`
pub async fn status(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "message": format!("Agri gateway running on port {}", state.port),
        "usage": {
            "crop": "POST /predict-crop",
            "yield": "POST /predict-yield",
            "disease": "POST /predict-disease (multipart field \"image\")",
            "exact_match": "/market-prices?commodity=&state=&district=&market=",
        },
    }))
}

/// `POST /predict-crop`
pub async fn predict_crop(
    State(state): State<AppState>,
    request: PredictionRequest,
) -> Result<Json<Value>, ApiError> {
    forward_prediction(&state, PredictionKind::Crop, request).await
}

/// `POST /predict-yield`
pub async fn predict_yield(
    State(state): State<AppState>,
    request: PredictionRequest,
) -> Result<Json<Value>, ApiError> {
    forward_prediction(&state, PredictionKind::Yield, request).await
}

async fn forward_prediction(
    state: &AppState,
    kind: PredictionKind,
    request: PredictionRequest,
) -> Result<Json<Value>, ApiError> {
    match state.inference.predict(kind, &request).await {
        Ok(value) => Ok(Json(value)),
        Err(err) => {
            error!(kind = kind.name(), error = %err, "prediction failed");
            Err(ApiError::forward(&err))
        }
    }
}

/// `POST /predict-disease`
///
/// The upload is deleted once the upstream call returns, whatever its result.
pub async fn predict_disease(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<Value>, ApiError> {
    let Ok(multipart) = multipart else {
        return Err(ApiError::bad_request(NO_IMAGE_MESSAGE));
    };

    let upload = match receive_image(multipart, &state.upload_dir).await {
        Ok(Some(upload)) => upload,
        Ok(None) => return Err(ApiError::bad_request(NO_IMAGE_MESSAGE)),
        Err(err) => {
            warn!(error = %err, "failed to receive upload");
            return Err(ApiError::forward(&err));
        }
    };

    info!(
        file_name = %upload.file_name(),
        content_type = %upload.content_type(),
        bytes = upload.size(),
        "image received"
    );
    let result = state.inference.predict_disease(&upload).await;
    upload.cleanup();

    match result {
        Ok(value) => Ok(Json(value)),
        Err(err) => {
            error!(error = %err, "disease detection failed");
            Err(ApiError::forward(&err))
        }
    }
}

/// `GET /market-prices`
pub async fn market_prices(
    State(state): State<AppState>,
    params: Result<Query<PriceParams>, QueryRejection>,
) -> Result<Response, ApiError> {
    let params = params.map(|Query(p)| p).unwrap_or_default();
    info!(?params, "market price lookup");

    let query = PriceQuery::try_from(params).map_err(|_| ApiError::bad_request(MISSING_PRICE_PARAMS))?;

    match state.oracle.lookup(&query).await {
        Ok(PriceOutcome::Record(record)) => Ok(Json(json!({ "record": record })).into_response()),
        Ok(PriceOutcome::Failed(failure)) => Ok(price_failure(failure, state.legacy_price_errors)),
        Err(err) => {
            error!(error = %err, "market price lookup failed");
            Err(ApiError::with_details(&err))
        }
    }
}

/// Response for a lookup that produced no record.
///
/// Legacy mode keeps the old `200 {record: <error>}` shape. Otherwise parse
/// failures answer 502 and transport failures 500, still carrying the record.
fn price_failure(failure: NormalizedError, legacy: bool) -> Response {
    if legacy {
        return Json(json!({ "record": failure })).into_response();
    }
    let status = match failure {
        NormalizedError::ParseError { .. } => StatusCode::BAD_GATEWAY,
        NormalizedError::TransportError { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (
        status,
        Json(json!({ "error": failure.summary(), "record": failure })),
    )
        .into_response()
}

/// Fallback for unknown routes.
pub async fn not_found() -> ApiError {
    ApiError::new(StatusCode::NOT_FOUND, json!({ "error": "Not found" }))
}
