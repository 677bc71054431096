use crate::error::GatewayError;
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};
use std::path::Path;
use tempfile::TempPath;
use tracing::debug;

/// Message returned when a market-price lookup is missing a parameter.
pub const MISSING_PRICE_PARAMS: &str = "All 4 params required: commodity, state, district, market";

/// Field mapping from the prediction form, forwarded to the inference
/// service without validation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PredictionRequest {
    pub fields: Map<String, Value>,
}

impl PredictionRequest {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self { fields }
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }
}

/// Which JSON inference endpoint a prediction goes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PredictionKind {
    Crop,
    Yield,
}

impl PredictionKind {
    /// Path on the inference service.
    pub fn path(self) -> &'static str {
        match self {
            PredictionKind::Crop => "/api/predict_crop",
            PredictionKind::Yield => "/api/predict_yield",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            PredictionKind::Crop => "crop",
            PredictionKind::Yield => "yield",
        }
    }
}

/// An uploaded image held in a temporary file.
///
/// The file is removed when the upload is dropped or [`cleanup`](Self::cleanup)
/// is called, whichever happens first.
#[derive(Debug)]
pub struct ImageUpload {
    path: TempPath,
    file_name: String,
    content_type: String,
    size: u64,
}

impl ImageUpload {
    pub fn new(path: TempPath, file_name: String, content_type: String, size: u64) -> Self {
        Self {
            path,
            file_name,
            content_type,
            size,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    /// Delete the temporary file. Failures are logged and otherwise ignored.
    pub fn cleanup(self) {
        let location = self.path.to_path_buf();
        if let Err(e) = self.path.close() {
            debug!(path = %location.display(), error = %e, "failed to remove upload");
        }
    }
}

/// Raw market-price query parameters, before presence validation.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PriceParams {
    pub commodity: Option<String>,
    pub state: Option<String>,
    pub district: Option<String>,
    pub market: Option<String>,
}

/// A validated market-price lookup. All four fields are non-empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceQuery {
    pub commodity: String,
    pub state: String,
    pub district: String,
    pub market: String,
}

impl PriceQuery {
    /// Template variables for prompt rendering.
    pub fn vars(&self) -> [(&'static str, &str); 4] {
        [
            ("commodity", self.commodity.as_str()),
            ("state", self.state.as_str()),
            ("district", self.district.as_str()),
            ("market", self.market.as_str()),
        ]
    }
}

impl TryFrom<PriceParams> for PriceQuery {
    type Error = GatewayError;

    fn try_from(params: PriceParams) -> Result<Self, Self::Error> {
        fn required(value: Option<String>) -> Result<String, GatewayError> {
            value
                .filter(|v| !v.is_empty())
                .ok_or_else(|| GatewayError::BadRequest(MISSING_PRICE_PARAMS.to_string()))
        }

        Ok(PriceQuery {
            commodity: required(params.commodity)?,
            state: required(params.state)?,
            district: required(params.district)?,
            market: required(params.market)?,
        })
    }
}

/// A market price as reported by the oracle.
///
/// Whatever JSON the oracle produced is kept as returned: fields are not
/// checked against the query or against the requested schema, and the
/// accessors return `None` for anything missing or mistyped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PriceRecord(Value);

impl PriceRecord {
    pub const FIELDS: [&'static str; 7] = [
        "commodity", "state", "district", "market", "price", "unit", "source",
    ];

    pub fn new(value: Value) -> Self {
        Self(value)
    }

    pub fn commodity(&self) -> Option<&str> {
        self.text("commodity")
    }

    pub fn state(&self) -> Option<&str> {
        self.text("state")
    }

    pub fn district(&self) -> Option<&str> {
        self.text("district")
    }

    pub fn market(&self) -> Option<&str> {
        self.text("market")
    }

    /// The price exactly as written, number or not.
    pub fn price(&self) -> Option<&Value> {
        self.0.get("price")
    }

    pub fn unit(&self) -> Option<&str> {
        self.text("unit")
    }

    pub fn source(&self) -> Option<&str> {
        self.text("source")
    }

    /// Requested fields the oracle left out.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        Self::FIELDS
            .into_iter()
            .filter(|key| self.0.get(key).is_none())
            .collect()
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }

    fn text(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }
}

/// A failed price lookup, in a shape safe to hand back to callers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NormalizedError {
    /// The oracle answered but its text was not valid JSON.
    ParseError { raw: String },
    /// The oracle could not be reached or refused the request.
    TransportError { message: String },
}

impl NormalizedError {
    /// Short human-readable summary, serialized under `error`.
    pub fn summary(&self) -> &'static str {
        match self {
            NormalizedError::ParseError { .. } => "Invalid response from price oracle",
            NormalizedError::TransportError { .. } => "Price oracle request failed",
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            NormalizedError::ParseError { .. } => "parse_error",
            NormalizedError::TransportError { .. } => "transport_error",
        }
    }
}

impl Serialize for NormalizedError {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(3))?;
        map.serialize_entry("error", self.summary())?;
        map.serialize_entry("kind", self.kind())?;
        match self {
            NormalizedError::ParseError { raw } => map.serialize_entry("raw", raw)?,
            NormalizedError::TransportError { message } => map.serialize_entry("message", message)?,
        }
        map.end()
    }
}

/// Result of one oracle lookup.
#[derive(Debug, Clone, PartialEq)]
pub enum PriceOutcome {
    Record(PriceRecord),
    Failed(NormalizedError),
}
