//! Normalized upstream outcomes and the typed view over Google error bodies.

use bytes::Bytes;
use serde::Deserialize;
use serde_json::{json, Value};

/// Result of exactly one upstream call.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// 2xx with a JSON body, kept as the raw bytes the upstream sent.
    Success(Bytes),
    /// Non-2xx response; the body is always JSON (synthesized if needed).
    UpstreamError { status: u16, body: Value },
    /// DNS, connect, timeout, reset or malformed response.
    TransportError(String),
}

impl Outcome {
    /// Builds an [`Outcome::UpstreamError`] from a raw response body,
    /// wrapping non-JSON text in a synthetic Google-style error.
    pub fn upstream_error(status: u16, raw: &str) -> Self {
        let body = serde_json::from_str(raw).unwrap_or_else(|_| synthetic_error_body(status, raw));
        Outcome::UpstreamError { status, body }
    }

    /// JSON recorded as the "last error" for exhaustion diagnostics.
    pub fn error_body(&self) -> Option<Value> {
        match self {
            Outcome::Success(_) => None,
            Outcome::UpstreamError { body, .. } => Some(body.clone()),
            Outcome::TransportError(message) => Some(json!({
                "error": { "message": message, "status": "TRANSPORT_ERROR" }
            })),
        }
    }

    /// Short form for logs.
    pub fn summary(&self) -> String {
        match self {
            Outcome::Success(body) => format!("success ({} bytes)", body.len()),
            Outcome::UpstreamError { status, body } => {
                let parsed = GoogleErrorBody::from_value(body);
                match parsed.message() {
                    Some(message) => format!("upstream {}: {}", status, message),
                    None => format!("upstream {}", status),
                }
            }
            Outcome::TransportError(message) => format!("transport: {}", message),
        }
    }
}

fn synthetic_error_body(status: u16, raw: &str) -> Value {
    json!({ "error": { "code": status, "message": raw } })
}

/// `{"error": {...}}` envelope returned by Google APIs.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct GoogleErrorBody {
    #[serde(default)]
    pub error: Option<GoogleError>,
}

#[derive(Debug, Default, Clone, Deserialize)]
pub struct GoogleError {
    #[serde(default)]
    pub code: Option<i64>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub details: Vec<ErrorDetail>,
}

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorDetail {
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub field_violations: Vec<FieldViolation>,
}

#[derive(Debug, Default, Clone, Deserialize)]
pub struct FieldViolation {
    #[serde(default)]
    pub field: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

impl GoogleErrorBody {
    /// Lenient parse; anything that does not fit the envelope yields an
    /// empty body rather than an error.
    pub fn from_value(value: &Value) -> Self {
        serde_json::from_value(value.clone()).unwrap_or_default()
    }

    pub fn code(&self) -> Option<i64> {
        self.error.as_ref().and_then(|e| e.code)
    }

    pub fn message(&self) -> Option<&str> {
        self.error.as_ref().and_then(|e| e.message.as_deref())
    }

    pub fn status(&self) -> Option<&str> {
        self.error.as_ref().and_then(|e| e.status.as_deref())
    }

    pub fn reasons(&self) -> impl Iterator<Item = &str> {
        self.error
            .iter()
            .flat_map(|e| e.details.iter())
            .filter_map(|d| d.reason.as_deref())
    }

    /// Message plus every field-violation description.
    pub fn descriptions(&self) -> impl Iterator<Item = &str> {
        let violations = self
            .error
            .iter()
            .flat_map(|e| e.details.iter())
            .flat_map(|d| d.field_violations.iter())
            .filter_map(|v| v.description.as_deref());
        self.message().into_iter().chain(violations)
    }
}

/// `GET /v1beta/models` response.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListModelsResponse {
    #[serde(default)]
    pub models: Vec<ModelInfo>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelInfo {
    pub name: String,
    #[serde(default)]
    pub supported_generation_methods: Option<Vec<String>>,
}

impl ModelInfo {
    /// Models that do not advertise their methods are assumed capable.
    pub fn supports_generate_content(&self) -> bool {
        self.supported_generation_methods
            .as_ref()
            .map_or(true, |methods| methods.iter().any(|m| m == "generateContent"))
    }

    pub fn model_id(&self) -> &str {
        self.name.strip_prefix("models/").unwrap_or(&self.name)
    }
}
