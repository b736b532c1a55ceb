//! Data models and structures
//!
//! Defines the inbound generation request and the candidate [`Attempt`]
//! tuples the orchestrator walks through.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

fn default_role() -> String {
    "user".to_string()
}

/// Text content part. Other content kinds are not forwarded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Part {
    pub text: String,
}

/// One conversation turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    #[serde(default = "default_role")]
    pub role: String,
    #[serde(default)]
    pub parts: Vec<Part>,
}

/// System-level directive kept apart from the conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instruction {
    #[serde(default)]
    pub parts: Vec<Part>,
}

impl Instruction {
    /// Part texts joined by newlines, skipping empty parts.
    pub fn text(&self) -> String {
        self.parts
            .iter()
            .map(|p| p.text.as_str())
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Tuning parameters the adapters know how to forward.
///
/// Both camelCase and snake_case spellings are accepted on input; any other
/// key is ignored during deserialization and therefore never forwarded.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(
        default,
        alias = "response_mime_type",
        skip_serializing_if = "Option::is_none"
    )]
    pub response_mime_type: Option<String>,
    #[serde(
        default,
        alias = "response_schema",
        skip_serializing_if = "Option::is_none"
    )]
    pub response_schema: Option<Value>,
}

/// Inbound request body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationRequest {
    pub contents: Vec<Message>,
    #[serde(
        default,
        alias = "system_instruction",
        skip_serializing_if = "Option::is_none"
    )]
    pub system_instruction: Option<Instruction>,
    #[serde(
        default,
        alias = "generation_config",
        skip_serializing_if = "Option::is_none"
    )]
    pub generation_config: Option<GenerationConfig>,
}

impl GenerationRequest {
    /// Parse and validate a raw request body.
    pub fn from_slice(body: &[u8]) -> crate::Result<Self> {
        let request: Self = serde_json::from_slice(body)
            .map_err(|e| crate::Error::InvalidRequest(e.to_string()))?;
        if request.contents.is_empty() {
            return Err(crate::Error::InvalidRequest(
                "contents must contain at least one message".to_string(),
            ));
        }
        Ok(request)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EndpointVersion {
    V1,
    V1Beta,
}

impl EndpointVersion {
    pub fn as_str(&self) -> &'static str {
        match self {
            EndpointVersion::V1 => "v1",
            EndpointVersion::V1Beta => "v1beta",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PayloadShape {
    Modern,
    Legacy,
}

/// One (endpoint version, payload shape, model) candidate.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Attempt {
    pub endpoint_version: EndpointVersion,
    pub payload_shape: PayloadShape,
    pub model_id: String,
}

impl Attempt {
    pub fn new(
        endpoint_version: EndpointVersion,
        payload_shape: PayloadShape,
        model_id: impl Into<String>,
    ) -> Self {
        Self {
            endpoint_version,
            payload_shape,
            model_id: model_id.into(),
        }
    }

    /// `generateContent` URL for this candidate, without the credential.
    pub fn endpoint(&self, base_url: &str) -> String {
        format!(
            "{}/{}/models/{}:generateContent",
            base_url.trim_end_matches('/'),
            self.endpoint_version.as_str(),
            self.model_id
        )
    }

    /// Full request URL carrying the credential as the `key` query parameter.
    pub fn url(&self, base_url: &str, api_key: &str) -> String {
        format!("{}?key={}", self.endpoint(base_url), api_key)
    }
}

impl fmt::Display for Attempt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let shape = match self.payload_shape {
            PayloadShape::Modern => "modern",
            PayloadShape::Legacy => "legacy",
        };
        write!(
            f,
            "{}/{} ({})",
            self.endpoint_version.as_str(),
            self.model_id,
            shape
        )
    }
}
