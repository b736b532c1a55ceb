//! Failure classification.
//!
//! Separates "this model/endpoint/shape combination does not apply" (keep
//! going) from "the credential or request is bad" (stop now).

use crate::upstream::{GoogleErrorBody, Outcome};

/// Markers in a 400 message that point at a payload-shape mismatch.
const SHAPE_MISMATCH_MARKERS: &[&str] = &[
    "unknown name",
    "cannot find field",
    "is not enabled for",
    "is not supported for this model",
    "is not supported by this model",
];

const AUTH_MESSAGE_MARKERS: &[&str] = &["api key not valid", "api key expired"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    /// Stop immediately and surface this failure.
    Fatal(String),
    /// Try the next candidate.
    Retryable,
    /// Retryable, but the failing attempt was the last candidate.
    Exhausted,
}

/// Classify a failed outcome. Successes are never classified and yield `None`.
pub fn classify(outcome: &Outcome, has_more: bool) -> Option<Classification> {
    let fatal = match outcome {
        Outcome::Success(_) => return None,
        Outcome::TransportError(_) => None,
        Outcome::UpstreamError { status, body } => {
            fatal_reason(*status, &GoogleErrorBody::from_value(body))
        }
    };

    Some(match fatal {
        Some(reason) => Classification::Fatal(reason),
        None if has_more => Classification::Retryable,
        None => Classification::Exhausted,
    })
}

fn fatal_reason(status: u16, body: &GoogleErrorBody) -> Option<String> {
    if is_auth_failure(status, body) {
        return Some("upstream rejected the API key".to_string());
    }

    match status {
        404 => None,
        400 if is_shape_mismatch(body) => None,
        400 => Some(format!(
            "upstream rejected the request as invalid: {}",
            body.message().unwrap_or("no message")
        )),
        _ => None,
    }
}

fn is_auth_failure(status: u16, body: &GoogleErrorBody) -> bool {
    status == 401
        || body.code() == Some(401)
        || body.status() == Some("UNAUTHENTICATED")
        || body.reasons().any(|reason| reason == "API_KEY_INVALID")
        || body.message().is_some_and(|message| {
            let lower = message.to_ascii_lowercase();
            AUTH_MESSAGE_MARKERS.iter().any(|m| lower.contains(m))
        })
}

fn is_shape_mismatch(body: &GoogleErrorBody) -> bool {
    body.descriptions().any(|text| {
        let lower = text.to_ascii_lowercase();
        SHAPE_MISMATCH_MARKERS.iter().any(|m| lower.contains(m))
    })
}
