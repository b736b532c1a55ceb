//! Upstream Gemini integration
//!
//! One POST per [`UpstreamCaller::call`], normalized into an [`Outcome`]
//! value, plus the best-effort list-models query used for discovery.

pub mod client;
pub mod mock;
pub mod types;

pub use client::GeminiHttpClient;
pub use mock::MockUpstream;
pub use types::{GoogleErrorBody, Outcome};

use crate::Result;
use async_trait::async_trait;
use serde_json::Value;

#[async_trait]
pub trait UpstreamCaller: Send + Sync {
    /// Transport failures are returned as [`Outcome::TransportError`], never
    /// as a panic or error.
    async fn call(&self, url: &str, payload: &Value) -> Outcome;
}

#[async_trait]
pub trait ModelDiscovery: Send + Sync {
    async fn discover_models(&self) -> Result<Vec<String>>;
}
