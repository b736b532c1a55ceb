use super::types::{ListModelsResponse, Outcome};
use super::{ModelDiscovery, UpstreamCaller};
use crate::{Error, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::de::IgnoredAny;
use serde_json::Value;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Lightweight Gemini REST client used for generation and model discovery.
pub struct GeminiHttpClient {
    client: Client,
    api_key: String,
    base_url: String,
    timeout: Duration,
}

impl GeminiHttpClient {
    pub fn new(api_key: String, timeout: Duration) -> Self {
        Self::new_with_client(api_key, timeout, Client::new())
    }

    pub fn new_with_client(api_key: String, timeout: Duration, client: Client) -> Self {
        Self {
            client,
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout,
        }
    }

    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Masks the credential so URLs and transport errors are safe to log.
    fn redact(&self, url: &str) -> String {
        if self.api_key.is_empty() {
            return url.to_string();
        }
        url.replace(&self.api_key, "***")
    }
}

#[async_trait]
impl UpstreamCaller for GeminiHttpClient {
    async fn call(&self, url: &str, payload: &Value) -> Outcome {
        let safe_url = self.redact(url);
        tracing::debug!("POST {}", safe_url);

        let response = match self
            .client
            .post(url)
            .timeout(self.timeout)
            .header("Content-Type", "application/json")
            .json(payload)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                let message = self.redact(&e.to_string());
                tracing::warn!("Failed to send request to Gemini: {}", message);
                return Outcome::TransportError(message);
            }
        };

        let status = response.status();
        let body = match response.bytes().await {
            Ok(body) => body,
            Err(e) => {
                let message = self.redact(&e.to_string());
                tracing::warn!("Failed to read Gemini response body: {}", message);
                return Outcome::TransportError(message);
            }
        };

        if !status.is_success() {
            let text = String::from_utf8_lossy(&body);
            tracing::debug!("Gemini API error (status {}): {}", status, text);
            return Outcome::upstream_error(status.as_u16(), &text);
        }

        match serde_json::from_slice::<IgnoredAny>(&body) {
            Ok(_) => Outcome::Success(body),
            Err(e) => {
                tracing::warn!("Failed to parse Gemini response from {}: {}", safe_url, e);
                Outcome::TransportError(format!("malformed upstream response: {}", e))
            }
        }
    }
}

#[async_trait]
impl ModelDiscovery for GeminiHttpClient {
    async fn discover_models(&self) -> Result<Vec<String>> {
        let url = format!("{}/v1beta/models", self.base_url);

        let response = self
            .client
            .get(&url)
            .timeout(self.timeout)
            .query(&[("key", self.api_key.as_str())])
            .send()
            .await
            .map_err(|e| Error::Discovery(self.redact(&e.to_string())))?;

        if !response.status().is_success() {
            let status = response.status();
            return Err(Error::Discovery(format!(
                "list models returned status {}",
                status
            )));
        }

        let body = response.text().await?;
        let parsed: ListModelsResponse = serde_json::from_str(&body)?;

        Ok(parsed
            .models
            .iter()
            .filter(|model| model.supports_generate_content())
            .map(|model| model.model_id().to_string())
            .collect())
    }
}
