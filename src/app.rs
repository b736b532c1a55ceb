//! Gateway assembly: configuration in, ready-to-serve orchestrator out.

use crate::catalog::AttemptCatalog;
use crate::config::Config;
use crate::discovery::DiscoveryCache;
use crate::models::GenerationRequest;
use crate::orchestrator::{AttemptObserver, GenerationOutcome, Orchestrator, TracingObserver};
use crate::upstream::{GeminiHttpClient, ModelDiscovery, UpstreamCaller};
use crate::{Error, Result};
use std::sync::Arc;
use tracing::{info, warn};

/// Coordinates credential gating, request parsing and the fallback loop.
pub struct App {
    orchestrator: Option<Orchestrator>,
}

/// Injectable upstream bundle used to construct [`App`] in tests/harnesses.
pub struct AppServices {
    pub caller: Arc<dyn UpstreamCaller>,
    pub discovery: Option<Arc<dyn ModelDiscovery>>,
    pub observer: Arc<dyn AttemptObserver>,
}

impl App {
    /// Build an app from concrete upstream dependencies.
    pub fn with_services(config: &Config, services: AppServices) -> Self {
        let Ok(api_key) = config.require_api_key() else {
            warn!("GEMINI_API_KEY is not set; generation requests will be refused");
            return Self { orchestrator: None };
        };

        let mut orchestrator =
            Orchestrator::new(services.caller, config.base_url.clone(), api_key.to_string())
                .with_catalog(AttemptCatalog::new(config.fallback_models.clone()))
                .with_observer(services.observer)
                .with_deadline(config.deadline);

        match services.discovery {
            Some(source) if config.discovery_enabled => {
                let cache = DiscoveryCache::new(
                    source,
                    config.discovery_ttl,
                    config.discovery_timeout,
                    config.discovery_limit,
                )
                .with_retry_after(config.discovery_retry);
                orchestrator = orchestrator.with_discovery(Arc::new(cache));
            }
            _ => info!("Model discovery disabled; using static fallback list"),
        }

        Self {
            orchestrator: Some(orchestrator),
        }
    }

    /// Construct an app talking to the real Gemini API.
    pub fn from_config(config: &Config) -> Self {
        let client = Arc::new(
            GeminiHttpClient::new(
                config.api_key.clone().unwrap_or_default(),
                config.attempt_timeout,
            )
            .with_base_url(config.base_url.clone()),
        );
        info!("Upstream base URL: {}", client.base_url());

        Self::with_services(
            config,
            AppServices {
                caller: client.clone(),
                discovery: Some(client as Arc<dyn ModelDiscovery>),
                observer: Arc::new(TracingObserver),
            },
        )
    }

    /// Handle one raw request body. The credential is checked before the
    /// body is even parsed.
    pub async fn generate(&self, body: &[u8]) -> Result<GenerationOutcome> {
        let orchestrator = self.orchestrator.as_ref().ok_or(Error::MissingApiKey)?;
        let request = GenerationRequest::from_slice(body)?;
        Ok(orchestrator.generate(&request).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::upstream::MockUpstream;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Config {
        let vars: HashMap<&str, &str> = vars.iter().copied().collect();
        Config::from_lookup(|key| vars.get(key).map(|v| v.to_string())).unwrap()
    }

    fn services(mock: &MockUpstream) -> AppServices {
        AppServices {
            caller: Arc::new(mock.clone()),
            discovery: Some(Arc::new(mock.clone()) as Arc<dyn ModelDiscovery>),
            observer: Arc::new(TracingObserver),
        }
    }

    const BODY: &[u8] = br#"{"contents":[{"role":"user","parts":[{"text":"hi"}]}]}"#;

    #[tokio::test]
    async fn test_missing_key_refuses_before_any_call() {
        let mock = MockUpstream::new().with_success("{}");
        let app = App::with_services(&config(&[]), services(&mock));

        let err = app.generate(BODY).await.unwrap_err();
        assert!(matches!(err, Error::MissingApiKey));
        assert_eq!(mock.get_call_count(), 0);
        assert_eq!(mock.get_discovery_count(), 0);
    }

    #[tokio::test]
    async fn test_invalid_body_is_rejected() {
        let mock = MockUpstream::new();
        let app = App::with_services(&config(&[("GEMINI_API_KEY", "k")]), services(&mock));

        let err = app.generate(b"{\"contents\": []}").await.unwrap_err();
        assert!(matches!(err, Error::InvalidRequest(_)));
        assert_eq!(mock.get_call_count(), 0);
    }

    #[tokio::test]
    async fn test_discovery_toggle_and_fallback_models() {
        let mock = MockUpstream::new()
            .with_models(vec!["discovered".to_string()])
            .with_success("{}");
        let app = App::with_services(
            &config(&[
                ("GEMINI_API_KEY", "k"),
                ("GEMINI_FALLBACK_MODELS", "configured"),
                ("GATEWAY_DISCOVERY_ENABLED", "false"),
            ]),
            services(&mock),
        );

        let outcome = app.generate(BODY).await.unwrap();
        assert!(matches!(outcome, GenerationOutcome::Success(_)));
        assert_eq!(mock.get_discovery_count(), 0);
        assert!(mock.get_calls()[0].url.contains("/models/configured:"));
        assert!(mock.get_calls()[0].url.ends_with("?key=k"));
    }
}
