//! Best-effort model discovery with a TTL cache.
//!
//! This cache is the only state shared between requests. A failed or empty
//! discovery is remembered for a shorter retry window, so a dead list-models
//! endpoint costs at most one request per window.

use crate::catalog::filter_models;
use crate::upstream::ModelDiscovery;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

pub const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(30);

struct CachedModels {
    /// `None` records a failed or unusable discovery.
    models: Option<Vec<String>>,
    fetched_at: Instant,
}

pub struct DiscoveryCache {
    source: Arc<dyn ModelDiscovery>,
    ttl: Duration,
    retry_after: Duration,
    timeout: Duration,
    limit: usize,
    cached: RwLock<Option<CachedModels>>,
}

impl DiscoveryCache {
    pub fn new(source: Arc<dyn ModelDiscovery>, ttl: Duration, timeout: Duration, limit: usize) -> Self {
        Self {
            source,
            ttl,
            retry_after: DEFAULT_RETRY_AFTER,
            timeout,
            limit,
            cached: RwLock::new(None),
        }
    }

    /// How long a failed discovery suppresses new list-models calls.
    pub fn with_retry_after(mut self, retry_after: Duration) -> Self {
        self.retry_after = retry_after;
        self
    }

    /// Usable discovered models, or `None` when discovery is unavailable
    /// or produced nothing usable.
    pub async fn models(&self) -> Option<Vec<String>> {
        self.models_within(self.timeout).await
    }

    /// Like [`models`](Self::models), but never waits longer than `budget`.
    /// Running out of budget counts as a failed discovery.
    pub async fn models_within(&self, budget: Duration) -> Option<Vec<String>> {
        if let Some(cached) = self.cached.read().await.as_ref() {
            let ttl = match cached.models {
                Some(_) => self.ttl,
                None => self.retry_after,
            };
            if cached.fetched_at.elapsed() < ttl {
                debug!("Using cached discovery result");
                return cached.models.clone();
            }
        }

        let timeout = self.timeout.min(budget);
        let discovered = match tokio::time::timeout(timeout, self.source.discover_models()).await {
            Ok(Ok(models)) => models,
            Ok(Err(e)) => {
                warn!("Model discovery failed, using static fallback list: {}", e);
                return self.store(None).await;
            }
            Err(_) => {
                warn!(
                    "Model discovery timed out after {:?}, using static fallback list",
                    timeout
                );
                return self.store(None).await;
            }
        };

        let mut models = filter_models(&discovered);
        models.truncate(self.limit);
        if models.is_empty() {
            info!("Model discovery returned no usable models");
            return self.store(None).await;
        }

        info!("Discovered {} usable models", models.len());
        self.store(Some(models)).await
    }

    async fn store(&self, models: Option<Vec<String>>) -> Option<Vec<String>> {
        *self.cached.write().await = Some(CachedModels {
            models: models.clone(),
            fetched_at: Instant::now(),
        });
        models
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::upstream::MockUpstream;
    use async_trait::async_trait;

    fn cache(mock: &MockUpstream, ttl: Duration, limit: usize) -> DiscoveryCache {
        DiscoveryCache::new(Arc::new(mock.clone()), ttl, Duration::from_secs(1), limit)
    }

    #[tokio::test]
    async fn test_failure_is_remembered_until_retry_window_passes() {
        let failing = MockUpstream::new();
        let remembered = cache(&failing, Duration::from_secs(60), 10);

        assert_eq!(remembered.models().await, None);
        assert_eq!(remembered.models().await, None);
        assert_eq!(failing.get_discovery_count(), 1);

        let failing = MockUpstream::new();
        let retrying = cache(&failing, Duration::from_secs(60), 10).with_retry_after(Duration::ZERO);

        retrying.models().await;
        retrying.models().await;
        assert_eq!(failing.get_discovery_count(), 2);
    }

    struct HangingDiscovery;

    #[async_trait]
    impl ModelDiscovery for HangingDiscovery {
        async fn discover_models(&self) -> crate::Result<Vec<String>> {
            tokio::time::sleep(Duration::from_secs(10)).await;
            Ok(vec!["gemini-2.0-flash".to_string()])
        }
    }

    #[tokio::test]
    async fn test_budget_caps_a_hanging_discovery() {
        let cache = DiscoveryCache::new(
            Arc::new(HangingDiscovery),
            Duration::from_secs(60),
            Duration::from_secs(5),
            5,
        );

        let started = Instant::now();
        assert_eq!(cache.models_within(Duration::from_millis(50)).await, None);
        assert!(started.elapsed() < Duration::from_secs(1));

        let started = Instant::now();
        assert_eq!(cache.models().await, None);
        assert!(started.elapsed() < Duration::from_millis(50));
    }

    #[tokio::test]
    async fn test_success_is_filtered_limited_and_cached() {
        let mock = MockUpstream::new().with_models(vec![
            "gemini-pro-vision".to_string(),
            "gemini-2.5-flash".to_string(),
            "gemini-2.0-flash".to_string(),
            "gemini-1.5-flash".to_string(),
        ]);
        let cache = cache(&mock, Duration::from_secs(60), 2);

        let expected = Some(vec!["gemini-2.5-flash".to_string(), "gemini-2.0-flash".to_string()]);
        assert_eq!(cache.models().await, expected);
        assert_eq!(cache.models().await, expected);
        assert_eq!(mock.get_discovery_count(), 1);
    }

    #[tokio::test]
    async fn test_expired_entry_is_refreshed() {
        let mock = MockUpstream::new().with_models(vec!["gemini-2.0-flash".to_string()]);
        let cache = cache(&mock, Duration::ZERO, 5);

        cache.models().await;
        cache.models().await;
        assert_eq!(mock.get_discovery_count(), 2);
    }

    #[tokio::test]
    async fn test_only_unstable_models_yields_none() {
        let mock = MockUpstream::new().with_models(vec!["gemini-pro-vision".to_string()]);
        let cache = cache(&mock, Duration::from_secs(60), 5);
        assert_eq!(cache.models().await, None);
    }
}
