//! The adaptive fallback loop.
//!
//! Plans the candidate list, then tries candidates strictly one at a time:
//! adapt the payload, call upstream, classify. The first success wins; a
//! fatal classification stops the loop; otherwise the loop runs until the
//! candidates or the overall deadline run out.

use crate::adapter::adapt;
use crate::catalog::AttemptCatalog;
use crate::classifier::{classify, Classification};
use crate::discovery::DiscoveryCache;
use crate::models::{Attempt, GenerationRequest};
use crate::upstream::{Outcome, UpstreamCaller};
use bytes::Bytes;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Hooks around every attempt, so the loop itself stays free of logging.
pub trait AttemptObserver: Send + Sync {
    fn attempt_started(&self, index: usize, attempt: &Attempt);

    fn attempt_finished(
        &self,
        index: usize,
        attempt: &Attempt,
        outcome: &Outcome,
        classification: Option<&Classification>,
    );
}

/// Default observer writing to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl AttemptObserver for TracingObserver {
    fn attempt_started(&self, index: usize, attempt: &Attempt) {
        debug!("Attempt {}: {}", index + 1, attempt);
    }

    fn attempt_finished(
        &self,
        index: usize,
        attempt: &Attempt,
        outcome: &Outcome,
        classification: Option<&Classification>,
    ) {
        match classification {
            None => info!("Attempt {} succeeded: {}", index + 1, attempt),
            Some(Classification::Fatal(reason)) => warn!(
                "Attempt {} ({}) failed fatally: {} [{}]",
                index + 1,
                attempt,
                reason,
                outcome.summary()
            ),
            Some(_) => info!(
                "Attempt {} ({}) failed, moving on: {}",
                index + 1,
                attempt,
                outcome.summary()
            ),
        }
    }
}

/// Diagnostics returned when no candidate succeeded.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExhaustionReport {
    pub attempts_tried: Vec<Attempt>,
    pub last_error: Option<Value>,
    pub deadline_exceeded: bool,
}

/// Terminal state of one orchestrated request.
#[derive(Debug, Clone, PartialEq)]
pub enum GenerationOutcome {
    /// Upstream body, byte-for-byte.
    Success(Bytes),
    /// Stopped early; `status` is the upstream status code.
    Fatal {
        status: u16,
        reason: String,
        body: Value,
    },
    Exhausted(ExhaustionReport),
}

pub struct Orchestrator {
    caller: Arc<dyn UpstreamCaller>,
    discovery: Option<Arc<DiscoveryCache>>,
    catalog: AttemptCatalog,
    observer: Arc<dyn AttemptObserver>,
    base_url: String,
    api_key: String,
    deadline: Option<Duration>,
}

impl Orchestrator {
    pub fn new(caller: Arc<dyn UpstreamCaller>, base_url: String, api_key: String) -> Self {
        Self {
            caller,
            discovery: None,
            catalog: AttemptCatalog::default(),
            observer: Arc::new(TracingObserver),
            base_url,
            api_key,
            deadline: None,
        }
    }

    pub fn with_catalog(mut self, catalog: AttemptCatalog) -> Self {
        self.catalog = catalog;
        self
    }

    pub fn with_discovery(mut self, discovery: Arc<DiscoveryCache>) -> Self {
        self.discovery = Some(discovery);
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn AttemptObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Upper bound on the whole candidate loop.
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Candidate list for the next request.
    pub async fn plan(&self) -> Vec<Attempt> {
        self.plan_before(None).await
    }

    /// Plan, then run. Discovery and the attempts share one deadline.
    pub async fn generate(&self, request: &GenerationRequest) -> GenerationOutcome {
        let deadline = self.deadline_from_now();
        let attempts = self.plan_before(deadline).await;
        debug!("Planned {} attempts", attempts.len());
        self.run_until(request, &attempts, deadline).await
    }

    /// Walk `attempts` in order.
    pub async fn run_attempts(
        &self,
        request: &GenerationRequest,
        attempts: &[Attempt],
    ) -> GenerationOutcome {
        self.run_until(request, attempts, self.deadline_from_now())
            .await
    }

    fn deadline_from_now(&self) -> Option<Instant> {
        self.deadline.map(|d| Instant::now() + d)
    }

    async fn plan_before(&self, deadline: Option<Instant>) -> Vec<Attempt> {
        let discovered = match &self.discovery {
            Some(cache) => {
                let budget = deadline.map_or(Duration::MAX, |d| {
                    d.saturating_duration_since(Instant::now())
                });
                cache.models_within(budget).await
            }
            None => None,
        };
        self.catalog.build(discovered.as_deref())
    }

    async fn run_until(
        &self,
        request: &GenerationRequest,
        attempts: &[Attempt],
        deadline: Option<Instant>,
    ) -> GenerationOutcome {
        let mut tried = Vec::with_capacity(attempts.len());
        let mut last_error = None;
        let mut deadline_exceeded = false;

        for (index, attempt) in attempts.iter().enumerate() {
            let remaining = deadline.map(|d| d.saturating_duration_since(Instant::now()));
            if remaining.is_some_and(|r| r.is_zero()) {
                deadline_exceeded = true;
                break;
            }

            self.observer.attempt_started(index, attempt);
            let payload = adapt(request, attempt);
            let url = attempt.url(&self.base_url, &self.api_key);
            tried.push(attempt.clone());

            let call = self.caller.call(&url, &payload);
            let outcome = match remaining {
                Some(remaining) => match tokio::time::timeout(remaining, call).await {
                    Ok(outcome) => outcome,
                    Err(_) => {
                        warn!("Deadline reached while waiting on {}", attempt);
                        deadline_exceeded = true;
                        break;
                    }
                },
                None => call.await,
            };

            let has_more = index + 1 < attempts.len();
            let classification = classify(&outcome, has_more);
            self.observer
                .attempt_finished(index, attempt, &outcome, classification.as_ref());

            match classification {
                None => {
                    if let Outcome::Success(body) = outcome {
                        return GenerationOutcome::Success(body);
                    }
                }
                Some(Classification::Fatal(reason)) => {
                    let status = match &outcome {
                        Outcome::UpstreamError { status, .. } => *status,
                        _ => 502,
                    };
                    return GenerationOutcome::Fatal {
                        status,
                        reason,
                        body: outcome.error_body().unwrap_or(Value::Null),
                    };
                }
                Some(Classification::Retryable) | Some(Classification::Exhausted) => {
                    last_error = outcome.error_body();
                }
            }
        }

        warn!(
            "No candidate succeeded after {} attempts{}",
            tried.len(),
            if deadline_exceeded {
                " (deadline exceeded)"
            } else {
                ""
            }
        );
        GenerationOutcome::Exhausted(ExhaustionReport {
            attempts_tried: tried,
            last_error,
            deadline_exceeded,
        })
    }
}
