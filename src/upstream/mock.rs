use super::types::Outcome;
use super::{ModelDiscovery, UpstreamCaller};
use crate::{Error, Result};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// One recorded upstream call.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub url: String,
    pub payload: Value,
}

/// Scripted upstream: outcomes are handed out in order, the fallback
/// outcome once the script runs dry.
#[derive(Clone)]
pub struct MockUpstream {
    outcomes: Arc<Mutex<VecDeque<Outcome>>>,
    fallback: Outcome,
    calls: Arc<Mutex<Vec<RecordedCall>>>,
    models: Arc<Mutex<Option<Vec<String>>>>,
    discovery_count: Arc<Mutex<usize>>,
}

impl MockUpstream {
    pub fn new() -> Self {
        Self {
            outcomes: Arc::new(Mutex::new(VecDeque::new())),
            fallback: Outcome::UpstreamError {
                status: 500,
                body: json!({ "error": { "code": 500, "message": "mock has no scripted outcome" } }),
            },
            calls: Arc::new(Mutex::new(Vec::new())),
            models: Arc::new(Mutex::new(None)),
            discovery_count: Arc::new(Mutex::new(0)),
        }
    }

    pub fn with_outcome(self, outcome: Outcome) -> Self {
        self.outcomes.lock().unwrap().push_back(outcome);
        self
    }

    pub fn with_success(self, body: &str) -> Self {
        self.with_outcome(Outcome::Success(bytes::Bytes::copy_from_slice(body.as_bytes())))
    }

    pub fn with_error(self, status: u16, body: Value) -> Self {
        self.with_outcome(Outcome::UpstreamError { status, body })
    }

    pub fn with_fallback(mut self, outcome: Outcome) -> Self {
        self.fallback = outcome;
        self
    }

    /// Models returned by discovery; without this, discovery fails.
    pub fn with_models(self, models: Vec<String>) -> Self {
        *self.models.lock().unwrap() = Some(models);
        self
    }

    pub fn get_call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn get_calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn get_discovery_count(&self) -> usize {
        *self.discovery_count.lock().unwrap()
    }
}

impl Default for MockUpstream {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl UpstreamCaller for MockUpstream {
    async fn call(&self, url: &str, payload: &Value) -> Outcome {
        self.calls.lock().unwrap().push(RecordedCall {
            url: url.to_string(),
            payload: payload.clone(),
        });

        self.outcomes
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone())
    }
}

#[async_trait]
impl ModelDiscovery for MockUpstream {
    async fn discover_models(&self) -> Result<Vec<String>> {
        *self.discovery_count.lock().unwrap() += 1;

        self.models
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| Error::Discovery("mock discovery unavailable".to_string()))
    }
}
