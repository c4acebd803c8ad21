//! Scripted providers for testing.
//!
//! Responses are queued ahead of time and consumed per call; when the
//! script runs dry the defaults take over (the transformer echoes its
//! input, the scorer returns its configured default bundle). Every
//! received request is recorded for assertion.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::domain::errors::ProviderError;
use crate::domain::models::MetricBundle;
use crate::domain::ports::{
    ScoreProvider, ScoreRequest, TransformProvider, TransformRequest, TransformResponse,
};

type Scripted<T> = Arc<Mutex<VecDeque<Result<T, ProviderError>>>>;

/// Transform provider that replays a scripted sequence of outcomes.
pub struct ScriptedTransformer {
    script: Scripted<TransformResponse>,
    requests: Arc<Mutex<Vec<TransformRequest>>>,
}

impl ScriptedTransformer {
    pub fn new() -> Self {
        Self {
            script: Arc::new(Mutex::new(VecDeque::new())),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Queue a candidate to return on the next call.
    pub async fn push_candidate(&self, candidate: impl Into<String>) {
        self.script.lock().await.push_back(Ok(TransformResponse {
            candidate: candidate.into(),
        }));
    }

    /// Queue a failure to return on the next call.
    pub async fn push_failure(&self, error: ProviderError) {
        self.script.lock().await.push_back(Err(error));
    }

    /// Requests received so far, in call order.
    pub async fn requests(&self) -> Vec<TransformRequest> {
        self.requests.lock().await.clone()
    }

    /// Number of calls received.
    pub async fn calls(&self) -> usize {
        self.requests.lock().await.len()
    }
}

impl Default for ScriptedTransformer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TransformProvider for ScriptedTransformer {
    fn name(&self) -> &'static str {
        "scripted-transformer"
    }

    async fn transform(
        &self,
        request: &TransformRequest,
    ) -> Result<TransformResponse, ProviderError> {
        self.requests.lock().await.push(request.clone());
        match self.script.lock().await.pop_front() {
            Some(outcome) => outcome,
            // Echo keeps every placeholder intact.
            None => Ok(TransformResponse {
                candidate: request.text.clone(),
            }),
        }
    }
}

/// Score provider that replays a scripted sequence of outcomes.
pub struct ScriptedScorer {
    script: Scripted<MetricBundle>,
    default_bundle: MetricBundle,
    requests: Arc<Mutex<Vec<ScoreRequest>>>,
}

impl ScriptedScorer {
    /// Scorer whose fallback bundle passes every floor but misses the
    /// default detection target.
    pub fn new() -> Self {
        Self::with_default(
            MetricBundle::new(0.5, 0.95, 1.0, 0.99, None)
                .expect("fallback bundle fields are in range"),
        )
    }

    /// Scorer with an explicit fallback bundle for dry-script calls.
    pub fn with_default(default_bundle: MetricBundle) -> Self {
        Self {
            script: Arc::new(Mutex::new(VecDeque::new())),
            default_bundle,
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Queue a bundle to return on the next call.
    pub async fn push_bundle(&self, bundle: MetricBundle) {
        self.script.lock().await.push_back(Ok(bundle));
    }

    /// Queue a failure to return on the next call.
    pub async fn push_failure(&self, error: ProviderError) {
        self.script.lock().await.push_back(Err(error));
    }

    /// Requests received so far, in call order.
    pub async fn requests(&self) -> Vec<ScoreRequest> {
        self.requests.lock().await.clone()
    }

    /// Number of calls received.
    pub async fn calls(&self) -> usize {
        self.requests.lock().await.len()
    }
}

impl Default for ScriptedScorer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ScoreProvider for ScriptedScorer {
    fn name(&self) -> &'static str {
        "scripted-scorer"
    }

    async fn score(&self, request: &ScoreRequest) -> Result<MetricBundle, ProviderError> {
        self.requests.lock().await.push(request.clone());
        match self.script.lock().await.pop_front() {
            Some(outcome) => outcome,
            None => Ok(self.default_bundle.clone()),
        }
    }
}
