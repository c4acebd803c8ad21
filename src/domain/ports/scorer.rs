//! Scoring provider port.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::errors::ProviderError;
use crate::domain::models::{MetricBundle, SectionKind};

/// Inputs for scoring one candidate against the immutable original.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreRequest {
    /// The unit's original text (reference baseline, terms restored).
    pub original: String,
    /// Candidate text with terms restored.
    pub candidate: String,
    /// Section role of the unit.
    pub section: SectionKind,
}

/// Black-box detection and quality estimator.
///
/// The returned detection score is a noisy, biased estimate; the loop
/// treats it as a signal, never as ground truth. A bundle with any field
/// outside `[0, 1]` must be reported as a fatal failure, not returned.
#[async_trait]
pub trait ScoreProvider: Send + Sync {
    /// Short provider name for logs.
    fn name(&self) -> &'static str;

    /// Score a candidate relative to the original.
    async fn score(&self, request: &ScoreRequest) -> Result<MetricBundle, ProviderError>;
}
