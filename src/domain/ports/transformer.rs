//! Transformation provider port.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::errors::ProviderError;
use crate::domain::models::{AggressionLevel, PlaceholderMap, SectionKind};

/// Inputs for one transformation attempt.
///
/// The text is vault-protected; every placeholder token must appear
/// verbatim in the candidate. Providers are untrusted, so the loop
/// verifies that after the fact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransformRequest {
    /// Vault-protected input text.
    pub text: String,
    /// Placeholder map for the protected text, for providers that want to
    /// know what the sentinels stand for structurally.
    pub placeholders: PlaceholderMap,
    /// Section role of the unit.
    pub section: SectionKind,
    /// Configured strategy identifier for the current tier.
    pub strategy: String,
    /// Aggression tier selecting how hard to push.
    pub aggression: AggressionLevel,
    /// Committed iteration of the unit at the time of the attempt.
    pub iteration: u32,
}

/// A candidate rewrite of the protected text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransformResponse {
    /// Candidate text, still carrying placeholders.
    pub candidate: String,
}

/// Black-box producer of candidate rewrites.
///
/// Implementations choose their own failure classification: transient
/// failures are retried with backoff, fatal ones demote the attempt to a
/// stage failure.
#[async_trait]
pub trait TransformProvider: Send + Sync {
    /// Short provider name for logs.
    fn name(&self) -> &'static str;

    /// Produce a candidate rewrite of vault-protected text.
    async fn transform(
        &self,
        request: &TransformRequest,
    ) -> Result<TransformResponse, ProviderError>;
}
