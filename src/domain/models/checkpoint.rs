//! Checkpoints and the rejected-attempt audit trail.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::domain::errors::DomainError;
use crate::domain::models::aggression::AggressionLevel;
use crate::domain::models::metrics::MetricBundle;

/// An immutable accepted snapshot of a unit at one committed iteration.
///
/// Checkpoints are append-only: once committed they are never mutated or
/// deleted, and a unit's current accepted text is always exactly the text
/// of its most recent checkpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub unit_id: Uuid,
    pub iteration: u32,
    pub text: String,
    pub metrics: MetricBundle,
    pub created_at: DateTime<Utc>,
}

impl Checkpoint {
    /// Snapshot a unit's accepted text and metrics at an iteration.
    pub fn new(
        unit_id: Uuid,
        iteration: u32,
        text: impl Into<String>,
        metrics: MetricBundle,
    ) -> Self {
        Self {
            unit_id,
            iteration,
            text: text.into(),
            metrics,
            created_at: Utc::now(),
        }
    }
}

/// Why an attempt was thrown away instead of committed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectionKind {
    /// A hard quality floor was breached.
    QualityViolation,
    /// The provider produced malformed or empty output.
    ProviderFatal,
    /// Transient failures outlasted the retry budget.
    TransientExhausted,
}

impl RejectionKind {
    /// Stable string form used in storage and logs.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::QualityViolation => "quality_violation",
            Self::ProviderFatal => "provider_fatal",
            Self::TransientExhausted => "transient_exhausted",
        }
    }
}

impl fmt::Display for RejectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for RejectionKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "quality_violation" => Ok(Self::QualityViolation),
            "provider_fatal" => Ok(Self::ProviderFatal),
            "transient_exhausted" => Ok(Self::TransientExhausted),
            other => Err(DomainError::ValidationFailed(format!(
                "unknown rejection kind: {other}"
            ))),
        }
    }
}

/// Audit record for an attempt that never became a checkpoint.
///
/// Rejected attempts are logged but never become `latest`; they exist so a
/// unit's full story is reportable after the fact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RejectedAttempt {
    pub unit_id: Uuid,
    /// Iteration the unit was sitting at when the attempt failed (the
    /// counter does not advance for rejections).
    pub at_iteration: u32,
    pub aggression: AggressionLevel,
    pub kind: RejectionKind,
    pub detail: String,
    /// Present when scoring completed before the gate rejected.
    pub metrics: Option<MetricBundle>,
    pub created_at: DateTime<Utc>,
}

impl RejectedAttempt {
    /// Record a rejection at the unit's current iteration.
    pub fn new(
        unit_id: Uuid,
        at_iteration: u32,
        aggression: AggressionLevel,
        kind: RejectionKind,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            unit_id,
            at_iteration,
            aggression,
            kind,
            detail: detail.into(),
            metrics: None,
            created_at: Utc::now(),
        }
    }

    /// Attach the scored bundle that failed the gate.
    #[must_use]
    pub fn with_metrics(mut self, metrics: MetricBundle) -> Self {
        self.metrics = Some(metrics);
        self
    }
}
