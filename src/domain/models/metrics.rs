//! Validated metric records produced by scoring providers.
//!
//! Scores arrive from untrusted providers as loose JSON; everything is
//! funneled through [`MetricBundle::new`] so an out-of-range value can never
//! enter the system, whether it comes from a constructor call, a database
//! row, or an HTTP response body.

use serde::{Deserialize, Serialize};

use crate::domain::errors::{DomainError, DomainResult};

/// Detection and quality metrics for one scored candidate.
///
/// All fields live in `[0.0, 1.0]`. `detection_score` is a noisy estimate
/// of AI-likelihood (lower reads as more human-like), not ground truth; the
/// quality sub-scores guard against the transformation degrading meaning,
/// protected terms, or numeric content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "MetricBundleRaw")]
pub struct MetricBundle {
    detection_score: f64,
    semantic_similarity: f64,
    term_preservation_rate: f64,
    quantitative_accuracy: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    fluency_score: Option<f64>,
}

impl MetricBundle {
    /// Build a bundle, rejecting any score outside `[0.0, 1.0]` (NaN
    /// included).
    pub fn new(
        detection_score: f64,
        semantic_similarity: f64,
        term_preservation_rate: f64,
        quantitative_accuracy: f64,
        fluency_score: Option<f64>,
    ) -> DomainResult<Self> {
        Ok(Self {
            detection_score: check_unit_interval("detection_score", detection_score)?,
            semantic_similarity: check_unit_interval("semantic_similarity", semantic_similarity)?,
            term_preservation_rate: check_unit_interval(
                "term_preservation_rate",
                term_preservation_rate,
            )?,
            quantitative_accuracy: check_unit_interval(
                "quantitative_accuracy",
                quantitative_accuracy,
            )?,
            fluency_score: fluency_score
                .map(|score| check_unit_interval("fluency_score", score))
                .transpose()?,
        })
    }

    /// The assumed baseline for an unscored original: maximum detection
    /// likelihood, perfect quality (the text is identical to itself).
    pub const fn worst_case() -> Self {
        Self {
            detection_score: 1.0,
            semantic_similarity: 1.0,
            term_preservation_rate: 1.0,
            quantitative_accuracy: 1.0,
            fluency_score: None,
        }
    }

    /// Noisy AI-likelihood estimate; lower is better.
    pub const fn detection_score(&self) -> f64 {
        self.detection_score
    }

    /// Meaning preservation relative to the original text.
    pub const fn semantic_similarity(&self) -> f64 {
        self.semantic_similarity
    }

    /// Fraction of protected terms that survived the transformation.
    pub const fn term_preservation_rate(&self) -> f64 {
        self.term_preservation_rate
    }

    /// Fraction of numeric tokens preserved within tolerance.
    pub const fn quantitative_accuracy(&self) -> f64 {
        self.quantitative_accuracy
    }

    /// Optional fluency estimate.
    pub const fn fluency_score(&self) -> Option<f64> {
        self.fluency_score
    }

    /// Lower the preservation rate to account for an independent check.
    ///
    /// The loop verifies placeholder survival itself and gates on the
    /// stricter of the two opinions; the rate never goes up here.
    pub fn clamp_term_preservation(mut self, verified_rate: f64) -> DomainResult<Self> {
        let verified = check_unit_interval("term_preservation_rate", verified_rate)?;
        if verified < self.term_preservation_rate {
            self.term_preservation_rate = verified;
        }
        Ok(self)
    }
}

fn check_unit_interval(metric: &'static str, value: f64) -> DomainResult<f64> {
    if (0.0..=1.0).contains(&value) {
        Ok(value)
    } else {
        Err(DomainError::MetricOutOfRange { metric, value })
    }
}

/// Unvalidated wire shape; only exists so deserialization runs validation.
#[derive(Debug, Deserialize)]
struct MetricBundleRaw {
    detection_score: f64,
    semantic_similarity: f64,
    term_preservation_rate: f64,
    quantitative_accuracy: f64,
    #[serde(default)]
    fluency_score: Option<f64>,
}

impl TryFrom<MetricBundleRaw> for MetricBundle {
    type Error = DomainError;

    fn try_from(raw: MetricBundleRaw) -> DomainResult<Self> {
        Self::new(
            raw.detection_score,
            raw.semantic_similarity,
            raw.term_preservation_rate,
            raw.quantitative_accuracy,
            raw.fluency_score,
        )
    }
}
