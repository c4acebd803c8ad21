//! Quality gate: hard floors a candidate must clear to be committed.
//!
//! The gate sees one [`MetricBundle`] per attempt, after the term
//! preservation rate has been clamped to the vault-verified survival rate.
//! Detection score is deliberately not gated here; chasing it is the
//! loop's job, protecting meaning is the gate's.

use thiserror::Error;

use crate::domain::models::MetricBundle;

/// A floor the candidate failed to clear.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum GateViolation {
    /// Semantic similarity dropped below the configured floor.
    #[error("semantic similarity {actual:.3} below floor {floor:.3}")]
    SimilarityBelowFloor {
        /// Scored similarity.
        actual: f64,
        /// Configured minimum.
        floor: f64,
    },
    /// One or more protected terms did not survive.
    #[error("term preservation {rate:.3} below required 1.000")]
    TermsDropped {
        /// Fraction of protected spans that survived.
        rate: f64,
    },
    /// Quantitative accuracy dropped below the configured floor.
    #[error("quantitative accuracy {actual:.3} below floor {floor:.3}")]
    AccuracyBelowFloor {
        /// Scored accuracy.
        actual: f64,
        /// Configured minimum.
        floor: f64,
    },
}

/// Floor configuration for one run.
#[derive(Debug, Clone, Copy)]
pub struct QualityGate {
    min_similarity: f64,
    min_accuracy: f64,
}

impl QualityGate {
    /// Build a gate with the given similarity and accuracy floors.
    pub const fn new(min_similarity: f64, min_accuracy: f64) -> Self {
        Self {
            min_similarity,
            min_accuracy,
        }
    }

    /// Check every floor; `Err` carries the first violation in check
    /// order (similarity, terms, accuracy).
    pub fn evaluate(&self, metrics: &MetricBundle) -> Result<(), GateViolation> {
        self.violations(metrics)
            .first()
            .copied()
            .map_or(Ok(()), Err)
    }

    /// All floors the bundle fails, for audit detail.
    pub fn violations(&self, metrics: &MetricBundle) -> Vec<GateViolation> {
        let mut violations = Vec::new();
        if metrics.semantic_similarity() < self.min_similarity {
            violations.push(GateViolation::SimilarityBelowFloor {
                actual: metrics.semantic_similarity(),
                floor: self.min_similarity,
            });
        }
        if metrics.term_preservation_rate() < 1.0 {
            violations.push(GateViolation::TermsDropped {
                rate: metrics.term_preservation_rate(),
            });
        }
        if metrics.quantitative_accuracy() < self.min_accuracy {
            violations.push(GateViolation::AccuracyBelowFloor {
                actual: metrics.quantitative_accuracy(),
                floor: self.min_accuracy,
            });
        }
        violations
    }
}
