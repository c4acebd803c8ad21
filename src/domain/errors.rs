//! Domain errors for the redraft refinement system.

use thiserror::Error;
use uuid::Uuid;

/// Domain-level errors that can occur while refining units.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Unit not found: {0}")]
    UnitNotFound(Uuid),

    #[error("Run not found: {0}")]
    RunNotFound(String),

    #[error("Checkpoint not found for unit {unit_id} at iteration {iteration}")]
    CheckpointNotFound { unit_id: Uuid, iteration: u32 },

    #[error("Checkpoint already committed for unit {unit_id} at iteration {iteration}")]
    CheckpointExists { unit_id: Uuid, iteration: u32 },

    #[error("Metric {metric} out of range: {value} (expected 0.0..=1.0)")]
    MetricOutOfRange { metric: &'static str, value: f64 },

    #[error("Invalid state transition from {from} to {to}: {reason}")]
    InvalidStateTransition { from: String, to: String, reason: String },

    #[error("Placeholder collision: input already contains {0}")]
    PlaceholderCollision(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

pub type DomainResult<T> = Result<T, DomainError>;

impl From<sqlx::Error> for DomainError {
    fn from(err: sqlx::Error) -> Self {
        DomainError::DatabaseError(err.to_string())
    }
}

impl From<serde_json::Error> for DomainError {
    fn from(err: serde_json::Error) -> Self {
        DomainError::SerializationError(err.to_string())
    }
}

/// Errors returned by transformation and scoring providers.
///
/// Providers classify their own failures; the refinement loop only decides
/// whether to retry (transient) or demote the attempt to a stage failure
/// (fatal).
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("Transient provider failure: {0}")]
    Transient(String),

    #[error("Fatal provider failure: {0}")]
    Fatal(String),
}

impl ProviderError {
    /// Whether the failure is worth retrying with backoff.
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }

    /// Whether the failure is permanent for this attempt.
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::Fatal(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_error_classification() {
        assert!(ProviderError::Transient("timeout".to_string()).is_transient());
        assert!(!ProviderError::Transient("timeout".to_string()).is_fatal());
        assert!(ProviderError::Fatal("empty body".to_string()).is_fatal());
        assert!(!ProviderError::Fatal("empty body".to_string()).is_transient());
    }

    #[test]
    fn sqlx_error_converts_to_database_error() {
        let err: DomainError = sqlx::Error::RowNotFound.into();
        assert!(matches!(err, DomainError::DatabaseError(_)));
    }
}
