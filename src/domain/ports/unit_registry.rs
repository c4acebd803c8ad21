//! Unit registry port: run membership and unit lifecycle state.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    AggressionLevel, Checkpoint, ProcessingUnit, RunRecord, SectionKind, TerminationReason,
    UnitStatus,
};

/// A persisted unit row: everything that cannot be rebuilt from the
/// checkpoint history alone.
#[derive(Debug, Clone)]
pub struct RegisteredUnit {
    pub run_id: String,
    /// Section order within the run; reassembly sorts by this.
    pub position: u32,
    pub id: Uuid,
    pub section: SectionKind,
    pub original_text: String,
    pub status: UnitStatus,
    pub aggression: AggressionLevel,
    pub supplemental_spent: bool,
    pub termination: Option<TerminationReason>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RegisteredUnit {
    /// Rebuild the in-memory unit from this row plus its checkpoint
    /// history (checkpoint 0 included). Resume never re-executes committed
    /// iterations: the unit continues from the latest checkpoint.
    pub fn into_unit(self, history: Vec<Checkpoint>) -> DomainResult<ProcessingUnit> {
        let Some(latest) = history.last() else {
            return Err(DomainError::CheckpointNotFound {
                unit_id: self.id,
                iteration: 0,
            });
        };

        Ok(ProcessingUnit {
            id: self.id,
            section: self.section,
            original_text: self.original_text,
            current_text: latest.text.clone(),
            placeholders: crate::domain::models::PlaceholderMap::default(),
            iteration: latest.iteration,
            aggression: self.aggression,
            supplemental_spent: self.supplemental_spent,
            metric_history: history.into_iter().map(|cp| cp.metrics).collect(),
            status: self.status,
            termination: self.termination,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// Persistence for runs and unit lifecycle state.
#[async_trait]
pub trait UnitRegistry: Send + Sync {
    /// Register a new run.
    async fn create_run(&self, run: &RunRecord) -> DomainResult<()>;

    /// Look up a run by id.
    async fn get_run(&self, run_id: &str) -> DomainResult<Option<RunRecord>>;

    /// Register a freshly created unit under a run.
    async fn insert_unit(
        &self,
        run_id: &str,
        position: u32,
        unit: &ProcessingUnit,
    ) -> DomainResult<()>;

    /// Persist a unit's mutable lifecycle state (status, aggression,
    /// supplemental flag, termination).
    async fn update_unit(&self, unit: &ProcessingUnit) -> DomainResult<()>;

    /// All units of a run in section order.
    async fn units_for_run(&self, run_id: &str) -> DomainResult<Vec<RegisteredUnit>>;

    /// Look up a single unit row.
    async fn get_unit(&self, unit_id: Uuid) -> DomainResult<Option<RegisteredUnit>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::MetricBundle;

    fn row(id: Uuid) -> RegisteredUnit {
        RegisteredUnit {
            run_id: "run-abc12345".to_string(),
            position: 0,
            id,
            section: SectionKind::Body,
            original_text: "original".to_string(),
            status: UnitStatus::Active,
            aggression: AggressionLevel::Aggressive,
            supplemental_spent: true,
            termination: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn into_unit_resumes_from_latest_checkpoint() {
        let id = Uuid::new_v4();
        let history = vec![
            Checkpoint::new(id, 0, "original", MetricBundle::worst_case()),
            Checkpoint::new(
                id,
                1,
                "refined",
                MetricBundle::new(0.5, 0.95, 1.0, 0.99, None).unwrap(),
            ),
        ];

        let unit = row(id).into_unit(history).unwrap();
        assert_eq!(unit.iteration, 1);
        assert_eq!(unit.current_text, "refined");
        assert_eq!(unit.metric_history.len(), 2);
        assert_eq!(unit.aggression, AggressionLevel::Aggressive);
        assert!(unit.supplemental_spent);
    }

    #[test]
    fn into_unit_requires_checkpoint_zero() {
        let err = row(Uuid::new_v4()).into_unit(vec![]).unwrap_err();
        assert!(matches!(err, DomainError::CheckpointNotFound { .. }));
    }
}
