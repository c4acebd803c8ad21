//! Run reports: per-unit outcomes assembled from the registry and the
//! checkpoint store.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{AggressionLevel, SectionKind, TerminationReason, UnitStatus};
use crate::domain::ports::{CheckpointStore, UnitRegistry};

/// Final state of one unit, flattened for display and JSON export.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnitReport {
    pub unit_id: Uuid,
    pub position: u32,
    pub section: SectionKind,
    pub status: UnitStatus,
    pub termination: Option<TerminationReason>,
    pub aggression: AggressionLevel,
    pub supplemental_spent: bool,
    /// Committed iterations beyond the baseline.
    pub iterations: u32,
    /// Detection score of checkpoint 0, absent for never-started units.
    pub baseline_detection: Option<f64>,
    /// Detection score of the latest checkpoint.
    pub final_detection: Option<f64>,
    pub rejected_attempts: usize,
}

/// Status counts across a run.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ReportTotals {
    pub accepted: usize,
    pub borderline: usize,
    pub failed: usize,
    pub active: usize,
}

/// Everything the `report` command shows for a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: String,
    pub input_path: String,
    pub created_at: DateTime<Utc>,
    pub generated_at: DateTime<Utc>,
    pub totals: ReportTotals,
    pub units: Vec<UnitReport>,
}

/// Assembles reports and refined documents for completed or in-flight
/// runs.
pub struct ReportBuilder {
    registry: Arc<dyn UnitRegistry>,
    store: Arc<dyn CheckpointStore>,
}

impl ReportBuilder {
    pub fn new(registry: Arc<dyn UnitRegistry>, store: Arc<dyn CheckpointStore>) -> Self {
        Self { registry, store }
    }

    /// Build the per-unit outcome report for a run.
    pub async fn build(&self, run_id: &str) -> DomainResult<RunReport> {
        let run = self
            .registry
            .get_run(run_id)
            .await?
            .ok_or_else(|| DomainError::RunNotFound(run_id.to_string()))?;

        let rows = self.registry.units_for_run(run_id).await?;
        let mut totals = ReportTotals::default();
        let mut units = Vec::with_capacity(rows.len());

        for row in rows {
            match row.status {
                UnitStatus::Accepted => totals.accepted += 1,
                UnitStatus::Borderline => totals.borderline += 1,
                UnitStatus::Failed => totals.failed += 1,
                UnitStatus::Active => totals.active += 1,
            }

            let history = self.store.history(row.id).await?;
            let rejected = self.store.rejected(row.id).await?;
            units.push(UnitReport {
                unit_id: row.id,
                position: row.position,
                section: row.section,
                status: row.status,
                termination: row.termination,
                aggression: row.aggression,
                supplemental_spent: row.supplemental_spent,
                iterations: history.last().map_or(0, |cp| cp.iteration),
                baseline_detection: history.first().map(|cp| cp.metrics.detection_score()),
                final_detection: history.last().map(|cp| cp.metrics.detection_score()),
                rejected_attempts: rejected.len(),
            });
        }

        Ok(RunReport {
            run_id: run.id,
            input_path: run.input_path,
            created_at: run.created_at,
            generated_at: Utc::now(),
            totals,
            units,
        })
    }

    /// Reassemble the document from each unit's latest accepted text, in
    /// section order. Units without checkpoints contribute their original
    /// text unchanged.
    pub async fn assemble_document(&self, run_id: &str) -> DomainResult<String> {
        if self.registry.get_run(run_id).await?.is_none() {
            return Err(DomainError::RunNotFound(run_id.to_string()));
        }

        let rows = self.registry.units_for_run(run_id).await?;
        let mut sections = Vec::with_capacity(rows.len());
        for row in rows {
            let text = match self.store.latest(row.id).await? {
                Some(checkpoint) => checkpoint.text,
                None => row.original_text,
            };
            sections.push(text);
        }

        Ok(sections.join("\n\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::MemoryCheckpointStore;
    use crate::domain::models::{Checkpoint, MetricBundle, ProcessingUnit, RunRecord};
    use crate::domain::ports::RegisteredUnit;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use tokio::sync::Mutex;

    /// Minimal in-memory registry for report assembly tests.
    #[derive(Default)]
    struct MapRegistry {
        runs: Mutex<HashMap<String, RunRecord>>,
        units: Mutex<Vec<(String, u32, ProcessingUnit)>>,
    }

    fn to_row(run_id: &str, position: u32, unit: &ProcessingUnit) -> RegisteredUnit {
        RegisteredUnit {
            run_id: run_id.to_string(),
            position,
            id: unit.id,
            section: unit.section,
            original_text: unit.original_text.clone(),
            status: unit.status,
            aggression: unit.aggression,
            supplemental_spent: unit.supplemental_spent,
            termination: unit.termination,
            created_at: unit.created_at,
            updated_at: unit.updated_at,
        }
    }

    #[async_trait]
    impl UnitRegistry for MapRegistry {
        async fn create_run(&self, run: &RunRecord) -> DomainResult<()> {
            self.runs.lock().await.insert(run.id.clone(), run.clone());
            Ok(())
        }

        async fn get_run(&self, run_id: &str) -> DomainResult<Option<RunRecord>> {
            Ok(self.runs.lock().await.get(run_id).cloned())
        }

        async fn insert_unit(
            &self,
            run_id: &str,
            position: u32,
            unit: &ProcessingUnit,
        ) -> DomainResult<()> {
            self.units
                .lock()
                .await
                .push((run_id.to_string(), position, unit.clone()));
            Ok(())
        }

        async fn update_unit(&self, unit: &ProcessingUnit) -> DomainResult<()> {
            let mut units = self.units.lock().await;
            for (_, _, stored) in units.iter_mut() {
                if stored.id == unit.id {
                    *stored = unit.clone();
                    return Ok(());
                }
            }
            Err(DomainError::UnitNotFound(unit.id))
        }

        async fn units_for_run(&self, run_id: &str) -> DomainResult<Vec<RegisteredUnit>> {
            let mut rows: Vec<_> = self
                .units
                .lock()
                .await
                .iter()
                .filter(|(id, _, _)| id == run_id)
                .map(|(id, position, unit)| to_row(id, *position, unit))
                .collect();
            rows.sort_by_key(|row| row.position);
            Ok(rows)
        }

        async fn get_unit(&self, unit_id: Uuid) -> DomainResult<Option<RegisteredUnit>> {
            Ok(self
                .units
                .lock()
                .await
                .iter()
                .find(|(_, _, unit)| unit.id == unit_id)
                .map(|(run_id, position, unit)| to_row(run_id, *position, unit)))
        }
    }

    fn metrics(detection: f64) -> MetricBundle {
        MetricBundle::new(detection, 0.95, 1.0, 0.99, None).unwrap()
    }

    #[tokio::test]
    async fn report_flattens_unit_outcomes() {
        let registry = Arc::new(MapRegistry::default());
        let store = Arc::new(MemoryCheckpointStore::default());

        let run = RunRecord::new("paper.md");
        registry.create_run(&run).await.unwrap();

        let mut unit = ProcessingUnit::new(SectionKind::Abstract, "original");
        registry.insert_unit(&run.id, 0, &unit).await.unwrap();
        store
            .commit(&Checkpoint::new(unit.id, 0, "original", metrics(0.8)))
            .await
            .unwrap();
        store
            .commit(&Checkpoint::new(unit.id, 1, "refined", metrics(0.15)))
            .await
            .unwrap();
        unit.record_commit("refined", metrics(0.15));
        unit.finish(UnitStatus::Accepted, TerminationReason::TargetMet)
            .unwrap();
        registry.update_unit(&unit).await.unwrap();

        let builder = ReportBuilder::new(registry, store);
        let report = builder.build(&run.id).await.unwrap();

        assert_eq!(report.totals.accepted, 1);
        assert_eq!(report.units.len(), 1);
        let entry = &report.units[0];
        assert_eq!(entry.iterations, 1);
        assert!((entry.baseline_detection.unwrap() - 0.8).abs() < f64::EPSILON);
        assert!((entry.final_detection.unwrap() - 0.15).abs() < f64::EPSILON);
        assert_eq!(entry.termination, Some(TerminationReason::TargetMet));
    }

    #[tokio::test]
    async fn unknown_run_is_an_error() {
        let builder = ReportBuilder::new(
            Arc::new(MapRegistry::default()),
            Arc::new(MemoryCheckpointStore::default()),
        );
        let err = builder.build("run-00000000").await.unwrap_err();
        assert!(matches!(err, DomainError::RunNotFound(_)));
    }

    #[tokio::test]
    async fn assembled_document_uses_latest_text_in_order() {
        let registry = Arc::new(MapRegistry::default());
        let store = Arc::new(MemoryCheckpointStore::default());

        let run = RunRecord::new("paper.md");
        registry.create_run(&run).await.unwrap();

        let refined = ProcessingUnit::new(SectionKind::Introduction, "# Intro\n\nold intro");
        let untouched = ProcessingUnit::new(SectionKind::Methods, "# Methods\n\nnever started");
        registry.insert_unit(&run.id, 0, &refined).await.unwrap();
        registry.insert_unit(&run.id, 1, &untouched).await.unwrap();
        store
            .commit(&Checkpoint::new(
                refined.id,
                1,
                "# Intro\n\nnew intro",
                metrics(0.1),
            ))
            .await
            .unwrap();

        let builder = ReportBuilder::new(registry, store);
        let document = builder.assemble_document(&run.id).await.unwrap();
        assert_eq!(
            document,
            "# Intro\n\nnew intro\n\n# Methods\n\nnever started"
        );
    }
}
