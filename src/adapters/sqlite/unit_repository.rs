//! SQLite implementation of the unit registry.
//!
//! Stores run membership and unit lifecycle rows so an interrupted run can
//! be resumed from its checkpoints via `units_for_run()` on startup.

use async_trait::async_trait;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::adapters::sqlite::{parse_datetime, parse_uuid};
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{ProcessingUnit, RunRecord};
use crate::domain::ports::{RegisteredUnit, UnitRegistry};

/// SQLite-backed persistence for runs and unit lifecycle state.
#[derive(Clone)]
pub struct SqliteUnitRegistry {
    pool: SqlitePool,
}

impl SqliteUnitRegistry {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

/// SQLite row mapping for the `runs` table.
#[derive(sqlx::FromRow)]
struct RunRow {
    id: String,
    input_path: String,
    created_at: String,
    updated_at: String,
}

impl TryFrom<RunRow> for RunRecord {
    type Error = DomainError;

    fn try_from(row: RunRow) -> Result<Self, Self::Error> {
        Ok(RunRecord {
            id: row.id,
            input_path: row.input_path,
            created_at: parse_datetime(&row.created_at)?,
            updated_at: parse_datetime(&row.updated_at)?,
        })
    }
}

/// SQLite row mapping for the `units` table.
#[derive(sqlx::FromRow)]
struct UnitRow {
    id: String,
    run_id: String,
    position: i64,
    section: String,
    original_text: String,
    status: String,
    aggression: String,
    supplemental_spent: i64,
    termination: Option<String>,
    created_at: String,
    updated_at: String,
}

impl TryFrom<UnitRow> for RegisteredUnit {
    type Error = DomainError;

    fn try_from(row: UnitRow) -> Result<Self, Self::Error> {
        Ok(RegisteredUnit {
            run_id: row.run_id,
            position: row.position as u32,
            id: parse_uuid(&row.id)?,
            section: row.section.parse()?,
            original_text: row.original_text,
            status: row.status.parse()?,
            aggression: row.aggression.parse()?,
            supplemental_spent: row.supplemental_spent != 0,
            termination: row.termination.as_deref().map(str::parse).transpose()?,
            created_at: parse_datetime(&row.created_at)?,
            updated_at: parse_datetime(&row.updated_at)?,
        })
    }
}

#[async_trait]
impl UnitRegistry for SqliteUnitRegistry {
    async fn create_run(&self, run: &RunRecord) -> DomainResult<()> {
        sqlx::query(
            "INSERT INTO runs (id, input_path, created_at, updated_at) VALUES (?, ?, ?, ?)",
        )
        .bind(&run.id)
        .bind(&run.input_path)
        .bind(run.created_at.to_rfc3339())
        .bind(run.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_run(&self, run_id: &str) -> DomainResult<Option<RunRecord>> {
        let row: Option<RunRow> = sqlx::query_as(
            "SELECT id, input_path, created_at, updated_at FROM runs WHERE id = ?",
        )
        .bind(run_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(RunRecord::try_from).transpose()
    }

    async fn insert_unit(
        &self,
        run_id: &str,
        position: u32,
        unit: &ProcessingUnit,
    ) -> DomainResult<()> {
        sqlx::query(
            r#"INSERT INTO units
               (id, run_id, position, section, original_text, status, aggression,
                supplemental_spent, termination, created_at, updated_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(unit.id.to_string())
        .bind(run_id)
        .bind(i64::from(position))
        .bind(unit.section.as_str())
        .bind(&unit.original_text)
        .bind(unit.status.as_str())
        .bind(unit.aggression.as_str())
        .bind(i64::from(unit.supplemental_spent))
        .bind(unit.termination.map(|t| t.as_str()))
        .bind(unit.created_at.to_rfc3339())
        .bind(unit.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn update_unit(&self, unit: &ProcessingUnit) -> DomainResult<()> {
        let result = sqlx::query(
            r#"UPDATE units
               SET status = ?, aggression = ?, supplemental_spent = ?,
                   termination = ?, updated_at = ?
               WHERE id = ?"#,
        )
        .bind(unit.status.as_str())
        .bind(unit.aggression.as_str())
        .bind(i64::from(unit.supplemental_spent))
        .bind(unit.termination.map(|t| t.as_str()))
        .bind(unit.updated_at.to_rfc3339())
        .bind(unit.id.to_string())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DomainError::UnitNotFound(unit.id));
        }
        Ok(())
    }

    async fn units_for_run(&self, run_id: &str) -> DomainResult<Vec<RegisteredUnit>> {
        let rows: Vec<UnitRow> = sqlx::query_as(
            "SELECT id, run_id, position, section, original_text, status, aggression,
                    supplemental_spent, termination, created_at, updated_at
             FROM units WHERE run_id = ?
             ORDER BY position ASC",
        )
        .bind(run_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(RegisteredUnit::try_from).collect()
    }

    async fn get_unit(&self, unit_id: Uuid) -> DomainResult<Option<RegisteredUnit>> {
        let row: Option<UnitRow> = sqlx::query_as(
            "SELECT id, run_id, position, section, original_text, status, aggression,
                    supplemental_spent, termination, created_at, updated_at
             FROM units WHERE id = ?",
        )
        .bind(unit_id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.map(RegisteredUnit::try_from).transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sqlite::create_migrated_test_pool;
    use crate::domain::models::{
        AggressionLevel, SectionKind, TerminationReason, UnitStatus,
    };

    async fn seeded_run(registry: &SqliteUnitRegistry) -> RunRecord {
        let run = RunRecord::new("paper.md");
        registry.create_run(&run).await.unwrap();
        run
    }

    #[tokio::test]
    async fn test_create_and_get_run() {
        let pool = create_migrated_test_pool().await.unwrap();
        let registry = SqliteUnitRegistry::new(pool);

        let run = seeded_run(&registry).await;
        let fetched = registry.get_run(&run.id).await.unwrap().unwrap();
        assert_eq!(fetched.id, run.id);
        assert_eq!(fetched.input_path, "paper.md");

        assert!(registry.get_run("run-00000000").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_insert_and_list_units_in_position_order() {
        let pool = create_migrated_test_pool().await.unwrap();
        let registry = SqliteUnitRegistry::new(pool);
        let run = seeded_run(&registry).await;

        let intro = ProcessingUnit::new(SectionKind::Introduction, "intro text");
        let methods = ProcessingUnit::new(SectionKind::Methods, "methods text");
        // Insert out of document order
        registry.insert_unit(&run.id, 1, &methods).await.unwrap();
        registry.insert_unit(&run.id, 0, &intro).await.unwrap();

        let units = registry.units_for_run(&run.id).await.unwrap();
        assert_eq!(units.len(), 2);
        assert_eq!(units[0].position, 0);
        assert_eq!(units[0].section, SectionKind::Introduction);
        assert_eq!(units[1].position, 1);
        assert_eq!(units[1].section, SectionKind::Methods);
    }

    #[tokio::test]
    async fn test_update_persists_lifecycle_state() {
        let pool = create_migrated_test_pool().await.unwrap();
        let registry = SqliteUnitRegistry::new(pool);
        let run = seeded_run(&registry).await;

        let mut unit = ProcessingUnit::new(SectionKind::Body, "text");
        registry.insert_unit(&run.id, 0, &unit).await.unwrap();

        unit.escalate_to(AggressionLevel::Intensive).unwrap();
        unit.supplemental_spent = true;
        unit.finish(UnitStatus::Borderline, TerminationReason::MaxIterationsExhausted)
            .unwrap();
        registry.update_unit(&unit).await.unwrap();

        let row = registry.get_unit(unit.id).await.unwrap().unwrap();
        assert_eq!(row.status, UnitStatus::Borderline);
        assert_eq!(row.aggression, AggressionLevel::Intensive);
        assert!(row.supplemental_spent);
        assert_eq!(row.termination, Some(TerminationReason::MaxIterationsExhausted));
    }

    #[tokio::test]
    async fn test_update_unknown_unit_is_an_error() {
        let pool = create_migrated_test_pool().await.unwrap();
        let registry = SqliteUnitRegistry::new(pool);

        let unit = ProcessingUnit::new(SectionKind::Body, "never inserted");
        let err = registry.update_unit(&unit).await.unwrap_err();
        assert!(matches!(err, DomainError::UnitNotFound(_)));
    }

    #[tokio::test]
    async fn test_runs_are_isolated() {
        let pool = create_migrated_test_pool().await.unwrap();
        let registry = SqliteUnitRegistry::new(pool);
        let first = seeded_run(&registry).await;
        let second = seeded_run(&registry).await;

        let unit = ProcessingUnit::new(SectionKind::Body, "text");
        registry.insert_unit(&first.id, 0, &unit).await.unwrap();

        assert_eq!(registry.units_for_run(&first.id).await.unwrap().len(), 1);
        assert!(registry.units_for_run(&second.id).await.unwrap().is_empty());
    }
}
