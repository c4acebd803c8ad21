//! SQLite implementation of the checkpoint store.
//!
//! Checkpoints are append-only rows keyed by `(unit_id, iteration)`; the
//! composite primary key turns a duplicate commit into a constraint
//! violation that surfaces as [`DomainError::CheckpointExists`].

use async_trait::async_trait;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::adapters::sqlite::{parse_datetime, parse_uuid};
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{Checkpoint, MetricBundle, RejectedAttempt};
use crate::domain::ports::CheckpointStore;

/// SQLite-backed persistence for checkpoints and the rejection audit trail.
#[derive(Clone)]
pub struct SqliteCheckpointStore {
    pool: SqlitePool,
}

impl SqliteCheckpointStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

/// SQLite row mapping for the `checkpoints` table.
#[derive(sqlx::FromRow)]
struct CheckpointRow {
    unit_id: String,
    iteration: i64,
    text: String,
    metrics_json: String,
    created_at: String,
}

impl TryFrom<CheckpointRow> for Checkpoint {
    type Error = DomainError;

    fn try_from(row: CheckpointRow) -> Result<Self, Self::Error> {
        Ok(Checkpoint {
            unit_id: parse_uuid(&row.unit_id)?,
            iteration: row.iteration as u32,
            text: row.text,
            metrics: serde_json::from_str(&row.metrics_json)?,
            created_at: parse_datetime(&row.created_at)?,
        })
    }
}

/// SQLite row mapping for the `rejected_attempts` table.
#[derive(sqlx::FromRow)]
struct RejectedAttemptRow {
    unit_id: String,
    at_iteration: i64,
    aggression: String,
    kind: String,
    detail: String,
    metrics_json: Option<String>,
    created_at: String,
}

impl TryFrom<RejectedAttemptRow> for RejectedAttempt {
    type Error = DomainError;

    fn try_from(row: RejectedAttemptRow) -> Result<Self, Self::Error> {
        let metrics = row
            .metrics_json
            .as_deref()
            .map(serde_json::from_str::<MetricBundle>)
            .transpose()?;

        Ok(RejectedAttempt {
            unit_id: parse_uuid(&row.unit_id)?,
            at_iteration: row.at_iteration as u32,
            aggression: row.aggression.parse()?,
            kind: row.kind.parse()?,
            detail: row.detail,
            metrics,
            created_at: parse_datetime(&row.created_at)?,
        })
    }
}

#[async_trait]
impl CheckpointStore for SqliteCheckpointStore {
    async fn commit(&self, checkpoint: &Checkpoint) -> DomainResult<()> {
        let metrics_json = serde_json::to_string(&checkpoint.metrics)?;

        let result = sqlx::query(
            r#"INSERT INTO checkpoints (unit_id, iteration, text, metrics_json, created_at)
               VALUES (?, ?, ?, ?, ?)"#,
        )
        .bind(checkpoint.unit_id.to_string())
        .bind(i64::from(checkpoint.iteration))
        .bind(&checkpoint.text)
        .bind(&metrics_json)
        .bind(checkpoint.created_at.to_rfc3339())
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                Err(DomainError::CheckpointExists {
                    unit_id: checkpoint.unit_id,
                    iteration: checkpoint.iteration,
                })
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn latest(&self, unit_id: Uuid) -> DomainResult<Option<Checkpoint>> {
        let row: Option<CheckpointRow> = sqlx::query_as(
            "SELECT unit_id, iteration, text, metrics_json, created_at
             FROM checkpoints WHERE unit_id = ?
             ORDER BY iteration DESC LIMIT 1",
        )
        .bind(unit_id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Checkpoint::try_from).transpose()
    }

    async fn at(&self, unit_id: Uuid, iteration: u32) -> DomainResult<Option<Checkpoint>> {
        let row: Option<CheckpointRow> = sqlx::query_as(
            "SELECT unit_id, iteration, text, metrics_json, created_at
             FROM checkpoints WHERE unit_id = ? AND iteration = ?",
        )
        .bind(unit_id.to_string())
        .bind(i64::from(iteration))
        .fetch_optional(&self.pool)
        .await?;

        row.map(Checkpoint::try_from).transpose()
    }

    async fn rollback(&self, unit_id: Uuid) -> DomainResult<Checkpoint> {
        self.latest(unit_id)
            .await?
            .ok_or(DomainError::CheckpointNotFound { unit_id, iteration: 0 })
    }

    async fn history(&self, unit_id: Uuid) -> DomainResult<Vec<Checkpoint>> {
        let rows: Vec<CheckpointRow> = sqlx::query_as(
            "SELECT unit_id, iteration, text, metrics_json, created_at
             FROM checkpoints WHERE unit_id = ?
             ORDER BY iteration ASC",
        )
        .bind(unit_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Checkpoint::try_from).collect()
    }

    async fn record_rejected(&self, attempt: &RejectedAttempt) -> DomainResult<()> {
        let metrics_json = attempt
            .metrics
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        sqlx::query(
            r#"INSERT INTO rejected_attempts
               (unit_id, at_iteration, aggression, kind, detail, metrics_json, created_at)
               VALUES (?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(attempt.unit_id.to_string())
        .bind(i64::from(attempt.at_iteration))
        .bind(attempt.aggression.as_str())
        .bind(attempt.kind.as_str())
        .bind(&attempt.detail)
        .bind(&metrics_json)
        .bind(attempt.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn rejected(&self, unit_id: Uuid) -> DomainResult<Vec<RejectedAttempt>> {
        let rows: Vec<RejectedAttemptRow> = sqlx::query_as(
            "SELECT unit_id, at_iteration, aggression, kind, detail, metrics_json, created_at
             FROM rejected_attempts WHERE unit_id = ?
             ORDER BY id ASC",
        )
        .bind(unit_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(RejectedAttempt::try_from).collect()
    }
}
