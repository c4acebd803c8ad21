//! Checkpoint store port.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::{Checkpoint, RejectedAttempt};

/// Append-only persistence of accepted snapshots plus the rejected-attempt
/// audit trail.
///
/// Records are partitioned by unit id; different units may commit
/// concurrently without interfering. A committed checkpoint is immutable:
/// re-committing the same `(unit_id, iteration)` key is an error, never an
/// overwrite.
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// Append an accepted snapshot. Fails with
    /// [`DomainError::CheckpointExists`](crate::domain::errors::DomainError::CheckpointExists)
    /// if the key was already committed.
    async fn commit(&self, checkpoint: &Checkpoint) -> DomainResult<()>;

    /// The most recent checkpoint for a unit, if any was committed.
    async fn latest(&self, unit_id: Uuid) -> DomainResult<Option<Checkpoint>>;

    /// The checkpoint at a specific iteration.
    async fn at(&self, unit_id: Uuid, iteration: u32) -> DomainResult<Option<Checkpoint>>;

    /// The checkpoint a rejected attempt falls back to: the current
    /// `latest`. Rejected attempts are recorded separately and never
    /// become `latest`.
    async fn rollback(&self, unit_id: Uuid) -> DomainResult<Checkpoint>;

    /// All checkpoints for a unit in iteration order.
    async fn history(&self, unit_id: Uuid) -> DomainResult<Vec<Checkpoint>>;

    /// Record an attempt that was thrown away.
    async fn record_rejected(&self, attempt: &RejectedAttempt) -> DomainResult<()>;

    /// The audit trail of rejected attempts in the order they happened.
    async fn rejected(&self, unit_id: Uuid) -> DomainResult<Vec<RejectedAttempt>>;
}
