//! In-memory checkpoint store for tests and throwaway runs.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{Checkpoint, RejectedAttempt};
use crate::domain::ports::CheckpointStore;

/// [`CheckpointStore`] over lock-guarded maps, partitioned by unit id.
///
/// Semantics match the SQLite store exactly, including the append-only
/// commit check, so contract tests can run against either backend.
#[derive(Default)]
pub struct MemoryCheckpointStore {
    checkpoints: Arc<RwLock<HashMap<Uuid, Vec<Checkpoint>>>>,
    rejected: Arc<RwLock<HashMap<Uuid, Vec<RejectedAttempt>>>>,
}

impl MemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CheckpointStore for MemoryCheckpointStore {
    async fn commit(&self, checkpoint: &Checkpoint) -> DomainResult<()> {
        let mut checkpoints = self.checkpoints.write().await;
        let unit_checkpoints = checkpoints.entry(checkpoint.unit_id).or_default();
        if unit_checkpoints
            .iter()
            .any(|existing| existing.iteration == checkpoint.iteration)
        {
            return Err(DomainError::CheckpointExists {
                unit_id: checkpoint.unit_id,
                iteration: checkpoint.iteration,
            });
        }
        unit_checkpoints.push(checkpoint.clone());
        unit_checkpoints.sort_by_key(|c| c.iteration);
        Ok(())
    }

    async fn latest(&self, unit_id: Uuid) -> DomainResult<Option<Checkpoint>> {
        let checkpoints = self.checkpoints.read().await;
        Ok(checkpoints
            .get(&unit_id)
            .and_then(|unit_checkpoints| unit_checkpoints.last().cloned()))
    }

    async fn at(&self, unit_id: Uuid, iteration: u32) -> DomainResult<Option<Checkpoint>> {
        let checkpoints = self.checkpoints.read().await;
        Ok(checkpoints.get(&unit_id).and_then(|unit_checkpoints| {
            unit_checkpoints
                .iter()
                .find(|c| c.iteration == iteration)
                .cloned()
        }))
    }

    async fn rollback(&self, unit_id: Uuid) -> DomainResult<Checkpoint> {
        self.latest(unit_id)
            .await?
            .ok_or(DomainError::CheckpointNotFound {
                unit_id,
                iteration: 0,
            })
    }

    async fn history(&self, unit_id: Uuid) -> DomainResult<Vec<Checkpoint>> {
        let checkpoints = self.checkpoints.read().await;
        Ok(checkpoints.get(&unit_id).cloned().unwrap_or_default())
    }

    async fn record_rejected(&self, attempt: &RejectedAttempt) -> DomainResult<()> {
        let mut rejected = self.rejected.write().await;
        rejected
            .entry(attempt.unit_id)
            .or_default()
            .push(attempt.clone());
        Ok(())
    }

    async fn rejected(&self, unit_id: Uuid) -> DomainResult<Vec<RejectedAttempt>> {
        let rejected = self.rejected.read().await;
        Ok(rejected.get(&unit_id).cloned().unwrap_or_default())
    }
}
