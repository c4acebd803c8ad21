//! Cross-backend contract tests for checkpoint stores.
//!
//! The refinement loop is written against the [`CheckpointStore`] port
//! and must behave identically whether it is backed by memory or SQLite.
//! Each scenario here runs once per backend through the same assertion
//! body, so any semantic drift between the two fails loudly.

mod common;

use common::clean_bundle;
use redraft::adapters::sqlite::{create_migrated_test_pool, SqliteCheckpointStore};
use redraft::adapters::MemoryCheckpointStore;
use redraft::domain::errors::DomainError;
use redraft::domain::models::{
    AggressionLevel, Checkpoint, MetricBundle, RejectedAttempt, RejectionKind,
};
use redraft::domain::ports::CheckpointStore;
use uuid::Uuid;

async fn sqlite_store() -> SqliteCheckpointStore {
    let pool = create_migrated_test_pool()
        .await
        .expect("failed to create migrated test pool");
    SqliteCheckpointStore::new(pool)
}

fn checkpoint(unit_id: Uuid, iteration: u32, text: &str) -> Checkpoint {
    Checkpoint::new(unit_id, iteration, text, clean_bundle(0.5))
}

// ----------------------------------------------------------------------------
// Shared assertion bodies
// ----------------------------------------------------------------------------

async fn assert_commits_are_immutable(store: &dyn CheckpointStore) {
    let unit_id = Uuid::new_v4();
    store.commit(&checkpoint(unit_id, 0, "baseline")).await.unwrap();
    store.commit(&checkpoint(unit_id, 1, "first")).await.unwrap();

    let err = store
        .commit(&checkpoint(unit_id, 1, "usurper"))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        DomainError::CheckpointExists { iteration: 1, .. }
    ));

    // Later commits never disturb earlier rows.
    store.commit(&checkpoint(unit_id, 2, "second")).await.unwrap();
    assert_eq!(store.at(unit_id, 1).await.unwrap().unwrap().text, "first");
    assert_eq!(
        store.at(unit_id, 0).await.unwrap().unwrap().text,
        "baseline"
    );
}

async fn assert_rollback_targets_latest(store: &dyn CheckpointStore) {
    let unit_id = Uuid::new_v4();

    let err = store.rollback(unit_id).await.unwrap_err();
    assert!(matches!(err, DomainError::CheckpointNotFound { .. }));

    store.commit(&checkpoint(unit_id, 0, "baseline")).await.unwrap();
    store.commit(&checkpoint(unit_id, 1, "first")).await.unwrap();
    assert_eq!(store.rollback(unit_id).await.unwrap().text, "first");
}

async fn assert_rejections_never_become_latest(store: &dyn CheckpointStore) {
    let unit_id = Uuid::new_v4();
    store.commit(&checkpoint(unit_id, 0, "baseline")).await.unwrap();

    store
        .record_rejected(
            &RejectedAttempt::new(
                unit_id,
                0,
                AggressionLevel::Gentle,
                RejectionKind::QualityViolation,
                "term preservation 0.500 below required 1.000",
            )
            .with_metrics(MetricBundle::new(0.3, 0.95, 0.5, 0.99, None).unwrap()),
        )
        .await
        .unwrap();

    // The audit trail grew; the accepted timeline did not.
    assert_eq!(store.rejected(unit_id).await.unwrap().len(), 1);
    let latest = store.latest(unit_id).await.unwrap().unwrap();
    assert_eq!(latest.iteration, 0);
    assert_eq!(latest.text, "baseline");
    assert_eq!(store.history(unit_id).await.unwrap().len(), 1);
}

async fn assert_concurrent_units_do_not_interfere(store: &dyn CheckpointStore) {
    let left = Uuid::new_v4();
    let right = Uuid::new_v4();

    let left_baseline = checkpoint(left, 0, "left baseline");
    let right_baseline = checkpoint(right, 0, "right baseline");
    let left_rejected = RejectedAttempt::new(
        left,
        0,
        AggressionLevel::Gentle,
        RejectionKind::ProviderFatal,
        "empty candidate",
    );
    let right_rejected = RejectedAttempt::new(
        right,
        0,
        AggressionLevel::Gentle,
        RejectionKind::TransientExhausted,
        "503 overloaded",
    );
    let (a, b, c, d) = tokio::join!(
        store.commit(&left_baseline),
        store.commit(&right_baseline),
        store.record_rejected(&left_rejected),
        store.record_rejected(&right_rejected),
    );
    a.unwrap();
    b.unwrap();
    c.unwrap();
    d.unwrap();

    assert_eq!(
        store.latest(left).await.unwrap().unwrap().text,
        "left baseline"
    );
    assert_eq!(
        store.latest(right).await.unwrap().unwrap().text,
        "right baseline"
    );
    assert_eq!(store.rejected(left).await.unwrap().len(), 1);
    assert_eq!(
        store.rejected(right).await.unwrap()[0].kind,
        RejectionKind::TransientExhausted
    );
}

async fn assert_metrics_survive_storage(store: &dyn CheckpointStore) {
    let unit_id = Uuid::new_v4();
    let metrics = MetricBundle::new(0.42, 0.93, 1.0, 0.97, Some(0.88)).unwrap();
    store
        .commit(&Checkpoint::new(unit_id, 0, "scored text", metrics.clone()))
        .await
        .unwrap();

    let read_back = store.latest(unit_id).await.unwrap().unwrap();
    assert_eq!(read_back.metrics, metrics);
    assert_eq!(read_back.metrics.fluency_score(), Some(0.88));
}

// ----------------------------------------------------------------------------
// Per-backend entry points
// ----------------------------------------------------------------------------

#[tokio::test]
async fn test_memory_commits_are_immutable() {
    assert_commits_are_immutable(&MemoryCheckpointStore::new()).await;
}

#[tokio::test]
async fn test_sqlite_commits_are_immutable() {
    assert_commits_are_immutable(&sqlite_store().await).await;
}

#[tokio::test]
async fn test_memory_rollback_targets_latest() {
    assert_rollback_targets_latest(&MemoryCheckpointStore::new()).await;
}

#[tokio::test]
async fn test_sqlite_rollback_targets_latest() {
    assert_rollback_targets_latest(&sqlite_store().await).await;
}

#[tokio::test]
async fn test_memory_rejections_never_become_latest() {
    assert_rejections_never_become_latest(&MemoryCheckpointStore::new()).await;
}

#[tokio::test]
async fn test_sqlite_rejections_never_become_latest() {
    assert_rejections_never_become_latest(&sqlite_store().await).await;
}

#[tokio::test]
async fn test_memory_concurrent_units_do_not_interfere() {
    assert_concurrent_units_do_not_interfere(&MemoryCheckpointStore::new()).await;
}

#[tokio::test]
async fn test_sqlite_concurrent_units_do_not_interfere() {
    assert_concurrent_units_do_not_interfere(&sqlite_store().await).await;
}

#[tokio::test]
async fn test_memory_metrics_survive_storage() {
    assert_metrics_survive_storage(&MemoryCheckpointStore::new()).await;
}

#[tokio::test]
async fn test_sqlite_metrics_survive_storage() {
    assert_metrics_survive_storage(&sqlite_store().await).await;
}
