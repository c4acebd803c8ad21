//! Document runner integration tests over the real SQLite stores.
//!
//! These run against an in-memory database with all migrations applied,
//! so the full path from worker pool through checkpoint persistence and
//! unit lifecycle rows is exercised, with only the providers scripted.

mod common;

use std::sync::Arc;

use common::{clean_bundle, fast_config};
use redraft::adapters::providers::{ScriptedScorer, ScriptedTransformer};
use redraft::adapters::sqlite::{
    create_migrated_test_pool, SqliteCheckpointStore, SqliteUnitRegistry,
};
use redraft::application::DocumentRunner;
use redraft::domain::errors::DomainError;
use redraft::domain::models::{
    Glossary, RefineConfig, RefinementEvent, SectionKind, TerminationReason, UnitStatus,
};
use redraft::domain::ports::{CheckpointStore, UnitRegistry};
use redraft::infrastructure::ProviderGate;
use redraft::services::{RefinementLoop, TermVault};

/// Scripted providers plus SQLite stores shared across runner instances,
/// so a second runner resumes exactly what the first one left behind.
struct RunnerHarness {
    transformer: Arc<ScriptedTransformer>,
    scorer: Arc<ScriptedScorer>,
    store: Arc<SqliteCheckpointStore>,
    registry: Arc<SqliteUnitRegistry>,
    config: RefineConfig,
}

impl RunnerHarness {
    async fn new(config: RefineConfig, default_detection: f64) -> Self {
        let pool = create_migrated_test_pool()
            .await
            .expect("failed to create migrated test pool");
        Self {
            transformer: Arc::new(ScriptedTransformer::new()),
            scorer: Arc::new(ScriptedScorer::with_default(clean_bundle(default_detection))),
            store: Arc::new(SqliteCheckpointStore::new(pool.clone())),
            registry: Arc::new(SqliteUnitRegistry::new(pool)),
            config,
        }
    }

    fn runner(&self) -> DocumentRunner {
        let refinement = RefinementLoop::new(
            self.transformer.clone(),
            self.scorer.clone(),
            self.store.clone(),
            TermVault::new(Glossary::empty()),
            ProviderGate::new(self.config.provider_concurrency, 1_000.0),
            self.config.clone(),
        );
        DocumentRunner::new(refinement, self.registry.clone(), self.config.clone())
    }
}

fn sections() -> Vec<(SectionKind, String)> {
    vec![
        (SectionKind::Introduction, "An opening paragraph.".to_string()),
        (SectionKind::Methods, "How the work was done.".to_string()),
        (SectionKind::Body, "The bulk of the argument.".to_string()),
    ]
}

#[tokio::test]
async fn run_refines_every_section_to_acceptance() {
    let harness = RunnerHarness::new(fast_config(), 0.1).await;
    let mut runner = harness.runner();
    let mut events = runner.take_event_receiver().unwrap();

    let run = runner.register_run("paper.md", sections()).await.unwrap();
    let outcome = runner.run(&run.id).await.unwrap();

    assert_eq!(outcome.accepted, 3);
    assert_eq!(outcome.interrupted, 0);
    assert!(outcome.is_complete());

    let rows = harness.registry.units_for_run(&run.id).await.unwrap();
    assert_eq!(rows.len(), 3);
    for (expected_position, row) in rows.iter().enumerate() {
        assert_eq!(row.position as usize, expected_position);
        assert_eq!(row.status, UnitStatus::Accepted);
        assert_eq!(row.termination, Some(TerminationReason::TargetMet));

        let history = harness.store.history(row.id).await.unwrap();
        assert_eq!(history.len(), 2, "baseline plus one accepted iteration");
    }

    let mut started = 0;
    let mut finished = 0;
    while let Ok(event) = events.try_recv() {
        match event {
            RefinementEvent::UnitStarted { .. } => started += 1,
            RefinementEvent::UnitFinished { status, .. } => {
                finished += 1;
                assert_eq!(status, UnitStatus::Accepted);
            }
            _ => {}
        }
    }
    assert_eq!(started, 3);
    assert_eq!(finished, 3);
}

#[tokio::test]
async fn units_keep_their_document_order() {
    let harness = RunnerHarness::new(fast_config(), 0.1).await;
    let runner = harness.runner();

    let run = runner.register_run("paper.md", sections()).await.unwrap();
    assert!(run.id.starts_with("run-"));

    let rows = harness.registry.units_for_run(&run.id).await.unwrap();
    let kinds: Vec<SectionKind> = rows.iter().map(|row| row.section).collect();
    assert_eq!(
        kinds,
        vec![
            SectionKind::Introduction,
            SectionKind::Methods,
            SectionKind::Body
        ]
    );
    assert_eq!(rows[1].original_text, "How the work was done.");
}

#[tokio::test]
async fn second_run_skips_terminal_units() {
    let harness = RunnerHarness::new(fast_config(), 0.1).await;
    let runner = harness.runner();
    let run = runner.register_run("paper.md", sections()).await.unwrap();

    let first = runner.run(&run.id).await.unwrap();
    assert_eq!(first.accepted, 3);
    let calls_after_first = harness.transformer.calls().await;

    let second = harness.runner().run(&run.id).await.unwrap();
    assert_eq!(second.accepted, 3);
    assert_eq!(
        harness.transformer.calls().await,
        calls_after_first,
        "terminal units were counted, not re-refined"
    );
}

#[tokio::test]
async fn shutdown_interrupts_and_resume_finishes_the_run() {
    // A scorer stuck at 0.5 never reaches the target, so units stay busy
    // until the shutdown lands. Pool size 1 serializes the two units.
    let config = RefineConfig {
        worker_pool_size: 1,
        max_iterations: 3,
        ..fast_config()
    };
    let harness = RunnerHarness::new(config, 0.5).await;

    let mut runner = harness.runner();
    let run = runner
        .register_run(
            "paper.md",
            vec![
                (SectionKind::Body, "First stubborn section.".to_string()),
                (SectionKind::Body, "Second stubborn section.".to_string()),
            ],
        )
        .await
        .unwrap();
    let mut events = runner.take_event_receiver().unwrap();
    let shutdown = runner.shutdown_handle();

    let run_id = run.id.clone();
    let driver = tokio::spawn(async move { runner.run(&run_id).await });

    // Interrupt as soon as the first iteration lands anywhere.
    while let Some(event) = events.recv().await {
        if matches!(event, RefinementEvent::IterationCommitted { .. }) {
            let _ = shutdown.send(());
            break;
        }
    }
    let interrupted_outcome = driver.await.unwrap().unwrap();

    assert_eq!(interrupted_outcome.total(), 2);
    assert!(
        interrupted_outcome.interrupted >= 1,
        "the queued unit saw the shutdown before starting"
    );

    // Resume over the same stores; the scorer now cooperates.
    harness.scorer.push_bundle(clean_bundle(0.1)).await;
    harness.scorer.push_bundle(clean_bundle(0.1)).await;
    let resumed_outcome = harness.runner().run(&run.id).await.unwrap();

    assert!(resumed_outcome.is_complete());
    assert_eq!(resumed_outcome.total(), 2);

    // Committed work was never re-executed: each unit's checkpoint
    // iterations are a strictly increasing sequence from zero.
    let rows = harness.registry.units_for_run(&run.id).await.unwrap();
    for row in rows {
        assert!(row.status.is_terminal());
        let history = harness.store.history(row.id).await.unwrap();
        let iterations: Vec<u32> = history.iter().map(|c| c.iteration).collect();
        let expected: Vec<u32> = (0..iterations.len() as u32).collect();
        assert_eq!(iterations, expected);
    }
}

#[tokio::test]
async fn unknown_run_ids_are_rejected() {
    let harness = RunnerHarness::new(fast_config(), 0.1).await;
    let runner = harness.runner();

    let err = runner.run("run-00000000").await.unwrap_err();
    assert!(matches!(err, DomainError::RunNotFound(id) if id == "run-00000000"));
}

#[tokio::test]
async fn baseline_scoring_accepts_already_human_sections() {
    let config = RefineConfig {
        score_baseline: true,
        ..fast_config()
    };
    let harness = RunnerHarness::new(config, 0.5).await;
    // The baseline probe returns a score under the target; no transform
    // should ever happen.
    harness.scorer.push_bundle(clean_bundle(0.05)).await;

    let mut runner = harness.runner();
    let mut events = runner.take_event_receiver().unwrap();
    let run = runner
        .register_run(
            "paper.md",
            vec![(SectionKind::Body, "Plainly human prose.".to_string())],
        )
        .await
        .unwrap();

    let outcome = runner.run(&run.id).await.unwrap();
    assert_eq!(outcome.accepted, 1);
    assert_eq!(harness.transformer.calls().await, 0);
    assert_eq!(harness.scorer.calls().await, 1, "only the baseline probe");

    let baseline_seen = std::iter::from_fn(|| events.try_recv().ok()).any(|event| {
        matches!(
            event,
            RefinementEvent::BaselineScored { detection_score, .. }
            if detection_score < 0.2
        )
    });
    assert!(baseline_seen);
}
