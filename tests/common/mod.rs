//! Shared fixtures for integration tests.

use std::sync::Arc;

use tokio::sync::{broadcast, mpsc};

use redraft::adapters::providers::{ScriptedScorer, ScriptedTransformer};
use redraft::adapters::MemoryCheckpointStore;
use redraft::domain::models::{
    Glossary, MetricBundle, ProcessingUnit, RefineConfig, RefinementEvent, SectionKind,
};
use redraft::infrastructure::ProviderGate;
use redraft::services::{RefinementLoop, TermVault, UnitOutcome};

/// Loop tuning for tests: near-zero backoff so exhausted retries do not
/// slow the suite down.
#[allow(dead_code)]
pub fn fast_config() -> RefineConfig {
    RefineConfig {
        initial_backoff_ms: 1,
        max_backoff_ms: 4,
        provider_timeout_secs: 5,
        worker_pool_size: 2,
        provider_concurrency: 4,
        ..RefineConfig::default()
    }
}

/// A bundle that clears every quality floor at the given detection score.
#[allow(dead_code)]
pub fn clean_bundle(detection: f64) -> MetricBundle {
    MetricBundle::new(detection, 0.95, 1.0, 0.99, None).expect("test bundle fields are in range")
}

/// A fresh body-section unit.
#[allow(dead_code)]
pub fn body_unit(text: &str) -> ProcessingUnit {
    ProcessingUnit::new(SectionKind::Body, text)
}

/// A refinement loop wired over scripted providers and an in-memory
/// checkpoint store, with handles kept on every collaborator so tests can
/// script responses and inspect what happened.
#[allow(dead_code)]
pub struct LoopHarness {
    pub transformer: Arc<ScriptedTransformer>,
    pub scorer: Arc<ScriptedScorer>,
    pub store: Arc<MemoryCheckpointStore>,
    pub refinement: RefinementLoop,
}

#[allow(dead_code)]
impl LoopHarness {
    pub fn new(config: RefineConfig) -> Self {
        Self::with_glossary(config, Glossary::empty())
    }

    pub fn with_glossary(config: RefineConfig, glossary: Glossary) -> Self {
        let transformer = Arc::new(ScriptedTransformer::new());
        let scorer = Arc::new(ScriptedScorer::new());
        let store = Arc::new(MemoryCheckpointStore::new());
        let gate = ProviderGate::new(config.provider_concurrency, 1_000.0);
        let refinement = RefinementLoop::new(
            transformer.clone(),
            scorer.clone(),
            store.clone(),
            TermVault::new(glossary),
            gate,
            config,
        );
        Self {
            transformer,
            scorer,
            store,
            refinement,
        }
    }

    /// Run one unit to completion with no shutdown signal and return the
    /// outcome plus every event the loop emitted.
    pub async fn run(&self, unit: &mut ProcessingUnit) -> (UnitOutcome, Vec<RefinementEvent>) {
        let (events_tx, mut events_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, mut shutdown) = broadcast::channel(1);
        let outcome = self
            .refinement
            .run_unit(unit, &events_tx, &mut shutdown)
            .await
            .expect("refinement loop failed");
        drop(shutdown_tx);
        drop(events_tx);

        let mut events = Vec::new();
        while let Ok(event) = events_rx.try_recv() {
            events.push(event);
        }
        (outcome, events)
    }

    /// Run one unit with a shutdown signal already pending.
    pub async fn run_with_shutdown_pending(
        &self,
        unit: &mut ProcessingUnit,
    ) -> (UnitOutcome, Vec<RefinementEvent>) {
        let (events_tx, mut events_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, mut shutdown) = broadcast::channel(1);
        shutdown_tx.send(()).expect("receiver is alive");
        let outcome = self
            .refinement
            .run_unit(unit, &events_tx, &mut shutdown)
            .await
            .expect("refinement loop failed");
        drop(events_tx);

        let mut events = Vec::new();
        while let Ok(event) = events_rx.try_recv() {
            events.push(event);
        }
        (outcome, events)
    }
}
