//! Document runner: fans a run's units out over a bounded worker pool.
//!
//! Each unit gets its own worker task; a semaphore caps how many refine
//! concurrently. Workers stream [`RefinementEvent`]s back over an mpsc
//! channel and watch a broadcast shutdown signal, so Ctrl-C lands at the
//! next stage boundary of every in-flight unit. Resume is the same code
//! path as a fresh run: terminal units are counted and skipped, ACTIVE
//! ones are rebuilt from their checkpoint history and continued.

use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::{broadcast, mpsc, Semaphore};
use tracing::{info, instrument, warn};

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    Checkpoint, MetricBundle, PlaceholderMap, ProcessingUnit, RefineConfig, RefinementEvent,
    RunRecord, SectionKind, TerminationReason, UnitStatus,
};
use crate::domain::ports::{RegisteredUnit, UnitRegistry};
use crate::services::refinement_loop::{RefinementLoop, UnitOutcome};

/// Counts of how a run's units ended.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunOutcome {
    pub accepted: usize,
    pub borderline: usize,
    pub failed: usize,
    /// Units left ACTIVE by a shutdown; `resume` picks them up.
    pub interrupted: usize,
}

impl RunOutcome {
    /// Whether every unit reached a terminal status.
    pub const fn is_complete(&self) -> bool {
        self.interrupted == 0
    }

    pub const fn total(&self) -> usize {
        self.accepted + self.borderline + self.failed + self.interrupted
    }

    fn count(&mut self, status: UnitStatus) {
        match status {
            UnitStatus::Accepted => self.accepted += 1,
            UnitStatus::Borderline => self.borderline += 1,
            UnitStatus::Failed => self.failed += 1,
            UnitStatus::Active => self.interrupted += 1,
        }
    }
}

/// How a single worker's unit ended.
enum UnitVerdict {
    Finished(UnitStatus),
    Interrupted,
}

/// Orchestrates one document run over the refinement loop.
pub struct DocumentRunner {
    refinement: RefinementLoop,
    registry: Arc<dyn UnitRegistry>,
    config: RefineConfig,
    event_tx: mpsc::UnboundedSender<RefinementEvent>,
    event_rx: Option<mpsc::UnboundedReceiver<RefinementEvent>>,
    shutdown_tx: broadcast::Sender<()>,
}

impl DocumentRunner {
    /// Wire a runner over an already-built loop and registry.
    pub fn new(
        refinement: RefinementLoop,
        registry: Arc<dyn UnitRegistry>,
        config: RefineConfig,
    ) -> Self {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            refinement,
            registry,
            config,
            event_tx,
            event_rx: Some(event_rx),
            shutdown_tx,
        }
    }

    /// Take the event stream to drive a display or log consumer.
    /// Returns `None` if it was already taken.
    pub fn take_event_receiver(&mut self) -> Option<mpsc::UnboundedReceiver<RefinementEvent>> {
        self.event_rx.take()
    }

    /// Handle for requesting a cooperative shutdown. Workers notice at
    /// their next stage boundary; in-flight commits always complete.
    pub fn shutdown_handle(&self) -> broadcast::Sender<()> {
        self.shutdown_tx.clone()
    }

    /// Register a run and its sections in document order.
    pub async fn register_run(
        &self,
        input_path: &str,
        sections: Vec<(SectionKind, String)>,
    ) -> DomainResult<RunRecord> {
        let run = RunRecord::new(input_path);
        self.registry.create_run(&run).await?;
        let count = sections.len();
        for (position, (section, text)) in sections.into_iter().enumerate() {
            let unit = ProcessingUnit::new(section, text);
            self.registry
                .insert_unit(&run.id, position as u32, &unit)
                .await?;
        }
        info!(run_id = %run.id, units = count, input = input_path, "run registered");
        Ok(run)
    }

    /// Refine every non-terminal unit of the run to completion or
    /// interruption.
    #[instrument(skip(self))]
    pub async fn run(&self, run_id: &str) -> DomainResult<RunOutcome> {
        if self.registry.get_run(run_id).await?.is_none() {
            return Err(DomainError::RunNotFound(run_id.to_string()));
        }

        let rows = self.registry.units_for_run(run_id).await?;
        let mut outcome = RunOutcome::default();
        let mut pending = Vec::new();
        for row in rows {
            if row.status.is_terminal() {
                outcome.count(row.status);
            } else {
                pending.push(row);
            }
        }

        if pending.is_empty() {
            info!(run_id, "no active units to refine");
            return Ok(outcome);
        }

        info!(
            run_id,
            units = pending.len(),
            workers = self.config.worker_pool_size,
            "refinement started"
        );

        // Subscribe every worker before spawning so a shutdown sent while
        // earlier units are still refining reaches the ones queued behind
        // them too.
        let receivers: Vec<_> = pending.iter().map(|_| self.shutdown_tx.subscribe()).collect();

        let workers = Arc::new(Semaphore::new(self.config.worker_pool_size));
        let mut handles = Vec::with_capacity(pending.len());
        for (row, mut shutdown) in pending.into_iter().zip(receivers) {
            let permit = workers
                .clone()
                .acquire_owned()
                .await
                .map_err(|e| DomainError::ValidationFailed(format!("worker pool closed: {e}")))?;
            let worker = UnitWorker {
                refinement: self.refinement.clone(),
                registry: Arc::clone(&self.registry),
                events: self.event_tx.clone(),
                score_baseline: self.config.score_baseline,
            };
            handles.push(tokio::spawn(async move {
                let _permit = permit;
                worker.process(row, &mut shutdown).await
            }));
        }

        for joined in join_all(handles).await {
            match joined {
                Ok(UnitVerdict::Finished(status)) => outcome.count(status),
                Ok(UnitVerdict::Interrupted) => outcome.interrupted += 1,
                Err(err) => {
                    warn!(error = %err, "unit worker aborted; unit stays active");
                    outcome.interrupted += 1;
                }
            }
        }

        info!(
            run_id,
            accepted = outcome.accepted,
            borderline = outcome.borderline,
            failed = outcome.failed,
            interrupted = outcome.interrupted,
            "refinement finished"
        );
        Ok(outcome)
    }
}

/// Everything one spawned unit task needs, cloned per unit.
struct UnitWorker {
    refinement: RefinementLoop,
    registry: Arc<dyn UnitRegistry>,
    events: mpsc::UnboundedSender<RefinementEvent>,
    score_baseline: bool,
}

impl UnitWorker {
    async fn process(
        self,
        row: RegisteredUnit,
        shutdown: &mut broadcast::Receiver<()>,
    ) -> UnitVerdict {
        let unit_id = row.id;
        let section = row.section;
        let position = row.position as usize;

        let history = match self.refinement.store().history(unit_id).await {
            Ok(history) => history,
            Err(err) => {
                warn!(unit_id = %unit_id, error = %err, "checkpoint history unavailable; unit left active");
                return UnitVerdict::Interrupted;
            }
        };
        let fresh = history.is_empty();
        let mut unit = match rebuild_unit(row, history) {
            Ok(unit) => unit,
            Err(err) => {
                warn!(unit_id = %unit_id, error = %err, "unit could not be rebuilt; left active");
                return UnitVerdict::Interrupted;
            }
        };

        self.emit(RefinementEvent::UnitStarted {
            unit_id,
            section,
            position,
            timestamp: chrono::Utc::now(),
        });

        if self.score_baseline && fresh {
            match self.refinement.score_baseline(&unit).await {
                Ok(bundle) => {
                    self.emit(RefinementEvent::BaselineScored {
                        unit_id,
                        detection_score: bundle.detection_score(),
                        timestamp: chrono::Utc::now(),
                    });
                    unit = unit.with_baseline(bundle);
                }
                Err(err) => {
                    warn!(unit_id = %unit_id, error = %err, "baseline scoring failed; assuming worst case");
                }
            }
        }

        match self.refinement.run_unit(&mut unit, &self.events, shutdown).await {
            Ok(UnitOutcome::Finished(reason)) => {
                self.persist(&unit).await;
                self.emit(RefinementEvent::UnitFinished {
                    unit_id,
                    status: unit.status,
                    termination: Some(reason),
                    iterations: unit.iteration,
                    timestamp: chrono::Utc::now(),
                });
                UnitVerdict::Finished(unit.status)
            }
            Ok(UnitOutcome::Interrupted) => {
                // Aggression and the supplemental flag advanced this session
                // must survive into the resume.
                self.persist(&unit).await;
                self.emit(RefinementEvent::UnitInterrupted {
                    unit_id,
                    at_iteration: unit.iteration,
                    timestamp: chrono::Utc::now(),
                });
                info!(unit_id = %unit_id, iteration = unit.iteration, "unit interrupted; resumable");
                UnitVerdict::Interrupted
            }
            Err(err) => {
                // Storage or configuration trouble, not provider trouble.
                // Archive the unit so the run report stays complete.
                warn!(unit_id = %unit_id, error = %err, "unit failed outside the loop");
                let _ = unit.finish(UnitStatus::Failed, TerminationReason::FatalQualityViolation);
                self.persist(&unit).await;
                self.emit(RefinementEvent::UnitFinished {
                    unit_id,
                    status: unit.status,
                    termination: unit.termination,
                    iterations: unit.iteration,
                    timestamp: chrono::Utc::now(),
                });
                UnitVerdict::Finished(unit.status)
            }
        }
    }

    async fn persist(&self, unit: &ProcessingUnit) {
        if let Err(err) = self.registry.update_unit(unit).await {
            warn!(unit_id = %unit.id, error = %err, "failed to persist unit state");
        }
    }

    fn emit(&self, event: RefinementEvent) {
        let _ = self.events.send(event);
    }
}

/// Rebuild the in-memory unit for a worker. Units that were registered but
/// never started have no checkpoint rows yet and restart from the original
/// text.
fn rebuild_unit(row: RegisteredUnit, history: Vec<Checkpoint>) -> DomainResult<ProcessingUnit> {
    if history.is_empty() {
        let original_text = row.original_text;
        return Ok(ProcessingUnit {
            id: row.id,
            section: row.section,
            current_text: original_text.clone(),
            original_text,
            placeholders: PlaceholderMap::default(),
            iteration: 0,
            aggression: row.aggression,
            supplemental_spent: row.supplemental_spent,
            metric_history: vec![MetricBundle::worst_case()],
            status: row.status,
            termination: row.termination,
            created_at: row.created_at,
            updated_at: row.updated_at,
        });
    }
    row.into_unit(history)
}
