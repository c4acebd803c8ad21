//! The refinement loop: one unit's walk from original text to a terminal
//! status.
//!
//! Each pass moves through a fixed sequence of stages:
//!
//! ```text
//! INIT -> TRANSFORMING -> SCORING -> GATING -> { COMMITTING | ROLLING_BACK }
//!      -> { continue | escalate | ACCEPTED | terminated }
//! ```
//!
//! The rules the loop enforces, independent of any provider's behavior:
//!
//! - **Checkpoints are append-only.** A committed iteration is never
//!   rewritten; rejected attempts go to the audit trail and the unit's
//!   text reverts to the latest checkpoint.
//! - **Floors are hard.** A candidate below the similarity or accuracy
//!   floor, or missing a single protected term, is rolled back no matter
//!   how good its detection score looks.
//! - **Aggression only rises.** Stagnation and rejections escalate the
//!   tier; nothing ever lowers it. At the ceiling the unit gets exactly
//!   one supplemental pass before the loop gives up.
//! - **Termination is bounded.** At most `max_iterations` commits, plus
//!   one more if the supplemental pass fires; every exit carries a
//!   [`TerminationReason`].
//!
//! Cancellation is cooperative: the shutdown receiver is checked at stage
//! boundaries only, so an in-flight commit always completes and the unit
//! resumes cleanly from its latest checkpoint.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

use crate::domain::errors::{DomainResult, ProviderError};
use crate::domain::models::{
    AggressionLevel, Checkpoint, MetricBundle, ProcessingUnit, RefineConfig, RefinementEvent,
    RejectedAttempt, RejectionKind, TerminationReason, UnitStatus,
};
use crate::domain::ports::{
    CheckpointStore, ScoreProvider, ScoreRequest, TransformProvider, TransformRequest,
    TransformResponse,
};
use crate::infrastructure::gate::ProviderGate;
use crate::infrastructure::retry::RetryPolicy;
use crate::services::aggression::{AggressionController, EscalationSignal};
use crate::services::gate::QualityGate;
use crate::services::vault::TermVault;

// ============================================================================
// Outcomes and stages
// ============================================================================

/// How a call to [`RefinementLoop::run_unit`] ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitOutcome {
    /// The unit reached a terminal status.
    Finished(TerminationReason),
    /// Shutdown was requested; the unit stays ACTIVE and resumable.
    Interrupted,
}

/// Stage names for structured logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopStage {
    Init,
    Transforming,
    Scoring,
    Gating,
    Committing,
    RollingBack,
}

impl LoopStage {
    /// Stable name used as a tracing field.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Init => "init",
            Self::Transforming => "transforming",
            Self::Scoring => "scoring",
            Self::Gating => "gating",
            Self::Committing => "committing",
            Self::RollingBack => "rolling_back",
        }
    }
}

/// What the loop does after handling one attempt's outcome.
enum Flow {
    /// Next pass under current settings.
    Continue,
    /// Next pass runs the one-shot supplemental strategy.
    ArmSupplemental,
    /// Terminal status reached.
    Finished(TerminationReason),
}

// ============================================================================
// Refinement loop
// ============================================================================

/// Drives one unit at a time through the refinement state machine.
///
/// The loop owns no unit state; callers pass a mutable [`ProcessingUnit`]
/// and the loop keeps it consistent with the checkpoint store at every
/// stage boundary. Cloning is cheap and the clone shares providers, store,
/// and the provider gate.
#[derive(Clone)]
pub struct RefinementLoop {
    transformer: Arc<dyn TransformProvider>,
    scorer: Arc<dyn ScoreProvider>,
    store: Arc<dyn CheckpointStore>,
    vault: TermVault,
    provider_gate: ProviderGate,
    controller: AggressionController,
    gate: QualityGate,
    retry: RetryPolicy,
    config: RefineConfig,
}

impl RefinementLoop {
    /// Wire a loop from its collaborators and tuning config.
    pub fn new(
        transformer: Arc<dyn TransformProvider>,
        scorer: Arc<dyn ScoreProvider>,
        store: Arc<dyn CheckpointStore>,
        vault: TermVault,
        provider_gate: ProviderGate,
        config: RefineConfig,
    ) -> Self {
        Self {
            transformer,
            scorer,
            store,
            vault,
            provider_gate,
            controller: AggressionController::new(config.stagnation_epsilon),
            gate: QualityGate::new(config.min_similarity, config.min_accuracy),
            retry: RetryPolicy::new(
                config.retry_cap,
                config.initial_backoff_ms,
                config.max_backoff_ms,
            ),
            config,
        }
    }

    /// The checkpoint store this loop commits to.
    pub fn store(&self) -> Arc<dyn CheckpointStore> {
        Arc::clone(&self.store)
    }

    /// Score a unit's original text without transforming or committing
    /// anything. Callers that want a measured checkpoint-0 bundle instead
    /// of the assumed worst case run this before [`Self::run_unit`].
    pub async fn score_baseline(
        &self,
        unit: &ProcessingUnit,
    ) -> Result<MetricBundle, ProviderError> {
        let request = ScoreRequest {
            original: unit.original_text.clone(),
            candidate: unit.original_text.clone(),
            section: unit.section,
        };
        self.retry.execute(|| self.call_score(&request)).await
    }

    /// Refine one unit until it terminates or shutdown is requested.
    ///
    /// Progress is reported over `events`; the unit is left consistent
    /// with the store in either case. Errors are fatal configuration or
    /// storage problems, never quality or provider trouble (those are
    /// absorbed into the termination decision).
    pub async fn run_unit(
        &self,
        unit: &mut ProcessingUnit,
        events: &mpsc::UnboundedSender<RefinementEvent>,
        shutdown: &mut broadcast::Receiver<()>,
    ) -> DomainResult<UnitOutcome> {
        self.log_stage(unit, LoopStage::Init);

        if unit.is_terminal() {
            // Resume handed us a unit that already finished.
            if let Some(reason) = unit.termination {
                return Ok(UnitOutcome::Finished(reason));
            }
        }

        if self.store.latest(unit.id).await?.is_none() {
            let baseline =
                Checkpoint::new(unit.id, 0, unit.current_text.clone(), unit.baseline().clone());
            self.store.commit(&baseline).await?;
        }

        if unit.latest_detection() < self.config.target_detection_threshold {
            // Already human enough. No provider is ever invoked.
            return self.finalize(unit, UnitStatus::Accepted, TerminationReason::TargetMet);
        }

        // The armed flag is not persisted. A unit interrupted after arming
        // the supplemental at the budget edge re-derives it here, otherwise
        // resume would terminate without the pass it was entitled to.
        let mut supplemental_pending = unit.iteration >= self.config.max_iterations
            && unit.aggression == AggressionLevel::MAX
            && !unit.supplemental_spent
            && self.controller.is_stagnant(&unit.detection_history());

        while unit.iteration < self.config.max_iterations || supplemental_pending {
            if shutdown_requested(shutdown) {
                return Ok(UnitOutcome::Interrupted);
            }

            let supplemental_run = supplemental_pending;
            supplemental_pending = false;
            if supplemental_run {
                unit.supplemental_spent = true;
            }
            let strategy = if supplemental_run {
                self.config.supplemental_strategy.clone()
            } else {
                self.config.strategy_for(unit.aggression).to_string()
            };

            // --- TRANSFORMING ---------------------------------------------
            self.log_stage(unit, LoopStage::Transforming);
            let (protected, map) = self.vault.protect(&unit.current_text)?;
            unit.placeholders = map.clone();

            let request = TransformRequest {
                text: protected,
                placeholders: map.clone(),
                section: unit.section,
                strategy,
                aggression: unit.aggression,
                iteration: unit.iteration,
            };
            let raw_candidate = match self.retry.execute(|| self.call_transform(&request)).await {
                Ok(response) if response.candidate.trim().is_empty() => {
                    let flow = self
                        .reject(unit, events, RejectionKind::ProviderFatal, "empty candidate", None)
                        .await?;
                    match flow {
                        Flow::Continue => continue,
                        Flow::ArmSupplemental => {
                            supplemental_pending = true;
                            continue;
                        }
                        Flow::Finished(reason) => return Ok(UnitOutcome::Finished(reason)),
                    }
                }
                Ok(response) => response.candidate,
                Err(err) => {
                    match self.reject_provider_error(unit, events, &err).await? {
                        Flow::Continue => continue,
                        Flow::ArmSupplemental => {
                            supplemental_pending = true;
                            continue;
                        }
                        Flow::Finished(reason) => return Ok(UnitOutcome::Finished(reason)),
                    }
                }
            };
            let restored = TermVault::restore(&raw_candidate, &map);

            // --- SCORING --------------------------------------------------
            if shutdown_requested(shutdown) {
                return Ok(UnitOutcome::Interrupted);
            }
            self.log_stage(unit, LoopStage::Scoring);
            let score_request = ScoreRequest {
                original: unit.original_text.clone(),
                candidate: restored.clone(),
                section: unit.section,
            };
            let metrics = match self.retry.execute(|| self.call_score(&score_request)).await {
                Ok(bundle) => bundle,
                Err(err) => {
                    match self.reject_provider_error(unit, events, &err).await? {
                        Flow::Continue => continue,
                        Flow::ArmSupplemental => {
                            supplemental_pending = true;
                            continue;
                        }
                        Flow::Finished(reason) => return Ok(UnitOutcome::Finished(reason)),
                    }
                }
            };
            // The scorer's preservation opinion never beats the vault's own
            // placeholder count.
            let metrics =
                metrics.clamp_term_preservation(TermVault::verify(&raw_candidate, &map))?;

            // --- GATING ---------------------------------------------------
            self.log_stage(unit, LoopStage::Gating);
            let flow = match self.gate.evaluate(&metrics) {
                Err(violation) => {
                    self.log_stage(unit, LoopStage::RollingBack);
                    self.reject(
                        unit,
                        events,
                        RejectionKind::QualityViolation,
                        violation.to_string(),
                        Some(metrics),
                    )
                    .await?
                }
                Ok(()) => {
                    self.log_stage(unit, LoopStage::Committing);
                    self.commit(unit, events, restored, metrics).await?
                }
            };
            match flow {
                Flow::Continue => {}
                Flow::ArmSupplemental => supplemental_pending = true,
                Flow::Finished(reason) => return Ok(UnitOutcome::Finished(reason)),
            }
        }

        // Budget spent without acceptance: borderline band decides.
        let status = self.exhaustion_status(unit);
        self.finalize(unit, status, TerminationReason::MaxIterationsExhausted)
    }

    // ========================================================================
    // Stage handlers
    // ========================================================================

    /// Commit a gated candidate and decide what happens next.
    async fn commit(
        &self,
        unit: &mut ProcessingUnit,
        events: &mpsc::UnboundedSender<RefinementEvent>,
        text: String,
        metrics: MetricBundle,
    ) -> DomainResult<Flow> {
        let checkpoint = Checkpoint::new(unit.id, unit.iteration + 1, text.clone(), metrics.clone());
        self.store.commit(&checkpoint).await?;
        unit.record_commit(text, metrics.clone());
        info!(
            unit_id = %unit.id,
            iteration = unit.iteration,
            detection = metrics.detection_score(),
            "iteration committed"
        );
        emit(
            events,
            RefinementEvent::IterationCommitted {
                unit_id: unit.id,
                iteration: unit.iteration,
                metrics: metrics.clone(),
                timestamp: chrono::Utc::now(),
            },
        );

        if metrics.detection_score() < self.config.target_detection_threshold {
            return self.finalize_flow(unit, UnitStatus::Accepted, TerminationReason::TargetMet);
        }

        match self.controller.after_commit(
            &unit.detection_history(),
            unit.aggression,
            unit.supplemental_spent,
        ) {
            EscalationSignal::Hold => Ok(Flow::Continue),
            EscalationSignal::Escalate(next) => {
                self.escalate(unit, events, next)?;
                Ok(Flow::Continue)
            }
            EscalationSignal::Supplemental => {
                self.arm_supplemental(unit, events);
                Ok(Flow::ArmSupplemental)
            }
            EscalationSignal::Exhausted => {
                let status = self.exhaustion_status(unit);
                self.finalize_flow(unit, status, TerminationReason::StagnationUnresolved)
            }
        }
    }

    /// Record a rejected attempt, roll back, and route the escalation
    /// signal. The iteration counter never advances here.
    async fn reject(
        &self,
        unit: &mut ProcessingUnit,
        events: &mpsc::UnboundedSender<RefinementEvent>,
        kind: RejectionKind,
        detail: impl Into<String>,
        metrics: Option<MetricBundle>,
    ) -> DomainResult<Flow> {
        let detail = detail.into();
        warn!(
            unit_id = %unit.id,
            at_iteration = unit.iteration,
            kind = %kind,
            detail = %detail,
            "attempt rejected"
        );

        let mut attempt =
            RejectedAttempt::new(unit.id, unit.iteration, unit.aggression, kind, detail.clone());
        if let Some(bundle) = metrics {
            attempt = attempt.with_metrics(bundle);
        }
        self.store.record_rejected(&attempt).await?;
        emit(
            events,
            RefinementEvent::AttemptRejected {
                unit_id: unit.id,
                at_iteration: unit.iteration,
                kind,
                detail,
                timestamp: chrono::Utc::now(),
            },
        );

        // The candidate was never committed; after a rollback the unit's
        // text must equal the latest checkpoint's.
        if matches!(
            kind,
            RejectionKind::QualityViolation | RejectionKind::ProviderFatal
        ) {
            let latest = self.store.rollback(unit.id).await?;
            unit.current_text = latest.text;
        }

        if kind == RejectionKind::TransientExhausted {
            // A provider that cannot answer will not answer the supplemental
            // pass either; at the ceiling this ends the unit outright.
            return match unit.aggression.next() {
                Some(next) => {
                    self.escalate(unit, events, next)?;
                    Ok(Flow::Continue)
                }
                None => self.finalize_flow(
                    unit,
                    UnitStatus::Failed,
                    TerminationReason::ProviderFatalError,
                ),
            };
        }

        match self
            .controller
            .after_failure(unit.aggression, unit.supplemental_spent)
        {
            EscalationSignal::Hold => Ok(Flow::Continue),
            EscalationSignal::Escalate(next) => {
                self.escalate(unit, events, next)?;
                Ok(Flow::Continue)
            }
            EscalationSignal::Supplemental => {
                self.arm_supplemental(unit, events);
                Ok(Flow::ArmSupplemental)
            }
            EscalationSignal::Exhausted => {
                let reason = match kind {
                    RejectionKind::QualityViolation => TerminationReason::FatalQualityViolation,
                    RejectionKind::ProviderFatal | RejectionKind::TransientExhausted => {
                        TerminationReason::ProviderFatalError
                    }
                };
                self.finalize_flow(unit, UnitStatus::Failed, reason)
            }
        }
    }

    /// Route a provider error that survived the retry policy.
    async fn reject_provider_error(
        &self,
        unit: &mut ProcessingUnit,
        events: &mpsc::UnboundedSender<RefinementEvent>,
        err: &ProviderError,
    ) -> DomainResult<Flow> {
        let kind = if err.is_transient() {
            RejectionKind::TransientExhausted
        } else {
            RejectionKind::ProviderFatal
        };
        self.reject(unit, events, kind, err.to_string(), None).await
    }

    // ========================================================================
    // Provider calls
    // ========================================================================

    async fn call_transform(
        &self,
        request: &TransformRequest,
    ) -> Result<TransformResponse, ProviderError> {
        let _permit = self.provider_gate.admit().await?;
        let timeout = Duration::from_secs(self.config.provider_timeout_secs);
        match tokio::time::timeout(timeout, self.transformer.transform(request)).await {
            Ok(result) => result,
            Err(_) => Err(ProviderError::Transient(format!(
                "{} timed out after {}s",
                self.transformer.name(),
                self.config.provider_timeout_secs
            ))),
        }
    }

    async fn call_score(&self, request: &ScoreRequest) -> Result<MetricBundle, ProviderError> {
        let _permit = self.provider_gate.admit().await?;
        let timeout = Duration::from_secs(self.config.provider_timeout_secs);
        match tokio::time::timeout(timeout, self.scorer.score(request)).await {
            Ok(result) => result,
            Err(_) => Err(ProviderError::Transient(format!(
                "{} timed out after {}s",
                self.scorer.name(),
                self.config.provider_timeout_secs
            ))),
        }
    }

    // ========================================================================
    // Bookkeeping
    // ========================================================================

    fn escalate(
        &self,
        unit: &mut ProcessingUnit,
        events: &mpsc::UnboundedSender<RefinementEvent>,
        next: AggressionLevel,
    ) -> DomainResult<()> {
        unit.escalate_to(next)?;
        info!(unit_id = %unit.id, level = %next, "aggression escalated");
        emit(
            events,
            RefinementEvent::Escalated {
                unit_id: unit.id,
                level: next,
                timestamp: chrono::Utc::now(),
            },
        );
        Ok(())
    }

    fn arm_supplemental(
        &self,
        unit: &ProcessingUnit,
        events: &mpsc::UnboundedSender<RefinementEvent>,
    ) {
        info!(
            unit_id = %unit.id,
            strategy = %self.config.supplemental_strategy,
            "supplemental strategy armed"
        );
        emit(
            events,
            RefinementEvent::SupplementalArmed {
                unit_id: unit.id,
                strategy: self.config.supplemental_strategy.clone(),
                timestamp: chrono::Utc::now(),
            },
        );
    }

    fn finalize(
        &self,
        unit: &mut ProcessingUnit,
        status: UnitStatus,
        reason: TerminationReason,
    ) -> DomainResult<UnitOutcome> {
        self.finalize_flow(unit, status, reason)
            .map(|_| UnitOutcome::Finished(reason))
    }

    fn finalize_flow(
        &self,
        unit: &mut ProcessingUnit,
        status: UnitStatus,
        reason: TerminationReason,
    ) -> DomainResult<Flow> {
        unit.finish(status, reason)?;
        info!(
            unit_id = %unit.id,
            status = %status,
            reason = %reason,
            iterations = unit.iteration,
            "unit finished"
        );
        Ok(Flow::Finished(reason))
    }

    /// Between borderline and failed at exhaustion, the last committed
    /// detection score decides.
    fn exhaustion_status(&self, unit: &ProcessingUnit) -> UnitStatus {
        if unit.latest_detection() < self.config.borderline_threshold {
            UnitStatus::Borderline
        } else {
            UnitStatus::Failed
        }
    }

    fn log_stage(&self, unit: &ProcessingUnit, stage: LoopStage) {
        debug!(
            unit_id = %unit.id,
            stage = stage.as_str(),
            iteration = unit.iteration,
            aggression = %unit.aggression,
            "stage entered"
        );
    }
}

fn emit(events: &mpsc::UnboundedSender<RefinementEvent>, event: RefinementEvent) {
    let _ = events.send(event);
}

fn shutdown_requested(shutdown: &mut broadcast::Receiver<()>) -> bool {
    match shutdown.try_recv() {
        Ok(()) | Err(broadcast::error::TryRecvError::Lagged(_)) => true,
        Err(_) => false,
    }
}
