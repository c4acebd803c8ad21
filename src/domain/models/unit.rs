//! Processing units: one document section moving through the refinement
//! loop.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::aggression::AggressionLevel;
use crate::domain::models::glossary::PlaceholderMap;
use crate::domain::models::metrics::MetricBundle;

/// Lifecycle status of a processing unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum UnitStatus {
    /// Still being refined (or interrupted and resumable).
    #[default]
    Active,
    /// Detection target met; the latest checkpoint is final.
    Accepted,
    /// Iterations exhausted but the last committed score landed inside the
    /// borderline band; a manual pass may finish the job.
    Borderline,
    /// Iterations or escalation exhausted without reaching any threshold.
    Failed,
}

impl UnitStatus {
    /// Stable string form used in storage and logs.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Accepted => "accepted",
            Self::Borderline => "borderline",
            Self::Failed => "failed",
        }
    }

    /// Whether the unit has finished refining.
    pub const fn is_terminal(self) -> bool {
        !matches!(self, Self::Active)
    }

    /// Statuses reachable from this one.
    pub fn valid_transitions(self) -> Vec<Self> {
        match self {
            Self::Active => vec![Self::Accepted, Self::Borderline, Self::Failed],
            Self::Accepted | Self::Borderline | Self::Failed => vec![],
        }
    }

    /// Whether moving to `target` is legal.
    pub fn can_transition_to(self, target: Self) -> bool {
        self.valid_transitions().contains(&target)
    }
}

impl fmt::Display for UnitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for UnitStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(Self::Active),
            "accepted" => Ok(Self::Accepted),
            "borderline" => Ok(Self::Borderline),
            "failed" => Ok(Self::Failed),
            other => Err(DomainError::ValidationFailed(format!(
                "unknown unit status: {other}"
            ))),
        }
    }
}

/// Why a unit stopped refining.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminationReason {
    /// Detection score dropped below the target threshold.
    TargetMet,
    /// Iteration budget ran out (status decides borderline vs failed).
    MaxIterationsExhausted,
    /// Still stagnant after the supplemental strategy.
    StagnationUnresolved,
    /// Escalation exhausted by repeated quality-floor violations.
    FatalQualityViolation,
    /// Provider unusable: retries exhausted at max aggression or repeated
    /// malformed output.
    ProviderFatalError,
}

impl TerminationReason {
    /// Stable string form used in storage and logs.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::TargetMet => "target_met",
            Self::MaxIterationsExhausted => "max_iterations_exhausted",
            Self::StagnationUnresolved => "stagnation_unresolved",
            Self::FatalQualityViolation => "fatal_quality_violation",
            Self::ProviderFatalError => "provider_fatal_error",
        }
    }
}

impl fmt::Display for TerminationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for TerminationReason {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "target_met" => Ok(Self::TargetMet),
            "max_iterations_exhausted" => Ok(Self::MaxIterationsExhausted),
            "stagnation_unresolved" => Ok(Self::StagnationUnresolved),
            "fatal_quality_violation" => Ok(Self::FatalQualityViolation),
            "provider_fatal_error" => Ok(Self::ProviderFatalError),
            other => Err(DomainError::ValidationFailed(format!(
                "unknown termination reason: {other}"
            ))),
        }
    }
}

/// Rough section role, inferred from headings by the document splitter and
/// passed through to providers untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SectionKind {
    Abstract,
    Introduction,
    Methods,
    Results,
    Discussion,
    Conclusion,
    /// Anything that does not match a known heading.
    #[default]
    Body,
}

impl SectionKind {
    /// Stable string form used in storage and provider requests.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Abstract => "abstract",
            Self::Introduction => "introduction",
            Self::Methods => "methods",
            Self::Results => "results",
            Self::Discussion => "discussion",
            Self::Conclusion => "conclusion",
            Self::Body => "body",
        }
    }

    /// Guess the section role from a heading line.
    pub fn from_heading(heading: &str) -> Self {
        let lowered = heading.to_lowercase();
        if lowered.contains("abstract") {
            Self::Abstract
        } else if lowered.contains("introduction") {
            Self::Introduction
        } else if lowered.contains("method") || lowered.contains("approach") {
            Self::Methods
        } else if lowered.contains("result") || lowered.contains("evaluation") {
            Self::Results
        } else if lowered.contains("discussion") {
            Self::Discussion
        } else if lowered.contains("conclusion") {
            Self::Conclusion
        } else {
            Self::Body
        }
    }
}

impl fmt::Display for SectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for SectionKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "abstract" => Ok(Self::Abstract),
            "introduction" => Ok(Self::Introduction),
            "methods" => Ok(Self::Methods),
            "results" => Ok(Self::Results),
            "discussion" => Ok(Self::Discussion),
            "conclusion" => Ok(Self::Conclusion),
            "body" => Ok(Self::Body),
            other => Err(DomainError::ValidationFailed(format!(
                "unknown section kind: {other}"
            ))),
        }
    }
}

/// One document section and everything the loop knows about it.
///
/// The original text is the immutable reference baseline; `current_text`
/// always equals the text of the most recent checkpoint. Metric history is
/// indexed by committed iteration, entry 0 being the baseline bundle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingUnit {
    pub id: Uuid,
    pub section: SectionKind,
    pub original_text: String,
    pub current_text: String,
    /// Placeholder map from the most recent protect pass.
    pub placeholders: PlaceholderMap,
    pub iteration: u32,
    pub aggression: AggressionLevel,
    /// Whether the one-shot supplemental strategy has been used.
    pub supplemental_spent: bool,
    pub metric_history: Vec<MetricBundle>,
    pub status: UnitStatus,
    pub termination: Option<TerminationReason>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ProcessingUnit {
    /// Create a fresh unit at iteration 0 with a worst-case baseline.
    pub fn new(section: SectionKind, original_text: impl Into<String>) -> Self {
        let original_text = original_text.into();
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            section,
            current_text: original_text.clone(),
            original_text,
            placeholders: PlaceholderMap::default(),
            iteration: 0,
            aggression: AggressionLevel::default(),
            supplemental_spent: false,
            metric_history: vec![MetricBundle::worst_case()],
            status: UnitStatus::Active,
            termination: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Replace the assumed baseline with a measured one.
    #[must_use]
    pub fn with_baseline(mut self, baseline: MetricBundle) -> Self {
        self.metric_history[0] = baseline;
        self
    }

    /// Metrics of the original text (checkpoint 0).
    pub fn baseline(&self) -> &MetricBundle {
        &self.metric_history[0]
    }

    /// Metrics of the most recent committed iteration.
    pub fn latest_metrics(&self) -> &MetricBundle {
        self.metric_history
            .last()
            .expect("metric history holds at least the baseline")
    }

    /// Detection score of the most recent committed iteration.
    pub fn latest_detection(&self) -> f64 {
        self.latest_metrics().detection_score()
    }

    /// Committed detection scores in iteration order, baseline first.
    pub fn detection_history(&self) -> Vec<f64> {
        self.metric_history
            .iter()
            .map(MetricBundle::detection_score)
            .collect()
    }

    /// Whether refinement is finished.
    pub const fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Record a committed iteration: new accepted text plus its metrics.
    pub fn record_commit(&mut self, text: impl Into<String>, metrics: MetricBundle) {
        self.current_text = text.into();
        self.iteration += 1;
        self.metric_history.push(metrics);
        self.updated_at = Utc::now();
    }

    /// Raise the aggression level. Downgrades are rejected: aggression is
    /// monotonic for the unit's lifetime.
    pub fn escalate_to(&mut self, level: AggressionLevel) -> DomainResult<()> {
        if level < self.aggression {
            return Err(DomainError::InvalidStateTransition {
                from: self.aggression.to_string(),
                to: level.to_string(),
                reason: "aggression never decreases".to_string(),
            });
        }
        self.aggression = level;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Move to a terminal status with its termination reason.
    pub fn finish(&mut self, status: UnitStatus, reason: TerminationReason) -> DomainResult<()> {
        if !self.status.can_transition_to(status) {
            return Err(DomainError::InvalidStateTransition {
                from: self.status.to_string(),
                to: status.to_string(),
                reason: "status transition not allowed".to_string(),
            });
        }
        self.status = status;
        self.termination = Some(reason);
        self.updated_at = Utc::now();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metrics(detection: f64) -> MetricBundle {
        MetricBundle::new(detection, 0.95, 1.0, 0.98, None).unwrap()
    }

    #[test]
    fn new_unit_starts_active_at_iteration_zero() {
        let unit = ProcessingUnit::new(SectionKind::Methods, "original text");
        assert_eq!(unit.iteration, 0);
        assert_eq!(unit.status, UnitStatus::Active);
        assert_eq!(unit.aggression, AggressionLevel::Gentle);
        assert_eq!(unit.current_text, unit.original_text);
        assert_eq!(unit.metric_history.len(), 1);
        assert!((unit.latest_detection() - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn with_baseline_replaces_worst_case() {
        let unit = ProcessingUnit::new(SectionKind::Body, "text").with_baseline(metrics(0.42));
        assert!((unit.baseline().detection_score() - 0.42).abs() < f64::EPSILON);
        assert_eq!(unit.metric_history.len(), 1);
    }

    #[test]
    fn record_commit_advances_iteration_and_history() {
        let mut unit = ProcessingUnit::new(SectionKind::Body, "text");
        unit.record_commit("refined text", metrics(0.6));
        assert_eq!(unit.iteration, 1);
        assert_eq!(unit.current_text, "refined text");
        assert_eq!(unit.detection_history(), vec![1.0, 0.6]);
    }

    #[test]
    fn escalation_is_monotonic() {
        let mut unit = ProcessingUnit::new(SectionKind::Body, "text");
        unit.escalate_to(AggressionLevel::Aggressive).unwrap();
        assert_eq!(unit.aggression, AggressionLevel::Aggressive);

        let err = unit.escalate_to(AggressionLevel::Gentle).unwrap_err();
        assert!(matches!(err, DomainError::InvalidStateTransition { .. }));
        assert_eq!(unit.aggression, AggressionLevel::Aggressive);
    }

    #[test]
    fn terminal_statuses_have_no_exits() {
        let mut unit = ProcessingUnit::new(SectionKind::Body, "text");
        unit.finish(UnitStatus::Accepted, TerminationReason::TargetMet)
            .unwrap();
        assert!(unit.is_terminal());
        assert_eq!(unit.termination, Some(TerminationReason::TargetMet));

        let err = unit
            .finish(UnitStatus::Failed, TerminationReason::StagnationUnresolved)
            .unwrap_err();
        assert!(matches!(err, DomainError::InvalidStateTransition { .. }));
    }

    #[test]
    fn status_transition_table() {
        assert!(UnitStatus::Active.can_transition_to(UnitStatus::Borderline));
        assert!(!UnitStatus::Accepted.can_transition_to(UnitStatus::Active));
        assert!(!UnitStatus::Failed.can_transition_to(UnitStatus::Accepted));
        assert!(UnitStatus::Active.valid_transitions().len() == 3);
    }

    #[test]
    fn section_kind_from_heading() {
        assert_eq!(
            SectionKind::from_heading("## 3. Methods and Materials"),
            SectionKind::Methods
        );
        assert_eq!(SectionKind::from_heading("Abstract"), SectionKind::Abstract);
        assert_eq!(
            SectionKind::from_heading("Acknowledgements"),
            SectionKind::Body
        );
    }

    #[test]
    fn enum_string_round_trips() {
        for status in [
            UnitStatus::Active,
            UnitStatus::Accepted,
            UnitStatus::Borderline,
            UnitStatus::Failed,
        ] {
            assert_eq!(status.as_str().parse::<UnitStatus>().unwrap(), status);
        }
        for reason in [
            TerminationReason::TargetMet,
            TerminationReason::MaxIterationsExhausted,
            TerminationReason::StagnationUnresolved,
            TerminationReason::FatalQualityViolation,
            TerminationReason::ProviderFatalError,
        ] {
            assert_eq!(
                reason.as_str().parse::<TerminationReason>().unwrap(),
                reason
            );
        }
    }
}
