//! Progress events emitted while a document run is in flight.
//!
//! Unit workers send these over an `mpsc` channel; the runner forwards
//! them to the display layer and the structured log. Events carry enough
//! context to render progress without looking the unit up again.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::models::aggression::AggressionLevel;
use crate::domain::models::checkpoint::RejectionKind;
use crate::domain::models::metrics::MetricBundle;
use crate::domain::models::unit::{SectionKind, TerminationReason, UnitStatus};

/// One observable moment in a unit's refinement.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefinementEvent {
    /// A worker picked the unit up and entered its loop.
    UnitStarted {
        unit_id: Uuid,
        section: SectionKind,
        /// Position of the section within the document.
        position: usize,
        timestamp: DateTime<Utc>,
    },

    /// The original text was scored before any transformation.
    BaselineScored {
        unit_id: Uuid,
        detection_score: f64,
        timestamp: DateTime<Utc>,
    },

    /// A candidate cleared every floor and became the new checkpoint.
    IterationCommitted {
        unit_id: Uuid,
        iteration: u32,
        metrics: MetricBundle,
        timestamp: DateTime<Utc>,
    },

    /// A candidate was rejected and rolled back; no checkpoint written.
    AttemptRejected {
        unit_id: Uuid,
        /// Iteration count at the time of the attempt (unchanged by it).
        at_iteration: u32,
        kind: RejectionKind,
        detail: String,
        timestamp: DateTime<Utc>,
    },

    /// The aggression level was raised for the next pass.
    Escalated {
        unit_id: Uuid,
        level: AggressionLevel,
        timestamp: DateTime<Utc>,
    },

    /// The one-shot supplemental strategy was armed for the next pass.
    SupplementalArmed {
        unit_id: Uuid,
        strategy: String,
        timestamp: DateTime<Utc>,
    },

    /// The unit reached a terminal status.
    UnitFinished {
        unit_id: Uuid,
        status: UnitStatus,
        termination: Option<TerminationReason>,
        iterations: u32,
        timestamp: DateTime<Utc>,
    },

    /// Shutdown was requested; the unit stays ACTIVE and resumable.
    UnitInterrupted {
        unit_id: Uuid,
        at_iteration: u32,
        timestamp: DateTime<Utc>,
    },
}

impl RefinementEvent {
    /// The unit this event is about.
    pub const fn unit_id(&self) -> Uuid {
        match self {
            Self::UnitStarted { unit_id, .. }
            | Self::BaselineScored { unit_id, .. }
            | Self::IterationCommitted { unit_id, .. }
            | Self::AttemptRejected { unit_id, .. }
            | Self::Escalated { unit_id, .. }
            | Self::SupplementalArmed { unit_id, .. }
            | Self::UnitFinished { unit_id, .. }
            | Self::UnitInterrupted { unit_id, .. } => *unit_id,
        }
    }
}
