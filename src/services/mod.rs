//! Core refinement services: the loop, its policies, and the term vault.

pub mod aggression;
pub mod gate;
pub mod refinement_loop;
pub mod vault;

pub use aggression::{AggressionController, EscalationSignal};
pub use gate::{GateViolation, QualityGate};
pub use refinement_loop::{RefinementLoop, UnitOutcome};
pub use vault::TermVault;
