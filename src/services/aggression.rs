//! Aggression controller: when the loop stalls, push harder.
//!
//! Pure decision logic over committed detection scores. The loop feeds it
//! the score history after each commit and asks what to do after each
//! rejected attempt; the controller answers with an [`EscalationSignal`]
//! and never touches the unit itself.

use crate::domain::models::AggressionLevel;

/// What the loop should do with the unit's aggression level next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EscalationSignal {
    /// Progress is fine, keep the current level.
    Hold,
    /// Stalled or rejected: move to this level for the next pass.
    Escalate(AggressionLevel),
    /// At the ceiling with the one-time supplemental strategy still
    /// unspent: run it.
    Supplemental,
    /// At the ceiling, supplemental spent. Nothing left to try.
    Exhausted,
}

/// Escalation policy for one refinement run.
///
/// Stagnation means the last two committed detection scores differ by less
/// than `epsilon` in absolute value. The baseline counts as a committed
/// score, so one transformed iteration is enough history to detect a
/// stall.
#[derive(Debug, Clone, Copy)]
pub struct AggressionController {
    epsilon: f64,
}

impl AggressionController {
    /// Build a controller with the given stagnation epsilon.
    pub const fn new(epsilon: f64) -> Self {
        Self { epsilon }
    }

    /// The configured stagnation epsilon.
    pub const fn epsilon(&self) -> f64 {
        self.epsilon
    }

    /// Decide after a committed iteration, given the full committed
    /// detection-score history (baseline first).
    pub fn after_commit(
        &self,
        detection_history: &[f64],
        level: AggressionLevel,
        supplemental_spent: bool,
    ) -> EscalationSignal {
        if self.is_stagnant(detection_history) {
            Self::push(level, supplemental_spent)
        } else {
            EscalationSignal::Hold
        }
    }

    /// Decide after a rejected attempt (quality violation or unusable
    /// provider output). Rejections always push: an attempt that produced
    /// nothing committable at this level will not fare better unchanged.
    pub fn after_failure(
        &self,
        level: AggressionLevel,
        supplemental_spent: bool,
    ) -> EscalationSignal {
        Self::push(level, supplemental_spent)
    }

    /// Whether the last two committed scores are within epsilon of each
    /// other. Fewer than two scores can never be stagnant.
    pub fn is_stagnant(&self, detection_history: &[f64]) -> bool {
        match detection_history {
            [.., previous, latest] => (latest - previous).abs() < self.epsilon,
            _ => false,
        }
    }

    fn push(level: AggressionLevel, supplemental_spent: bool) -> EscalationSignal {
        match level.next() {
            Some(next) => EscalationSignal::Escalate(next),
            None if !supplemental_spent => EscalationSignal::Supplemental,
            None => EscalationSignal::Exhausted,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f64 = 0.02;

    fn controller() -> AggressionController {
        AggressionController::new(EPSILON)
    }

    #[test]
    fn improving_scores_hold_the_level() {
        let signal = controller().after_commit(&[0.90, 0.60, 0.40], AggressionLevel::Gentle, false);
        assert_eq!(signal, EscalationSignal::Hold);
    }

    #[test]
    fn stalled_scores_escalate_one_tier() {
        let signal =
            controller().after_commit(&[0.90, 0.55, 0.545], AggressionLevel::Moderate, false);
        assert_eq!(
            signal,
            EscalationSignal::Escalate(AggressionLevel::Aggressive)
        );
    }

    #[test]
    fn stall_against_the_baseline_counts() {
        // One commit that barely moved the needle relative to checkpoint 0.
        let signal = controller().after_commit(&[0.80, 0.79], AggressionLevel::Gentle, false);
        assert_eq!(signal, EscalationSignal::Escalate(AggressionLevel::Moderate));
    }

    #[test]
    fn delta_equal_to_epsilon_is_not_a_stall() {
        let ctl = controller();
        assert!(!ctl.is_stagnant(&[0.50, 0.50 - EPSILON]));
        assert!(ctl.is_stagnant(&[0.50, 0.50 - EPSILON / 2.0]));
    }

    #[test]
    fn worsening_scores_also_stall_when_close() {
        // Stagnation is about magnitude of movement, not direction.
        let ctl = controller();
        assert!(ctl.is_stagnant(&[0.50, 0.51]));
        assert!(!ctl.is_stagnant(&[0.50, 0.60]));
    }

    #[test]
    fn single_score_never_stalls() {
        let ctl = controller();
        assert!(!ctl.is_stagnant(&[]));
        assert!(!ctl.is_stagnant(&[0.80]));
    }

    #[test]
    fn ceiling_stall_fires_supplemental_once() {
        let ctl = controller();
        let stalled = [0.30, 0.295];
        assert_eq!(
            ctl.after_commit(&stalled, AggressionLevel::Nuclear, false),
            EscalationSignal::Supplemental
        );
        assert_eq!(
            ctl.after_commit(&stalled, AggressionLevel::Nuclear, true),
            EscalationSignal::Exhausted
        );
    }

    #[test]
    fn rejection_escalates_without_history() {
        let ctl = controller();
        assert_eq!(
            ctl.after_failure(AggressionLevel::Gentle, false),
            EscalationSignal::Escalate(AggressionLevel::Moderate)
        );
        assert_eq!(
            ctl.after_failure(AggressionLevel::Nuclear, false),
            EscalationSignal::Supplemental
        );
        assert_eq!(
            ctl.after_failure(AggressionLevel::Nuclear, true),
            EscalationSignal::Exhausted
        );
    }

    #[test]
    fn escalation_walks_every_tier_under_sustained_stall() {
        // The scenario where nothing ever moves: gentle climbs to nuclear,
        // then supplemental, then exhausted.
        let ctl = controller();
        let stalled = [0.80, 0.80];
        let mut level = AggressionLevel::Gentle;
        let mut seen = vec![level];

        loop {
            match ctl.after_commit(&stalled, level, false) {
                EscalationSignal::Escalate(next) => {
                    level = next;
                    seen.push(level);
                }
                EscalationSignal::Supplemental => break,
                other => panic!("unexpected signal: {other:?}"),
            }
        }
        assert_eq!(seen, AggressionLevel::ALL);
        assert_eq!(
            ctl.after_commit(&stalled, level, true),
            EscalationSignal::Exhausted
        );
    }
}
