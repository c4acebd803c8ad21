//! Live progress rendering over the refinement event stream.
//!
//! One indicatif bar per unit, driven entirely by [`RefinementEvent`]s so
//! the display layer never touches the registry or the store. Bars draw to
//! stderr; stdout stays reserved for documents and reports.

use std::collections::HashMap;
use std::time::Duration;

use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use uuid::Uuid;

use crate::domain::models::{RefinementEvent, UnitStatus};

const UNIT_TEMPLATE: &str = "{prefix:>18} {bar:30.cyan/blue} {pos}/{len} {msg}";
const PROGRESS_CHARS: &str = "█▓▒░ ";

/// Per-unit progress bars for one run.
pub struct RunProgress {
    multi: MultiProgress,
    bars: HashMap<Uuid, ProgressBar>,
    /// Bar length: the iteration budget plus the supplemental pass.
    budget: u64,
}

impl RunProgress {
    /// Visible progress display; hides itself when stderr is not a
    /// terminal.
    pub fn new(max_iterations: u32) -> Self {
        Self {
            multi: MultiProgress::new(),
            bars: HashMap::new(),
            budget: u64::from(max_iterations) + 1,
        }
    }

    /// Display that never draws, for JSON mode and tests.
    pub fn hidden(max_iterations: u32) -> Self {
        let multi = MultiProgress::new();
        multi.set_draw_target(ProgressDrawTarget::hidden());
        Self {
            multi,
            bars: HashMap::new(),
            budget: u64::from(max_iterations) + 1,
        }
    }

    /// Apply one event to the display.
    pub fn handle(&mut self, event: &RefinementEvent) {
        match event {
            RefinementEvent::UnitStarted {
                unit_id,
                section,
                position,
                ..
            } => {
                let bar = self.multi.add(unit_bar(self.budget));
                bar.set_prefix(format!("{position:>2}. {section}"));
                bar.set_message("refining");
                self.bars.insert(*unit_id, bar);
            }
            RefinementEvent::BaselineScored {
                unit_id,
                detection_score,
                ..
            } => {
                if let Some(bar) = self.bars.get(unit_id) {
                    bar.set_message(format!("baseline {detection_score:.2}"));
                }
            }
            RefinementEvent::IterationCommitted {
                unit_id,
                iteration,
                metrics,
                ..
            } => {
                if let Some(bar) = self.bars.get(unit_id) {
                    bar.set_position(u64::from(*iteration));
                    bar.set_message(format!("detection {:.2}", metrics.detection_score()));
                }
            }
            RefinementEvent::AttemptRejected { unit_id, kind, .. } => {
                if let Some(bar) = self.bars.get(unit_id) {
                    bar.set_message(format!("rejected: {kind}"));
                }
            }
            RefinementEvent::Escalated { unit_id, level, .. } => {
                if let Some(bar) = self.bars.get(unit_id) {
                    bar.set_message(format!("escalated to {level}"));
                }
            }
            RefinementEvent::SupplementalArmed {
                unit_id, strategy, ..
            } => {
                if let Some(bar) = self.bars.get(unit_id) {
                    bar.set_message(format!("supplemental: {strategy}"));
                }
            }
            RefinementEvent::UnitFinished {
                unit_id,
                status,
                iterations,
                ..
            } => {
                if let Some(bar) = self.bars.get(unit_id) {
                    bar.set_position(u64::from(*iterations));
                    let icon = match status {
                        UnitStatus::Accepted => "✓",
                        UnitStatus::Borderline => "!",
                        UnitStatus::Failed | UnitStatus::Active => "✗",
                    };
                    bar.finish_with_message(format!("{icon} {status}"));
                }
            }
            RefinementEvent::UnitInterrupted {
                unit_id,
                at_iteration,
                ..
            } => {
                if let Some(bar) = self.bars.get(unit_id) {
                    bar.set_position(u64::from(*at_iteration));
                    bar.finish_with_message("interrupted (resumable)");
                }
            }
        }
    }

    /// Remove all bars from the terminal.
    pub fn finish(&self) {
        self.multi.clear().ok();
    }
}

fn unit_bar(budget: u64) -> ProgressBar {
    let bar = ProgressBar::new(budget);
    bar.set_style(
        ProgressStyle::default_bar()
            .template(UNIT_TEMPLATE)
            .expect("Invalid progress bar template")
            .progress_chars(PROGRESS_CHARS),
    );
    bar.enable_steady_tick(Duration::from_millis(100));
    bar
}
