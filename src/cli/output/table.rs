//! Table output formatting for run reports using comfy-table.

use comfy_table::{presets, Attribute, Cell, Color, ContentArrangement, Table};
use std::env;

use crate::application::report::{RunReport, UnitReport};
use crate::domain::models::UnitStatus;

/// Table formatter for CLI output
pub struct TableFormatter {
    use_colors: bool,
}

impl TableFormatter {
    pub fn new() -> Self {
        Self {
            use_colors: supports_color(),
        }
    }

    pub fn with_colors(use_colors: bool) -> Self {
        Self { use_colors }
    }

    /// Format a run's per-unit outcomes as a table.
    pub fn format_report(&self, report: &RunReport) -> String {
        let mut table = self.create_base_table();

        table.set_header(vec![
            Cell::new("#").add_attribute(Attribute::Bold),
            Cell::new("Section").add_attribute(Attribute::Bold),
            Cell::new("Status").add_attribute(Attribute::Bold),
            Cell::new("Iter").add_attribute(Attribute::Bold),
            Cell::new("Detection").add_attribute(Attribute::Bold),
            Cell::new("Aggression").add_attribute(Attribute::Bold),
            Cell::new("Rejected").add_attribute(Attribute::Bold),
            Cell::new("Termination").add_attribute(Attribute::Bold),
        ]);

        for unit in &report.units {
            table.add_row(vec![
                Cell::new(unit.position.to_string()),
                Cell::new(unit.section.to_string()),
                self.status_cell(unit.status),
                Cell::new(unit.iterations.to_string()),
                Cell::new(detection_trajectory(unit)),
                Cell::new(unit.aggression.to_string()),
                Cell::new(unit.rejected_attempts.to_string()),
                Cell::new(
                    unit.termination
                        .map_or_else(|| "-".to_string(), |t| t.to_string()),
                ),
            ]);
        }

        table.to_string()
    }

    /// One-line totals summary for a report.
    pub fn format_totals(&self, report: &RunReport) -> String {
        let totals = &report.totals;
        format!(
            "{} accepted, {} borderline, {} failed, {} active",
            totals.accepted, totals.borderline, totals.failed, totals.active
        )
    }

    fn status_cell(&self, status: UnitStatus) -> Cell {
        if self.use_colors {
            Cell::new(status.to_string()).fg(status_color(status))
        } else {
            Cell::new(format!("{} {status}", status_icon(status)))
        }
    }

    fn create_base_table(&self) -> Table {
        let mut table = Table::new();
        table
            .load_preset(presets::UTF8_FULL)
            .set_content_arrangement(ContentArrangement::Dynamic);
        table
    }
}

impl Default for TableFormatter {
    fn default() -> Self {
        Self::new()
    }
}

/// `baseline -> final` detection scores, or a dash when never scored.
fn detection_trajectory(unit: &UnitReport) -> String {
    match (unit.baseline_detection, unit.final_detection) {
        (Some(baseline), Some(last)) if unit.iterations > 0 => {
            format!("{baseline:.2} → {last:.2}")
        }
        (Some(baseline), _) => format!("{baseline:.2}"),
        _ => "-".to_string(),
    }
}

/// Check if color output is supported
fn supports_color() -> bool {
    if env::var("NO_COLOR").is_ok() {
        return false;
    }

    if let Ok(term) = env::var("TERM") {
        if term == "dumb" {
            return false;
        }
    }

    true
}

fn status_color(status: UnitStatus) -> Color {
    match status {
        UnitStatus::Accepted => Color::Green,
        UnitStatus::Borderline => Color::Yellow,
        UnitStatus::Failed => Color::Red,
        UnitStatus::Active => Color::Cyan,
    }
}

fn status_icon(status: UnitStatus) -> &'static str {
    match status {
        UnitStatus::Accepted => "✓",
        UnitStatus::Borderline => "!",
        UnitStatus::Failed => "✗",
        UnitStatus::Active => "⟳",
    }
}
