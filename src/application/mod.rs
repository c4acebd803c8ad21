//! Application layer: orchestration over the domain services.
//!
//! The [`DocumentRunner`] drives concurrent per-unit refinement loops and
//! owns the event and shutdown channels; the [`ReportBuilder`] flattens
//! persisted run state into reports and reassembled documents.

pub mod document_runner;
pub mod report;

pub use document_runner::{DocumentRunner, RunOutcome};
pub use report::{ReportBuilder, ReportTotals, RunReport, UnitReport};
