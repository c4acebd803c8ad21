//! Terminal output: progress rendering and report tables.

pub mod progress;
pub mod table;

pub use progress::RunProgress;
pub use table::TableFormatter;
