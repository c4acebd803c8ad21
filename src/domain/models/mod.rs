//! Domain models for the refinement system.

pub mod aggression;
pub mod checkpoint;
pub mod config;
pub mod events;
pub mod glossary;
pub mod metrics;
pub mod run;
pub mod unit;

pub use aggression::AggressionLevel;
pub use checkpoint::{Checkpoint, RejectedAttempt, RejectionKind};
pub use config::{
    Config, DatabaseConfig, GlossaryConfig, LoggingConfig, ProviderConfig, RefineConfig,
};
pub use events::RefinementEvent;
pub use glossary::{Glossary, PlaceholderEntry, PlaceholderMap};
pub use metrics::MetricBundle;
pub use run::RunRecord;
pub use unit::{ProcessingUnit, SectionKind, TerminationReason, UnitStatus};
