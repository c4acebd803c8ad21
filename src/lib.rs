//! Redraft - iterative text refinement with quality gates
//!
//! Redraft drives document sections through a transform / score / gate loop
//! until a noisy detection score drops below a target, while hard quality
//! floors (semantic similarity, protected-term preservation, quantitative
//! accuracy) keep the text honest. Every accepted iteration is an immutable
//! checkpoint in SQLite, so runs are inspectable, resumable, and never lose
//! committed work.
//!
//! # Architecture
//!
//! This crate follows Clean Architecture / Hexagonal Architecture principles:
//!
//! - **Domain Layer** (`domain`): Models, ports, and errors
//! - **Service Layer** (`services`): The refinement loop and its collaborators
//! - **Application Layer** (`application`): Run orchestration and reporting
//! - **Adapters** (`adapters`): SQLite, HTTP providers, in-memory test doubles
//! - **Infrastructure Layer** (`infrastructure`): Config, logging, retries, throttling
//! - **CLI Layer** (`cli`): Command-line interface
//!
//! # Example
//!
//! ```ignore
//! use redraft::application::DocumentRunner;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     // Wire providers and stores, register a run, refine it.
//!     Ok(())
//! }
//! ```

pub mod adapters;
pub mod application;
pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;

// Re-export commonly used types for convenience
pub use application::{DocumentRunner, ReportBuilder, RunOutcome, RunReport};
pub use domain::errors::{DomainError, DomainResult, ProviderError};
pub use domain::models::{
    AggressionLevel, Checkpoint, Config, Glossary, MetricBundle, ProcessingUnit, RefinementEvent,
    SectionKind, TerminationReason, UnitStatus,
};
pub use domain::ports::{CheckpointStore, ScoreProvider, TransformProvider, UnitRegistry};
pub use infrastructure::config::{ConfigError, ConfigLoader};
pub use services::{RefinementLoop, TermVault};
