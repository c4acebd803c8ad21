//! Port trait definitions (hexagonal architecture).
//!
//! Async trait interfaces implemented by adapters:
//! - `TransformProvider`: black-box text transformation
//! - `ScoreProvider`: black-box detection/quality scoring
//! - `CheckpointStore`: append-only snapshot persistence
//! - `UnitRegistry`: run membership and unit lifecycle state
//!
//! The refinement loop depends only on these contracts, never on a
//! concrete vendor client or database.

pub mod checkpoint_store;
pub mod scorer;
pub mod transformer;
pub mod unit_registry;

pub use checkpoint_store::CheckpointStore;
pub use scorer::{ScoreProvider, ScoreRequest};
pub use transformer::{TransformProvider, TransformRequest, TransformResponse};
pub use unit_registry::{RegisteredUnit, UnitRegistry};
