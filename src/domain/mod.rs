//! Domain layer: models, ports, and errors for the refinement system.
//!
//! Everything here is infrastructure-free business logic; adapters and
//! services plug in through the port traits.

pub mod errors;
pub mod models;
pub mod ports;

pub use errors::{DomainError, DomainResult, ProviderError};
