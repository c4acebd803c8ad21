//! Adapters binding the domain ports to concrete backends.

pub mod memory;
pub mod providers;
pub mod sqlite;

pub use memory::MemoryCheckpointStore;
pub use providers::{HttpScoreProvider, HttpTransformProvider};
pub use sqlite::{SqliteCheckpointStore, SqliteUnitRegistry};
