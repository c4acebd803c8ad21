//! Configuration loading and validation.

mod loader;

pub use loader::{load_glossary, ConfigError, ConfigLoader};
