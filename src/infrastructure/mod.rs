//! Infrastructure: configuration loading, logging, retries, and provider
//! admission control.

pub mod config;
pub mod gate;
pub mod logging;
pub mod retry;

pub use config::{ConfigError, ConfigLoader};
pub use gate::{ProviderGate, TokenBucketRateLimiter};
pub use logging::Logger;
pub use retry::RetryPolicy;
