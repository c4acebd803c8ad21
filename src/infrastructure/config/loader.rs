use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use thiserror::Error;

use crate::domain::models::{AggressionLevel, Config, Glossary, GlossaryConfig};

/// Configuration error types
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid {name}: {value}. Must be within [0.0, 1.0]")]
    ThresholdOutOfRange { name: &'static str, value: f64 },

    #[error(
        "Invalid borderline_threshold: {borderline}. Must not be below target_detection_threshold ({target})"
    )]
    BorderlineBelowTarget { borderline: f64, target: f64 },

    #[error("Invalid max_iterations: {0}. Must be at least 1")]
    InvalidMaxIterations(u32),

    #[error("Invalid stagnation_epsilon: {0}. Must be positive")]
    InvalidStagnationEpsilon(f64),

    #[error("aggression_tiers cannot be empty")]
    EmptyAggressionTiers,

    #[error("Too many aggression_tiers: {tiers}. Only {levels} aggression levels exist")]
    TooManyAggressionTiers { tiers: usize, levels: usize },

    #[error("supplemental_strategy cannot be empty")]
    EmptySupplementalStrategy,

    #[error("Invalid worker_pool_size: {0}. Must be at least 1")]
    InvalidWorkerPoolSize(usize),

    #[error("Invalid provider_concurrency: {0}. Must be at least 1")]
    InvalidProviderConcurrency(usize),

    #[error("Invalid rate limit: {0}. Must be positive")]
    InvalidRateLimit(f64),

    #[error(
        "Invalid backoff configuration: initial_backoff_ms ({0}) must not exceed max_backoff_ms ({1})"
    )]
    InvalidBackoff(u64, u64),

    #[error("Provider {0} URL cannot be empty")]
    EmptyProviderUrl(&'static str),

    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("Invalid log format: {0}. Must be one of: json, pretty")]
    InvalidLogFormat(String),

    #[error("Database path cannot be empty")]
    EmptyDatabasePath,
}

/// Configuration loader with hierarchical merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with hierarchical merging
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults (Serialized)
    /// 2. .redraft/config.yaml (project config)
    /// 3. .redraft/local.yaml (project local overrides, optional)
    /// 4. Environment variables (REDRAFT_* prefix, highest priority)
    ///
    /// Configuration is always project-local (pwd/.redraft/) so one machine
    /// can hold several documents with different tuning.
    pub fn load() -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(".redraft/config.yaml"))
            .merge(Yaml::file(".redraft/local.yaml"))
            .merge(Env::prefixed("REDRAFT_").split("__"))
            .extract()
            .context("Failed to extract configuration from figment")?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific file. Environment variables still
    /// win over file values.
    pub fn load_from_file(path: impl AsRef<std::path::Path>) -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(path.as_ref()))
            .merge(Env::prefixed("REDRAFT_").split("__"))
            .extract()
            .context(format!(
                "Failed to load config from {}",
                path.as_ref().display()
            ))?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Validate configuration after loading
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        let refine = &config.refine;

        for (name, value) in [
            (
                "target_detection_threshold",
                refine.target_detection_threshold,
            ),
            ("borderline_threshold", refine.borderline_threshold),
            ("min_similarity", refine.min_similarity),
            ("min_accuracy", refine.min_accuracy),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::ThresholdOutOfRange { name, value });
            }
        }

        // The borderline band sits at or above the target; anything below
        // could classify a unit as borderline that already met the target.
        if refine.borderline_threshold < refine.target_detection_threshold {
            return Err(ConfigError::BorderlineBelowTarget {
                borderline: refine.borderline_threshold,
                target: refine.target_detection_threshold,
            });
        }

        if refine.max_iterations == 0 {
            return Err(ConfigError::InvalidMaxIterations(refine.max_iterations));
        }

        if refine.stagnation_epsilon <= 0.0 || !refine.stagnation_epsilon.is_finite() {
            return Err(ConfigError::InvalidStagnationEpsilon(
                refine.stagnation_epsilon,
            ));
        }

        if refine.aggression_tiers.is_empty() {
            return Err(ConfigError::EmptyAggressionTiers);
        }

        // Extra tiers would silently never be selected.
        if refine.aggression_tiers.len() > AggressionLevel::ALL.len() {
            return Err(ConfigError::TooManyAggressionTiers {
                tiers: refine.aggression_tiers.len(),
                levels: AggressionLevel::ALL.len(),
            });
        }

        if refine.supplemental_strategy.trim().is_empty() {
            return Err(ConfigError::EmptySupplementalStrategy);
        }

        if refine.worker_pool_size == 0 {
            return Err(ConfigError::InvalidWorkerPoolSize(refine.worker_pool_size));
        }

        if refine.provider_concurrency == 0 {
            return Err(ConfigError::InvalidProviderConcurrency(
                refine.provider_concurrency,
            ));
        }

        if refine.initial_backoff_ms > refine.max_backoff_ms {
            return Err(ConfigError::InvalidBackoff(
                refine.initial_backoff_ms,
                refine.max_backoff_ms,
            ));
        }

        if config.providers.transform_url.is_empty() {
            return Err(ConfigError::EmptyProviderUrl("transform"));
        }

        if config.providers.score_url.is_empty() {
            return Err(ConfigError::EmptyProviderUrl("score"));
        }

        if config.providers.rate_limit_rps <= 0.0 {
            return Err(ConfigError::InvalidRateLimit(config.providers.rate_limit_rps));
        }

        if config.database.path.is_empty() {
            return Err(ConfigError::EmptyDatabasePath);
        }

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&config.logging.level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
        }

        let valid_log_formats = ["json", "pretty"];
        if !valid_log_formats.contains(&config.logging.format.as_str()) {
            return Err(ConfigError::InvalidLogFormat(config.logging.format.clone()));
        }

        Ok(())
    }
}

/// Load the protected-term glossary named by the configuration.
///
/// A `.json` path is parsed as JSON, anything else as YAML. The file's own
/// `protect_numbers` key governs numeric protection; without a file, an
/// empty glossary with the configured numeric protection is returned.
pub fn load_glossary(config: &GlossaryConfig) -> Result<Glossary> {
    let Some(path) = &config.path else {
        return Ok(Glossary::empty().with_protect_numbers(config.protect_numbers));
    };

    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read glossary file {path}"))?;

    let glossary: Glossary = if path.ends_with(".json") {
        serde_json::from_str(&raw).with_context(|| format!("Invalid JSON glossary: {path}"))?
    } else {
        serde_yaml::from_str(&raw).with_context(|| format!("Invalid YAML glossary: {path}"))?
    };

    Ok(glossary)
}
