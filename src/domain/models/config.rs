//! Configuration model.
//!
//! The core loop consumes an already-validated [`Config`]; loading and
//! validation live in `infrastructure::config`. Defaults here mirror the
//! serde `default =` functions so a bare `Config::default()` and a config
//! file with missing keys agree.

use serde::{Deserialize, Serialize};

use crate::domain::models::aggression::AggressionLevel;

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Refinement-loop tuning consumed by the core.
    #[serde(default)]
    pub refine: RefineConfig,
    /// External provider endpoints and throttling.
    #[serde(default)]
    pub providers: ProviderConfig,
    /// SQLite checkpoint database.
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Logging setup.
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Protected-term glossary.
    #[serde(default)]
    pub glossary: GlossaryConfig,
}

/// Tuning knobs for the refinement loop itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefineConfig {
    /// Detection score below which a unit is accepted.
    #[serde(default = "default_target_detection_threshold")]
    pub target_detection_threshold: f64,

    /// Looser fallback band for borderline classification at exhaustion.
    #[serde(default = "default_borderline_threshold")]
    pub borderline_threshold: f64,

    /// Committed-iteration budget per unit.
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,

    /// Two consecutive committed scores closer than this count as
    /// stagnation.
    #[serde(default = "default_stagnation_epsilon")]
    pub stagnation_epsilon: f64,

    /// Hard floor on semantic similarity.
    #[serde(default = "default_min_similarity")]
    pub min_similarity: f64,

    /// Hard floor on quantitative accuracy.
    #[serde(default = "default_min_accuracy")]
    pub min_accuracy: f64,

    /// Strategy identifier per aggression tier, gentlest first.
    #[serde(default = "default_aggression_tiers")]
    pub aggression_tiers: Vec<String>,

    /// One-shot strategy fired at max aggression before giving up.
    #[serde(default = "default_supplemental_strategy")]
    pub supplemental_strategy: String,

    /// Retry budget per provider call for transient failures.
    #[serde(default = "default_retry_cap")]
    pub retry_cap: u32,

    /// First backoff delay after a transient failure.
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    /// Backoff ceiling.
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,

    /// Per-call timeout applied to every provider invocation.
    #[serde(default = "default_provider_timeout_secs")]
    pub provider_timeout_secs: u64,

    /// Units refined concurrently.
    #[serde(default = "default_worker_pool_size")]
    pub worker_pool_size: usize,

    /// In-flight provider calls allowed across all units.
    #[serde(default = "default_provider_concurrency")]
    pub provider_concurrency: usize,

    /// Score originals before refining so already-human text is accepted
    /// without a single transformation.
    #[serde(default)]
    pub score_baseline: bool,
}

impl RefineConfig {
    /// Strategy identifier for a tier; shorter tier lists reuse their last
    /// entry for the remaining levels.
    pub fn strategy_for(&self, level: AggressionLevel) -> &str {
        let index = usize::from(level.tier().saturating_sub(1));
        self.aggression_tiers
            .get(index.min(self.aggression_tiers.len().saturating_sub(1)))
            .map_or("", String::as_str)
    }
}

impl Default for RefineConfig {
    fn default() -> Self {
        Self {
            target_detection_threshold: default_target_detection_threshold(),
            borderline_threshold: default_borderline_threshold(),
            max_iterations: default_max_iterations(),
            stagnation_epsilon: default_stagnation_epsilon(),
            min_similarity: default_min_similarity(),
            min_accuracy: default_min_accuracy(),
            aggression_tiers: default_aggression_tiers(),
            supplemental_strategy: default_supplemental_strategy(),
            retry_cap: default_retry_cap(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            provider_timeout_secs: default_provider_timeout_secs(),
            worker_pool_size: default_worker_pool_size(),
            provider_concurrency: default_provider_concurrency(),
            score_baseline: false,
        }
    }
}

/// Transformation and scoring endpoint settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Transformation endpoint (JSON POST).
    #[serde(default = "default_transform_url")]
    pub transform_url: String,

    /// Scoring endpoint (JSON POST).
    #[serde(default = "default_score_url")]
    pub score_url: String,

    /// Environment variable holding the bearer token.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Requests per second allowed against the provider.
    #[serde(default = "default_rate_limit_rps")]
    pub rate_limit_rps: f64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            transform_url: default_transform_url(),
            score_url: default_score_url(),
            api_key_env: default_api_key_env(),
            rate_limit_rps: default_rate_limit_rps(),
        }
    }
}

/// Checkpoint database location.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite file path; parent directories are created on open.
    #[serde(default = "default_database_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
        }
    }
}

/// Logging setup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Stderr format: pretty or json.
    #[serde(default = "default_log_format")]
    pub format: String,

    /// When set, daily-rotated JSON logs are also written here.
    #[serde(default)]
    pub directory: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            directory: None,
        }
    }
}

/// Glossary file settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlossaryConfig {
    /// YAML or JSON glossary file; absent means no term protection.
    #[serde(default)]
    pub path: Option<String>,

    /// Vault numeric tokens alongside terms.
    #[serde(default = "default_protect_numbers")]
    pub protect_numbers: bool,
}

impl Default for GlossaryConfig {
    fn default() -> Self {
        Self {
            path: None,
            protect_numbers: default_protect_numbers(),
        }
    }
}

const fn default_target_detection_threshold() -> f64 {
    0.20
}

const fn default_borderline_threshold() -> f64 {
    0.25
}

const fn default_max_iterations() -> u32 {
    7
}

const fn default_stagnation_epsilon() -> f64 {
    0.02
}

const fn default_min_similarity() -> f64 {
    0.92
}

const fn default_min_accuracy() -> f64 {
    0.95
}

fn default_aggression_tiers() -> Vec<String> {
    vec![
        "lexical_substitution".to_string(),
        "sentence_restructure".to_string(),
        "extensive_rewrite".to_string(),
        "layered_transform".to_string(),
        "round_trip".to_string(),
    ]
}

fn default_supplemental_strategy() -> String {
    "round_trip".to_string()
}

const fn default_retry_cap() -> u32 {
    3
}

const fn default_initial_backoff_ms() -> u64 {
    500
}

const fn default_max_backoff_ms() -> u64 {
    30_000
}

const fn default_provider_timeout_secs() -> u64 {
    120
}

const fn default_worker_pool_size() -> usize {
    4
}

const fn default_provider_concurrency() -> usize {
    8
}

fn default_transform_url() -> String {
    "http://localhost:8700/transform".to_string()
}

fn default_score_url() -> String {
    "http://localhost:8700/score".to_string()
}

fn default_api_key_env() -> String {
    "REDRAFT_API_KEY".to_string()
}

const fn default_rate_limit_rps() -> f64 {
    10.0
}

fn default_database_path() -> String {
    ".redraft/redraft.db".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

const fn default_protect_numbers() -> bool {
    true
}
