//! Configuration for the evaluation harness.
//!
//! This module provides:
//! - `LoopConfig` for the iterative feedback loop (iterations, thresholds)
//! - `HarnessConfig` for scenario runs (paths, concurrency, timeouts, logging)
//!
//! ## Validation
//!
//! All configuration is validated before a run starts so that bad values fail fast
//! with descriptive errors. Use `HarnessConfig::from_env()` to load and validate
//! configuration from environment variables, or the `with_*` setters followed by
//! `validate()` for programmatic configuration.

use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;

/// Maximum allowed value for max_iterations to prevent runaway loops.
pub const MAX_ITERATIONS_LIMIT: usize = 100;

/// Maximum number of scenarios run at the same time.
pub const MAX_CONCURRENCY_LIMIT: usize = 64;

/// Valid log levels for `HarnessConfig::log_level`.
pub const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Validation error with context and suggestions.
#[derive(Debug, Clone)]
pub struct ValidationError {
    /// The field that failed validation
    pub field: String,
    /// Description of the error
    pub message: String,
    /// Suggested fix or valid values
    pub suggestion: Option<String>,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)?;
        if let Some(ref suggestion) = self.suggestion {
            write!(f, ". {}", suggestion)?;
        }
        Ok(())
    }
}

impl ValidationError {
    /// Create a new validation error.
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self { field: field.into(), message: message.into(), suggestion: None }
    }

    /// Add a suggestion to the error.
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }
}

impl std::error::Error for ValidationError {}

/// Configuration of the generate → evaluate → feedback loop.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoopConfig {
    /// Maximum number of generation attempts
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,
    /// Score (0-100) at which the loop counts as converged
    #[serde(default = "default_quality_threshold")]
    pub quality_threshold: f64,
    /// Minimum score gain between consecutive iterations to keep going
    #[serde(default = "default_improvement_threshold")]
    pub improvement_threshold: f64,
    /// Stop as soon as an iteration scores 100
    #[serde(default = "default_true")]
    pub early_stop_on_perfect: bool,
    /// Append the previous iteration's feedback to the prompt
    #[serde(default = "default_true")]
    pub include_feedback: bool,
}

fn default_max_iterations() -> usize {
    5
}

fn default_quality_threshold() -> f64 {
    80.0
}

fn default_improvement_threshold() -> f64 {
    5.0
}

fn default_true() -> bool {
    true
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            quality_threshold: default_quality_threshold(),
            improvement_threshold: default_improvement_threshold(),
            early_stop_on_perfect: true,
            include_feedback: true,
        }
    }
}

impl LoopConfig {
    /// Config for a single evaluation pass (no retries).
    pub fn single_pass() -> Self {
        Self { max_iterations: 1, ..Default::default() }
    }

    /// Set the maximum number of iterations.
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Set the quality threshold.
    pub fn with_quality_threshold(mut self, threshold: f64) -> Self {
        self.quality_threshold = threshold;
        self
    }

    /// Set the improvement threshold.
    pub fn with_improvement_threshold(mut self, threshold: f64) -> Self {
        self.improvement_threshold = threshold;
        self
    }

    /// Enable or disable the early stop on a perfect score.
    pub fn with_early_stop_on_perfect(mut self, enabled: bool) -> Self {
        self.early_stop_on_perfect = enabled;
        self
    }

    /// Enable or disable feeding evaluation feedback back into the prompt.
    pub fn with_feedback(mut self, enabled: bool) -> Self {
        self.include_feedback = enabled;
        self
    }

    /// Validate the loop config.
    ///
    /// Checks:
    /// - `max_iterations` is between 1 and `MAX_ITERATIONS_LIMIT`
    /// - both thresholds are finite and within 0-100
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.max_iterations == 0 {
            return Err(ValidationError::new(
                "max_iterations",
                "Max iterations must be greater than 0",
            )
            .with_suggestion("Use 1 for a single evaluation pass"));
        }

        if self.max_iterations > MAX_ITERATIONS_LIMIT {
            return Err(ValidationError::new(
                "max_iterations",
                format!(
                    "Max iterations {} exceeds limit of {}",
                    self.max_iterations, MAX_ITERATIONS_LIMIT
                ),
            )
            .with_suggestion(format!("Use a value between 1 and {}", MAX_ITERATIONS_LIMIT)));
        }

        validate_score("quality_threshold", self.quality_threshold)?;
        validate_score("improvement_threshold", self.improvement_threshold)?;

        Ok(())
    }
}

fn validate_score(field: &str, value: f64) -> Result<(), ValidationError> {
    if !value.is_finite() {
        return Err(ValidationError::new(field, "Value must be a finite number")
            .with_suggestion("Use a value between 0 and 100"));
    }
    if !(0.0..=100.0).contains(&value) {
        return Err(ValidationError::new(field, format!("Value {} is out of range", value))
            .with_suggestion("Scores are expressed on a 0-100 scale"));
    }
    Ok(())
}

/// Top-level configuration for scenario runs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HarnessConfig {
    /// Loop settings applied to every scenario
    #[serde(default)]
    pub loop_config: LoopConfig,
    /// Repository root containing `.github/skills` and `tests/scenarios`
    #[serde(default = "default_base_path")]
    pub base_path: String,
    /// Number of scenarios run at the same time
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// Per-call timeout applied to the code generator, in seconds
    #[serde(default)]
    pub generation_timeout_secs: Option<u64>,
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_base_path() -> String {
    ".".to_string()
}

fn default_concurrency() -> usize {
    1
}

fn default_log_level() -> String {
    "warn".to_string()
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            loop_config: LoopConfig::default(),
            base_path: default_base_path(),
            concurrency: default_concurrency(),
            generation_timeout_secs: None,
            log_level: default_log_level(),
        }
    }
}

impl HarnessConfig {
    /// Create from environment variables.
    pub fn from_env() -> Result<Self, ValidationError> {
        let mut config = Self::default();

        if let Some(v) = env_parse::<usize>("SKILL_EVAL_MAX_ITERATIONS")? {
            config.loop_config.max_iterations = v;
        }
        if let Some(v) = env_parse::<f64>("SKILL_EVAL_QUALITY_THRESHOLD")? {
            config.loop_config.quality_threshold = v;
        }
        if let Some(v) = env_parse::<f64>("SKILL_EVAL_IMPROVEMENT_THRESHOLD")? {
            config.loop_config.improvement_threshold = v;
        }
        if let Some(v) = env_parse::<bool>("SKILL_EVAL_EARLY_STOP")? {
            config.loop_config.early_stop_on_perfect = v;
        }
        if let Some(v) = env_parse::<bool>("SKILL_EVAL_INCLUDE_FEEDBACK")? {
            config.loop_config.include_feedback = v;
        }
        if let Ok(path) = env::var("SKILL_EVAL_BASE_PATH") {
            config.base_path = path;
        }
        if let Some(v) = env_parse::<usize>("SKILL_EVAL_CONCURRENCY")? {
            config.concurrency = v;
        }
        if let Some(v) = env_parse::<u64>("SKILL_EVAL_GENERATION_TIMEOUT")? {
            config.generation_timeout_secs = Some(v);
        }
        if let Ok(level) = env::var("SKILL_EVAL_LOG_LEVEL") {
            config.log_level = level;
        }

        config.validate()?;
        Ok(config)
    }

    /// Validate the harness config, including the nested loop config.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.loop_config.validate().map_err(|e| {
            ValidationError::new(format!("loop_config.{}", e.field), e.message)
                .with_suggestion(e.suggestion.unwrap_or_default())
        })?;

        if self.base_path.is_empty() {
            return Err(ValidationError::new("base_path", "Base path cannot be empty")
                .with_suggestion("Use '.' for the current directory"));
        }

        if self.concurrency == 0 || self.concurrency > MAX_CONCURRENCY_LIMIT {
            return Err(ValidationError::new(
                "concurrency",
                format!("Concurrency {} is out of range", self.concurrency),
            )
            .with_suggestion(format!("Use a value between 1 and {}", MAX_CONCURRENCY_LIMIT)));
        }

        if self.generation_timeout_secs == Some(0) {
            return Err(ValidationError::new(
                "generation_timeout_secs",
                "Generation timeout must be greater than 0",
            )
            .with_suggestion("Remove SKILL_EVAL_GENERATION_TIMEOUT to disable the timeout"));
        }

        if !LOG_LEVELS.contains(&self.log_level.to_lowercase().as_str()) {
            return Err(ValidationError::new(
                "log_level",
                format!("Invalid log level '{}'", self.log_level),
            )
            .with_suggestion(format!("Valid log levels: {:?}", LOG_LEVELS)));
        }

        Ok(())
    }
}

fn env_parse<T: FromStr>(var: &str) -> Result<Option<T>, ValidationError> {
    match env::var(var) {
        Ok(raw) => raw.trim().parse::<T>().map(Some).map_err(|_| {
            ValidationError::new(var, format!("Cannot parse value '{}'", raw))
                .with_suggestion("Unset the variable to use the default")
        }),
        Err(_) => Ok(None),
    }
}
