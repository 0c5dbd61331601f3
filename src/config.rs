//! Evaluator configuration
//!
//! Thresholds that shape the heuristics of the evaluator. Every field has a
//! default, so an empty TOML document is a valid configuration.

use crate::error::ScoreError;
use crate::feedback::Locale;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Actions at or above this intensity (0-10 scale) count as forceful
pub const DEFAULT_FORCEFUL_INTENSITY_THRESHOLD: f64 = 8.0;

/// Move events per elapsed second above which motion counts as erratic
pub const DEFAULT_MAX_MOVES_PER_SECOND: f64 = 6.0;

/// Maximum number of feedback sentences in a result
pub const DEFAULT_FEEDBACK_LIMIT: usize = 8;

/// Algorithm version reported when the rubric carries none
pub const DEFAULT_ALGORITHM_VERSION: &str = "v1";

/// Tunable evaluator settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EvaluatorConfig {
    pub forceful_intensity_threshold: f64,
    pub max_moves_per_second: f64,
    pub feedback_limit: usize,
    pub default_algorithm_version: String,
    pub locale: Locale,
}

impl Default for EvaluatorConfig {
    fn default() -> Self {
        Self {
            forceful_intensity_threshold: DEFAULT_FORCEFUL_INTENSITY_THRESHOLD,
            max_moves_per_second: DEFAULT_MAX_MOVES_PER_SECOND,
            feedback_limit: DEFAULT_FEEDBACK_LIMIT,
            default_algorithm_version: DEFAULT_ALGORITHM_VERSION.to_string(),
            locale: Locale::default(),
        }
    }
}

impl EvaluatorConfig {
    /// Parse and validate a TOML configuration
    pub fn from_toml_str(content: &str) -> Result<Self, ScoreError> {
        let config: EvaluatorConfig =
            toml::from_str(content).map_err(|e| ScoreError::ConfigError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file
    pub fn from_path(path: &Path) -> Result<Self, ScoreError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ScoreError::ConfigError(format!("failed to read {}: {e}", path.display()))
        })?;
        let config = Self::from_toml_str(&content)?;
        tracing::debug!(path = %path.display(), "loaded evaluator config");
        Ok(config)
    }

    pub fn with_locale(mut self, locale: Locale) -> Self {
        self.locale = locale;
        self
    }

    pub fn validate(&self) -> Result<(), ScoreError> {
        if !self.forceful_intensity_threshold.is_finite() || self.forceful_intensity_threshold < 0.0
        {
            return Err(ScoreError::InvalidConfig(format!(
                "forceful_intensity_threshold must be a non-negative number, got {}",
                self.forceful_intensity_threshold
            )));
        }
        if !self.max_moves_per_second.is_finite() || self.max_moves_per_second < 0.0 {
            return Err(ScoreError::InvalidConfig(format!(
                "max_moves_per_second must be a non-negative number, got {}",
                self.max_moves_per_second
            )));
        }
        if self.feedback_limit == 0 {
            return Err(ScoreError::InvalidConfig(
                "feedback_limit must be at least 1".to_string(),
            ));
        }
        if self.default_algorithm_version.trim().is_empty() {
            return Err(ScoreError::InvalidConfig(
                "default_algorithm_version must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}
