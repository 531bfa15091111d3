//! Engine configuration.
//!
//! Parsed from TOML. Every field has a default, so an empty document is
//! a valid configuration; validation catches out-of-range thresholds
//! before the engine ever sees them.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from configuration loading.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// The file could not be read.
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    /// The TOML could not be parsed.
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// A field failed validation.
    #[error("invalid config: {0}")]
    Validation(String),
}

/// Top-level engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Minimum participation rate before a pass/fail outcome is
    /// computed; below it the outcome is `NoQuorum`.
    pub quorum_floor: f64,

    /// Pass threshold applied to campaigns that do not specify their
    /// own.
    pub default_pass_percentage: f64,

    /// Length of the voting window for rule-opened campaigns, in days.
    pub default_window_days: i64,

    /// Trigger rule thresholds.
    pub trigger: TriggerConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            quorum_floor: 0.5,
            default_pass_percentage: 0.6,
            default_window_days: 7,
            trigger: TriggerConfig::default(),
        }
    }
}

/// Thresholds for the trigger rule engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TriggerConfig {
    /// Probation length in days; tenure at or beyond it proposes a
    /// probation conversion.
    pub probation_days: u32,

    /// Monthly late-arrival count at which a disciplinary demotion
    /// campaign is proposed.
    pub max_late_count: u32,

    /// Monthly late minutes at which a disciplinary demotion campaign is
    /// proposed.
    pub max_late_minutes: u32,
}

impl Default for TriggerConfig {
    fn default() -> Self {
        Self {
            probation_days: 90,
            max_late_count: 3,
            max_late_minutes: 120,
        }
    }
}

impl EngineConfig {
    /// Loads configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed, or
    /// validated.
    pub fn from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parses configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is invalid or a field is out of
    /// range.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validates field ranges.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] naming the offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.quorum_floor) {
            return Err(ConfigError::Validation(format!(
                "quorum_floor {} must be within [0, 1]",
                self.quorum_floor
            )));
        }
        if !(self.default_pass_percentage > 0.0 && self.default_pass_percentage <= 1.0) {
            return Err(ConfigError::Validation(format!(
                "default_pass_percentage {} must be within (0, 1]",
                self.default_pass_percentage
            )));
        }
        if self.default_window_days < 1 {
            return Err(ConfigError::Validation(format!(
                "default_window_days {} must be at least 1",
                self.default_window_days
            )));
        }
        Ok(())
    }
}
