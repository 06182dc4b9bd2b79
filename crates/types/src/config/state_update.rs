//! Cluster-state update modality.

use std::{fmt, str::FromStr};

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::ConfigError;

/// Default number of compare-and-swap attempts for a distributed update.
fn default_max_cas_retries() -> u32 {
    16
}

/// How cluster-state mutations reach the authoritative store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum StateUpdateMode {
    /// Mutations are offered to a single-writer queue consumed by the overseer.
    #[default]
    Overseer,
    /// Mutations are applied directly with compare-and-swap on the state document.
    Distributed,
}

impl fmt::Display for StateUpdateMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Overseer => f.write_str("overseer"),
            Self::Distributed => f.write_str("distributed"),
        }
    }
}

impl FromStr for StateUpdateMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "overseer" => Ok(Self::Overseer),
            "distributed" => Ok(Self::Distributed),
            other => Err(ConfigError::Validation {
                message: format!("unknown state update mode '{other}'"),
            }),
        }
    }
}

/// Cluster-state update configuration.
///
/// # Validation Rules
///
/// - `max_cas_retries` must be > 0
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct StateUpdateConfig {
    /// Active update modality.
    #[serde(default)]
    pub mode: StateUpdateMode,
    /// Compare-and-swap attempts before a distributed update gives up.
    #[serde(default = "default_max_cas_retries")]
    pub max_cas_retries: u32,
}

#[bon::bon]
impl StateUpdateConfig {
    /// Creates a new state update configuration with validation.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] if `max_cas_retries` is zero.
    #[builder]
    pub fn new(
        #[builder(default)] mode: StateUpdateMode,
        #[builder(default = default_max_cas_retries())] max_cas_retries: u32,
    ) -> Result<Self, ConfigError> {
        let config = Self { mode, max_cas_retries };
        config.validate()?;
        Ok(config)
    }
}

impl StateUpdateConfig {
    /// Validates the configuration values.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] if any value is out of range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_cas_retries == 0 {
            return Err(ConfigError::Validation {
                message: "max_cas_retries must be > 0".to_string(),
            });
        }
        Ok(())
    }

    /// Returns true when mutations bypass the overseer queue.
    #[must_use]
    pub fn is_distributed(&self) -> bool {
        self.mode == StateUpdateMode::Distributed
    }
}

impl Default for StateUpdateConfig {
    fn default() -> Self {
        Self { mode: StateUpdateMode::default(), max_cas_retries: default_max_cas_retries() }
    }
}
