//! Collection command timeouts.

use std::time::Duration;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::ConfigError;

/// Default budget for replica teardowns dispatched by a shard delete (60s).
fn default_replica_teardown_timeout() -> Duration {
    Duration::from_secs(60)
}

/// Default budget for the slice to disappear from cluster state (45s).
fn default_confirmation_timeout() -> Duration {
    Duration::from_secs(45)
}

/// Timeouts applied by the delete-shard command.
///
/// Expiry of `replica_teardown_timeout` is not an error: the command goes on
/// to remove the slice from cluster state while teardowns may still be in
/// flight. Expiry of `confirmation_timeout` fails the command.
///
/// # Validation Rules
///
/// - `replica_teardown_timeout` must be > 0
/// - `confirmation_timeout` must be > 0
///
/// # Example
///
/// ```no_run
/// # use std::time::Duration;
/// # use shardkeeper_types::config::DeleteShardConfig;
/// let config = DeleteShardConfig::builder()
///     .replica_teardown_timeout(Duration::from_secs(30))
///     .confirmation_timeout(Duration::from_secs(20))
///     .build()
///     .expect("valid delete-shard config");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct DeleteShardConfig {
    /// Maximum wait for all replica teardowns to report completion.
    #[serde(default = "default_replica_teardown_timeout")]
    #[serde(with = "super::humantime_serde")]
    #[schemars(with = "String")]
    pub replica_teardown_timeout: Duration,
    /// Maximum wait for the deleted slice to vanish from cluster state.
    #[serde(default = "default_confirmation_timeout")]
    #[serde(with = "super::humantime_serde")]
    #[schemars(with = "String")]
    pub confirmation_timeout: Duration,
}

#[bon::bon]
impl DeleteShardConfig {
    /// Creates a new delete-shard configuration with validation.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] if either timeout is zero.
    #[builder]
    pub fn new(
        #[builder(default = default_replica_teardown_timeout())] replica_teardown_timeout: Duration,
        #[builder(default = default_confirmation_timeout())] confirmation_timeout: Duration,
    ) -> Result<Self, ConfigError> {
        let config = Self { replica_teardown_timeout, confirmation_timeout };
        config.validate()?;
        Ok(config)
    }
}

impl DeleteShardConfig {
    /// Validates the configuration values.
    ///
    /// Call after deserialization to ensure values are within valid ranges.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] if any value is out of range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.replica_teardown_timeout.is_zero() {
            return Err(ConfigError::Validation {
                message: "replica_teardown_timeout must be > 0".to_string(),
            });
        }
        if self.confirmation_timeout.is_zero() {
            return Err(ConfigError::Validation {
                message: "confirmation_timeout must be > 0".to_string(),
            });
        }
        Ok(())
    }
}

impl Default for DeleteShardConfig {
    fn default() -> Self {
        Self {
            replica_teardown_timeout: default_replica_teardown_timeout(),
            confirmation_timeout: default_confirmation_timeout(),
        }
    }
}
