//! Server configuration.
//!
//! Provides CLI parsing and configuration loading from files and environment
//! variables. Precedence, lowest first: built-in defaults, TOML file,
//! `SHARDKEEPER__` environment variables, CLI flags.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use shardkeeper_types::config::{DeleteShardConfig, StateUpdateConfig, StateUpdateMode};
use snafu::{ResultExt, Snafu};

/// Environment variable prefix; `__` separates nested keys
/// (e.g. `SHARDKEEPER__STATE_UPDATE__MODE=distributed`).
pub const ENV_PREFIX: &str = "SHARDKEEPER";

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable text.
    Text,
    /// One JSON object per event.
    Json,
    /// JSON when stderr is not a terminal, text otherwise.
    #[default]
    Auto,
}

/// Server configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Config {
    /// Log output format.
    #[serde(default)]
    pub log_format: LogFormat,
    /// How cluster-state mutations are published.
    #[serde(default)]
    pub state_update: StateUpdateConfig,
    /// Delete-shard timeouts.
    #[serde(default)]
    pub delete_shard: DeleteShardConfig,
}

/// Configuration error.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ConfigError {
    /// Failed to load configuration sources.
    #[snafu(display("failed to load config: {source}"))]
    Load {
        /// Underlying loader error.
        source: config::ConfigError,
    },

    /// A value is out of range.
    #[snafu(display("{source}"))]
    Invalid {
        /// Validation failure.
        source: shardkeeper_types::config::ConfigError,
    },
}

impl Config {
    /// Loads configuration from an optional TOML file and the process
    /// environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if a source cannot be read or parsed, or a
    /// value fails validation.
    pub fn load(path: Option<&std::path::Path>) -> Result<Self, ConfigError> {
        Self::load_with_env(path, None)
    }

    /// Like [`Config::load`], reading environment variables from `env`
    /// instead of the process environment when given.
    ///
    /// # Errors
    ///
    /// See [`Config::load`].
    pub fn load_with_env(
        path: Option<&std::path::Path>,
        env: Option<config::Map<String, String>>,
    ) -> Result<Self, ConfigError> {
        let builder = config::Config::builder();

        let builder = match path {
            Some(path) => builder.add_source(config::File::from(path)),
            None => builder.add_source(config::File::with_name("shardkeeper").required(false)),
        };

        let builder = builder.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true)
                .source(env),
        );

        let config: Self =
            builder.build().context(LoadSnafu)?.try_deserialize().context(LoadSnafu)?;
        config.validate()?;
        Ok(config)
    }

    /// Validates nested sections.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] for the first out-of-range value.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.state_update.validate().context(InvalidSnafu)?;
        self.delete_shard.validate().context(InvalidSnafu)?;
        Ok(())
    }
}

/// Returns the JSON schema of [`Config`].
pub fn generate_config_schema() -> String {
    let schema = schemars::schema_for!(Config);
    serde_json::to_string_pretty(&schema).unwrap_or_default() + "\n"
}

/// Returns a TOML document holding the default configuration.
pub fn generate_config_example() -> String {
    let defaults = Config::default();
    let log_format = match defaults.log_format {
        LogFormat::Text => "text",
        LogFormat::Json => "json",
        LogFormat::Auto => "auto",
    };
    format!(
        "# shardkeeper configuration\n\
         # Every key can also be set as SHARDKEEPER__<SECTION>__<KEY>.\n\
         \n\
         log_format = \"{log_format}\"\n\
         \n\
         [state_update]\n\
         # overseer | distributed\n\
         mode = \"{mode}\"\n\
         max_cas_retries = {retries}\n\
         \n\
         [delete_shard]\n\
         replica_teardown_timeout = \"{teardown}\"\n\
         confirmation_timeout = \"{confirmation}\"\n",
        mode = defaults.state_update.mode,
        retries = defaults.state_update.max_cas_retries,
        teardown = humantime::format_duration(defaults.delete_shard.replica_teardown_timeout),
        confirmation = humantime::format_duration(defaults.delete_shard.confirmation_timeout),
    )
}

// ============================================================================
// CLI
// ============================================================================

/// Command-line interface.
#[derive(Debug, Parser)]
#[command(name = "shardkeeper", version, about = "Shard lifecycle commands for a search cluster")]
pub struct Cli {
    /// TOML configuration file.
    #[arg(long, global = true, env = "SHARDKEEPER_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log output format; overrides the configuration file.
    #[arg(long, global = true, value_enum)]
    pub log_format: Option<LogFormat>,

    #[command(subcommand)]
    pub command: CliCommand,
}

/// Top-level subcommands.
#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Delete a shard from a collection in a cluster snapshot.
    DeleteShard(DeleteShardArgs),
    /// Inspect the configuration format.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// `config` subcommand actions.
#[derive(Debug, Clone, Copy, Subcommand)]
pub enum ConfigAction {
    /// Print the JSON schema of the configuration file.
    Schema,
    /// Print a configuration file holding the defaults.
    Example,
}

/// Arguments of `delete-shard`.
#[derive(Debug, Clone, Args)]
pub struct DeleteShardArgs {
    /// JSON cluster snapshot to load into the in-memory store.
    #[arg(long)]
    pub snapshot: PathBuf,

    /// Collection name (or alias with --follow-aliases).
    #[arg(long)]
    pub collection: String,

    /// Slice id to delete.
    #[arg(long)]
    pub shard: String,

    /// Resolve the collection name through aliases.
    #[arg(long, default_value_t = false)]
    pub follow_aliases: bool,

    /// Correlation id passed through to replica teardowns.
    #[arg(long = "async", value_name = "ID")]
    pub async_id: Option<String>,

    /// Update modality; overrides the configuration file.
    #[arg(long, value_enum)]
    pub mode: Option<ModeArg>,

    /// Extra request property, repeatable.
    #[arg(long = "property", value_name = "KEY=VALUE", value_parser = parse_property)]
    pub properties: Vec<(String, String)>,
}

/// CLI spelling of [`StateUpdateMode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ModeArg {
    /// Centralized overseer queue.
    Overseer,
    /// Direct compare-and-swap writes.
    Distributed,
}

impl From<ModeArg> for StateUpdateMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Overseer => Self::Overseer,
            ModeArg::Distributed => Self::Distributed,
        }
    }
}

fn parse_property(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected KEY=VALUE, got '{raw}'")),
    }
}
