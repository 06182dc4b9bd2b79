//! shardkeeper binary.
//!
//! Loads a cluster snapshot into an in-memory coordination store and runs a
//! collection command against it, printing the results envelope as JSON.
//!
//! # Usage
//!
//! ```bash
//! # Delete an inactive shard
//! shardkeeper delete-shard --snapshot cluster.json --collection books --shard shard1_0
//!
//! # Publish through direct compare-and-swap instead of the overseer queue
//! SHARDKEEPER__STATE_UPDATE__MODE=distributed \
//! shardkeeper delete-shard --snapshot cluster.json --collection books --shard shard1_0
//!
//! # CLI arguments override environment variables and the config file
//! shardkeeper --config shardkeeper.toml delete-shard --mode overseer ...
//!
//! # Print the configuration schema or a default config file
//! shardkeeper config schema
//! shardkeeper config example
//! ```

use std::io::IsTerminal;

use clap::Parser;
use shardkeeper_server::{
    config::{self, Cli, CliCommand, Config, ConfigAction, LogFormat},
    runner::{self, RunError},
    shutdown,
};
use snafu::{ResultExt, Snafu};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Top-level error type for the binary.
#[derive(Debug, Snafu)]
enum ServerError {
    #[snafu(display("{source}"))]
    Config { source: config::ConfigError },

    #[snafu(display("{source}"))]
    Run { source: RunError },

    #[snafu(display("failed to encode results: {source}"))]
    Output { source: serde_json::Error },

    #[snafu(display("interrupted before the command finished"))]
    Interrupted,
}

#[tokio::main]
async fn main() -> Result<(), ServerError> {
    let cli = Cli::parse();

    let args = match cli.command {
        CliCommand::Config { action } => {
            match action {
                ConfigAction::Schema => print!("{}", config::generate_config_schema()),
                ConfigAction::Example => print!("{}", config::generate_config_example()),
            }
            return Ok(());
        },
        CliCommand::DeleteShard(args) => args,
    };

    let mut config = Config::load(cli.config.as_deref()).context(ConfigSnafu)?;
    if let Some(log_format) = cli.log_format {
        config.log_format = log_format;
    }
    init_logging(&config);

    tracing::info!(
        collection = %args.collection,
        shard = %args.shard,
        snapshot = %args.snapshot.display(),
        "Running delete-shard"
    );

    let outcome =
        shutdown::until_shutdown(runner::run_delete_shard(&config, &args), shutdown::shutdown_signal())
            .await;

    match outcome {
        Some(Ok(results)) => {
            let json = serde_json::to_string_pretty(&results).context(OutputSnafu)?;
            println!("{json}");
            Ok(())
        },
        Some(Err(e)) => {
            if let Some(command_error) = e.command_error() {
                tracing::error!(
                    code = %command_error.code(),
                    retryable = command_error.is_retryable(),
                    action = command_error.suggested_action(),
                    "Command failed"
                );
            }
            Err(ServerError::Run { source: e })
        },
        None => InterruptedSnafu.fail(),
    }
}

/// Initializes the logging system based on configuration.
///
/// Supports three formats:
/// - `Text`: Human-readable format (development)
/// - `Json`: JSON structured logging (production)
/// - `Auto`: JSON when stderr is not a terminal, text otherwise
///
/// Logs go to stderr so stdout carries only the results envelope.
fn init_logging(config: &Config) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let use_json = match config.log_format {
        LogFormat::Json => true,
        LogFormat::Text => false,
        LogFormat::Auto => !std::io::stderr().is_terminal(),
    };

    if use_json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                fmt::layer()
                    .json()
                    .flatten_event(true)
                    .with_current_span(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}
