//! Runs `delete-shard` against a cluster snapshot.
//!
//! The snapshot is loaded into a fresh [`MemoryCoordinationStore`]; in
//! overseer mode an [`Overseer`] drains the update queue for the duration of
//! the command.

use std::{path::PathBuf, sync::Arc};

use shardkeeper_collections::{CollectionCommand, CommandContext, DeleteShardCmd, shared_results};
use shardkeeper_state::{
    ClusterSnapshot, ClusterStateReader, CoordinationStore, MemoryCoordinationStore, Overseer,
    ReaderError, SnapshotError,
};
use shardkeeper_types::{
    CommandError, CommandResults, NodeProps,
    config::StateUpdateMode,
    props::{ASYNC, COLLECTION_PROP, FOLLOW_ALIASES, SHARD_ID_PROP},
};
use snafu::{ResultExt, Snafu};
use tracing::info;

use crate::config::{Config, DeleteShardArgs};

/// Failures of a `delete-shard` run.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum RunError {
    /// The snapshot file could not be read.
    #[snafu(display("failed to read snapshot {}: {source}", path.display()))]
    ReadSnapshot {
        /// Snapshot path.
        path: PathBuf,
        /// I/O error.
        source: std::io::Error,
    },

    /// The snapshot file is not a valid cluster description.
    #[snafu(display("failed to parse snapshot {}: {source}", path.display()))]
    ParseSnapshot {
        /// Snapshot path.
        path: PathBuf,
        /// Parser error.
        source: serde_json::Error,
    },

    /// The snapshot could not be written into the store.
    #[snafu(display("failed to seed coordination store: {source}"))]
    Seed {
        /// Loader error.
        source: SnapshotError,
    },

    /// Cluster state could not be read back.
    #[snafu(display("failed to read cluster state: {source}"))]
    ReadState {
        /// Reader error.
        source: ReaderError,
    },

    /// The command failed.
    #[snafu(display("{source}"))]
    Command {
        /// Command error carrying the code and message.
        source: CommandError,
    },
}

impl RunError {
    /// Returns the command error, if the command itself failed.
    #[must_use]
    pub fn command_error(&self) -> Option<&CommandError> {
        match self {
            Self::Command { source } => Some(source),
            _ => None,
        }
    }
}

/// Builds the command message from CLI arguments. Extra properties go in
/// first so the named flags win.
#[must_use]
pub fn request_message(args: &DeleteShardArgs) -> NodeProps {
    let mut message = NodeProps::from_pairs(args.properties.iter().cloned());
    message.insert(COLLECTION_PROP, args.collection.as_str());
    message.insert(SHARD_ID_PROP, args.shard.as_str());
    if args.follow_aliases {
        message.insert(FOLLOW_ALIASES, true);
    }
    if let Some(async_id) = &args.async_id {
        message.insert(ASYNC, async_id.as_str());
    }
    message
}

/// Loads the snapshot, runs the command and returns its results envelope.
///
/// # Errors
///
/// Returns [`RunError`] if the snapshot cannot be loaded or the command
/// fails.
pub async fn run_delete_shard(
    config: &Config,
    args: &DeleteShardArgs,
) -> Result<CommandResults, RunError> {
    let raw = tokio::fs::read(&args.snapshot)
        .await
        .context(ReadSnapshotSnafu { path: &args.snapshot })?;
    let snapshot: ClusterSnapshot =
        serde_json::from_slice(&raw).context(ParseSnapshotSnafu { path: &args.snapshot })?;

    let store: Arc<dyn CoordinationStore> = Arc::new(MemoryCoordinationStore::new());
    snapshot.load_into(store.as_ref()).await.context(SeedSnafu)?;

    let mut update_config = config.state_update.clone();
    if let Some(mode) = args.mode {
        update_config.mode = mode.into();
    }
    info!(
        snapshot = %args.snapshot.display(),
        mode = %update_config.mode,
        "Seeded coordination store"
    );

    let overseer = (update_config.mode == StateUpdateMode::Overseer)
        .then(|| Overseer::new(Arc::clone(&store), update_config.max_cas_retries).spawn());

    let ctx = CommandContext::builder()
        .store(Arc::clone(&store))
        .update_config(update_config)
        .config(config.delete_shard.clone())
        .build();
    let cmd = DeleteShardCmd::new(Arc::new(ctx));

    let reader = ClusterStateReader::new(Arc::clone(&store));
    let outcome = async {
        let cluster_state = reader.cluster_state().await.context(ReadStateSnafu)?;
        let results = shared_results();
        cmd.call(&cluster_state, &request_message(args), &results).await.context(CommandSnafu)?;
        let envelope = results.lock().clone();
        Ok::<_, RunError>(envelope)
    }
    .await;

    if let Some(overseer) = overseer {
        overseer.shutdown().await;
    }
    outcome
}
