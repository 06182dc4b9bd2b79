//! Shared collaborators of collection commands.

use std::sync::Arc;

use async_trait::async_trait;
use shardkeeper_state::{ClusterStateReader, CoordinationStore, StateUpdater, state_updater};
use shardkeeper_types::{
    ClusterState, NodeProps, Result,
    config::{DeleteShardConfig, StateUpdateConfig},
};

use crate::{
    aggregator::SharedResults,
    replica::{ReplicaDeleter, StoreReplicaDeleter},
};

/// A collection command.
#[async_trait]
pub trait CollectionCommand: Send + Sync {
    /// Runs the command against `cluster_state`, appending outcomes to
    /// `results`.
    ///
    /// # Errors
    ///
    /// Returns a bad request for invalid input, or a server error when the
    /// command fails after validation.
    async fn call(
        &self,
        cluster_state: &ClusterState,
        message: &NodeProps,
        results: &SharedResults,
    ) -> Result<()>;
}

/// Store, reader, updater and replica deleter shared by commands.
///
/// # Example
///
/// ```no_run
/// # use std::sync::Arc;
/// # use shardkeeper_collections::CommandContext;
/// # use shardkeeper_state::MemoryCoordinationStore;
/// let ctx = CommandContext::builder().store(Arc::new(MemoryCoordinationStore::new())).build();
/// ```
pub struct CommandContext {
    store: Arc<dyn CoordinationStore>,
    reader: ClusterStateReader,
    updater: Arc<dyn StateUpdater>,
    replica_deleter: Arc<dyn ReplicaDeleter>,
    config: DeleteShardConfig,
}

#[bon::bon]
impl CommandContext {
    /// Creates a context over `store`.
    ///
    /// Without an explicit `updater`, one is built for `update_config.mode`.
    /// Without an explicit `replica_deleter`, a [`StoreReplicaDeleter`]
    /// publishing through the updater is used.
    #[builder]
    pub fn new(
        store: Arc<dyn CoordinationStore>,
        #[builder(default)] update_config: StateUpdateConfig,
        #[builder(default)] config: DeleteShardConfig,
        updater: Option<Arc<dyn StateUpdater>>,
        replica_deleter: Option<Arc<dyn ReplicaDeleter>>,
    ) -> Self {
        let updater = updater.unwrap_or_else(|| state_updater(Arc::clone(&store), &update_config));
        let replica_deleter = replica_deleter.unwrap_or_else(|| {
            Arc::new(StoreReplicaDeleter::new(Arc::clone(&updater))) as Arc<dyn ReplicaDeleter>
        });
        let reader = ClusterStateReader::new(Arc::clone(&store));
        Self { store, reader, updater, replica_deleter, config }
    }
}

impl CommandContext {
    /// Coordination store.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn CoordinationStore> {
        &self.store
    }

    /// Cluster-state reader over the store.
    #[must_use]
    pub fn reader(&self) -> &ClusterStateReader {
        &self.reader
    }

    /// Active cluster-state updater.
    #[must_use]
    pub fn updater(&self) -> &Arc<dyn StateUpdater> {
        &self.updater
    }

    /// Replica deleter used by fan-out commands.
    #[must_use]
    pub fn replica_deleter(&self) -> &Arc<dyn ReplicaDeleter> {
        &self.replica_deleter
    }

    /// Delete-shard timeouts.
    #[must_use]
    pub fn config(&self) -> &DeleteShardConfig {
        &self.config
    }
}
