//! Replica deletion.
//!
//! [`ReplicaDeleter`] is the per-replica subroutine a shard delete fans out
//! to. It returns as soon as the work is scheduled and reports the outcome
//! through the [`ReplicaCompletion`] it is given.

use std::sync::Arc;

use shardkeeper_state::{CoordinationError, StateUpdater};
use shardkeeper_types::{
    ClusterState, ClusterStateMutation, CommandResults, NodeProps,
    props::{ASYNC, COLLECTION_PROP, PARALLEL, REPLICA_PROP, SHARD_ID_PROP},
    results::{FAILURE, SUCCESS},
};
use snafu::Snafu;
use tracing::{debug, warn};

use crate::fanout::ReplicaCompletion;

/// Synchronous failure of [`ReplicaDeleter::delete_replica`].
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ReplicaDeleteError {
    /// The coordination store failed while scheduling the deletion.
    #[snafu(display("coordination store error while deleting replica: {source}"))]
    Coordination {
        /// Underlying store error.
        source: CoordinationError,
    },

    /// The request could not be scheduled.
    #[snafu(display("{message}"))]
    Other {
        /// Reason.
        message: String,
    },
}

/// Deletes a single replica.
pub trait ReplicaDeleter: Send + Sync + 'static {
    /// Schedules deletion of the replica described by `props` and returns.
    ///
    /// `completion` must be consumed once the deletion is resolved. On a
    /// synchronous error it is dropped, which releases the caller's latch.
    ///
    /// # Errors
    ///
    /// Returns [`ReplicaDeleteError`] if the deletion cannot be scheduled.
    fn delete_replica(
        &self,
        cluster_state: &ClusterState,
        props: &NodeProps,
        completion: ReplicaCompletion,
    ) -> Result<(), ReplicaDeleteError>;
}

/// Replica deleter that removes the replica from cluster state.
///
/// The hosting node must be live; otherwise the replica is reported as a
/// failure and cluster state is left untouched. On success the replica's
/// envelope carries `success = { core, node }`.
pub struct StoreReplicaDeleter {
    updater: Arc<dyn StateUpdater>,
}

impl StoreReplicaDeleter {
    /// Creates a deleter publishing through `updater`.
    pub fn new(updater: Arc<dyn StateUpdater>) -> Self {
        Self { updater }
    }
}

fn required<'a>(props: &'a NodeProps, key: &'static str) -> Result<&'a str, ReplicaDeleteError> {
    props.get_str(key).ok_or_else(|| ReplicaDeleteError::Other {
        message: format!("Missing required parameter: {key}"),
    })
}

impl ReplicaDeleter for StoreReplicaDeleter {
    fn delete_replica(
        &self,
        cluster_state: &ClusterState,
        props: &NodeProps,
        completion: ReplicaCompletion,
    ) -> Result<(), ReplicaDeleteError> {
        let collection_name = required(props, COLLECTION_PROP)?;
        let shard = required(props, SHARD_ID_PROP)?;
        let replica_name = required(props, REPLICA_PROP)?;

        let collection = cluster_state.collection(collection_name).ok_or_else(|| {
            ReplicaDeleteError::Other {
                message: format!("Invalid collection specified: {collection_name}"),
            }
        })?;
        let slice = collection.slice(shard).ok_or_else(|| ReplicaDeleteError::Other {
            message: format!("Invalid shard name : {shard} in collection : {collection_name}"),
        })?;
        let replica = slice.replica(replica_name).ok_or_else(|| ReplicaDeleteError::Other {
            message: format!(
                "Invalid replica : {replica_name} in shard/collection : {shard}/{collection_name}"
            ),
        })?;

        let node = replica.node_name.clone();
        let core = replica.core_name.clone();
        let live = cluster_state.is_live(&node);
        let mutation = ClusterStateMutation::DeleteReplica {
            collection: collection_name.to_string(),
            shard: shard.to_string(),
            replica: replica_name.to_string(),
        };
        debug!(
            replica = %replica_name,
            node = %node,
            parallel = props.get_bool(PARALLEL, false),
            async_id = props.get_str(ASYNC),
            "Scheduling replica deletion"
        );

        let updater = Arc::clone(&self.updater);
        tokio::spawn(async move {
            let mut results = CommandResults::new();
            if !live {
                warn!(node = %node, core = %core, "Replica host is not live");
                results.add(FAILURE, format!("Node {node} is not live"));
            } else {
                match updater.apply(mutation).await {
                    Ok(()) => {
                        let mut detail = CommandResults::new();
                        detail.add("core", core);
                        detail.add("node", node);
                        results.add(SUCCESS, detail);
                    },
                    Err(e) => {
                        warn!(node = %node, core = %core, error = %e, "Failed to remove replica");
                        results.add(FAILURE, e.to_string());
                    },
                }
            }
            completion.complete(results);
        });
        Ok(())
    }
}
