//! Shard deletion.
//!
//! Removes one slice from a collection:
//!
//! 1. Resolve the collection name (aliases only when `followAliases` is set)
//! 2. Validate that the slice exists and may be deleted
//! 3. Move a recovering slice to `construction` before touching replicas
//! 4. Tear down every replica in parallel, waiting up to the configured budget
//! 5. Publish `deleteshard`
//! 6. Clean the slice's leader-election, leader and term metadata
//! 7. Wait for the slice to vanish from cluster state
//!
//! A replica teardown timeout (step 4) is logged, not raised: the command
//! removes the slice regardless. A metadata cleanup failure (step 6) is
//! logged and ignored.

use std::sync::Arc;

use async_trait::async_trait;
use shardkeeper_state::{StateUpdateError, WaitForStateError};
use shardkeeper_types::{
    ClusterState, ClusterStateMutation, CommandError, NodeProps, Result, Slice, SliceState,
    error::BoxedError,
    mutation::{DELETE_SHARD, UPDATE_SHARD_STATE},
    props::{ASYNC, COLLECTION_PROP, FOLLOW_ALIASES, SHARD_ID_PROP},
};
use snafu::{ResultExt, Snafu};
use tracing::{debug, info};

use crate::{
    aggregator::SharedResults,
    cleaner::clean_shard_metadata,
    confirm::wait_for_slice_removal,
    context::{CollectionCommand, CommandContext},
    enumerator::replica_descriptors,
    fanout::fan_out,
    replica::ReplicaDeleteError,
    validator::{resolve_collection_name, validate_slice},
};

/// Failures after validation. Every variant surfaces as a server error.
#[derive(Debug, Snafu)]
enum DeleteError {
    #[snafu(display("failed to dispatch replica deletion: {source}"))]
    Replica { source: ReplicaDeleteError },

    #[snafu(display("failed to publish {operation}: {source}"))]
    Publish { operation: &'static str, source: StateUpdateError },

    #[snafu(display("slice still present: {source}"))]
    Confirm { source: WaitForStateError },
}

fn execution_error(collection: &str, shard: &str, source: impl Into<BoxedError>) -> CommandError {
    CommandError::server_error(
        format!("Error executing delete operation for collection: {collection} shard: {shard}"),
        source,
    )
}

fn required<'a>(message: &'a NodeProps, key: &str) -> Result<&'a str> {
    message
        .get_str(key)
        .ok_or_else(|| CommandError::bad_request(format!("Missing required parameter: {key}")))
}

/// The `deleteshard` collection command.
pub struct DeleteShardCmd {
    ctx: Arc<CommandContext>,
}

impl DeleteShardCmd {
    /// Creates the command over `ctx`.
    pub fn new(ctx: Arc<CommandContext>) -> Self {
        Self { ctx }
    }

    /// Publishes `slice -> construction` so recovery logic elsewhere stops
    /// contending for the replicas about to be torn down.
    async fn mark_construction(
        &self,
        collection: &str,
        shard: &str,
    ) -> std::result::Result<(), DeleteError> {
        let mutation = ClusterStateMutation::UpdateShardState {
            collection: collection.to_string(),
            states: [(shard.to_string(), SliceState::Construction)].into(),
        };
        self.ctx
            .updater()
            .apply(mutation)
            .await
            .context(PublishSnafu { operation: UPDATE_SHARD_STATE })?;
        debug!(collection, shard, "Marked recovering slice as construction");
        Ok(())
    }

    async fn delete_slice(
        &self,
        cluster_state: &ClusterState,
        collection: &str,
        slice: &Slice,
        message: &NodeProps,
        results: &SharedResults,
    ) -> std::result::Result<(), DeleteError> {
        let shard = slice.name.as_str();
        let config = self.ctx.config();

        let descriptors = replica_descriptors(collection, slice, message, message.get_str(ASYNC));
        let summary = fan_out(
            self.ctx.replica_deleter().as_ref(),
            cluster_state,
            descriptors,
            results,
            config.replica_teardown_timeout,
        )
        .await
        .context(ReplicaSnafu)?;
        debug!(
            collection,
            shard,
            dispatched = summary.dispatched,
            pending = summary.pending,
            "Replica teardown finished"
        );

        let mutation = ClusterStateMutation::DeleteShard {
            collection: collection.to_string(),
            shard: shard.to_string(),
        };
        self.ctx
            .updater()
            .apply(mutation)
            .await
            .context(PublishSnafu { operation: DELETE_SHARD })?;

        let cleanup = clean_shard_metadata(self.ctx.store().as_ref(), collection, shard).await;
        let failed = cleanup.iter().filter(|outcome| outcome.result.is_err()).count();
        debug!(collection, shard, failed, "Shard metadata cleanup finished");

        wait_for_slice_removal(self.ctx.reader(), collection, shard, config.confirmation_timeout)
            .await
            .context(ConfirmSnafu)?;
        Ok(())
    }
}

#[async_trait]
impl CollectionCommand for DeleteShardCmd {
    async fn call(
        &self,
        cluster_state: &ClusterState,
        message: &NodeProps,
        results: &SharedResults,
    ) -> Result<()> {
        let external_name = required(message, COLLECTION_PROP)?;
        let shard = required(message, SHARD_ID_PROP)?;
        let follow_aliases = message.get_bool(FOLLOW_ALIASES, false);
        let collection =
            resolve_collection_name(self.ctx.reader(), external_name, follow_aliases).await?;

        info!(collection = %collection, shard, "Delete shard invoked");
        let slice = validate_slice(cluster_state, &collection, shard)?;

        if slice.state == SliceState::Recovery {
            self.mark_construction(&collection, shard)
                .await
                .map_err(|e| execution_error(&collection, shard, e))?;
        }

        self.delete_slice(cluster_state, &collection, slice, message, results)
            .await
            .map_err(|e| execution_error(&collection, shard, e))?;

        info!(collection = %collection, shard, "Successfully deleted shard");
        Ok(())
    }
}
