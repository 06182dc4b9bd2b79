//! Replica teardown descriptors.

use shardkeeper_types::{
    NodeProps, Slice,
    props::{ASYNC, COLLECTION_PROP, CORE_NAME_PROP, NODE, PARALLEL, REPLICA_PROP, SHARD_ID_PROP},
};

use crate::{aggregator::ReplicaTarget, fanout::TeardownDescriptor};

/// Builds one teardown descriptor per replica of `slice`.
///
/// Every request key is carried over. The replica's identity (canonical
/// collection, shard, core, replica and node) overrides request keys of the
/// same name, `parallel` is forced to `true`, and `async` is set to
/// `async_id` or removed.
#[must_use]
pub fn replica_descriptors(
    collection: &str,
    slice: &Slice,
    message: &NodeProps,
    async_id: Option<&str>,
) -> Vec<TeardownDescriptor> {
    slice
        .replicas()
        .map(|replica| {
            let identity = NodeProps::from_pairs([
                (COLLECTION_PROP, collection),
                (SHARD_ID_PROP, slice.name.as_str()),
                (CORE_NAME_PROP, replica.core_name.as_str()),
                (REPLICA_PROP, replica.name.as_str()),
                (NODE, replica.node_name.as_str()),
            ]);
            let props = message
                .clone()
                .plus_all(&identity)
                .plus(PARALLEL, Some("true"))
                .plus(ASYNC, async_id);
            TeardownDescriptor {
                target: ReplicaTarget {
                    collection: collection.to_string(),
                    shard: slice.name.clone(),
                    node: replica.node_name.clone(),
                },
                props,
            }
        })
        .collect()
}
