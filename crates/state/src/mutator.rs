//! Pure slice-map mutations.
//!
//! Both update modalities funnel through [`apply`], so a mutation yields the
//! same collection whether the overseer or the issuing node writes it.

use shardkeeper_types::{ClusterStateMutation, DocCollection};
use tracing::debug;

/// Returns `collection` with `mutation` applied.
///
/// Mutations that name a missing slice or replica leave the collection
/// unchanged, so replaying a message is harmless.
#[must_use]
pub fn apply(collection: &DocCollection, mutation: &ClusterStateMutation) -> DocCollection {
    let mut next = collection.clone();
    match mutation {
        ClusterStateMutation::UpdateShardState { states, .. } => {
            for (slice_id, state) in states {
                match next.slices.get_mut(slice_id) {
                    Some(slice) => {
                        debug!(
                            collection = %next.name,
                            slice = %slice_id,
                            from = %slice.state,
                            to = %state,
                            "Updating slice state"
                        );
                        slice.state = *state;
                    },
                    None => {
                        debug!(collection = %next.name, slice = %slice_id, "Ignoring unknown slice");
                    },
                }
            }
        },
        ClusterStateMutation::DeleteShard { shard, .. } => {
            if next.slices.remove(shard).is_some() {
                debug!(collection = %next.name, slice = %shard, "Removed slice");
            }
        },
        ClusterStateMutation::DeleteReplica { shard, replica, .. } => {
            if let Some(slice) = next.slices.get_mut(shard)
                && slice.replicas.remove(replica).is_some()
            {
                debug!(collection = %next.name, slice = %shard, replica = %replica, "Removed replica");
            }
        },
    }
    next
}
