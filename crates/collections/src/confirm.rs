//! Waits for a deleted slice to disappear from cluster state.

use std::time::Duration;

use shardkeeper_state::{ClusterStateReader, WaitForStateError};

/// Waits until `shard` is absent from `collection`. A collection that no
/// longer exists counts as absent.
///
/// # Errors
///
/// Returns [`WaitForStateError::Timeout`] if the slice is still present after
/// `timeout`.
pub async fn wait_for_slice_removal(
    reader: &ClusterStateReader,
    collection: &str,
    shard: &str,
    timeout: Duration,
) -> Result<(), WaitForStateError> {
    reader
        .wait_for_state(collection, timeout, |doc| doc.is_none_or(|doc| doc.slice(shard).is_none()))
        .await
}
