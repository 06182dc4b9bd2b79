//! Results aggregation for commands that fan out.
//!
//! The caller's envelope is shared behind a mutex; every replica completion
//! merges its own single-writer envelope into it.

use std::sync::Arc;

use parking_lot::Mutex;
use shardkeeper_types::{
    CommandResults, ResultValue,
    results::{FAILURE, SUCCESS},
};

/// Results envelope shared between a command and its replica completions.
pub type SharedResults = Arc<Mutex<CommandResults>>;

/// Creates an empty shared envelope.
#[must_use]
pub fn shared_results() -> SharedResults {
    Arc::new(Mutex::new(CommandResults::new()))
}

/// Identifies the replica an outcome belongs to, for failure messages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplicaTarget {
    /// Canonical collection name.
    pub collection: String,
    /// Slice id.
    pub shard: String,
    /// Hosting node.
    pub node: String,
}

/// Merges one replica's envelope into the shared envelope.
///
/// A `failure` entry becomes a single summary line naming the replica's
/// location; a `success` sub-map is appended as is. Both may appear.
pub(crate) fn merge_replica_results(
    shared: &SharedResults,
    target: &ReplicaTarget,
    replica_results: &CommandResults,
) {
    if replica_results.get(FAILURE).is_some() {
        let message = format!(
            "Failed to delete replica for collection={} shard={} on node={}",
            target.collection, target.shard, target.node
        );
        shared.lock().add(FAILURE, message);
    }
    if let Some(success) = replica_results.get(SUCCESS).and_then(ResultValue::as_map) {
        shared.lock().add(SUCCESS, success.clone());
    }
}
