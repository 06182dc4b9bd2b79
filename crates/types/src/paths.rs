//! Coordination-store path layout.
//!
//! ```text
//! /aliases.json
//! /live_nodes/<node>
//! /overseer/collection-queue-work/qn-<seq>
//! /collections/<collection>/state.json
//! /collections/<collection>/leader_elect/<slice>/...
//! /collections/<collection>/leaders/<slice>/...
//! /collections/<collection>/terms/<slice>
//! ```

/// Root of all per-collection data.
pub const COLLECTIONS_ZKNODE: &str = "/collections";
/// Registry of live nodes; one child per node.
pub const LIVE_NODES_ZKNODE: &str = "/live_nodes";
/// Alias definitions document.
pub const ALIASES: &str = "/aliases.json";
/// Centralized cluster-state update queue consumed by the overseer.
pub const OVERSEER_QUEUE: &str = "/overseer/collection-queue-work";
/// Prefix of sequential queue entries.
pub const QUEUE_ENTRY_PREFIX: &str = "qn-";
/// Name of the per-collection state document.
pub const STATE_JSON: &str = "state.json";

/// Returns `/collections/<collection>`.
#[must_use]
pub fn collection_path(collection: &str) -> String {
    format!("{COLLECTIONS_ZKNODE}/{collection}")
}

/// Returns `/collections/<collection>/state.json`.
#[must_use]
pub fn collection_state_path(collection: &str) -> String {
    format!("{COLLECTIONS_ZKNODE}/{collection}/{STATE_JSON}")
}

/// Returns `/live_nodes/<node>`.
#[must_use]
pub fn live_node_path(node: &str) -> String {
    format!("{LIVE_NODES_ZKNODE}/{node}")
}

/// Returns the ancillary subtrees tied to a slice: leader election, leader
/// pointer and term counters, in that order.
#[must_use]
pub fn shard_metadata_paths(collection: &str, slice: &str) -> [String; 3] {
    [
        format!("{COLLECTIONS_ZKNODE}/{collection}/leader_elect/{slice}"),
        format!("{COLLECTIONS_ZKNODE}/{collection}/leaders/{slice}"),
        format!("{COLLECTIONS_ZKNODE}/{collection}/terms/{slice}"),
    ]
}

/// Returns the parent of `path`, or `None` for the root.
#[must_use]
pub fn parent(path: &str) -> Option<&str> {
    match path.rfind('/') {
        Some(0) if path.len() > 1 => Some("/"),
        Some(0) | None => None,
        Some(idx) => Some(&path[..idx]),
    }
}
