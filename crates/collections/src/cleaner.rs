//! Best-effort removal of a deleted slice's ancillary metadata.

use shardkeeper_state::{CoordinationError, CoordinationStore};
use shardkeeper_types::paths;
use tracing::warn;

/// Outcome of cleaning one metadata subtree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanupOutcome {
    /// Subtree root.
    pub path: String,
    /// Result of the recursive delete.
    pub result: Result<(), CoordinationError>,
}

/// Recursively deletes the leader-election, leader and term subtrees of a
/// slice. Every path is attempted; failures are logged and returned, never
/// raised.
pub async fn clean_shard_metadata(
    store: &dyn CoordinationStore,
    collection: &str,
    shard: &str,
) -> Vec<CleanupOutcome> {
    let mut outcomes = Vec::with_capacity(3);
    for path in paths::shard_metadata_paths(collection, shard) {
        let result = store.clean(&path).await;
        if let Err(e) = &result {
            warn!(
                collection,
                shard,
                path = %path,
                error = %e,
                "Non-fatal error occurred when deleting shard metadata"
            );
        }
        outcomes.push(CleanupOutcome { path, result });
    }
    outcomes
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use shardkeeper_state::MemoryCoordinationStore;

    use super::*;

    #[tokio::test]
    async fn test_cleans_all_three_subtrees() {
        let store = MemoryCoordinationStore::new();
        store.create_all("/collections/c1/leader_elect/s1/election/n_0", Vec::new()).await.unwrap();
        store.create_all("/collections/c1/leaders/s1/leader", Vec::new()).await.unwrap();
        store.create_all("/collections/c1/terms/s1", b"{}".to_vec()).await.unwrap();
        store.create_all("/collections/c1/terms/s2", b"{}".to_vec()).await.unwrap();

        let outcomes = clean_shard_metadata(&store, "c1", "s1").await;

        assert!(outcomes.iter().all(|o| o.result.is_ok()));
        for path in paths::shard_metadata_paths("c1", "s1") {
            assert!(store.exists(&path).await.unwrap().is_none());
        }
        assert!(store.exists("/collections/c1/terms/s2").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_failure_on_one_path_does_not_stop_others() {
        let store = MemoryCoordinationStore::new();
        for path in paths::shard_metadata_paths("c1", "s1") {
            store.create_all(&format!("{path}/child"), Vec::new()).await.unwrap();
        }
        store.inject_fault("/collections/c1/leaders");

        let outcomes = clean_shard_metadata(&store, "c1", "s1").await;

        let failed: Vec<_> =
            outcomes.iter().filter(|o| o.result.is_err()).map(|o| o.path.as_str()).collect();
        assert_eq!(failed, vec!["/collections/c1/leaders/s1"]);
        assert!(store.exists("/collections/c1/leader_elect/s1").await.unwrap().is_none());
        assert!(store.exists("/collections/c1/terms/s1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_missing_paths_are_fine() {
        let store = MemoryCoordinationStore::new();
        let outcomes = clean_shard_metadata(&store, "c1", "s1").await;
        assert_eq!(outcomes.len(), 3);
        assert!(outcomes.iter().all(|o| o.result.is_ok()));
    }
}
