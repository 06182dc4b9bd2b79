//! Shared test utilities for shardkeeper crates.
//!
//! This crate provides common test helpers to reduce boilerplate across test modules:
//!
//! - [`TestDir`] - Managed temporary directory with JSON helpers
//! - [`TestCluster`] - In-memory coordination store preloaded with a cluster
//! - [`assert_eventually`] / [`eventually_async`] - Poll a condition until it's true or timeout
//! - [`strategies`] - Proptest generators for slices and hash ranges

#![deny(unsafe_code)]
// Test utilities are allowed to use unwrap for simplicity
#![cfg_attr(test, allow(clippy::disallowed_methods))]

mod test_dir;
pub use test_dir::TestDir;

mod assertions;
pub use assertions::{assert_eventually, eventually_async};

mod cluster;
pub use cluster::{TestCluster, replica};

pub mod strategies;

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use std::{
        collections::BTreeMap,
        sync::atomic::{AtomicUsize, Ordering},
        time::Duration,
    };

    use shardkeeper_types::{DocCollection, Slice, SliceState};

    use super::*;

    // ============================================
    // TestDir tests
    // ============================================

    #[test]
    fn test_dir_creates_temp_directory() {
        let dir = TestDir::new();
        assert!(dir.path().exists(), "temp directory should exist");
        assert!(dir.path().is_dir(), "should be a directory");
    }

    #[test]
    fn test_dir_write_json() {
        let dir = TestDir::new();
        let path = dir.write_json("snapshot.json", &serde_json::json!({ "live_nodes": ["n1"] }));
        let raw = std::fs::read_to_string(&path).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(parsed["live_nodes"][0], "n1");
    }

    #[test]
    fn test_dir_cleanup_on_drop() {
        let path = {
            let dir = TestDir::new();
            let p = dir.write("file.txt", "data");
            assert!(p.exists());
            dir.path().to_path_buf()
        };
        assert!(!path.exists(), "temp directory should be cleaned up on drop");
    }

    // ============================================
    // eventually tests
    // ============================================

    #[tokio::test]
    async fn test_assert_eventually_delayed_success() {
        let counter = AtomicUsize::new(0);
        let result = assert_eventually(Duration::from_millis(500), || {
            let val = counter.fetch_add(1, Ordering::SeqCst);
            val >= 3
        })
        .await;
        assert!(result, "condition should eventually become true");
        assert!(counter.load(Ordering::SeqCst) >= 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_assert_eventually_timeout() {
        let result = assert_eventually(Duration::from_millis(50), || false).await;
        assert!(!result, "never-true condition should timeout");
    }

    #[tokio::test(start_paused = true)]
    async fn test_eventually_async_observes_store() {
        use shardkeeper_state::CoordinationStore;

        let cluster = TestCluster::builder().build().await;
        let store = cluster.memory_store().clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            store
                .create_all("/overseer/collection-queue-work/qn-0000000000", Vec::new())
                .await
                .unwrap();
        });

        let cluster_ref = &cluster;
        let seen = eventually_async(Duration::from_secs(1), || async move {
            cluster_ref.queue_len().await == 1
        })
        .await;
        assert!(seen, "queue entry should become visible");
    }

    // ============================================
    // TestCluster tests
    // ============================================

    #[tokio::test]
    async fn test_cluster_loads_collections_and_aliases() {
        let slice = Slice::builder()
            .name("s1")
            .state(SliceState::Inactive)
            .replicas(vec![replica("c1", "s1", "r1", "n1")])
            .build();
        let cluster = TestCluster::builder()
            .collections(vec![DocCollection::new("c1", [slice])])
            .live_nodes(vec!["n1".to_string()])
            .aliases(BTreeMap::from([("books".to_string(), "c1".to_string())]))
            .build()
            .await;

        let state = cluster.cluster_state().await;
        let loaded = state.collection("c1").unwrap().slice("s1").unwrap();
        assert_eq!(loaded.replica("r1").unwrap().core_name, "c1_s1_r1");
        assert!(state.is_live("n1"));
        assert_eq!(cluster.reader().resolve_simple_alias("books").await.unwrap(), "c1");
    }

    #[tokio::test]
    async fn test_cluster_shard_metadata_helpers() {
        let cluster = TestCluster::builder().build().await;
        assert!(cluster.remaining_shard_metadata("c1", "s1").await.is_empty());

        cluster.add_shard_metadata("c1", "s1").await;
        assert_eq!(cluster.remaining_shard_metadata("c1", "s1").await.len(), 3);
    }

    #[tokio::test]
    async fn test_cluster_queue_helpers() {
        let cluster = TestCluster::builder().live_nodes(vec!["n1".to_string()]).build().await;
        assert_eq!(cluster.queue_len().await, 0);

        cluster.enqueue_raw(b"{}").await;
        cluster.enqueue_raw(b"{}").await;
        assert_eq!(cluster.queue_len().await, 2);

        cluster.kill_node("n1").await;
        assert!(!cluster.cluster_state().await.is_live("n1"));
    }
}
