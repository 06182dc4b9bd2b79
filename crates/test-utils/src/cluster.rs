//! In-memory cluster fixture.

// Test utilities are expected to panic on failure - that's their purpose
#![allow(clippy::expect_used)]

use std::{collections::BTreeMap, sync::Arc};

use shardkeeper_state::{
    ClusterSnapshot, ClusterStateReader, CoordinationStore, CreateMode, MemoryCoordinationStore,
};
use shardkeeper_types::{ClusterState, DocCollection, Replica, paths};

/// A [`MemoryCoordinationStore`] preloaded with collections, live nodes and
/// aliases.
///
/// # Example
///
/// ```no_run
/// # async fn demo() {
/// use shardkeeper_test_utils::{TestCluster, replica};
/// use shardkeeper_types::{DocCollection, Slice, SliceState};
///
/// let slice = Slice::builder()
///     .name("s1")
///     .state(SliceState::Inactive)
///     .replicas(vec![replica("c1", "s1", "r1", "n1")])
///     .build();
/// let cluster = TestCluster::builder()
///     .collections(vec![DocCollection::new("c1", [slice])])
///     .live_nodes(vec!["n1".to_string()])
///     .build()
///     .await;
/// assert!(cluster.cluster_state().await.is_live("n1"));
/// # }
/// ```
pub struct TestCluster {
    store: Arc<MemoryCoordinationStore>,
}

#[bon::bon]
impl TestCluster {
    /// Loads the given cluster into a fresh in-memory store.
    ///
    /// # Panics
    ///
    /// Panics if the snapshot cannot be loaded.
    #[builder]
    pub async fn new(
        #[builder(default)] collections: Vec<DocCollection>,
        #[builder(default)] live_nodes: Vec<String>,
        #[builder(default)] aliases: BTreeMap<String, String>,
    ) -> Self {
        let store = Arc::new(MemoryCoordinationStore::new());
        ClusterSnapshot { collections, live_nodes, aliases }
            .load_into(store.as_ref())
            .await
            .expect("failed to load test cluster");
        Self { store }
    }
}

impl TestCluster {
    /// The concrete store, for fault injection.
    #[must_use]
    pub fn memory_store(&self) -> &Arc<MemoryCoordinationStore> {
        &self.store
    }

    /// The store as a trait object.
    #[must_use]
    pub fn store(&self) -> Arc<dyn CoordinationStore> {
        Arc::clone(&self.store) as Arc<dyn CoordinationStore>
    }

    /// A reader over the store.
    #[must_use]
    pub fn reader(&self) -> ClusterStateReader {
        ClusterStateReader::new(self.store())
    }

    /// Reads the current cluster state.
    ///
    /// # Panics
    ///
    /// Panics if the state cannot be read.
    pub async fn cluster_state(&self) -> ClusterState {
        self.reader().cluster_state().await.expect("failed to read cluster state")
    }

    /// Reads one collection.
    ///
    /// # Panics
    ///
    /// Panics if the state document cannot be read.
    pub async fn collection(&self, name: &str) -> Option<DocCollection> {
        self.reader().collection(name).await.expect("failed to read collection")
    }

    /// Creates leader-election, leader and term nodes for a slice, each with
    /// one child.
    ///
    /// # Panics
    ///
    /// Panics if a node cannot be created.
    pub async fn add_shard_metadata(&self, collection: &str, slice: &str) {
        for path in paths::shard_metadata_paths(collection, slice) {
            self.store
                .create_all(&format!("{path}/n1"), Vec::new())
                .await
                .expect("failed to create shard metadata");
        }
    }

    /// Returns which of the slice's metadata subtrees still exist.
    ///
    /// # Panics
    ///
    /// Panics if the store fails.
    pub async fn remaining_shard_metadata(&self, collection: &str, slice: &str) -> Vec<String> {
        let mut remaining = Vec::new();
        for path in paths::shard_metadata_paths(collection, slice) {
            if self.store.exists(&path).await.expect("exists failed").is_some() {
                remaining.push(path);
            }
        }
        remaining
    }

    /// Number of entries waiting in the overseer queue.
    ///
    /// # Panics
    ///
    /// Panics if the store fails with anything other than a missing queue.
    pub async fn queue_len(&self) -> usize {
        match self.store.get_children(paths::OVERSEER_QUEUE).await {
            Ok(children) => children.len(),
            Err(e) if e.is_no_node() => 0,
            Err(e) => panic!("failed to list overseer queue: {e}"),
        }
    }

    /// Enqueues a raw overseer message.
    ///
    /// # Panics
    ///
    /// Panics if the entry cannot be created.
    pub async fn enqueue_raw(&self, data: &[u8]) {
        self.store
            .create_all(paths::OVERSEER_QUEUE, Vec::new())
            .await
            .expect("failed to create overseer queue");
        let prefix = format!("{}/{}", paths::OVERSEER_QUEUE, paths::QUEUE_ENTRY_PREFIX);
        self.store
            .create(&prefix, data.to_vec(), CreateMode::PersistentSequential)
            .await
            .expect("failed to enqueue");
    }

    /// Removes a node from the live set.
    ///
    /// # Panics
    ///
    /// Panics if the node is not registered.
    pub async fn kill_node(&self, node: &str) {
        self.store
            .delete(&paths::live_node_path(node), None)
            .await
            .expect("failed to remove live node");
    }
}

/// Builds a replica whose core name is `<collection>_<slice>_<name>`.
#[must_use]
pub fn replica(collection: &str, slice: &str, name: &str, node: &str) -> Replica {
    Replica::builder()
        .name(name)
        .core_name(format!("{collection}_{slice}_{name}"))
        .node_name(node)
        .build()
}
