//! Cluster snapshots.
//!
//! A [`ClusterSnapshot`] is a self-contained JSON description of a cluster
//! (collections, live nodes and aliases) that can be written into an empty
//! coordination store to bootstrap it.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use shardkeeper_types::{DocCollection, paths};
use snafu::{ResultExt, Snafu};
use tracing::info;

use crate::{
    reader::Aliases,
    store::{CoordinationError, CoordinationStore},
};

/// Errors loading a snapshot into a store.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum SnapshotError {
    /// The coordination store failed.
    #[snafu(display("failed to write {path}: {source}"))]
    Write {
        /// Target path.
        path: String,
        /// Underlying store error.
        source: CoordinationError,
    },

    /// A document could not be encoded.
    #[snafu(display("failed to encode {path}: {source}"))]
    Encode {
        /// Target path.
        path: String,
        /// Encoder error.
        source: serde_json::Error,
    },
}

/// Serializable description of a whole cluster.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterSnapshot {
    /// Collections with their slices and replicas.
    #[serde(default)]
    pub collections: Vec<DocCollection>,
    /// Nodes to register as live.
    #[serde(default)]
    pub live_nodes: Vec<String>,
    /// Collection aliases, alias name to comma-separated targets.
    #[serde(default)]
    pub aliases: BTreeMap<String, String>,
}

impl ClusterSnapshot {
    /// Writes the snapshot into `store`, creating parents as needed.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError`] if a document cannot be encoded or written.
    pub async fn load_into(&self, store: &dyn CoordinationStore) -> Result<(), SnapshotError> {
        for collection in &self.collections {
            let path = paths::collection_state_path(&collection.name);
            let data = serde_json::to_vec(collection).context(EncodeSnafu { path: &path })?;
            store.create_all(&path, data).await.context(WriteSnafu { path: &path })?;
        }

        store
            .create_all(paths::LIVE_NODES_ZKNODE, Vec::new())
            .await
            .context(WriteSnafu { path: paths::LIVE_NODES_ZKNODE })?;
        for node in &self.live_nodes {
            let path = paths::live_node_path(node);
            store.create_all(&path, Vec::new()).await.context(WriteSnafu { path: &path })?;
        }

        if !self.aliases.is_empty() {
            let aliases = Aliases { collection: self.aliases.clone() };
            let data =
                serde_json::to_vec(&aliases).context(EncodeSnafu { path: paths::ALIASES })?;
            store
                .create_all(paths::ALIASES, data)
                .await
                .context(WriteSnafu { path: paths::ALIASES })?;
        }

        info!(
            collections = self.collections.len(),
            live_nodes = self.live_nodes.len(),
            aliases = self.aliases.len(),
            "Loaded cluster snapshot"
        );
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use shardkeeper_types::Slice;

    use super::*;
    use crate::{ClusterStateReader, MemoryCoordinationStore};

    #[tokio::test]
    async fn test_snapshot_round_trips_through_reader() {
        let snapshot: ClusterSnapshot = serde_json::from_value(serde_json::json!({
            "collections": [
                { "name": "c1", "slices": { "s1": { "name": "s1", "state": "inactive" } } }
            ],
            "live_nodes": ["n1", "n2"],
            "aliases": { "books": "c1" }
        }))
        .unwrap();

        let store = std::sync::Arc::new(MemoryCoordinationStore::new());
        snapshot.load_into(store.as_ref()).await.unwrap();

        let reader = ClusterStateReader::new(store);
        let state = reader.cluster_state().await.unwrap();
        assert!(state.collection("c1").unwrap().slice("s1").is_some());
        assert!(state.is_live("n2"));
        assert_eq!(reader.resolve_simple_alias("books").await.unwrap(), "c1");
    }

    #[tokio::test]
    async fn test_empty_snapshot_registers_live_nodes_root() {
        let store = MemoryCoordinationStore::new();
        ClusterSnapshot::default().load_into(&store).await.unwrap();
        assert!(store.exists(paths::LIVE_NODES_ZKNODE).await.unwrap().is_some());
        assert!(store.exists(paths::ALIASES).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_store_failure_names_path() {
        let store = MemoryCoordinationStore::new();
        store.inject_fault("/collections");
        let snapshot = ClusterSnapshot {
            collections: vec![DocCollection::new("c1", [Slice::builder().name("s1").build()])],
            ..ClusterSnapshot::default()
        };

        let err = snapshot.load_into(&store).await.unwrap_err();
        assert!(err.to_string().starts_with("failed to write /collections/c1/state.json"));
    }
}
