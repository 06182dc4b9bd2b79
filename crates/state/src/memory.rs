//! In-memory coordination store.
//!
//! All nodes live in a single ordered map guarded by a `parking_lot` lock, so
//! each operation is atomic with respect to every other. Change notification
//! goes through a `tokio::sync::watch` counter.
//!
//! Faults can be injected per path prefix: every mutating operation on a path
//! under an injected prefix fails with `ConnectionLoss` until cleared.

use std::collections::BTreeMap;

use async_trait::async_trait;
use parking_lot::RwLock;
use shardkeeper_types::paths;
use tokio::sync::watch;

use crate::store::{CoordinationError, CoordinationStore, CreateMode, Stat};

#[derive(Debug, Clone, Default)]
struct Node {
    data: Vec<u8>,
    version: i32,
    /// Next sequence number handed to a sequential child.
    next_sequence: u64,
}

/// In-process [`CoordinationStore`].
pub struct MemoryCoordinationStore {
    nodes: RwLock<BTreeMap<String, Node>>,
    faults: RwLock<Vec<String>>,
    changes: watch::Sender<u64>,
}

impl MemoryCoordinationStore {
    /// Creates a store holding only the root node.
    #[must_use]
    pub fn new() -> Self {
        let mut nodes = BTreeMap::new();
        nodes.insert("/".to_string(), Node::default());
        let (changes, _) = watch::channel(0);
        Self { nodes: RwLock::new(nodes), faults: RwLock::new(Vec::new()), changes }
    }

    /// Makes every mutating operation under `prefix` fail with `ConnectionLoss`.
    pub fn inject_fault(&self, prefix: impl Into<String>) {
        self.faults.write().push(prefix.into());
    }

    /// Removes all injected faults.
    pub fn clear_faults(&self) {
        self.faults.write().clear();
    }

    /// Number of nodes, including the root.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.read().len()
    }

    fn check_fault(&self, path: &str) -> Result<(), CoordinationError> {
        if self.faults.read().iter().any(|prefix| path.starts_with(prefix.as_str())) {
            return Err(CoordinationError::ConnectionLoss { path: path.to_string() });
        }
        Ok(())
    }

    fn notify(&self) {
        self.changes.send_modify(|counter| *counter += 1);
    }

    fn child_names(nodes: &BTreeMap<String, Node>, path: &str) -> Vec<String> {
        let prefix = if path == "/" { "/".to_string() } else { format!("{path}/") };
        nodes
            .range(prefix.clone()..)
            .take_while(|(key, _)| key.starts_with(&prefix))
            .filter_map(|(key, _)| {
                let rest = &key[prefix.len()..];
                (!rest.is_empty() && !rest.contains('/')).then(|| rest.to_string())
            })
            .collect()
    }

    fn stat(nodes: &BTreeMap<String, Node>, path: &str, node: &Node) -> Stat {
        Stat { version: node.version, num_children: Self::child_names(nodes, path).len() }
    }
}

impl Default for MemoryCoordinationStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CoordinationStore for MemoryCoordinationStore {
    async fn create(
        &self,
        path: &str,
        data: Vec<u8>,
        mode: CreateMode,
    ) -> Result<String, CoordinationError> {
        self.check_fault(path)?;
        let parent = paths::parent(path)
            .ok_or_else(|| CoordinationError::NodeExists { path: path.to_string() })?;

        let created = {
            let mut nodes = self.nodes.write();
            let parent_node = nodes
                .get_mut(parent)
                .ok_or_else(|| CoordinationError::NoNode { path: parent.to_string() })?;

            let actual = match mode {
                CreateMode::Persistent => path.to_string(),
                CreateMode::PersistentSequential => {
                    let seq = parent_node.next_sequence;
                    parent_node.next_sequence += 1;
                    format!("{path}{seq:010}")
                },
            };

            if nodes.contains_key(&actual) {
                return Err(CoordinationError::NodeExists { path: actual });
            }
            nodes.insert(actual.clone(), Node { data, ..Node::default() });
            actual
        };

        self.notify();
        Ok(created)
    }

    async fn create_all(&self, path: &str, data: Vec<u8>) -> Result<(), CoordinationError> {
        self.check_fault(path)?;
        let mut created_any = false;
        {
            let mut nodes = self.nodes.write();
            let mut current = String::new();
            let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
            for (idx, segment) in segments.iter().enumerate() {
                current.push('/');
                current.push_str(segment);
                if !nodes.contains_key(&current) {
                    let payload = if idx + 1 == segments.len() { data.clone() } else { Vec::new() };
                    nodes.insert(current.clone(), Node { data: payload, ..Node::default() });
                    created_any = true;
                }
            }
        }
        if created_any {
            self.notify();
        }
        Ok(())
    }

    async fn get_data(&self, path: &str) -> Result<(Vec<u8>, Stat), CoordinationError> {
        let nodes = self.nodes.read();
        let node =
            nodes.get(path).ok_or_else(|| CoordinationError::NoNode { path: path.to_string() })?;
        Ok((node.data.clone(), Self::stat(&nodes, path, node)))
    }

    async fn set_data(
        &self,
        path: &str,
        data: Vec<u8>,
        expected_version: Option<i32>,
    ) -> Result<Stat, CoordinationError> {
        self.check_fault(path)?;
        let stat = {
            let mut nodes = self.nodes.write();
            let node = nodes
                .get_mut(path)
                .ok_or_else(|| CoordinationError::NoNode { path: path.to_string() })?;
            if let Some(expected) = expected_version
                && expected != node.version
            {
                return Err(CoordinationError::BadVersion {
                    path: path.to_string(),
                    expected,
                    actual: node.version,
                });
            }
            node.data = data;
            node.version += 1;
            let node = node.clone();
            Self::stat(&nodes, path, &node)
        };
        self.notify();
        Ok(stat)
    }

    async fn exists(&self, path: &str) -> Result<Option<Stat>, CoordinationError> {
        let nodes = self.nodes.read();
        Ok(nodes.get(path).map(|node| Self::stat(&nodes, path, node)))
    }

    async fn get_children(&self, path: &str) -> Result<Vec<String>, CoordinationError> {
        let nodes = self.nodes.read();
        if !nodes.contains_key(path) {
            return Err(CoordinationError::NoNode { path: path.to_string() });
        }
        Ok(Self::child_names(&nodes, path))
    }

    async fn delete(
        &self,
        path: &str,
        expected_version: Option<i32>,
    ) -> Result<(), CoordinationError> {
        self.check_fault(path)?;
        {
            let mut nodes = self.nodes.write();
            let node =
                nodes.get(path).ok_or_else(|| CoordinationError::NoNode { path: path.to_string() })?;
            if let Some(expected) = expected_version
                && expected != node.version
            {
                return Err(CoordinationError::BadVersion {
                    path: path.to_string(),
                    expected,
                    actual: node.version,
                });
            }
            if path == "/" || !Self::child_names(&nodes, path).is_empty() {
                return Err(CoordinationError::NotEmpty { path: path.to_string() });
            }
            nodes.remove(path);
        }
        self.notify();
        Ok(())
    }

    fn subscribe(&self) -> watch::Receiver<u64> {
        self.changes.subscribe()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_requires_parent() {
        let store = MemoryCoordinationStore::new();
        let err = store.create("/a/b", Vec::new(), CreateMode::Persistent).await.unwrap_err();
        assert_eq!(err, CoordinationError::NoNode { path: "/a".to_string() });

        store.create("/a", Vec::new(), CreateMode::Persistent).await.unwrap();
        store.create("/a/b", b"x".to_vec(), CreateMode::Persistent).await.unwrap();
        let err = store.create("/a/b", Vec::new(), CreateMode::Persistent).await.unwrap_err();
        assert!(matches!(err, CoordinationError::NodeExists { .. }));
    }

    #[tokio::test]
    async fn test_sequential_children_are_ordered() {
        let store = MemoryCoordinationStore::new();
        store.create_all("/queue", Vec::new()).await.unwrap();

        let first = store.create("/queue/qn-", Vec::new(), CreateMode::PersistentSequential).await;
        let second = store.create("/queue/qn-", Vec::new(), CreateMode::PersistentSequential).await;
        assert_eq!(first.unwrap(), "/queue/qn-0000000000");
        assert_eq!(second.unwrap(), "/queue/qn-0000000001");

        let children = store.get_children("/queue").await.unwrap();
        assert_eq!(children, vec!["qn-0000000000", "qn-0000000001"]);
    }

    #[tokio::test]
    async fn test_set_data_compare_and_swap() {
        let store = MemoryCoordinationStore::new();
        store.create_all("/doc", b"v0".to_vec()).await.unwrap();

        let stat = store.set_data("/doc", b"v1".to_vec(), Some(0)).await.unwrap();
        assert_eq!(stat.version, 1);

        let err = store.set_data("/doc", b"v2".to_vec(), Some(0)).await.unwrap_err();
        assert_eq!(
            err,
            CoordinationError::BadVersion { path: "/doc".to_string(), expected: 0, actual: 1 }
        );

        let (data, stat) = store.get_data("/doc").await.unwrap();
        assert_eq!(data, b"v1");
        assert_eq!(stat.version, 1);
    }

    #[tokio::test]
    async fn test_delete_refuses_non_leaf() {
        let store = MemoryCoordinationStore::new();
        store.create_all("/a/b/c", Vec::new()).await.unwrap();

        let err = store.delete("/a/b", None).await.unwrap_err();
        assert!(matches!(err, CoordinationError::NotEmpty { .. }));
        store.delete("/a/b/c", None).await.unwrap();
        store.delete("/a/b", None).await.unwrap();
        assert!(store.exists("/a/b").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_clean_removes_subtree_only() {
        let store = MemoryCoordinationStore::new();
        store.create_all("/c/leaders/s1/leader", Vec::new()).await.unwrap();
        store.create_all("/c/leaders/s1/x/y", Vec::new()).await.unwrap();
        store.create_all("/c/leaders/s10", Vec::new()).await.unwrap();

        store.clean("/c/leaders/s1").await.unwrap();

        assert!(store.exists("/c/leaders/s1").await.unwrap().is_none());
        assert!(store.exists("/c/leaders/s10").await.unwrap().is_some());
        assert_eq!(store.get_children("/c/leaders").await.unwrap(), vec!["s10"]);
    }

    #[tokio::test]
    async fn test_clean_missing_path_is_ok() {
        let store = MemoryCoordinationStore::new();
        store.clean("/nothing/here").await.unwrap();
    }

    #[tokio::test]
    async fn test_injected_fault_blocks_writes_under_prefix() {
        let store = MemoryCoordinationStore::new();
        store.create_all("/c/terms/s1", Vec::new()).await.unwrap();
        store.inject_fault("/c/terms");

        let err = store.clean("/c/terms/s1").await.unwrap_err();
        assert!(matches!(err, CoordinationError::ConnectionLoss { .. }));
        // Reads are unaffected.
        assert!(store.exists("/c/terms/s1").await.unwrap().is_some());

        store.clear_faults();
        store.clean("/c/terms/s1").await.unwrap();
    }

    #[tokio::test]
    async fn test_mutations_notify_subscribers() {
        let store = MemoryCoordinationStore::new();
        let mut rx = store.subscribe();
        let before = *rx.borrow_and_update();

        store.create_all("/x", Vec::new()).await.unwrap();
        rx.changed().await.unwrap();
        assert!(*rx.borrow_and_update() > before);
    }
}
