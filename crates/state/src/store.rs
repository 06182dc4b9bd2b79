//! Coordination store contract.
//!
//! The coordination store is a hierarchical key-value store in the style of
//! ZooKeeper: every node has a path, a byte payload and a version that is
//! bumped on each write. Writers may pass an expected version to get
//! compare-and-swap semantics. Parents must exist before children are created.

use async_trait::async_trait;
use snafu::Snafu;
use tokio::sync::watch;

/// Errors returned by coordination-store operations.
#[derive(Debug, Clone, PartialEq, Eq, Snafu)]
#[snafu(visibility(pub))]
pub enum CoordinationError {
    /// The node (or a required parent) does not exist.
    #[snafu(display("no node for {path}"))]
    NoNode {
        /// Missing path.
        path: String,
    },

    /// The node already exists.
    #[snafu(display("node exists for {path}"))]
    NodeExists {
        /// Conflicting path.
        path: String,
    },

    /// The expected version did not match the stored version.
    #[snafu(display("bad version for {path}: expected {expected}, found {actual}"))]
    BadVersion {
        /// Target path.
        path: String,
        /// Version supplied by the writer.
        expected: i32,
        /// Version currently stored.
        actual: i32,
    },

    /// The node has children and cannot be deleted.
    #[snafu(display("directory not empty for {path}"))]
    NotEmpty {
        /// Target path.
        path: String,
    },

    /// The store could not be reached.
    #[snafu(display("connection loss for {path}"))]
    ConnectionLoss {
        /// Path of the failed request.
        path: String,
    },
}

impl CoordinationError {
    /// Returns true if the error reports a missing node.
    #[must_use]
    pub fn is_no_node(&self) -> bool {
        matches!(self, Self::NoNode { .. })
    }
}

/// Metadata of a stored node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stat {
    /// Data version, starting at 0 and bumped on each `set_data`.
    pub version: i32,
    /// Number of direct children.
    pub num_children: usize,
}

/// Node creation mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateMode {
    /// Plain node at exactly the requested path.
    Persistent,
    /// Node whose name is the requested path followed by a zero-padded,
    /// monotonically increasing per-parent sequence number.
    PersistentSequential,
}

/// Hierarchical key-value store with versions and change notification.
#[async_trait]
pub trait CoordinationStore: Send + Sync + 'static {
    /// Creates a node and returns its actual path (which differs from `path`
    /// for sequential nodes).
    ///
    /// # Errors
    ///
    /// `NoNode` if the parent is missing, `NodeExists` if the path is taken.
    async fn create(
        &self,
        path: &str,
        data: Vec<u8>,
        mode: CreateMode,
    ) -> Result<String, CoordinationError>;

    /// Creates `path` and any missing ancestors. Existing nodes are left as is.
    ///
    /// # Errors
    ///
    /// Returns the underlying store error.
    async fn create_all(&self, path: &str, data: Vec<u8>) -> Result<(), CoordinationError>;

    /// Reads a node's payload and metadata.
    ///
    /// # Errors
    ///
    /// `NoNode` if the node is missing.
    async fn get_data(&self, path: &str) -> Result<(Vec<u8>, Stat), CoordinationError>;

    /// Replaces a node's payload. With `expected_version`, the write only
    /// succeeds if the stored version still matches.
    ///
    /// # Errors
    ///
    /// `NoNode` if the node is missing, `BadVersion` on a version mismatch.
    async fn set_data(
        &self,
        path: &str,
        data: Vec<u8>,
        expected_version: Option<i32>,
    ) -> Result<Stat, CoordinationError>;

    /// Returns the node's metadata, or `None` if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns the underlying store error.
    async fn exists(&self, path: &str) -> Result<Option<Stat>, CoordinationError>;

    /// Lists the names (not paths) of a node's direct children, sorted.
    ///
    /// # Errors
    ///
    /// `NoNode` if the node is missing.
    async fn get_children(&self, path: &str) -> Result<Vec<String>, CoordinationError>;

    /// Deletes a leaf node.
    ///
    /// # Errors
    ///
    /// `NoNode`, `NotEmpty`, or `BadVersion`.
    async fn delete(&self, path: &str, expected_version: Option<i32>)
    -> Result<(), CoordinationError>;

    /// Subscribes to change notifications. The value is a counter bumped on
    /// every successful mutation anywhere in the store.
    fn subscribe(&self) -> watch::Receiver<u64>;

    /// Deletes `path` and everything below it. A missing path is not an
    /// error, and neither is a node that vanishes concurrently.
    ///
    /// # Errors
    ///
    /// Returns the first store error other than `NoNode`.
    async fn clean(&self, path: &str) -> Result<(), CoordinationError> {
        // Breadth-first walk, then delete deepest paths first.
        let mut ordered = vec![path.to_string()];
        let mut idx = 0;
        while idx < ordered.len() {
            let current = ordered[idx].clone();
            idx += 1;
            let children = match self.get_children(&current).await {
                Ok(children) => children,
                Err(e) if e.is_no_node() => continue,
                Err(e) => return Err(e),
            };
            let prefix = if current == "/" { String::new() } else { current };
            ordered.extend(children.into_iter().map(|child| format!("{prefix}/{child}")));
        }

        for node in ordered.iter().rev() {
            match self.delete(node, None).await {
                Ok(()) => {},
                Err(e) if e.is_no_node() => {},
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }
}

/// Returns the last path segment.
pub(crate) fn node_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}
