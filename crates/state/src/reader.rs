//! Cluster-state reader.
//!
//! Reads collection documents, aliases and live nodes out of the coordination
//! store and assembles immutable [`ClusterState`] snapshots. Nothing is cached:
//! every call reflects the store as of that call.

use std::{collections::BTreeMap, sync::Arc, time::Duration};

use serde::{Deserialize, Serialize};
use shardkeeper_types::{ClusterState, DocCollection, paths};
use snafu::{OptionExt, ResultExt, Snafu};
use tracing::debug;

use crate::store::{CoordinationError, CoordinationStore};

/// Fallback poll interval once the change channel is closed.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Errors reading cluster state.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ReaderError {
    /// The coordination store failed.
    #[snafu(display("coordination store read failed: {source}"))]
    Store {
        /// Underlying store error.
        source: CoordinationError,
    },

    /// A stored document could not be decoded.
    #[snafu(display("failed to decode {path}: {source}"))]
    Decode {
        /// Path of the document.
        path: String,
        /// Decoder error.
        source: serde_json::Error,
    },

    /// A name used as a collection is an alias over several collections.
    #[snafu(display("Alias {alias} refers to more than one collection: {targets}"))]
    NotSimpleAlias {
        /// Alias name.
        alias: String,
        /// Comma-separated targets.
        targets: String,
    },
}

/// Errors from [`ClusterStateReader::wait_for_state`].
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum WaitForStateError {
    /// The predicate did not hold before the deadline.
    #[snafu(display("timed out after {timeout:?} waiting for state of collection {collection}"))]
    Timeout {
        /// Collection being observed.
        collection: String,
        /// Budget that elapsed.
        timeout: Duration,
    },

    /// Reading the collection failed.
    #[snafu(display("failed to read state while waiting: {source}"))]
    Read {
        /// Underlying read error.
        source: ReaderError,
    },
}

/// Alias definitions stored at `/aliases.json`.
///
/// An alias maps to a comma-separated list of collections. Only aliases with
/// exactly one target are "simple" and can stand in for a collection name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Aliases {
    /// Collection aliases keyed by alias name.
    #[serde(default)]
    pub collection: BTreeMap<String, String>,
}

impl Aliases {
    /// Returns the single target of `alias`, if it is a simple alias.
    #[must_use]
    pub fn simple_target(&self, alias: &str) -> Option<&str> {
        let targets = self.collection.get(alias)?;
        let mut iter = targets.split(',').map(str::trim).filter(|t| !t.is_empty());
        match (iter.next(), iter.next()) {
            (Some(target), None) => Some(target),
            _ => None,
        }
    }
}

/// Reads cluster state from a coordination store.
#[derive(Clone)]
pub struct ClusterStateReader {
    store: Arc<dyn CoordinationStore>,
}

impl ClusterStateReader {
    /// Creates a reader over `store`.
    pub fn new(store: Arc<dyn CoordinationStore>) -> Self {
        Self { store }
    }

    /// Returns the underlying store.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn CoordinationStore> {
        &self.store
    }

    /// Reads one collection, or `None` if it has no state document.
    ///
    /// # Errors
    ///
    /// Returns [`ReaderError`] if the store fails or the document is corrupt.
    pub async fn collection(&self, name: &str) -> Result<Option<DocCollection>, ReaderError> {
        let path = paths::collection_state_path(name);
        let (bytes, stat) = match self.store.get_data(&path).await {
            Ok(found) => found,
            Err(e) if e.is_no_node() => return Ok(None),
            Err(e) => return Err(e).context(StoreSnafu),
        };
        let mut collection: DocCollection =
            serde_json::from_slice(&bytes).context(DecodeSnafu { path })?;
        collection.znode_version = stat.version;
        Ok(Some(collection))
    }

    /// Returns the names of registered live nodes.
    ///
    /// # Errors
    ///
    /// Returns [`ReaderError`] if the store fails.
    pub async fn live_nodes(&self) -> Result<Vec<String>, ReaderError> {
        match self.store.get_children(paths::LIVE_NODES_ZKNODE).await {
            Ok(nodes) => Ok(nodes),
            Err(e) if e.is_no_node() => Ok(Vec::new()),
            Err(e) => Err(e).context(StoreSnafu),
        }
    }

    /// Assembles a snapshot of every collection and the live nodes.
    ///
    /// A collection directory without a state document is skipped.
    ///
    /// # Errors
    ///
    /// Returns [`ReaderError`] if the store fails or a document is corrupt.
    pub async fn cluster_state(&self) -> Result<ClusterState, ReaderError> {
        let names = match self.store.get_children(paths::COLLECTIONS_ZKNODE).await {
            Ok(names) => names,
            Err(e) if e.is_no_node() => Vec::new(),
            Err(e) => return Err(e).context(StoreSnafu),
        };

        let mut collections = Vec::with_capacity(names.len());
        for name in &names {
            if let Some(collection) = self.collection(name).await? {
                collections.push(collection);
            }
        }
        let live_nodes = self.live_nodes().await?;
        Ok(ClusterState::new(collections, live_nodes))
    }

    /// Reads the alias definitions; a missing document means no aliases.
    ///
    /// # Errors
    ///
    /// Returns [`ReaderError`] if the store fails or the document is corrupt.
    pub async fn aliases(&self) -> Result<Aliases, ReaderError> {
        match self.store.get_data(paths::ALIASES).await {
            Ok((bytes, _)) if bytes.is_empty() => Ok(Aliases::default()),
            Ok((bytes, _)) => {
                serde_json::from_slice(&bytes).context(DecodeSnafu { path: paths::ALIASES })
            },
            Err(e) if e.is_no_node() => Ok(Aliases::default()),
            Err(e) => Err(e).context(StoreSnafu),
        }
    }

    /// Resolves `name` through a simple alias. Returns `name` unchanged when
    /// it is not an alias.
    ///
    /// # Errors
    ///
    /// Returns [`ReaderError::NotSimpleAlias`] if `name` maps to more than one
    /// collection, or another [`ReaderError`] if the alias document cannot be
    /// read.
    pub async fn resolve_simple_alias(&self, name: &str) -> Result<String, ReaderError> {
        let aliases = self.aliases().await?;
        let Some(targets) = aliases.collection.get(name) else {
            return Ok(name.to_string());
        };
        let resolved = aliases
            .simple_target(name)
            .context(NotSimpleAliasSnafu { alias: name, targets: targets.as_str() })?;
        debug!(alias = %name, collection = %resolved, "Resolved alias");
        Ok(resolved.to_string())
    }

    /// Waits until `predicate` holds for the named collection, re-reading it
    /// after every store change.
    ///
    /// The predicate sees `None` when the collection does not exist.
    ///
    /// # Errors
    ///
    /// [`WaitForStateError::Timeout`] when `timeout` elapses first, or
    /// [`WaitForStateError::Read`] if reading fails.
    pub async fn wait_for_state<F>(
        &self,
        collection: &str,
        timeout: Duration,
        predicate: F,
    ) -> Result<(), WaitForStateError>
    where
        F: Fn(Option<&DocCollection>) -> bool + Send + Sync,
    {
        match tokio::time::timeout(timeout, self.poll_until(collection, &predicate)).await {
            Ok(result) => result,
            Err(_) => TimeoutSnafu { collection, timeout }.fail(),
        }
    }

    async fn poll_until<F>(&self, collection: &str, predicate: &F) -> Result<(), WaitForStateError>
    where
        F: Fn(Option<&DocCollection>) -> bool + Send + Sync,
    {
        // Subscribe before the first read so no change is missed in between.
        let mut changes = self.store.subscribe();
        loop {
            let _ = changes.borrow_and_update();
            let current = self.collection(collection).await.context(ReadSnafu)?;
            if predicate(current.as_ref()) {
                return Ok(());
            }
            if changes.changed().await.is_err() {
                tokio::time::sleep(POLL_INTERVAL).await;
            }
        }
    }
}
