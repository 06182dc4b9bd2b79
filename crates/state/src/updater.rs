//! Cluster-state update modalities.
//!
//! A command publishes mutations through [`StateUpdater`] without knowing which
//! modality is active:
//!
//! - [`OverseerQueueUpdater`] enqueues the message for the [`Overseer`],
//!   which applies queued mutations in FIFO order.
//! - [`DistributedStateUpdater`] applies the mutation itself with
//!   compare-and-swap on the collection's `state.json`.
//!
//! Both end in [`apply_with_cas`], so the resulting collection is identical.
//!
//! [`Overseer`]: crate::Overseer

use std::sync::Arc;

use async_trait::async_trait;
use shardkeeper_types::{
    ClusterStateMutation, DocCollection,
    config::{StateUpdateConfig, StateUpdateMode},
    paths,
};
use snafu::{ResultExt, Snafu};
use tracing::debug;

use crate::{
    mutator,
    store::{CoordinationError, CoordinationStore, CreateMode},
};

/// Errors publishing a cluster-state mutation.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum StateUpdateError {
    /// The coordination store failed.
    #[snafu(display("coordination store error: {source}"))]
    Coordination {
        /// Underlying store error.
        source: CoordinationError,
    },

    /// The mutation names a collection with no state document.
    #[snafu(display("collection {collection} not found"))]
    CollectionNotFound {
        /// Collection name.
        collection: String,
    },

    /// The stored collection document could not be decoded.
    #[snafu(display("failed to decode {path}: {source}"))]
    Decode {
        /// Path of the document.
        path: String,
        /// Decoder error.
        source: serde_json::Error,
    },

    /// A message or document could not be encoded.
    #[snafu(display("failed to encode cluster state: {source}"))]
    Encode {
        /// Encoder error.
        source: serde_json::Error,
    },

    /// Concurrent writers kept winning the compare-and-swap race.
    #[snafu(display("gave up updating {collection} after {attempts} conflicting writes"))]
    CasRetriesExhausted {
        /// Collection name.
        collection: String,
        /// Attempts made.
        attempts: u32,
    },
}

impl StateUpdateError {
    /// Returns the coordination-store error behind this failure, if any.
    #[must_use]
    pub fn coordination_error(&self) -> Option<&CoordinationError> {
        match self {
            Self::Coordination { source } => Some(source),
            _ => None,
        }
    }
}

/// Publishes cluster-state mutations.
#[async_trait]
pub trait StateUpdater: Send + Sync + 'static {
    /// Publishes `mutation`. Returning `Ok` means the mutation is durable
    /// (distributed) or durably enqueued (overseer); it does not mean readers
    /// already observe it.
    async fn apply(&self, mutation: ClusterStateMutation) -> Result<(), StateUpdateError>;

    /// Returns the modality this updater implements.
    fn mode(&self) -> StateUpdateMode;
}

/// Builds the updater for the configured modality.
pub fn state_updater(
    store: Arc<dyn CoordinationStore>,
    config: &StateUpdateConfig,
) -> Arc<dyn StateUpdater> {
    match config.mode {
        StateUpdateMode::Overseer => Arc::new(OverseerQueueUpdater::new(store)),
        StateUpdateMode::Distributed => {
            Arc::new(DistributedStateUpdater::new(store, config.max_cas_retries))
        },
    }
}

/// Reads the collection document, applies the mutation and writes it back
/// with compare-and-swap, retrying on version conflicts.
pub(crate) async fn apply_with_cas(
    store: &dyn CoordinationStore,
    mutation: &ClusterStateMutation,
    max_retries: u32,
) -> Result<(), StateUpdateError> {
    let collection = mutation.collection();
    let path = paths::collection_state_path(collection);

    for attempt in 1..=max_retries {
        let (bytes, stat) = match store.get_data(&path).await {
            Ok(found) => found,
            Err(e) if e.is_no_node() => return CollectionNotFoundSnafu { collection }.fail(),
            Err(e) => return Err(e).context(CoordinationSnafu),
        };
        let current: DocCollection =
            serde_json::from_slice(&bytes).context(DecodeSnafu { path: &path })?;

        let next = mutator::apply(&current, mutation);
        if next == current {
            return Ok(());
        }
        let payload = serde_json::to_vec(&next).context(EncodeSnafu)?;

        match store.set_data(&path, payload, Some(stat.version)).await {
            Ok(_) => return Ok(()),
            Err(CoordinationError::BadVersion { expected, actual, .. }) => {
                debug!(
                    collection,
                    attempt,
                    expected,
                    actual,
                    operation = mutation.operation(),
                    "State version conflict, retrying"
                );
            },
            Err(e) => return Err(e).context(CoordinationSnafu),
        }
    }

    CasRetriesExhaustedSnafu { collection, attempts: max_retries }.fail()
}

// ============================================================================
// Overseer queue
// ============================================================================

/// Enqueues mutations for the overseer.
pub struct OverseerQueueUpdater {
    store: Arc<dyn CoordinationStore>,
}

impl OverseerQueueUpdater {
    /// Creates an updater writing to the queue in `store`.
    pub fn new(store: Arc<dyn CoordinationStore>) -> Self {
        Self { store }
    }

    async fn offer(&self, payload: Vec<u8>) -> Result<String, CoordinationError> {
        let entry = format!("{}/{}", paths::OVERSEER_QUEUE, paths::QUEUE_ENTRY_PREFIX);
        match self.store.create(&entry, payload.clone(), CreateMode::PersistentSequential).await {
            Err(e) if e.is_no_node() => {
                self.store.create_all(paths::OVERSEER_QUEUE, Vec::new()).await?;
                self.store.create(&entry, payload, CreateMode::PersistentSequential).await
            },
            other => other,
        }
    }
}

#[async_trait]
impl StateUpdater for OverseerQueueUpdater {
    async fn apply(&self, mutation: ClusterStateMutation) -> Result<(), StateUpdateError> {
        let payload = mutation.to_props().to_bytes().context(EncodeSnafu)?;
        let entry = self.offer(payload).await.context(CoordinationSnafu)?;
        debug!(
            collection = mutation.collection(),
            operation = mutation.operation(),
            entry = %entry,
            "Offered mutation to overseer queue"
        );
        Ok(())
    }

    fn mode(&self) -> StateUpdateMode {
        StateUpdateMode::Overseer
    }
}

// ============================================================================
// Distributed
// ============================================================================

/// Applies mutations directly to the state document.
pub struct DistributedStateUpdater {
    store: Arc<dyn CoordinationStore>,
    max_cas_retries: u32,
}

impl DistributedStateUpdater {
    /// Creates an updater that gives up after `max_cas_retries` conflicts.
    pub fn new(store: Arc<dyn CoordinationStore>, max_cas_retries: u32) -> Self {
        Self { store, max_cas_retries }
    }
}

#[async_trait]
impl StateUpdater for DistributedStateUpdater {
    async fn apply(&self, mutation: ClusterStateMutation) -> Result<(), StateUpdateError> {
        apply_with_cas(self.store.as_ref(), &mutation, self.max_cas_retries).await?;
        debug!(
            collection = mutation.collection(),
            operation = mutation.operation(),
            "Applied mutation directly"
        );
        Ok(())
    }

    fn mode(&self) -> StateUpdateMode {
        StateUpdateMode::Distributed
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};

    use shardkeeper_types::{NodeProps, Slice, SliceState};

    use super::*;
    use crate::{ClusterStateReader, MemoryCoordinationStore, store::Stat};

    async fn seeded_store() -> Arc<MemoryCoordinationStore> {
        let store = Arc::new(MemoryCoordinationStore::new());
        let collection = DocCollection::new(
            "c1",
            [
                Slice::builder().name("s1").state(SliceState::Recovery).build(),
                Slice::builder().name("s2").build(),
            ],
        );
        store
            .create_all(
                &paths::collection_state_path("c1"),
                serde_json::to_vec(&collection).unwrap(),
            )
            .await
            .unwrap();
        store
    }

    fn delete_s1() -> ClusterStateMutation {
        ClusterStateMutation::DeleteShard { collection: "c1".to_string(), shard: "s1".to_string() }
    }

    #[tokio::test]
    async fn test_distributed_applies_directly() {
        let store = seeded_store().await;
        let updater = DistributedStateUpdater::new(store.clone(), 16);
        assert_eq!(updater.mode(), StateUpdateMode::Distributed);

        updater.apply(delete_s1()).await.unwrap();

        let reader = ClusterStateReader::new(store);
        let collection = reader.collection("c1").await.unwrap().unwrap();
        assert!(collection.slice("s1").is_none());
        assert!(collection.slice("s2").is_some());
    }

    #[tokio::test]
    async fn test_distributed_unknown_collection() {
        let store = Arc::new(MemoryCoordinationStore::new());
        let updater = DistributedStateUpdater::new(store, 16);
        let err = updater
            .apply(ClusterStateMutation::DeleteShard {
                collection: "ghost".to_string(),
                shard: "s1".to_string(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, StateUpdateError::CollectionNotFound { .. }));
    }

    #[tokio::test]
    async fn test_distributed_surfaces_coordination_error() {
        let store = seeded_store().await;
        store.inject_fault("/collections/c1");
        let updater = DistributedStateUpdater::new(store, 16);

        let err = updater.apply(delete_s1()).await.unwrap_err();
        assert!(matches!(err.coordination_error(), Some(CoordinationError::ConnectionLoss { .. })));
    }

    /// Store wrapper whose first CAS write loses to a concurrent writer.
    struct RacingStore {
        inner: Arc<MemoryCoordinationStore>,
        raced: AtomicBool,
    }

    #[async_trait]
    impl CoordinationStore for RacingStore {
        async fn create(
            &self,
            path: &str,
            data: Vec<u8>,
            mode: CreateMode,
        ) -> Result<String, CoordinationError> {
            self.inner.create(path, data, mode).await
        }

        async fn create_all(&self, path: &str, data: Vec<u8>) -> Result<(), CoordinationError> {
            self.inner.create_all(path, data).await
        }

        async fn get_data(&self, path: &str) -> Result<(Vec<u8>, Stat), CoordinationError> {
            self.inner.get_data(path).await
        }

        async fn set_data(
            &self,
            path: &str,
            data: Vec<u8>,
            expected_version: Option<i32>,
        ) -> Result<Stat, CoordinationError> {
            if !self.raced.swap(true, Ordering::SeqCst) {
                let (current, _) = self.inner.get_data(path).await?;
                self.inner.set_data(path, current, None).await?;
            }
            self.inner.set_data(path, data, expected_version).await
        }

        async fn exists(&self, path: &str) -> Result<Option<Stat>, CoordinationError> {
            self.inner.exists(path).await
        }

        async fn get_children(&self, path: &str) -> Result<Vec<String>, CoordinationError> {
            self.inner.get_children(path).await
        }

        async fn delete(
            &self,
            path: &str,
            expected_version: Option<i32>,
        ) -> Result<(), CoordinationError> {
            self.inner.delete(path, expected_version).await
        }

        fn subscribe(&self) -> tokio::sync::watch::Receiver<u64> {
            self.inner.subscribe()
        }
    }

    #[tokio::test]
    async fn test_distributed_retries_on_version_conflict() {
        let inner = seeded_store().await;
        let store = Arc::new(RacingStore { inner: inner.clone(), raced: AtomicBool::new(false) });

        DistributedStateUpdater::new(store.clone(), 16).apply(delete_s1()).await.unwrap();

        let (_, stat) = inner.get_data(&paths::collection_state_path("c1")).await.unwrap();
        assert_eq!(stat.version, 2, "one racing write plus one successful retry");
    }

    #[tokio::test]
    async fn test_distributed_gives_up_after_retries() {
        let inner = seeded_store().await;
        let store = Arc::new(RacingStore { inner, raced: AtomicBool::new(false) });

        let err = DistributedStateUpdater::new(store, 1).apply(delete_s1()).await.unwrap_err();
        assert!(matches!(err, StateUpdateError::CasRetriesExhausted { attempts: 1, .. }));
    }

    #[tokio::test]
    async fn test_overseer_updater_enqueues_without_applying() {
        let store = seeded_store().await;
        let updater = OverseerQueueUpdater::new(store.clone());
        assert_eq!(updater.mode(), StateUpdateMode::Overseer);

        updater.apply(delete_s1()).await.unwrap();
        updater
            .apply(ClusterStateMutation::UpdateShardState {
                collection: "c1".to_string(),
                states: [("s2".to_string(), SliceState::Inactive)].into(),
            })
            .await
            .unwrap();

        let entries = store.get_children(paths::OVERSEER_QUEUE).await.unwrap();
        assert_eq!(entries, vec!["qn-0000000000", "qn-0000000001"]);

        let (bytes, _) =
            store.get_data(&format!("{}/{}", paths::OVERSEER_QUEUE, entries[0])).await.unwrap();
        let message = NodeProps::from_bytes(&bytes).unwrap();
        assert_eq!(ClusterStateMutation::from_props(&message).unwrap(), delete_s1());

        // Nothing applied until the overseer runs.
        let collection = ClusterStateReader::new(store).collection("c1").await.unwrap().unwrap();
        assert!(collection.slice("s1").is_some());
    }

    #[tokio::test]
    async fn test_factory_selects_modality() {
        let store: Arc<dyn CoordinationStore> = Arc::new(MemoryCoordinationStore::new());
        let distributed = StateUpdateConfig::builder()
            .mode(StateUpdateMode::Distributed)
            .build()
            .unwrap();
        assert_eq!(state_updater(store.clone(), &distributed).mode(), StateUpdateMode::Distributed);
        assert_eq!(
            state_updater(store, &StateUpdateConfig::default()).mode(),
            StateUpdateMode::Overseer
        );
    }
}
