//! Harness for delete-shard integration tests.
//!
//! Wraps a [`TestCluster`] with a recording updater and a recording replica
//! deleter so tests can assert what was published and in which order. In
//! overseer mode a real [`Overseer`] drains the queue in the background.

#![allow(dead_code, clippy::unwrap_used, clippy::expect_used, clippy::disallowed_methods)]

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use shardkeeper_collections::{
    CollectionCommand, CommandContext, DeleteShardCmd, ReplicaCompletion, ReplicaDeleteError,
    ReplicaDeleter, SharedResults, StoreReplicaDeleter, shared_results,
};
use shardkeeper_state::{
    Overseer, OverseerHandle, StateUpdateError, StateUpdater, state_updater,
};
use shardkeeper_test_utils::{TestCluster, replica};
use shardkeeper_types::{
    ClusterState, ClusterStateMutation, CommandResults, DocCollection, HashRange, NodeProps,
    Result, Slice, SliceState,
    config::{DeleteShardConfig, StateUpdateConfig, StateUpdateMode},
    props::REPLICA_PROP,
};

/// Both update modalities, for tests that must hold in each.
pub const MODES: [StateUpdateMode; 2] = [StateUpdateMode::Overseer, StateUpdateMode::Distributed];

/// Something the command did, in the order it happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// A mutation was handed to the updater.
    Published(&'static str),
    /// A replica teardown was dispatched.
    Dispatched(String),
}

pub type EventLog = Arc<Mutex<Vec<Event>>>;

// ============================================================================
// Recording collaborators
// ============================================================================

/// Records every mutation, then forwards it (or swallows it).
pub struct RecordingUpdater {
    inner: Option<Arc<dyn StateUpdater>>,
    mode: StateUpdateMode,
    events: EventLog,
}

impl RecordingUpdater {
    pub fn forwarding(inner: Arc<dyn StateUpdater>, events: EventLog) -> Self {
        let mode = inner.mode();
        Self { inner: Some(inner), mode, events }
    }

    /// Accepts every mutation without applying it.
    pub fn accepting(mode: StateUpdateMode, events: EventLog) -> Self {
        Self { inner: None, mode, events }
    }
}

#[async_trait]
impl StateUpdater for RecordingUpdater {
    async fn apply(&self, mutation: ClusterStateMutation) -> std::result::Result<(), StateUpdateError> {
        self.events.lock().push(Event::Published(mutation.operation()));
        match &self.inner {
            Some(inner) => inner.apply(mutation).await,
            None => Ok(()),
        }
    }

    fn mode(&self) -> StateUpdateMode {
        self.mode
    }
}

/// Records each dispatch and the descriptor it carried, then delegates.
pub struct RecordingDeleter<D> {
    inner: D,
    events: EventLog,
    props: Mutex<Vec<NodeProps>>,
}

impl<D> RecordingDeleter<D> {
    pub fn new(inner: D, events: EventLog) -> Self {
        Self { inner, events, props: Mutex::new(Vec::new()) }
    }

    pub fn dispatched_props(&self) -> Vec<NodeProps> {
        self.props.lock().clone()
    }
}

impl<D: ReplicaDeleter> ReplicaDeleter for RecordingDeleter<D> {
    fn delete_replica(
        &self,
        cluster_state: &ClusterState,
        props: &NodeProps,
        completion: ReplicaCompletion,
    ) -> std::result::Result<(), ReplicaDeleteError> {
        let name = props.get_str(REPLICA_PROP).unwrap_or_default().to_string();
        self.events.lock().push(Event::Dispatched(name));
        self.props.lock().push(props.clone());
        self.inner.delete_replica(cluster_state, props, completion)
    }
}

/// A deleter whose behaviour is fixed per test.
pub enum ScriptedDeleter {
    /// Every dispatch fails synchronously with a coordination error.
    CoordinationError,
    /// Every dispatch fails synchronously with a non-coordination error.
    Broken,
    /// Dispatch succeeds but completions are parked and never fired.
    Hang(Mutex<Vec<ReplicaCompletion>>),
}

impl ReplicaDeleter for ScriptedDeleter {
    fn delete_replica(
        &self,
        _cluster_state: &ClusterState,
        _props: &NodeProps,
        completion: ReplicaCompletion,
    ) -> std::result::Result<(), ReplicaDeleteError> {
        match self {
            Self::CoordinationError => Err(ReplicaDeleteError::Coordination {
                source: shardkeeper_state::CoordinationError::ConnectionLoss {
                    path: "/collections".to_string(),
                },
            }),
            Self::Broken => Err(ReplicaDeleteError::Other { message: "disk on fire".to_string() }),
            Self::Hang(parked) => {
                parked.lock().push(completion);
                Ok(())
            },
        }
    }
}

// ============================================================================
// Fixtures
// ============================================================================

/// Builds collection `c1` holding one slice `s1` with replicas `r1@n1` and
/// `r2@n2`, plus an untouched active slice `s2`.
pub fn collection(state: SliceState, range: Option<HashRange>) -> DocCollection {
    let target = Slice::builder()
        .name("s1")
        .state(state)
        .maybe_range(range)
        .replicas(vec![replica("c1", "s1", "r1", "n1"), replica("c1", "s1", "r2", "n2")])
        .build();
    let sibling = Slice::builder()
        .name("s2")
        .range(HashRange::new(0, i32::MAX))
        .replicas(vec![replica("c1", "s2", "r3", "n1")])
        .build();
    DocCollection::new("c1", [target, sibling])
}

/// Hash range of `s1` in [`collection`] fixtures.
pub fn lower_half() -> Option<HashRange> {
    Some(HashRange::new(i32::MIN, -1))
}

pub async fn cluster_with(collections: Vec<DocCollection>) -> TestCluster {
    TestCluster::builder()
        .collections(collections)
        .live_nodes(vec!["n1".to_string(), "n2".to_string()])
        .build()
        .await
}

/// `{collection: c1, shard: s1}` plus `extra` pairs.
pub fn request(extra: &[(&str, &str)]) -> NodeProps {
    let mut message = NodeProps::from_pairs([("collection", "c1"), ("shard", "s1")]);
    for (key, value) in extra {
        message.insert(*key, *value);
    }
    message
}

// ============================================================================
// Harness
// ============================================================================

pub struct Harness {
    pub cluster: TestCluster,
    pub events: EventLog,
    pub deleter: Option<Arc<RecordingDeleter<StoreReplicaDeleter>>>,
    pub cmd: DeleteShardCmd,
    overseer: Option<OverseerHandle>,
}

#[bon::bon]
impl Harness {
    /// Wires a command over `cluster`.
    ///
    /// - `run_overseer`: in overseer mode, drain the queue in the background
    /// - `apply_mutations`: when false, the updater accepts mutations but
    ///   never applies them
    /// - `replica_deleter`: replaces the recording store deleter
    #[builder]
    pub async fn new(
        cluster: TestCluster,
        #[builder(default)] mode: StateUpdateMode,
        #[builder(default = true)] run_overseer: bool,
        #[builder(default = true)] apply_mutations: bool,
        replica_deleter: Option<Arc<dyn ReplicaDeleter>>,
    ) -> Self {
        let events: EventLog = Arc::new(Mutex::new(Vec::new()));
        let update_config = StateUpdateConfig::builder().mode(mode).build().unwrap();

        let updater: Arc<dyn StateUpdater> = if apply_mutations {
            Arc::new(RecordingUpdater::forwarding(
                state_updater(cluster.store(), &update_config),
                Arc::clone(&events),
            ))
        } else {
            Arc::new(RecordingUpdater::accepting(mode, Arc::clone(&events)))
        };

        let (deleter, replica_deleter) = match replica_deleter {
            Some(custom) => (None, custom),
            None => {
                let recording = Arc::new(RecordingDeleter::new(
                    StoreReplicaDeleter::new(Arc::clone(&updater)),
                    Arc::clone(&events),
                ));
                (Some(Arc::clone(&recording)), recording as Arc<dyn ReplicaDeleter>)
            },
        };

        let ctx = CommandContext::builder()
            .store(cluster.store())
            .update_config(update_config.clone())
            .config(DeleteShardConfig::default())
            .updater(updater)
            .replica_deleter(replica_deleter)
            .build();

        let overseer = (mode == StateUpdateMode::Overseer && run_overseer)
            .then(|| Overseer::new(cluster.store(), update_config.max_cas_retries).spawn());

        Self { cluster, events, deleter, cmd: DeleteShardCmd::new(Arc::new(ctx)), overseer }
    }
}

impl Harness {
    /// Runs the command against the current cluster state.
    pub async fn delete(&self, message: &NodeProps) -> (Result<()>, CommandResults) {
        let results: SharedResults = shared_results();
        let state = self.cluster.cluster_state().await;
        let outcome = self.cmd.call(&state, message, &results).await;
        let snapshot = results.lock().clone();
        (outcome, snapshot)
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().clone()
    }

    pub fn published(&self) -> Vec<&'static str> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                Event::Published(op) => Some(op),
                Event::Dispatched(_) => None,
            })
            .collect()
    }

    pub fn dispatched(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                Event::Dispatched(name) => Some(name),
                Event::Published(_) => None,
            })
            .collect()
    }

    pub async fn shutdown(self) {
        if let Some(overseer) = self.overseer {
            overseer.shutdown().await;
        }
    }
}
