//! Parallel replica teardown.
//!
//! Each dispatched replica receives a [`ReplicaCompletion`] holding one count
//! of a [`CompletionLatch`]. The count is released when the completion is
//! consumed or dropped, so a deleter that fails or loses its completion can
//! never leave the coordinator waiting past its deadline.

use std::{
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use shardkeeper_types::{ClusterState, CommandResults, NodeProps};
use tokio::sync::Notify;
use tracing::{debug, info, warn};

use crate::{
    aggregator::{ReplicaTarget, SharedResults, merge_replica_results},
    replica::{ReplicaDeleteError, ReplicaDeleter},
};

// ============================================================================
// Latch
// ============================================================================

struct LatchState {
    remaining: AtomicUsize,
    notify: Notify,
}

/// Count-down latch released by [`ReplicaCompletion`]s.
pub(crate) struct CompletionLatch {
    state: Arc<LatchState>,
}

/// One outstanding count of a [`CompletionLatch`]; released on drop.
struct LatchGuard {
    state: Arc<LatchState>,
}

impl Drop for LatchGuard {
    fn drop(&mut self) {
        if self.state.remaining.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.state.notify.notify_one();
        }
    }
}

impl CompletionLatch {
    /// Creates a latch expecting `count` guards to be issued and released.
    pub(crate) fn new(count: usize) -> Self {
        Self {
            state: Arc::new(LatchState {
                remaining: AtomicUsize::new(count),
                notify: Notify::new(),
            }),
        }
    }

    fn guard(&self) -> LatchGuard {
        LatchGuard { state: Arc::clone(&self.state) }
    }

    /// Counts not yet released.
    pub(crate) fn remaining(&self) -> usize {
        self.state.remaining.load(Ordering::Acquire)
    }

    /// Waits until every count is released or `timeout` elapses. Returns
    /// false on timeout.
    pub(crate) async fn wait(&self, timeout: Duration) -> bool {
        let released = async {
            while self.remaining() > 0 {
                self.state.notify.notified().await;
            }
        };
        tokio::time::timeout(timeout, released).await.is_ok()
    }
}

// ============================================================================
// Completion
// ============================================================================

/// Completion continuation handed to a [`ReplicaDeleter`] for one replica.
///
/// Consume it with [`complete`](Self::complete) once the replica's deletion is
/// resolved. Dropping it without completing releases the latch but records
/// nothing.
pub struct ReplicaCompletion {
    target: ReplicaTarget,
    results: SharedResults,
    _guard: LatchGuard,
}

impl ReplicaCompletion {
    /// Returns the replica this completion reports for.
    #[must_use]
    pub fn target(&self) -> &ReplicaTarget {
        &self.target
    }

    /// Merges the replica's own results into the command's envelope and
    /// releases the latch.
    pub fn complete(self, replica_results: CommandResults) {
        merge_replica_results(&self.results, &self.target, &replica_results);
    }
}

// ============================================================================
// Fan-out
// ============================================================================

/// A replica to tear down: where it lives plus the full message passed to the
/// replica deleter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TeardownDescriptor {
    /// Location used for logging and failure messages.
    pub target: ReplicaTarget,
    /// Message handed to the replica deleter.
    pub props: NodeProps,
}

/// Result of a fan-out round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FanOutSummary {
    /// Replicas handed to the deleter.
    pub dispatched: usize,
    /// Completions still outstanding when the wait ended.
    pub pending: usize,
}

/// Dispatches every descriptor to `deleter` and waits, up to `timeout`, for
/// all completions.
///
/// A synchronous coordination-store failure is logged and dispatch continues.
/// Any other synchronous failure stops dispatch and is returned. A timeout is
/// not an error; the returned summary reports the outstanding count.
pub(crate) async fn fan_out(
    deleter: &dyn ReplicaDeleter,
    cluster_state: &ClusterState,
    descriptors: Vec<TeardownDescriptor>,
    results: &SharedResults,
    timeout: Duration,
) -> Result<FanOutSummary, ReplicaDeleteError> {
    let latch = CompletionLatch::new(descriptors.len());
    let mut dispatched = 0;

    for descriptor in descriptors {
        let target = &descriptor.target;
        info!(
            collection = %target.collection,
            shard = %target.shard,
            node = %target.node,
            "Deleting replica"
        );

        let completion = ReplicaCompletion {
            target: target.clone(),
            results: Arc::clone(results),
            _guard: latch.guard(),
        };
        match deleter.delete_replica(cluster_state, &descriptor.props, completion) {
            Ok(()) => dispatched += 1,
            Err(e @ ReplicaDeleteError::Coordination { .. }) => {
                warn!(replica = ?descriptor.props, error = %e, "Error deleting replica");
            },
            Err(e) => {
                warn!(replica = ?descriptor.props, error = %e, "Error deleting replica");
                return Err(e);
            },
        }
    }

    debug!(dispatched, "Waiting for delete shard action to complete");
    if !latch.wait(timeout).await {
        warn!(
            pending = latch.remaining(),
            timeout = ?timeout,
            "Replica teardown wait timed out; continuing with shard removal"
        );
    }
    Ok(FanOutSummary { dispatched, pending: latch.remaining() })
}
