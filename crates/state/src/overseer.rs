//! Overseer queue consumer.
//!
//! The overseer is the single writer of the centralized modality. It drains
//! `/overseer/collection-queue-work` in sequence order, applies each mutation
//! to the target collection and deletes the entry once applied.
//!
//! An entry is only left in place when the store itself fails; it is retried
//! on the next pass. Malformed messages and messages for unknown collections
//! are logged and dropped so they cannot block the queue.

use std::{sync::Arc, time::Duration};

use shardkeeper_types::{ClusterStateMutation, NodeProps, paths};
use snafu::ResultExt;
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::{debug, error, info, warn};

use crate::{
    store::{CoordinationStore, node_name},
    updater::{CoordinationSnafu, StateUpdateError, apply_with_cas},
};

/// Pause before retrying a pass that failed on the store.
const RETRY_BACKOFF: Duration = Duration::from_millis(250);

/// Consumer of the centralized update queue.
pub struct Overseer {
    store: Arc<dyn CoordinationStore>,
    max_cas_retries: u32,
}

/// Handle to a running overseer task.
pub struct OverseerHandle {
    shutdown: mpsc::Sender<()>,
    task: JoinHandle<()>,
}

impl OverseerHandle {
    /// Stops the overseer and waits for its task to finish.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(()).await;
        if let Err(e) = self.task.await {
            warn!(error = %e, "Overseer task ended abnormally");
        }
    }
}

impl Overseer {
    /// Creates an overseer for the queue in `store`.
    pub fn new(store: Arc<dyn CoordinationStore>, max_cas_retries: u32) -> Self {
        Self { store, max_cas_retries }
    }

    /// Applies every queued mutation, oldest first, and returns how many
    /// entries were consumed.
    ///
    /// # Errors
    ///
    /// Returns the first coordination-store failure (including exhausted
    /// compare-and-swap retries); the failing entry and all later ones stay
    /// queued.
    pub async fn process_queue(&self) -> Result<usize, StateUpdateError> {
        let entries = match self.store.get_children(paths::OVERSEER_QUEUE).await {
            Ok(entries) => entries,
            Err(e) if e.is_no_node() => return Ok(0),
            Err(e) => return Err(e).context(CoordinationSnafu),
        };

        let mut consumed = 0;
        for name in entries {
            let path = format!("{}/{name}", paths::OVERSEER_QUEUE);
            let bytes = match self.store.get_data(&path).await {
                Ok((bytes, _)) => bytes,
                Err(e) if e.is_no_node() => continue,
                Err(e) => return Err(e).context(CoordinationSnafu),
            };

            self.process_entry(&path, &bytes).await?;

            match self.store.delete(&path, None).await {
                Ok(()) => {},
                Err(e) if e.is_no_node() => {},
                Err(e) => return Err(e).context(CoordinationSnafu),
            }
            consumed += 1;
        }
        Ok(consumed)
    }

    async fn process_entry(&self, path: &str, bytes: &[u8]) -> Result<(), StateUpdateError> {
        let entry = node_name(path);
        let mutation = match NodeProps::from_bytes(bytes)
            .map_err(|e| e.to_string())
            .and_then(|props| ClusterStateMutation::from_props(&props).map_err(|e| e.to_string()))
        {
            Ok(mutation) => mutation,
            Err(reason) => {
                warn!(entry, reason = %reason, "Dropping malformed overseer message");
                return Ok(());
            },
        };

        match apply_with_cas(self.store.as_ref(), &mutation, self.max_cas_retries).await {
            Ok(()) => {
                debug!(
                    entry,
                    collection = mutation.collection(),
                    operation = mutation.operation(),
                    "Applied queued mutation"
                );
                Ok(())
            },
            Err(StateUpdateError::CollectionNotFound { collection }) => {
                warn!(entry, collection = %collection, "Dropping message for unknown collection");
                Ok(())
            },
            Err(e @ (StateUpdateError::Coordination { .. }
            | StateUpdateError::CasRetriesExhausted { .. })) => Err(e),
            Err(e) => {
                error!(
                    entry,
                    collection = mutation.collection(),
                    error = %e,
                    "Dropping message that cannot be applied"
                );
                Ok(())
            },
        }
    }

    /// Runs until `shutdown` receives a message or is closed, draining the
    /// queue after every store change.
    pub async fn run(self, mut shutdown: mpsc::Receiver<()>) {
        info!("Overseer started");
        let mut changes = self.store.subscribe();
        loop {
            let _ = changes.borrow_and_update();
            let failed = match self.process_queue().await {
                Ok(0) => false,
                Ok(consumed) => {
                    debug!(consumed, "Drained overseer queue");
                    false
                },
                Err(e) => {
                    warn!(error = %e, "Overseer pass failed, will retry");
                    true
                },
            };

            if failed {
                tokio::select! {
                    _ = tokio::time::sleep(RETRY_BACKOFF) => continue,
                    _ = shutdown.recv() => break,
                }
            }

            tokio::select! {
                changed = changes.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                _ = shutdown.recv() => break,
            }
        }
        info!("Overseer shutting down");
    }

    /// Starts the overseer as a background task.
    pub fn spawn(self) -> OverseerHandle {
        let (shutdown, shutdown_rx) = mpsc::channel(1);
        let task = tokio::spawn(async move {
            self.run(shutdown_rx).await;
        });
        OverseerHandle { shutdown, task }
    }
}
