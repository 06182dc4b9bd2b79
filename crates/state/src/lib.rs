//! Cluster-state machinery for shardkeeper.
//!
//! This crate sits between the coordination store and the collection
//! commands, providing:
//!
//! - The [`CoordinationStore`] contract: a hierarchical key-value store with
//!   versioned nodes, sequential children and change notification
//! - [`MemoryCoordinationStore`], an in-process implementation with fault
//!   injection for tests and local runs
//! - [`ClusterStateReader`] for snapshots, alias resolution and
//!   `wait_for_state`
//! - The pure slice [`mutator`] shared by both update modalities
//! - [`StateUpdater`] with its two modalities: [`OverseerQueueUpdater`]
//!   (centralized queue drained by the [`Overseer`]) and
//!   [`DistributedStateUpdater`] (direct compare-and-swap)
//! - [`ClusterSnapshot`] for bootstrapping a store from JSON

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod memory;
pub mod mutator;
mod overseer;
mod reader;
mod snapshot;
mod store;
mod updater;

pub use memory::MemoryCoordinationStore;
pub use overseer::{Overseer, OverseerHandle};
pub use reader::{Aliases, ClusterStateReader, ReaderError, WaitForStateError};
pub use snapshot::{ClusterSnapshot, SnapshotError};
pub use store::{CoordinationError, CoordinationStore, CreateMode, Stat};
pub use updater::{
    DistributedStateUpdater, OverseerQueueUpdater, StateUpdateError, StateUpdater, state_updater,
};
