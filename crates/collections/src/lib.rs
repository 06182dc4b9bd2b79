//! Collection commands for shardkeeper.
//!
//! The centrepiece is [`DeleteShardCmd`], which removes a slice from a
//! collection: it validates the request, tears down the slice's replicas in
//! parallel, publishes the slice removal through the active [`StateUpdater`]
//! modality, cleans ancillary coordination metadata and waits until the
//! removal is visible.
//!
//! Supporting pieces are public so other commands can reuse them:
//! - [`ReplicaDeleter`] and the shipped [`StoreReplicaDeleter`]
//! - [`SharedResults`], the mutex-guarded results envelope
//! - [`validator`], [`enumerator`] and [`cleaner`] steps
//!
//! [`StateUpdater`]: shardkeeper_state::StateUpdater

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod aggregator;
pub mod cleaner;
mod confirm;
mod context;
mod delete_shard;
pub mod enumerator;
mod fanout;
mod replica;
pub mod validator;

pub use aggregator::{ReplicaTarget, SharedResults, shared_results};
pub use confirm::wait_for_slice_removal;
pub use context::{CollectionCommand, CommandContext};
pub use delete_shard::DeleteShardCmd;
pub use fanout::{ReplicaCompletion, TeardownDescriptor};
pub use replica::{ReplicaDeleteError, ReplicaDeleter, StoreReplicaDeleter};
