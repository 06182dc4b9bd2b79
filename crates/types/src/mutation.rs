//! Cluster-state mutation messages.
//!
//! Mutations travel as [`NodeProps`] whose `operation` key carries the
//! lower-case operation tag. The overseer queue stores them in that form; the
//! distributed updater applies the typed form directly.

use std::collections::BTreeMap;

use snafu::{OptionExt, Snafu};

use crate::{
    props::{COLLECTION_PROP, NodeProps, QUEUE_OPERATION, REPLICA_PROP, SHARD_ID_PROP},
    types::SliceState,
};

/// Operation tag for [`ClusterStateMutation::UpdateShardState`].
pub const UPDATE_SHARD_STATE: &str = "updateshardstate";
/// Operation tag for [`ClusterStateMutation::DeleteShard`].
pub const DELETE_SHARD: &str = "deleteshard";
/// Operation tag for [`ClusterStateMutation::DeleteReplica`].
pub const DELETE_CORE: &str = "deletecore";

/// Errors decoding a mutation message.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum MessageError {
    /// A required key is missing or not a string.
    #[snafu(display("message is missing required property '{field}'"))]
    MissingField {
        /// Missing key.
        field: &'static str,
    },

    /// The operation tag is not recognized.
    #[snafu(display("unknown cluster state operation '{operation}'"))]
    UnknownOperation {
        /// Rejected tag.
        operation: String,
    },

    /// A slice state value could not be parsed.
    #[snafu(display("invalid state for slice '{slice}': {value}"))]
    InvalidSliceState {
        /// Slice id.
        slice: String,
        /// Rejected value.
        value: String,
    },
}

/// A change to one collection's slice map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClusterStateMutation {
    /// Sets the state of each named slice.
    UpdateShardState {
        /// Collection to update.
        collection: String,
        /// Target state per slice id.
        states: BTreeMap<String, SliceState>,
    },
    /// Removes a slice.
    DeleteShard {
        /// Collection to update.
        collection: String,
        /// Slice id to remove.
        shard: String,
    },
    /// Removes one replica from a slice.
    DeleteReplica {
        /// Collection to update.
        collection: String,
        /// Slice hosting the replica.
        shard: String,
        /// Replica name.
        replica: String,
    },
}

impl ClusterStateMutation {
    /// Returns the operation tag.
    #[must_use]
    pub const fn operation(&self) -> &'static str {
        match self {
            Self::UpdateShardState { .. } => UPDATE_SHARD_STATE,
            Self::DeleteShard { .. } => DELETE_SHARD,
            Self::DeleteReplica { .. } => DELETE_CORE,
        }
    }

    /// Returns the collection this mutation targets.
    #[must_use]
    pub fn collection(&self) -> &str {
        match self {
            Self::UpdateShardState { collection, .. }
            | Self::DeleteShard { collection, .. }
            | Self::DeleteReplica { collection, .. } => collection,
        }
    }

    /// Encodes the mutation as a property message.
    #[must_use]
    pub fn to_props(&self) -> NodeProps {
        let mut props = NodeProps::from_pairs([
            (QUEUE_OPERATION, self.operation()),
            (COLLECTION_PROP, self.collection()),
        ]);
        match self {
            Self::UpdateShardState { states, .. } => {
                for (slice, state) in states {
                    props.insert(slice.clone(), state.as_str());
                }
            },
            Self::DeleteShard { shard, .. } => props.insert(SHARD_ID_PROP, shard.as_str()),
            Self::DeleteReplica { shard, replica, .. } => {
                props.insert(SHARD_ID_PROP, shard.as_str());
                props.insert(REPLICA_PROP, replica.as_str());
            },
        }
        props
    }

    /// Decodes a property message.
    ///
    /// For `updateshardstate`, every key other than `operation` and
    /// `collection` names a slice and its target state.
    ///
    /// # Errors
    ///
    /// Returns [`MessageError`] if a required key is missing, the operation is
    /// unknown, or a slice state does not parse.
    pub fn from_props(props: &NodeProps) -> Result<Self, MessageError> {
        let operation =
            props.get_str(QUEUE_OPERATION).context(MissingFieldSnafu { field: QUEUE_OPERATION })?;
        let collection = props
            .get_str(COLLECTION_PROP)
            .context(MissingFieldSnafu { field: COLLECTION_PROP })?
            .to_string();
        let shard = || {
            props
                .get_str(SHARD_ID_PROP)
                .map(str::to_string)
                .context(MissingFieldSnafu { field: SHARD_ID_PROP })
        };

        match operation {
            UPDATE_SHARD_STATE => {
                let mut states = BTreeMap::new();
                for (key, value) in props.iter() {
                    if key == QUEUE_OPERATION || key == COLLECTION_PROP {
                        continue;
                    }
                    let raw = value.as_str().unwrap_or_default();
                    let state = raw.parse::<SliceState>().map_err(|_| {
                        MessageError::InvalidSliceState {
                            slice: key.to_string(),
                            value: value.to_string(),
                        }
                    })?;
                    states.insert(key.to_string(), state);
                }
                Ok(Self::UpdateShardState { collection, states })
            },
            DELETE_SHARD => Ok(Self::DeleteShard { collection, shard: shard()? }),
            DELETE_CORE => {
                let replica = props
                    .get_str(REPLICA_PROP)
                    .context(MissingFieldSnafu { field: REPLICA_PROP })?
                    .to_string();
                Ok(Self::DeleteReplica { collection, shard: shard()?, replica })
            },
            other => UnknownOperationSnafu { operation: other }.fail(),
        }
    }
}
