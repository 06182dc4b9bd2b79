//! Cluster data model.
//!
//! A collection is partitioned into slices (shards). Each slice owns a set of
//! replicas hosted on cluster nodes and, unless it is custom-routed, a hash
//! range. These types mirror the per-collection `state.json` documents kept in
//! the coordination store.

use std::{
    collections::{BTreeMap, BTreeSet},
    fmt,
    str::FromStr,
};

use serde::{Deserialize, Serialize};
use snafu::Snafu;

// ============================================================================
// Slice State
// ============================================================================

/// Lifecycle state of a slice.
///
/// Serialized (and displayed) in lower case, e.g. `"construction"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SliceState {
    /// Serving reads and writes for its hash range.
    Active,
    /// Retired, typically the parent of a completed split.
    Inactive,
    /// Being built (split target or torn-down slice).
    Construction,
    /// Replicas are recovering before the slice becomes active.
    Recovery,
    /// Recovery failed; the slice needs operator attention.
    RecoveryFailed,
}

impl SliceState {
    /// All states, in declaration order.
    pub const ALL: [SliceState; 5] = [
        SliceState::Active,
        SliceState::Inactive,
        SliceState::Construction,
        SliceState::Recovery,
        SliceState::RecoveryFailed,
    ];

    /// Returns the wire name of this state.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Inactive => "inactive",
            Self::Construction => "construction",
            Self::Recovery => "recovery",
            Self::RecoveryFailed => "recovery_failed",
        }
    }
}

impl fmt::Display for SliceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error parsing a [`SliceState`] or [`HashRange`] from text.
#[derive(Debug, Snafu)]
pub enum ParseError {
    /// Unknown slice state name.
    #[snafu(display("unknown slice state: {value}"))]
    UnknownSliceState {
        /// Rejected input.
        value: String,
    },

    /// Malformed hash range.
    #[snafu(display("invalid hash range: {value}"))]
    InvalidHashRange {
        /// Rejected input.
        value: String,
    },
}

impl FromStr for SliceState {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|state| state.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| ParseError::UnknownSliceState { value: s.to_string() })
    }
}

// ============================================================================
// Hash Range
// ============================================================================

/// Inclusive 32-bit hash range owned by a compositeId-routed slice.
///
/// Text form is two lower-case hex words, e.g. `80000000-ffffffff`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct HashRange {
    /// Lower bound (inclusive).
    pub min: i32,
    /// Upper bound (inclusive).
    pub max: i32,
}

impl HashRange {
    /// Creates a range from its bounds.
    #[must_use]
    pub const fn new(min: i32, max: i32) -> Self {
        Self { min, max }
    }

    /// Returns true if `hash` falls inside the range.
    #[must_use]
    pub const fn includes(&self, hash: i32) -> bool {
        hash >= self.min && hash <= self.max
    }
}

impl fmt::Display for HashRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:x}-{:x}", self.min as u32, self.max as u32)
    }
}

impl FromStr for HashRange {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ParseError::InvalidHashRange { value: s.to_string() };
        let (min, max) = s.split_once('-').ok_or_else(invalid)?;
        let min = u32::from_str_radix(min, 16).map_err(|_| invalid())?;
        let max = u32::from_str_radix(max, 16).map_err(|_| invalid())?;
        Ok(Self { min: min as i32, max: max as i32 })
    }
}

impl TryFrom<String> for HashRange {
    type Error = ParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<HashRange> for String {
    fn from(range: HashRange) -> Self {
        range.to_string()
    }
}

// ============================================================================
// Replica / Slice / Collection
// ============================================================================

/// A hosted copy of a slice on one node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, bon::Builder)]
pub struct Replica {
    /// Replica name, unique within the slice (e.g. `core_node3`).
    #[builder(into)]
    pub name: String,
    /// Local storage unit on the hosting node.
    #[builder(into)]
    #[serde(rename = "core")]
    pub core_name: String,
    /// Cluster-addressable node hosting the replica.
    #[builder(into)]
    pub node_name: String,
}

/// A partition of a collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slice {
    /// Slice identifier, scoped to the collection.
    pub name: String,
    /// Current lifecycle state.
    pub state: SliceState,
    /// Hash range; `None` for custom-routed ("implicit") slices.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub range: Option<HashRange>,
    /// Replicas keyed by replica name.
    #[serde(default)]
    pub replicas: BTreeMap<String, Replica>,
}

#[bon::bon]
impl Slice {
    /// Creates a slice, keying `replicas` by their names.
    #[builder]
    pub fn new(
        #[builder(into)] name: String,
        #[builder(default = SliceState::Active)] state: SliceState,
        range: Option<HashRange>,
        #[builder(default)] replicas: Vec<Replica>,
    ) -> Self {
        let replicas = replicas.into_iter().map(|r| (r.name.clone(), r)).collect();
        Self { name, state, range, replicas }
    }
}

impl Slice {
    /// Returns true if this slice is routed by the caller rather than by hash.
    #[must_use]
    pub fn is_custom_routed(&self) -> bool {
        self.range.is_none()
    }

    /// Iterates the replicas in name order.
    pub fn replicas(&self) -> impl Iterator<Item = &Replica> {
        self.replicas.values()
    }

    /// Looks up a replica by name.
    #[must_use]
    pub fn replica(&self, name: &str) -> Option<&Replica> {
        self.replicas.get(name)
    }
}

/// A collection and its slices, as stored in `state.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocCollection {
    /// Canonical collection name.
    pub name: String,
    /// Slices keyed by slice id.
    #[serde(default)]
    pub slices: BTreeMap<String, Slice>,
    /// Version of the `state.json` node this snapshot was read from.
    #[serde(skip)]
    pub znode_version: i32,
}

impl DocCollection {
    /// Creates a collection from a list of slices.
    pub fn new(name: impl Into<String>, slices: impl IntoIterator<Item = Slice>) -> Self {
        Self {
            name: name.into(),
            slices: slices.into_iter().map(|s| (s.name.clone(), s)).collect(),
            znode_version: 0,
        }
    }

    /// Looks up a slice by id.
    #[must_use]
    pub fn slice(&self, id: &str) -> Option<&Slice> {
        self.slices.get(id)
    }

    /// Iterates the slices in id order.
    pub fn slices(&self) -> impl Iterator<Item = &Slice> {
        self.slices.values()
    }
}

/// Immutable snapshot of the cluster: every collection plus the live nodes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClusterState {
    /// Collections keyed by canonical name.
    pub collections: BTreeMap<String, DocCollection>,
    /// Nodes currently registered as live.
    pub live_nodes: BTreeSet<String>,
}

impl ClusterState {
    /// Creates a snapshot from its parts.
    pub fn new(
        collections: impl IntoIterator<Item = DocCollection>,
        live_nodes: impl IntoIterator<Item = String>,
    ) -> Self {
        Self {
            collections: collections.into_iter().map(|c| (c.name.clone(), c)).collect(),
            live_nodes: live_nodes.into_iter().collect(),
        }
    }

    /// Looks up a collection by canonical name.
    #[must_use]
    pub fn collection(&self, name: &str) -> Option<&DocCollection> {
        self.collections.get(name)
    }

    /// Returns true if `node` is registered as live.
    #[must_use]
    pub fn is_live(&self, node: &str) -> bool {
        self.live_nodes.contains(node)
    }
}
