//! Property messages.
//!
//! [`NodeProps`] is the flat key/value message format used for command
//! requests, replica teardown descriptors and overseer queue entries. Values
//! are JSON scalars so a message round-trips through the coordination store
//! unchanged.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Collection name.
pub const COLLECTION_PROP: &str = "collection";
/// Slice id.
pub const SHARD_ID_PROP: &str = "shard";
/// Core name of a replica.
pub const CORE_NAME_PROP: &str = "core";
/// Replica name.
pub const REPLICA_PROP: &str = "replica";
/// Node hosting a replica, as used by core-admin style requests.
pub const NODE: &str = "node";
/// Node hosting a replica, as recorded in cluster state.
pub const NODE_NAME_PROP: &str = "node_name";
/// Async request correlation id.
pub const ASYNC: &str = "async";
/// Whether the external collection name may be an alias.
pub const FOLLOW_ALIASES: &str = "followAliases";
/// Marks replica teardowns dispatched concurrently by a parent command.
pub const PARALLEL: &str = "parallel";
/// Operation tag of a cluster-state update message.
pub const QUEUE_OPERATION: &str = "operation";

/// An ordered, flat property map.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeProps(BTreeMap<String, Value>);

impl NodeProps {
    /// Creates an empty message.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a message from string pairs.
    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
    {
        Self(pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }

    /// Returns the value of `key` if it is a string.
    #[must_use]
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    /// Returns `key` as a boolean, accepting `true`/`false` and their string forms.
    #[must_use]
    pub fn get_bool(&self, key: &str, default: bool) -> bool {
        match self.0.get(key) {
            Some(Value::Bool(b)) => *b,
            Some(Value::String(s)) => s.parse().unwrap_or(default),
            _ => default,
        }
    }

    /// Returns the raw value of `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Returns true if `key` is present.
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Sets `key`, replacing any previous value.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    /// Returns a copy with `key` set. A `None` value removes the key.
    #[must_use]
    pub fn plus(mut self, key: impl Into<String>, value: Option<impl Into<Value>>) -> Self {
        let key = key.into();
        match value {
            Some(value) => {
                self.0.insert(key, value.into());
            },
            None => {
                self.0.remove(&key);
            },
        }
        self
    }

    /// Returns a copy with every entry of `other` merged over this message.
    #[must_use]
    pub fn plus_all(mut self, other: &NodeProps) -> Self {
        self.0.extend(other.0.iter().map(|(k, v)| (k.clone(), v.clone())));
        self
    }

    /// Iterates entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if the message has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Serializes the message to JSON bytes.
    ///
    /// # Errors
    ///
    /// Returns the serializer error; a map of JSON values cannot normally fail.
    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    /// Parses a message from JSON bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if `bytes` is not a JSON object.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for NodeProps {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self::from_pairs(iter)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_get_bool_accepts_strings_and_defaults() {
        let props = NodeProps::from_pairs([(FOLLOW_ALIASES, "true")]);
        assert!(props.get_bool(FOLLOW_ALIASES, false));

        let props = NodeProps::from_pairs([(FOLLOW_ALIASES, Value::Bool(false))]);
        assert!(!props.get_bool(FOLLOW_ALIASES, true));

        assert!(NodeProps::new().get_bool(FOLLOW_ALIASES, true));
        let props = NodeProps::from_pairs([(FOLLOW_ALIASES, "maybe")]);
        assert!(!props.get_bool(FOLLOW_ALIASES, false));
    }

    #[test]
    fn test_plus_overrides_and_none_removes() {
        let base = NodeProps::from_pairs([(COLLECTION_PROP, "c1"), (ASYNC, "old")]);
        let next = base.clone().plus(PARALLEL, Some("true")).plus(ASYNC, None::<String>);

        assert_eq!(next.get_str(PARALLEL), Some("true"));
        assert!(!next.contains_key(ASYNC));
        assert_eq!(base.get_str(ASYNC), Some("old"));
    }

    #[test]
    fn test_plus_all_merges_over_existing_entries() {
        let descriptor = NodeProps::from_pairs([(COLLECTION_PROP, "c1"), (CORE_NAME_PROP, "core")]);
        let message = NodeProps::from_pairs([(COLLECTION_PROP, "alias"), ("extra", "x")]);

        let merged = descriptor.plus_all(&message);
        assert_eq!(merged.get_str(COLLECTION_PROP), Some("alias"));
        assert_eq!(merged.get_str(CORE_NAME_PROP), Some("core"));
        assert_eq!(merged.get_str("extra"), Some("x"));
    }

    #[test]
    fn test_bytes_round_trip() {
        let props = NodeProps::from_pairs([(QUEUE_OPERATION, "deleteshard"), (SHARD_ID_PROP, "s1")]);
        let back = NodeProps::from_bytes(&props.to_bytes().unwrap()).unwrap();
        assert_eq!(back, props);
    }
}
