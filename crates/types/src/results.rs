//! Ordered results envelope returned by collection commands.
//!
//! A [`CommandResults`] is an ordered list of `(key, value)` pairs in which a
//! key may repeat: a command that tears down three replicas appends three
//! `success` entries. Values are either text or a nested envelope.
//!
//! The envelope itself is not synchronized. Commands that append from several
//! tasks wrap it in a mutex.

use serde::{Serialize, Serializer, ser::SerializeMap};

/// Key under which per-replica successes are recorded.
pub const SUCCESS: &str = "success";
/// Key under which per-replica failures are recorded.
pub const FAILURE: &str = "failure";

/// A value stored in a [`CommandResults`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResultValue {
    /// Plain text.
    Text(String),
    /// A nested ordered map.
    Map(CommandResults),
}

impl ResultValue {
    /// Returns the text, if this is a text value.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            Self::Map(_) => None,
        }
    }

    /// Returns the nested map, if this is a map value.
    #[must_use]
    pub fn as_map(&self) -> Option<&CommandResults> {
        match self {
            Self::Map(m) => Some(m),
            Self::Text(_) => None,
        }
    }
}

impl From<String> for ResultValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<&str> for ResultValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<CommandResults> for ResultValue {
    fn from(value: CommandResults) -> Self {
        Self::Map(value)
    }
}

impl Serialize for ResultValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Text(s) => serializer.serialize_str(s),
            Self::Map(m) => m.serialize(serializer),
        }
    }
}

/// Ordered multimap of command results.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandResults {
    entries: Vec<(String, ResultValue)>,
}

impl CommandResults {
    /// Creates an empty envelope.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an entry; earlier entries with the same key are kept.
    pub fn add(&mut self, key: impl Into<String>, value: impl Into<ResultValue>) {
        self.entries.push((key.into(), value.into()));
    }

    /// Returns the first value stored under `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&ResultValue> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Returns every value stored under `key`, in insertion order.
    pub fn get_all<'a>(&'a self, key: &'a str) -> impl Iterator<Item = &'a ResultValue> + 'a {
        self.entries.iter().filter(move |(k, _)| k == key).map(|(_, v)| v)
    }

    /// Counts the entries stored under `key`.
    #[must_use]
    pub fn count(&self, key: &str) -> usize {
        self.get_all(key).count()
    }

    /// Iterates all entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ResultValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Serialized as a JSON object in first-appearance key order. A key stored
/// once maps to its value; a repeated key maps to an array of its values.
impl Serialize for CommandResults {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut keys: Vec<&str> = Vec::new();
        for (k, _) in &self.entries {
            if !keys.contains(&k.as_str()) {
                keys.push(k);
            }
        }

        let mut map = serializer.serialize_map(Some(keys.len()))?;
        for key in keys {
            let values: Vec<&ResultValue> = self.get_all(key).collect();
            match values.as_slice() {
                [single] => map.serialize_entry(key, single)?,
                many => map.serialize_entry(key, many)?,
            }
        }
        map.end()
    }
}
