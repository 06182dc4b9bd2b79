//! Temporary directory management for tests.
//!
//! [`TestDir`] wraps [`tempfile::TempDir`] with helpers for writing the JSON
//! snapshot and TOML config files the server binary reads.

// Test utilities are expected to panic on failure - that's their purpose
#![allow(clippy::expect_used)]

use std::path::{Path, PathBuf};

use serde::Serialize;
use tempfile::TempDir;

/// A managed temporary directory for tests.
///
/// The directory is automatically cleaned up when this struct is dropped.
///
/// # Example
///
/// ```
/// use shardkeeper_test_utils::TestDir;
///
/// let dir = TestDir::new();
/// let snapshot = dir.write_json("cluster.json", &serde_json::json!({ "live_nodes": ["n1"] }));
/// assert!(snapshot.exists());
/// ```
pub struct TestDir {
    inner: TempDir,
}

impl TestDir {
    /// Create a new temporary directory.
    ///
    /// # Panics
    ///
    /// Panics if the temporary directory cannot be created.
    #[must_use]
    pub fn new() -> Self {
        let inner = TempDir::new().expect("failed to create temp directory");
        Self { inner }
    }

    /// Returns the path to the temporary directory.
    #[must_use]
    pub fn path(&self) -> &Path {
        self.inner.path()
    }

    /// Join a relative path to the temporary directory.
    #[must_use]
    pub fn join<P: AsRef<Path>>(&self, path: P) -> PathBuf {
        self.inner.path().join(path)
    }

    /// Writes `contents` to `name` inside the directory and returns its path.
    ///
    /// # Panics
    ///
    /// Panics if the file cannot be written.
    pub fn write(&self, name: &str, contents: impl AsRef<[u8]>) -> PathBuf {
        let path = self.join(name);
        std::fs::write(&path, contents).expect("failed to write test file");
        path
    }

    /// Serializes `value` as pretty JSON into `name` and returns its path.
    ///
    /// # Panics
    ///
    /// Panics if serialization or the write fails.
    pub fn write_json<T: Serialize>(&self, name: &str, value: &T) -> PathBuf {
        let json = serde_json::to_vec_pretty(value).expect("failed to serialize test file");
        self.write(name, json)
    }
}

impl Default for TestDir {
    fn default() -> Self {
        Self::new()
    }
}
