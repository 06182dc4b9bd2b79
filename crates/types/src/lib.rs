//! Core types, messages, and errors for shardkeeper.
//!
//! This crate provides the foundational types shared by every other crate:
//! - The cluster data model (collections, slices, replicas, hash ranges)
//! - Property messages exchanged with the coordination store and the overseer
//! - The ordered results envelope returned by collection commands
//! - Cluster-state mutation messages
//! - Coordination-store path layout
//! - Error types using snafu
//! - Configuration structs with validating builders

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod mutation;
pub mod paths;
pub mod props;
pub mod results;
pub mod types;

// Re-export commonly used types at crate root
pub use error::{CommandError, ErrorCode, Result};
pub use mutation::{ClusterStateMutation, MessageError};
pub use props::NodeProps;
pub use results::{CommandResults, ResultValue};
pub use types::*;
