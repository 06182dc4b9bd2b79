//! shardkeeper server library.
//!
//! Provides the pieces behind the `shardkeeper` binary: configuration and
//! CLI parsing, the snapshot-backed command runner, and signal handling.

#![deny(unsafe_code)]

pub mod config;
pub mod runner;
pub mod shutdown;
