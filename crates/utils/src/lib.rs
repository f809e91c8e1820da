//! Shared utilities and pure functions for avp
//!
//! This crate provides common utility functions that are used throughout
//! the avp workspace. Path helpers are pure apart from the filesystem probes
//! needed to find a repository root.

pub mod network;
pub mod paths;
pub mod tracing;

pub use network::*;
pub use paths::*;
