//! The `avp` command line
//!
//! Loads configuration, discovers manifests, and runs them through the
//! secret substitution pipeline of `avp-kube`.

pub mod commands;
mod execute;
pub mod manifests;

pub use commands::Commands;
