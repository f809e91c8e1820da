//! Configuration loading and management for avp
//!
//! Configuration is read once per run from the process environment, an
//! optional config file and command-line flags, and handed around as an
//! immutable [`Config`].

pub mod config;
pub mod loader;
pub mod settings;

#[cfg(test)]
mod config_tests;

pub use config::*;
pub use loader::*;
pub use settings::Settings;
