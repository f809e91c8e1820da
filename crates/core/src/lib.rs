//! Core domain types, errors, and constants for `avp`.
//!
//! ## Key Components
//!
//! - **`errors`**: the workspace-wide `Error` enum, the `Result` alias and the
//!   `ErrorList` accumulator used where several failures are reported at once.
//! - **`types`**: the `Manifest` wrapper around one structured document and the
//!   `SecretMap`/`Annotations` aliases shared by backends and templates.
//! - **`constants`**: annotation keys, environment variable names and the
//!   output document separator.

pub mod constants;
pub mod errors;
pub mod types;

pub use self::{
    constants::*,
    errors::{Error, ErrorList, Result},
    types::*,
};
