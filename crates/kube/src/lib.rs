//! Manifest templating for avp
//!
//! ## Key Components
//!
//! - **`pipeline`**: login once, then template and serialize every manifest in
//!   input order, skipping those carrying the ignore annotation.
//! - **`template`**: the substitution walk over one manifest.
//! - **`placeholder`** and **`modifiers`**: the `<...>` syntax and the value
//!   transformations it can name.
//! - **`validation`**: the optional secret path restriction.

pub mod modifiers;
pub mod pipeline;
pub mod placeholder;
pub mod template;
pub mod validation;

pub use modifiers::Modifier;
pub use pipeline::{process_manifests, Pipeline};
pub use placeholder::{Placeholder, Reference};
pub use template::Template;
pub use validation::PathValidator;
