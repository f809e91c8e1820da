//! Network-related utilities.
//!
//! - **`retry`**: exponential backoff retry for transient failures of remote
//!   secret stores.

pub mod retry;

pub use retry::{retry_async, RetryConfig, RetryableError};
