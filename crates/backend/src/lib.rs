//! Secret backends for avp
//!
//! A backend is a capability with two required operations: `login`, called
//! exactly once per run, and `lookup`, which returns every secret stored at a
//! path. Concrete stores vary independently of the manifest pipeline.

mod file;
mod memory;
mod vault;

pub use file::FileBackend;
pub use memory::InMemoryBackend;
pub use vault::VaultBackend;

use async_trait::async_trait;
use avp_config::{BackendSettings, Config};
use avp_core::{Annotations, Result, SecretMap};

/// Trait for secret stores that placeholders are resolved against
#[async_trait]
pub trait Backend: Send + Sync {
    /// Name used in diagnostics and error messages
    fn name(&self) -> &str {
        "backend"
    }

    /// Authenticate against the store.
    ///
    /// Called exactly once, before any lookup.
    async fn login(&mut self) -> Result<()>;

    /// Fetch every secret stored at `path`
    ///
    /// # Arguments
    /// * `path` - Store-specific secret path
    /// * `version` - Requested secret version, `None` for the latest
    /// * `annotations` - Annotations of the manifest being processed, for
    ///   per-manifest backend options
    async fn lookup(
        &self,
        path: &str,
        version: Option<&str>,
        annotations: &Annotations,
    ) -> Result<SecretMap>;
}

/// Construct the backend selected by the configuration
pub fn build_backend(config: &Config) -> Result<Box<dyn Backend>> {
    tracing::debug!(backend = config.backend.name(), "building secret backend");
    match &config.backend {
        BackendSettings::Vault(settings) => Ok(Box::new(VaultBackend::new(settings.clone())?)),
        BackendSettings::File { root } => Ok(Box::new(FileBackend::new(root.clone()))),
    }
}
