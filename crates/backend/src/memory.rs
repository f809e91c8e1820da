use crate::Backend;
use async_trait::async_trait;
use avp_core::{Annotations, Error, Result, SecretMap};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Backend serving a fixed set of secrets from memory.
///
/// Useful for embedding and tests: it counts logins and lookups and can be
/// told to reject the login.
#[derive(Debug, Default)]
pub struct InMemoryBackend {
    secrets: BTreeMap<String, SecretMap>,
    login_error: Option<String>,
    logged_in: bool,
    logins: Arc<AtomicUsize>,
    lookups: Arc<AtomicUsize>,
}

impl InMemoryBackend {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `value` under `key` at `path`
    #[must_use]
    pub fn with_secret(
        mut self,
        path: impl Into<String>,
        key: impl Into<String>,
        value: impl Into<Value>,
    ) -> Self {
        self.secrets
            .entry(path.into())
            .or_default()
            .insert(key.into(), value.into());
        self
    }

    /// Make `login` fail with an authentication error
    #[must_use]
    pub fn with_login_error(mut self, message: impl Into<String>) -> Self {
        self.login_error = Some(message.into());
        self
    }

    /// Shared counter of `login` calls
    #[must_use]
    pub fn login_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.logins)
    }

    #[must_use]
    pub fn lookup_count(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Backend for InMemoryBackend {
    fn name(&self) -> &str {
        "memory"
    }

    async fn login(&mut self) -> Result<()> {
        self.logins.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = &self.login_error {
            return Err(Error::authentication("memory", message.clone()));
        }
        self.logged_in = true;
        Ok(())
    }

    async fn lookup(
        &self,
        path: &str,
        _version: Option<&str>,
        _annotations: &Annotations,
    ) -> Result<SecretMap> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        if !self.logged_in {
            return Err(Error::backend("memory", "lookup before login"));
        }
        self.secrets
            .get(path)
            .cloned()
            .ok_or_else(|| Error::secret_not_found(path))
    }
}
