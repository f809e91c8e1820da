//! Configuration loader for avp
//!
//! Layers, lowest precedence first: process environment, the optional config
//! file, then command-line flags. `AVP_SECRET_DIR` from the first two layers
//! overrides the `--secret-dir` flag.

use crate::{config::Config, settings::Settings};
use avp_core::{constants::ENV_AVP_SECRET_DIR, Error, Result};
use avp_utils::paths::{detect_git_root, resolve_secret_dir};
use std::path::PathBuf;

/// Configuration loader that handles all startup configuration
pub struct ConfigLoader {
    /// Optional config file (YAML, JSON or env file)
    config_path: Option<PathBuf>,
    /// Secret directory given on the command line
    secret_dir: Option<String>,
    /// Verbose diagnostics
    verbose: bool,
    /// Working directory, defaults to the process working directory
    working_dir: Option<PathBuf>,
    /// Environment snapshot, defaults to the process environment
    environment: Option<Vec<(String, String)>>,
}

impl ConfigLoader {
    /// Create a new configuration loader
    pub fn new() -> Self {
        Self {
            config_path: None,
            secret_dir: None,
            verbose: false,
            working_dir: None,
            environment: None,
        }
    }

    /// Read additional settings from a config file
    pub fn config_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_path = Some(path.into());
        self
    }

    /// Set the secret directory flag value
    pub fn secret_dir(mut self, dir: impl Into<String>) -> Self {
        self.secret_dir = Some(dir.into());
        self
    }

    /// Enable verbose diagnostics
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Resolve relative paths against `dir` instead of the process cwd
    pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Use an explicit environment instead of the process environment
    pub fn environment<I, K, V>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.environment = Some(
            vars.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        );
        self
    }

    /// Load the configuration
    pub fn load(self) -> Result<Config> {
        let working_dir = match self.working_dir {
            Some(dir) => dir,
            None => std::env::current_dir().map_err(|e| {
                Error::configuration(format!("could not get current working directory: {e}"))
            })?,
        };

        let mut settings = match self.environment {
            Some(vars) => Settings::from_env_vars(vars),
            None => Settings::from_env_vars(std::env::vars()),
        };

        if let Some(path) = &self.config_path {
            let path = if path.is_absolute() {
                path.clone()
            } else {
                working_dir.join(path)
            };
            tracing::debug!(path = %path.display(), "reading config file");
            settings.merge(Settings::from_file(&path)?);
        }

        let configured_dir = settings
            .get(ENV_AVP_SECRET_DIR)
            .map(str::to_string)
            .or(self.secret_dir)
            .unwrap_or_default();
        let secret_dir = resolve_secret_dir(&configured_dir, &working_dir, detect_git_root)?;
        tracing::debug!(secret_dir = %secret_dir.display(), "resolved secret directory");

        Config::from_settings(&settings, secret_dir, self.verbose)
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}
