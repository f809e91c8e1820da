//! Centralized configuration for avp
//!
//! `Config` is the single source of truth for one run. It is built once by
//! the [`ConfigLoader`](crate::ConfigLoader) and never mutated afterwards.

use crate::settings::Settings;
use avp_core::constants::*;
use avp_core::{parse_bool_or_default, Error, Result};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Immutable configuration for one pipeline run
#[derive(Debug, Clone)]
pub struct Config {
    /// Regular expression every secret path must match, if set
    pub path_validation: Option<String>,

    /// Absolute base directory for file-based secret sources
    pub secret_dir: PathBuf,

    /// Whether diagnostic output (including sensitive values) is enabled
    pub verbose: bool,

    /// Which backend to talk to and how
    pub backend: BackendSettings,
}

/// Backend selection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendSettings {
    /// HashiCorp Vault KV engine
    Vault(VaultSettings),
    /// Plain YAML/JSON files below the secret directory
    File { root: PathBuf },
}

impl BackendSettings {
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            BackendSettings::Vault(_) => "vault",
            BackendSettings::File { .. } => "file",
        }
    }
}

/// Vault connection settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VaultSettings {
    pub address: String,
    pub namespace: Option<String>,
    pub auth: AuthMethod,
    pub kv_version: KvVersion,
    pub ca_cert: Option<PathBuf>,
    pub skip_verify: bool,
    pub timeout: Duration,
}

/// How the Vault backend obtains a token
#[derive(Clone, PartialEq, Eq)]
pub enum AuthMethod {
    Token {
        token: String,
    },
    AppRole {
        role_id: String,
        secret_id: String,
        mount_path: String,
    },
    Kubernetes {
        role: String,
        mount_path: String,
        token_path: PathBuf,
    },
}

// Credentials are redacted
impl fmt::Debug for AuthMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthMethod::Token { .. } => f.debug_struct("Token").finish_non_exhaustive(),
            AuthMethod::AppRole { mount_path, .. } => f
                .debug_struct("AppRole")
                .field("mount_path", mount_path)
                .finish_non_exhaustive(),
            AuthMethod::Kubernetes {
                role,
                mount_path,
                token_path,
            } => f
                .debug_struct("Kubernetes")
                .field("role", role)
                .field("mount_path", mount_path)
                .field("token_path", token_path)
                .finish(),
        }
    }
}

impl AuthMethod {
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            AuthMethod::Token { .. } => "token",
            AuthMethod::AppRole { .. } => "approle",
            AuthMethod::Kubernetes { .. } => "k8s",
        }
    }
}

/// Version of the Vault KV secrets engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KvVersion {
    V1,
    V2,
}

impl KvVersion {
    pub fn parse(value: &str) -> Result<Self> {
        match value.trim() {
            "1" => Ok(KvVersion::V1),
            "2" => Ok(KvVersion::V2),
            other => Err(Error::configuration(format!(
                "unsupported KV version '{other}', expected 1 or 2"
            ))),
        }
    }
}

impl Config {
    /// Build the configuration from merged settings.
    ///
    /// `secret_dir` must already be resolved to an absolute path.
    pub fn from_settings(settings: &Settings, secret_dir: PathBuf, verbose: bool) -> Result<Self> {
        let backend = match settings.get_or(ENV_AVP_TYPE, "vault") {
            "vault" => BackendSettings::Vault(vault_settings(settings)?),
            "file" => BackendSettings::File {
                root: secret_dir.clone(),
            },
            other => {
                return Err(Error::configuration(format!(
                    "unsupported backend type '{other}' in {ENV_AVP_TYPE}, expected vault or file"
                )))
            }
        };

        Ok(Self {
            path_validation: settings.get(ENV_AVP_PATH_VALIDATION).map(str::to_string),
            secret_dir,
            verbose,
            backend,
        })
    }
}

fn vault_settings(settings: &Settings) -> Result<VaultSettings> {
    let address = required(settings, ENV_VAULT_ADDR, "the vault backend")?;

    let auth = match settings.get_or(ENV_AVP_AUTH_TYPE, "token") {
        "token" => AuthMethod::Token {
            token: required(settings, ENV_VAULT_TOKEN, "token authentication")?,
        },
        "approle" => AuthMethod::AppRole {
            role_id: required(settings, ENV_AVP_ROLE_ID, "approle authentication")?,
            secret_id: required(settings, ENV_AVP_SECRET_ID, "approle authentication")?,
            mount_path: settings
                .get_or(ENV_AVP_MOUNT_PATH, DEFAULT_APPROLE_MOUNT_PATH)
                .to_string(),
        },
        "k8s" => AuthMethod::Kubernetes {
            role: required(settings, ENV_AVP_K8S_ROLE, "k8s authentication")?,
            mount_path: settings
                .get_or(ENV_AVP_K8S_MOUNT_PATH, DEFAULT_K8S_MOUNT_PATH)
                .to_string(),
            token_path: expand_home(settings.get_or(ENV_AVP_K8S_TOKEN_PATH, DEFAULT_K8S_TOKEN_PATH)),
        },
        other => {
            return Err(Error::configuration(format!(
                "unsupported auth type '{other}' in {ENV_AVP_AUTH_TYPE}, expected token, approle or k8s"
            )))
        }
    };

    let timeout = match settings.get(ENV_AVP_HTTP_TIMEOUT_SECS) {
        Some(raw) => raw
            .parse::<u64>()
            .ok()
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
            .ok_or_else(|| {
                Error::configuration(format!(
                    "{ENV_AVP_HTTP_TIMEOUT_SECS} must be a positive number of seconds, got '{raw}'"
                ))
            })?,
        None => Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
    };

    Ok(VaultSettings {
        address: address.trim_end_matches('/').to_string(),
        namespace: settings.get(ENV_VAULT_NAMESPACE).map(str::to_string),
        auth,
        kv_version: KvVersion::parse(settings.get_or(ENV_AVP_KV_VERSION, DEFAULT_KV_VERSION))?,
        ca_cert: settings.get(ENV_VAULT_CACERT).map(expand_home),
        skip_verify: settings
            .get(ENV_VAULT_SKIP_VERIFY)
            .map(parse_bool_or_default)
            .unwrap_or(false),
        timeout,
    })
}

fn required(settings: &Settings, key: &str, purpose: &str) -> Result<String> {
    settings
        .get(key)
        .map(str::to_string)
        .ok_or_else(|| Error::configuration(format!("{key} is required for {purpose}")))
}

/// Expand a leading `~/` to the user's home directory
fn expand_home(path: &str) -> PathBuf {
    match path.strip_prefix("~/") {
        Some(rest) => dirs::home_dir()
            .map(|home| home.join(rest))
            .unwrap_or_else(|| PathBuf::from(path)),
        None => PathBuf::from(path),
    }
}
