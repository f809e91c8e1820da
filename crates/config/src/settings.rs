//! Raw key/value settings gathered from the environment and config files

use avp_core::{Error, Result, CONFIG_KEYS};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;

/// Flat `KEY -> value` settings, later layers overriding earlier ones
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Settings(BTreeMap<String, String>);

impl Settings {
    #[must_use]
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Keep only the recognised keys from a set of environment variables
    pub fn from_env_vars<I, K, V>(vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let map = vars
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .filter(|(k, _)| CONFIG_KEYS.contains(&k.as_str()))
            .collect();
        Self(map)
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    /// The trimmed value for `key`, treating blank values as unset
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .get(key)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    #[must_use]
    pub fn get_or<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.get(key).unwrap_or(default)
    }

    /// Overlay another layer on top of this one
    pub fn merge(&mut self, other: Settings) {
        self.0.extend(other.0);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Read a config file. The format follows the extension: `.yaml`/`.yml`
    /// and `.json` are mappings of scalar values, anything else is parsed as
    /// an env file (`KEY=value` lines).
    pub fn from_file(path: &Path) -> Result<Self> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);

        match extension.as_deref() {
            Some("yaml") | Some("yml") => {
                let text = std::fs::read_to_string(path)
                    .map_err(|e| Error::file_system(path, "read", e))?;
                let value: Value = serde_yaml::from_str(&text)
                    .map_err(|e| Error::parse(path.display().to_string(), e.to_string()))?;
                Self::from_value(path, value)
            }
            Some("json") => {
                let text = std::fs::read_to_string(path)
                    .map_err(|e| Error::file_system(path, "read", e))?;
                let value: Value = serde_json::from_str(&text)
                    .map_err(|e| Error::parse(path.display().to_string(), e.to_string()))?;
                Self::from_value(path, value)
            }
            _ => Self::from_env_file(path),
        }
    }

    fn from_env_file(path: &Path) -> Result<Self> {
        let iter = dotenvy::from_path_iter(path).map_err(|e| {
            Error::parse(path.display().to_string(), format!("invalid env file: {e}"))
        })?;
        let mut settings = Self::new();
        for item in iter {
            let (key, value) = item.map_err(|e| {
                Error::parse(path.display().to_string(), format!("invalid env file: {e}"))
            })?;
            settings.set(key, value);
        }
        Ok(settings)
    }

    fn from_value(path: &Path, value: Value) -> Result<Self> {
        let map = match value {
            Value::Object(map) => map,
            Value::Null => return Ok(Self::new()),
            _ => {
                return Err(Error::parse(
                    path.display().to_string(),
                    "config file must contain a mapping of keys to values",
                ))
            }
        };

        let mut settings = Self::new();
        for (key, value) in map {
            let value = match value {
                Value::String(s) => s,
                Value::Bool(b) => b.to_string(),
                Value::Number(n) => n.to_string(),
                Value::Null => String::new(),
                Value::Array(_) | Value::Object(_) => {
                    return Err(Error::parse(
                        path.display().to_string(),
                        format!("value for '{key}' must be a scalar"),
                    ))
                }
            };
            settings.set(key, value);
        }
        Ok(settings)
    }
}
