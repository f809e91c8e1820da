use std::fmt;
use std::path::PathBuf;

/// Result type alias for avp operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for avp operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid or missing configuration
    #[error("configuration error: {message}")]
    Configuration { message: String },

    /// Manifest discovery failures (no files, unreadable input)
    #[error("{message}")]
    Discovery { message: String },

    /// File system operations
    #[error("file system {operation} operation failed for '{path}': {source}")]
    FileSystem {
        path: PathBuf,
        operation: String,
        #[source]
        source: std::io::Error,
    },

    /// A document could not be parsed as YAML or JSON
    #[error("failed to parse '{origin}': {message}")]
    Parse { origin: String, message: String },

    /// Backend login failures
    #[error("{backend} authentication failed: {message}")]
    Authentication { backend: String, message: String },

    /// Non-transient backend failures
    #[error("{backend} backend error: {message}")]
    Backend { backend: String, message: String },

    /// Transient network failures, eligible for retry
    #[error("network error for '{endpoint}': {message}")]
    Network { endpoint: String, message: String },

    /// The backend has nothing at the requested path or key
    #[error("{}", format_not_found(.path, .key))]
    SecretNotFound { path: String, key: Option<String> },

    /// A secret path rejected by the configured path validation pattern
    #[error("the path {path} is disallowed by AVP_PATH_VALIDATION restriction {pattern}")]
    PathDisallowed { path: String, pattern: String },

    /// Malformed placeholder syntax
    #[error("invalid placeholder '{placeholder}': {message}")]
    Placeholder { placeholder: String, message: String },

    /// A placeholder modifier could not be applied
    #[error("modifier '{modifier}' failed: {message}")]
    Modifier { modifier: String, message: String },

    /// Every substitution failure recorded while walking one manifest
    #[error("could not replace all placeholders in {manifest}:\n{errors}")]
    Replacement { manifest: String, errors: ErrorList },

    /// Several independent failures reported as one
    #[error("{context}:\n{errors}")]
    Aggregate { context: String, errors: ErrorList },

    /// YAML or JSON serialization failures
    #[error("serialization error: {message}")]
    Serialization { message: String },
}

fn format_not_found(path: &str, key: &Option<String>) -> String {
    match key {
        Some(key) => format!("could not find secret key '{key}' at path {path}"),
        None => format!("could not find secrets at path {path}"),
    }
}

// Conversion implementations
impl From<std::io::Error> for Error {
    fn from(error: std::io::Error) -> Self {
        Error::FileSystem {
            path: PathBuf::new(),
            operation: "unknown".to_string(),
            source: error,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(error: serde_json::Error) -> Self {
        Error::Serialization {
            message: error.to_string(),
        }
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(error: serde_yaml::Error) -> Self {
        Error::Serialization {
            message: error.to_string(),
        }
    }
}

// Helper methods for creating errors with context
impl Error {
    /// Create a configuration error
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Error::Configuration {
            message: message.into(),
        }
    }

    /// Create a discovery error
    #[must_use]
    pub fn discovery(message: impl Into<String>) -> Self {
        Error::Discovery {
            message: message.into(),
        }
    }

    /// Create a file system error with context
    #[must_use]
    pub fn file_system(
        path: impl Into<PathBuf>,
        operation: impl Into<String>,
        source: std::io::Error,
    ) -> Self {
        Error::FileSystem {
            path: path.into(),
            operation: operation.into(),
            source,
        }
    }

    /// Create a parse error for the named input
    #[must_use]
    pub fn parse(origin: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Parse {
            origin: origin.into(),
            message: message.into(),
        }
    }

    /// Create an authentication error
    #[must_use]
    pub fn authentication(backend: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Authentication {
            backend: backend.into(),
            message: message.into(),
        }
    }

    /// Create a backend error
    #[must_use]
    pub fn backend(backend: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Backend {
            backend: backend.into(),
            message: message.into(),
        }
    }

    /// Create a network error
    #[must_use]
    pub fn network(endpoint: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Network {
            endpoint: endpoint.into(),
            message: message.into(),
        }
    }

    /// Nothing stored at `path`
    #[must_use]
    pub fn secret_not_found(path: impl Into<String>) -> Self {
        Error::SecretNotFound {
            path: path.into(),
            key: None,
        }
    }

    /// `key` missing from the secrets stored at `path`
    #[must_use]
    pub fn secret_key_not_found(path: impl Into<String>, key: impl Into<String>) -> Self {
        Error::SecretNotFound {
            path: path.into(),
            key: Some(key.into()),
        }
    }

    /// Create a path validation error
    #[must_use]
    pub fn path_disallowed(path: impl Into<String>, pattern: impl Into<String>) -> Self {
        Error::PathDisallowed {
            path: path.into(),
            pattern: pattern.into(),
        }
    }

    /// Create a placeholder syntax error
    #[must_use]
    pub fn placeholder(placeholder: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Placeholder {
            placeholder: placeholder.into(),
            message: message.into(),
        }
    }

    /// Create a modifier error
    #[must_use]
    pub fn modifier(modifier: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Modifier {
            modifier: modifier.into(),
            message: message.into(),
        }
    }

    /// Whether retrying the failed operation may succeed
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Error::Network { .. } => true,
            Error::FileSystem { source, .. } => matches!(
                source.kind(),
                std::io::ErrorKind::Interrupted | std::io::ErrorKind::TimedOut
            ),
            _ => false,
        }
    }
}

/// Accumulates errors instead of stopping at the first one.
///
/// Used where every failure should be reported together, such as reading a
/// directory of manifests or replacing all placeholders of one manifest.
#[derive(Debug, Default)]
pub struct ErrorList(Vec<Error>);

impl ErrorList {
    #[must_use]
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn push(&mut self, error: Error) {
        self.0.push(error);
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Error> {
        self.0.iter()
    }

    /// Record the error of `result`, if any, and return its value
    pub fn collect<T>(&mut self, result: Result<T>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(error) => {
                self.push(error);
                None
            }
        }
    }

    /// `Ok(value)` when nothing was recorded, otherwise one `Aggregate` error
    pub fn into_result<T>(self, context: impl Into<String>, value: T) -> Result<T> {
        if self.is_empty() {
            Ok(value)
        } else {
            Err(Error::Aggregate {
                context: context.into(),
                errors: self,
            })
        }
    }
}

impl fmt::Display for ErrorList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for error in &self.0 {
            if !first {
                writeln!(f)?;
            }
            write!(f, "{error}")?;
            first = false;
        }
        Ok(())
    }
}

impl IntoIterator for ErrorList {
    type Item = Error;
    type IntoIter = std::vec::IntoIter<Error>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl From<Vec<Error>> for ErrorList {
    fn from(errors: Vec<Error>) -> Self {
        Self(errors)
    }
}
