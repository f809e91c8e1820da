use avp_core::constants::ENV_AVP_PATH_VALIDATION;
use avp_core::{Error, Result};
use regex::Regex;

/// Restricts which secret paths placeholders may read from.
///
/// Compiled once per run from `AVP_PATH_VALIDATION` and shared by every
/// template. A path outside the pattern is a hard error.
#[derive(Debug, Clone)]
pub struct PathValidator {
    regex: Regex,
}

impl PathValidator {
    /// Compile an optional pattern; `None` and blank patterns allow every path
    pub fn compile(pattern: Option<&str>) -> Result<Option<Self>> {
        match pattern.map(str::trim) {
            None | Some("") => Ok(None),
            Some(pattern) => Self::new(pattern).map(Some),
        }
    }

    pub fn new(pattern: &str) -> Result<Self> {
        let regex = Regex::new(pattern).map_err(|e| {
            Error::configuration(format!(
                "invalid {ENV_AVP_PATH_VALIDATION} pattern '{pattern}': {e}"
            ))
        })?;
        Ok(Self { regex })
    }

    #[must_use]
    pub fn pattern(&self) -> &str {
        self.regex.as_str()
    }

    #[must_use]
    pub fn is_allowed(&self, path: &str) -> bool {
        self.regex.is_match(path)
    }

    /// `Ok(())` when `path` matches, `PathDisallowed` otherwise
    pub fn check(&self, path: &str) -> Result<()> {
        if self.is_allowed(path) {
            Ok(())
        } else {
            Err(Error::path_disallowed(path, self.pattern()))
        }
    }
}

/// Check `path` against an optional validator
pub(crate) fn check_path(validator: Option<&PathValidator>, path: &str) -> Result<()> {
    validator.map_or(Ok(()), |v| v.check(path))
}
