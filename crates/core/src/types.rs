use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;

use crate::constants::AVP_IGNORE_ANNOTATION;
use crate::errors::{Error, Result};

/// Secrets returned by a backend for one path, keyed by secret name
pub type SecretMap = BTreeMap<String, Value>;

/// String annotations read from `metadata.annotations`
pub type Annotations = BTreeMap<String, String>;

/// One structured manifest held as a JSON-compatible tree.
///
/// The root is always a mapping. Keys are kept sorted, which makes the YAML
/// produced by [`Manifest::to_yaml`] canonical for a given tree.
#[derive(Debug, Clone, PartialEq)]
pub struct Manifest(Map<String, Value>);

impl Manifest {
    /// Wrap a parsed document, rejecting anything but a mapping
    pub fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            other => Err(Error::parse(
                "manifest",
                format!("expected a mapping at the document root, found {}", kind_of(&other)),
            )),
        }
    }

    /// Parse a single YAML (or JSON) document
    pub fn from_yaml(source: &str) -> Result<Self> {
        let value: Value = serde_yaml::from_str(source)
            .map_err(|e| Error::parse("manifest", e.to_string()))?;
        Self::from_value(value)
    }

    #[must_use]
    pub fn kind(&self) -> &str {
        self.0.get("kind").and_then(Value::as_str).unwrap_or_default()
    }

    #[must_use]
    pub fn name(&self) -> &str {
        self.metadata()
            .and_then(|m| m.get("name"))
            .and_then(Value::as_str)
            .unwrap_or_default()
    }

    #[must_use]
    pub fn namespace(&self) -> Option<&str> {
        self.metadata()
            .and_then(|m| m.get("namespace"))
            .and_then(Value::as_str)
    }

    /// String-valued annotations; non-string entries are skipped
    #[must_use]
    pub fn annotations(&self) -> Annotations {
        self.metadata()
            .and_then(|m| m.get("annotations"))
            .and_then(Value::as_object)
            .map(|annotations| {
                annotations
                    .iter()
                    .filter_map(|(k, v)| v.as_str().map(|v| (k.clone(), v.to_string())))
                    .collect()
            })
            .unwrap_or_default()
    }

    #[must_use]
    pub fn annotation(&self, key: &str) -> Option<&str> {
        self.metadata()
            .and_then(|m| m.get("annotations"))
            .and_then(|a| a.get(key))
            .and_then(Value::as_str)
    }

    /// Whether the ignore annotation is set to a true boolean.
    ///
    /// Unparsable values count as `false` so a typo never aborts a run.
    #[must_use]
    pub fn is_ignored(&self) -> bool {
        self.annotation(AVP_IGNORE_ANNOTATION)
            .map(parse_bool_or_default)
            .unwrap_or(false)
    }

    /// `namespace.name` identity used in diagnostics
    #[must_use]
    pub fn identity(&self) -> String {
        format!("{}.{}", self.namespace().unwrap_or_default(), self.name())
    }

    #[must_use]
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn as_map_mut(&mut self) -> &mut Map<String, Value> {
        &mut self.0
    }

    /// Canonical YAML text of the manifest, ending with a newline
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(&self.0).map_err(Error::from)
    }

    fn metadata(&self) -> Option<&Map<String, Value>> {
        self.0.get("metadata").and_then(Value::as_object)
    }
}

impl fmt::Display for Manifest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.identity())
    }
}

/// Boolean parsing with the accepted spellings of Go's `strconv.ParseBool`,
/// falling back to `false` for anything else.
#[must_use]
pub fn parse_bool_or_default(value: &str) -> bool {
    matches!(value, "1" | "t" | "T" | "TRUE" | "true" | "True")
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a sequence",
        Value::Object(_) => "a mapping",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEPLOYMENT: &str = r#"
apiVersion: apps/v1
kind: Deployment
metadata:
  name: web
  namespace: prod
  annotations:
    avp.kubernetes.io/path: secret/data/web
    replicas-hint: 3
spec:
  replicas: 2
"#;

    #[test]
    fn test_manifest_accessors() {
        let manifest = Manifest::from_yaml(DEPLOYMENT).unwrap();
        assert_eq!(manifest.kind(), "Deployment");
        assert_eq!(manifest.name(), "web");
        assert_eq!(manifest.namespace(), Some("prod"));
        assert_eq!(manifest.identity(), "prod.web");

        let annotations = manifest.annotations();
        assert_eq!(annotations.len(), 1);
        assert_eq!(
            annotations.get("avp.kubernetes.io/path").map(String::as_str),
            Some("secret/data/web")
        );
    }

    #[test]
    fn test_manifest_without_metadata() {
        let manifest = Manifest::from_yaml("kind: ConfigMap\n").unwrap();
        assert_eq!(manifest.name(), "");
        assert_eq!(manifest.namespace(), None);
        assert!(manifest.annotations().is_empty());
        assert!(!manifest.is_ignored());
    }

    #[test]
    fn test_non_mapping_document_is_rejected() {
        let err = Manifest::from_yaml("- a\n- b\n").unwrap_err();
        assert!(err.to_string().contains("found a sequence"));
    }

    #[test]
    fn test_parse_bool_or_default() {
        for truthy in ["1", "t", "T", "true", "TRUE", "True"] {
            assert!(parse_bool_or_default(truthy), "{truthy}");
        }
        for falsy in ["0", "false", "no", "yes", "", "tru", " true"] {
            assert!(!parse_bool_or_default(falsy), "{falsy}");
        }
    }

    #[test]
    fn test_ignore_annotation() {
        let ignored = Manifest::from_yaml(
            "kind: Secret\nmetadata:\n  name: s\n  annotations:\n    avp.kubernetes.io/ignore: \"true\"\n",
        )
        .unwrap();
        assert!(ignored.is_ignored());

        let malformed = Manifest::from_yaml(
            "kind: Secret\nmetadata:\n  name: s\n  annotations:\n    avp.kubernetes.io/ignore: \"maybe\"\n",
        )
        .unwrap();
        assert!(!malformed.is_ignored());
    }

    #[test]
    fn test_to_yaml_sorts_keys() {
        let manifest = Manifest::from_yaml("kind: ConfigMap\napiVersion: v1\ndata:\n  b: '2'\n  a: '1'\n").unwrap();
        assert_eq!(
            manifest.to_yaml().unwrap(),
            "apiVersion: v1\ndata:\n  a: '1'\n  b: '2'\nkind: ConfigMap\n"
        );
    }
}
