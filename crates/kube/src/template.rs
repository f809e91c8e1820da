use crate::modifiers::stringify;
use crate::placeholder::{self, Occurrence, Reference};
use crate::validation::{check_path, PathValidator};
use avp_backend::Backend;
use avp_core::{
    parse_bool_or_default, Annotations, Error, ErrorList, Manifest, Result, SecretMap,
    AVP_PATH_ANNOTATION, AVP_REMOVE_MISSING_ANNOTATION, AVP_SECRET_VERSION_ANNOTATION,
};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde_json::{Map, Value};
use std::borrow::Cow;
use std::collections::{BTreeMap, BTreeSet};

/// Secret path plus requested version
type SecretRef = (String, Option<String>);

/// One manifest bound to a backend and an optional path validator.
///
/// Construction reads the manifest annotations and, when
/// `avp.kubernetes.io/path` is set, fetches that secret once. [`replace`]
/// then substitutes every placeholder in the tree.
///
/// [`replace`]: Template::replace
pub struct Template<'a> {
    manifest: Manifest,
    annotations: Annotations,
    backend: &'a dyn Backend,
    validator: Option<&'a PathValidator>,
    path_secrets: Option<PathSecrets>,
    secret_version: Option<String>,
    remove_missing: bool,
}

struct PathSecrets {
    path: String,
    secrets: SecretMap,
}

/// What to do with one string field
enum Substitution {
    Keep,
    Replace(Value),
    Remove,
}

enum Resolution {
    Value(Value),
    /// Bare key absent and `remove-missing` applies
    Missing,
    /// The inline secret could not be fetched; the error is already recorded
    Unavailable,
}

impl<'a> Template<'a> {
    pub async fn new(
        manifest: Manifest,
        backend: &'a dyn Backend,
        validator: Option<&'a PathValidator>,
    ) -> Result<Self> {
        let annotations = manifest.annotations();
        let secret_version = non_empty(&annotations, AVP_SECRET_VERSION_ANNOTATION);
        let remove_missing = matches!(manifest.kind(), "Secret" | "ConfigMap")
            && annotations
                .get(AVP_REMOVE_MISSING_ANNOTATION)
                .is_some_and(|v| parse_bool_or_default(v));

        let path_secrets = match non_empty(&annotations, AVP_PATH_ANNOTATION) {
            Some(path) => {
                check_path(validator, &path)?;
                tracing::debug!(manifest = %manifest, path = %path, "reading secrets for path annotation");
                let secrets = backend
                    .lookup(&path, secret_version.as_deref(), &annotations)
                    .await?;
                Some(PathSecrets { path, secrets })
            }
            None => None,
        };

        Ok(Self {
            manifest,
            annotations,
            backend,
            validator,
            path_secrets,
            secret_version,
            remove_missing,
        })
    }

    /// Substitute every placeholder in the manifest.
    ///
    /// All failures are reported together as one `Replacement` error. On
    /// error the manifest is left exactly as it was.
    pub async fn replace(&mut self) -> Result<()> {
        let mut errors = ErrorList::new();

        let mut inline = BTreeMap::new();
        for (path, version) in self.inline_references() {
            let fetched = match check_path(self.validator, &path) {
                Ok(()) => {
                    self.backend
                        .lookup(&path, version.as_deref(), &self.annotations)
                        .await
                }
                Err(e) => Err(e),
            };
            if let Some(secrets) = errors.collect(fetched) {
                inline.insert((path, version), secrets);
            }
        }

        let mut tree = self.manifest.as_map().clone();
        let replaced = self.walk_map(&mut tree, true, false, &inline, &mut errors);

        if !errors.is_empty() {
            return Err(Error::Replacement {
                manifest: self.manifest.identity(),
                errors,
            });
        }

        tracing::debug!(manifest = %self.manifest, replaced, "replaced placeholders");
        *self.manifest.as_map_mut() = tree;
        Ok(())
    }

    #[must_use]
    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    #[must_use]
    pub fn into_manifest(self) -> Manifest {
        self.manifest
    }

    pub fn to_yaml(&self) -> Result<String> {
        self.manifest.to_yaml()
    }

    fn bare_allowed(&self) -> bool {
        self.path_secrets.is_some()
    }

    fn is_secret(&self) -> bool {
        self.manifest.kind() == "Secret"
    }

    /// Every distinct inline secret the manifest refers to
    fn inline_references(&self) -> BTreeSet<SecretRef> {
        let mut references = BTreeSet::new();
        for (field, value) in self.manifest.as_map() {
            let secret_data = self.is_secret() && field == "data";
            visit_strings(value, &mut |raw: &str| {
                let source = self.source_text(raw, secret_data);
                for occurrence in placeholder::find(&source, self.bare_allowed()) {
                    if let Ok(placeholder) = occurrence.parse() {
                        if let Reference::Inline { path, version, .. } = placeholder.reference {
                            references.insert((path, version.or_else(|| self.secret_version.clone())));
                        }
                    }
                }
            });
        }
        references
    }

    /// Returns the number of fields replaced or removed
    fn walk_map(
        &self,
        map: &mut Map<String, Value>,
        root: bool,
        secret_data: bool,
        inline: &BTreeMap<SecretRef, SecretMap>,
        errors: &mut ErrorList,
    ) -> usize {
        let mut replaced = 0;
        let mut removed = Vec::new();

        for (key, child) in map.iter_mut() {
            let secret_data = secret_data || (root && self.is_secret() && key == "data");
            match child {
                Value::String(raw) => match self.substitute(raw, secret_data, true, inline, errors) {
                    Substitution::Keep => {}
                    Substitution::Replace(value) => {
                        *child = value;
                        replaced += 1;
                    }
                    Substitution::Remove => removed.push(key.clone()),
                },
                Value::Object(nested) => {
                    replaced += self.walk_map(nested, false, secret_data, inline, errors);
                }
                Value::Array(items) => {
                    replaced += self.walk_array(items, secret_data, inline, errors);
                }
                _ => {}
            }
        }

        for key in &removed {
            tracing::debug!(manifest = %self.manifest, key = %key, "removing field with missing secret");
            map.remove(key);
        }
        replaced + removed.len()
    }

    fn walk_array(
        &self,
        items: &mut [Value],
        secret_data: bool,
        inline: &BTreeMap<SecretRef, SecretMap>,
        errors: &mut ErrorList,
    ) -> usize {
        let mut replaced = 0;
        for item in items {
            match item {
                Value::String(raw) => {
                    // Sequence elements are never removed, a missing key is an error
                    if let Substitution::Replace(value) =
                        self.substitute(raw, secret_data, false, inline, errors)
                    {
                        *item = value;
                        replaced += 1;
                    }
                }
                Value::Object(nested) => {
                    replaced += self.walk_map(nested, false, secret_data, inline, errors);
                }
                Value::Array(nested) => {
                    replaced += self.walk_array(nested, secret_data, inline, errors);
                }
                _ => {}
            }
        }
        replaced
    }

    fn substitute(
        &self,
        raw: &str,
        secret_data: bool,
        removable: bool,
        inline: &BTreeMap<SecretRef, SecretMap>,
        errors: &mut ErrorList,
    ) -> Substitution {
        let source = self.source_text(raw, secret_data);
        let occurrences = placeholder::find(&source, self.bare_allowed());
        if occurrences.is_empty() {
            return Substitution::Keep;
        }

        let mut values = Vec::with_capacity(occurrences.len());
        let mut failed = false;
        let mut missing = false;
        for occurrence in &occurrences {
            match self.resolve(occurrence, removable, inline) {
                Ok(Resolution::Value(value)) => values.push(value),
                Ok(Resolution::Missing) => missing = true,
                Ok(Resolution::Unavailable) => failed = true,
                Err(error) => {
                    errors.push(error);
                    failed = true;
                }
            }
        }
        if failed {
            return Substitution::Keep;
        }
        if missing {
            return Substitution::Remove;
        }

        let value = match (occurrences.as_slice(), values.pop()) {
            // A lone placeholder keeps the type of the secret value
            ([only], Some(value)) if only.range == (0..source.len()) => value,
            (_, last) => {
                values.extend(last);
                let mut text = String::with_capacity(source.len());
                let mut cursor = 0;
                for (occurrence, value) in occurrences.iter().zip(&values) {
                    text.push_str(&source[cursor..occurrence.range.start]);
                    text.push_str(&stringify(value));
                    cursor = occurrence.range.end;
                }
                text.push_str(&source[cursor..]);
                Value::String(text)
            }
        };

        if secret_data {
            Substitution::Replace(Value::String(STANDARD.encode(stringify(&value))))
        } else {
            Substitution::Replace(value)
        }
    }

    fn resolve(
        &self,
        occurrence: &Occurrence<'_>,
        removable: bool,
        inline: &BTreeMap<SecretRef, SecretMap>,
    ) -> Result<Resolution> {
        let placeholder = occurrence.parse()?;

        let value = match &placeholder.reference {
            Reference::Bare { key } => {
                let Some(path_secrets) = &self.path_secrets else {
                    return Err(Error::placeholder(
                        format!("<{}>", occurrence.inner),
                        format!("no {AVP_PATH_ANNOTATION} annotation to read '{key}' from"),
                    ));
                };
                match path_secrets.secrets.get(key) {
                    Some(value) => value.clone(),
                    None if self.remove_missing && removable => return Ok(Resolution::Missing),
                    None => return Err(Error::secret_key_not_found(&path_secrets.path, key)),
                }
            }
            Reference::Inline { path, key, version } => {
                let version = version.clone().or_else(|| self.secret_version.clone());
                let Some(secrets) = inline.get(&(path.clone(), version)) else {
                    return Ok(Resolution::Unavailable);
                };
                secrets
                    .get(key)
                    .cloned()
                    .ok_or_else(|| Error::secret_key_not_found(path, key))?
            }
        };

        placeholder
            .modifiers
            .iter()
            .try_fold(value, |value, modifier| modifier.apply(value))
            .map(Resolution::Value)
    }

    /// The text placeholders are searched in.
    ///
    /// `data` values of a Secret are base64; when the decoded text holds
    /// placeholders that text is used, otherwise the raw value.
    fn source_text<'t>(&self, raw: &'t str, secret_data: bool) -> Cow<'t, str> {
        if secret_data {
            let decoded = STANDARD
                .decode(raw.trim())
                .ok()
                .and_then(|bytes| String::from_utf8(bytes).ok());
            if let Some(decoded) = decoded {
                if !placeholder::find(&decoded, self.bare_allowed()).is_empty() {
                    return Cow::Owned(decoded);
                }
            }
        }
        Cow::Borrowed(raw)
    }
}

fn non_empty(annotations: &Annotations, key: &str) -> Option<String> {
    annotations
        .get(key)
        .map(|value| value.trim())
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

fn visit_strings(value: &Value, visit: &mut dyn FnMut(&str)) {
    match value {
        Value::String(text) => visit(text),
        Value::Array(items) => {
            for item in items {
                visit_strings(item, visit);
            }
        }
        Value::Object(map) => {
            for item in map.values() {
                visit_strings(item, visit);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use avp_backend::InMemoryBackend;
    use serde_json::json;

    async fn backend() -> InMemoryBackend {
        let mut backend = InMemoryBackend::new()
            .with_secret("secret/data/app", "username", "admin")
            .with_secret("secret/data/app", "password", "s3cr3t")
            .with_secret("secret/data/app", "replicas", 3)
            .with_secret("secret/data/app", "config", r#"{"db":{"host":"db.internal"}}"#)
            .with_secret("kv/shared", "token", "t0k3n");
        backend.login().await.unwrap();
        backend
    }

    async fn render(source: &str, backend: &InMemoryBackend) -> Result<Manifest> {
        let manifest = Manifest::from_yaml(source)?;
        let mut template = Template::new(manifest, backend, None).await?;
        template.replace().await?;
        Ok(template.into_manifest())
    }

    #[tokio::test]
    async fn test_bare_placeholders_need_path_annotation() {
        let backend = backend().await;
        let manifest = render(
            "kind: ConfigMap\nmetadata:\n  name: web\ndata:\n  user: <username>\n",
            &backend,
        )
        .await
        .unwrap();
        assert_eq!(manifest.as_map()["data"]["user"], json!("<username>"));
        assert_eq!(backend.lookup_count(), 0);
    }

    #[tokio::test]
    async fn test_typed_and_embedded_values() {
        let backend = backend().await;
        let manifest = render(
            r#"
kind: Deployment
metadata:
  name: web
  annotations:
    avp.kubernetes.io/path: secret/data/app
spec:
  replicas: <replicas>
  template:
    spec:
      containers:
        - args: ["--user=<username>", "--token=<path:kv/shared#token>"]
"#,
            &backend,
        )
        .await
        .unwrap();

        let map = manifest.as_map();
        assert_eq!(map["spec"]["replicas"], json!(3));
        assert_eq!(
            map["spec"]["template"]["spec"]["containers"][0]["args"],
            json!(["--user=admin", "--token=t0k3n"])
        );
    }

    #[tokio::test]
    async fn test_modifiers_apply_in_order() {
        let backend = backend().await;
        let manifest = render(
            "kind: ConfigMap\ndata:\n  host: <path:secret/data/app#config | jsonParse | jsonPath {.db.host}>\n",
            &backend,
        )
        .await
        .unwrap();
        assert_eq!(manifest.as_map()["data"]["host"], json!("db.internal"));
    }

    #[tokio::test]
    async fn test_secret_data_is_base64_encoded() {
        let backend = backend().await;
        // "PHBhc3N3b3JkPg==" is "<password>"
        let manifest = render(
            r#"
kind: Secret
metadata:
  name: creds
  annotations:
    avp.kubernetes.io/path: secret/data/app
data:
  encoded: PHBhc3N3b3JkPg==
  plain: <username>
  untouched: c3RhdGlj
stringData:
  raw: <username>
"#,
            &backend,
        )
        .await
        .unwrap();

        let map = manifest.as_map();
        assert_eq!(map["data"]["encoded"], json!(STANDARD.encode("s3cr3t")));
        assert_eq!(map["data"]["plain"], json!(STANDARD.encode("admin")));
        assert_eq!(map["data"]["untouched"], json!("c3RhdGlj"));
        assert_eq!(map["stringData"]["raw"], json!("admin"));
    }

    #[tokio::test]
    async fn test_errors_are_collected_and_manifest_untouched() {
        let backend = backend().await;
        let source = r#"
kind: ConfigMap
metadata:
  name: web
  namespace: prod
  annotations:
    avp.kubernetes.io/path: secret/data/app
data:
  a: <missing-one>
  b: <missing-two>
  c: <username>
"#;
        let manifest = Manifest::from_yaml(source).unwrap();
        let mut template = Template::new(manifest.clone(), &backend, None).await.unwrap();
        let err = template.replace().await.unwrap_err();

        match &err {
            Error::Replacement { manifest, errors } => {
                assert_eq!(manifest, "prod.web");
                assert_eq!(errors.len(), 2);
            }
            other => panic!("expected replacement error, got {other:?}"),
        }
        assert_eq!(template.manifest(), &manifest);
    }

    #[tokio::test]
    async fn test_remove_missing_drops_fields() {
        let backend = backend().await;
        let manifest = render(
            r#"
kind: Secret
metadata:
  name: creds
  annotations:
    avp.kubernetes.io/path: secret/data/app
    avp.kubernetes.io/remove-missing: "true"
stringData:
  user: <username>
  gone: <not-there>
"#,
            &backend,
        )
        .await
        .unwrap();

        let string_data = manifest.as_map()["stringData"].as_object().unwrap();
        assert_eq!(string_data.get("user"), Some(&json!("admin")));
        assert!(!string_data.contains_key("gone"));
    }

    #[tokio::test]
    async fn test_remove_missing_keeps_sequence_elements() {
        let backend = backend().await;
        let source = r#"
kind: Secret
metadata:
  name: creds
  annotations:
    avp.kubernetes.io/path: secret/data/app
    avp.kubernetes.io/remove-missing: "true"
stringData:
  list: [<gone>, <username>]
"#;
        let manifest = Manifest::from_yaml(source).unwrap();
        let mut template = Template::new(manifest.clone(), &backend, None).await.unwrap();
        let err = template.replace().await.unwrap_err();

        match &err {
            Error::Replacement { errors, .. } => {
                assert_eq!(errors.len(), 1);
                assert_eq!(
                    errors.iter().next().unwrap().to_string(),
                    "could not find secret key 'gone' at path secret/data/app"
                );
            }
            other => panic!("expected replacement error, got {other:?}"),
        }
        assert_eq!(template.manifest(), &manifest);
    }

    #[tokio::test]
    async fn test_inline_path_fetched_once() {
        let backend = backend().await;
        render(
            "kind: ConfigMap\ndata:\n  a: <path:kv/shared#token>\n  b: <path:kv/shared#token | base64encode>\n",
            &backend,
        )
        .await
        .unwrap();
        assert_eq!(backend.lookup_count(), 1);
    }

    #[tokio::test]
    async fn test_validator_rejects_annotation_path() {
        let backend = backend().await;
        let validator = PathValidator::new("^kv/").unwrap();
        let manifest = Manifest::from_yaml(
            "kind: ConfigMap\nmetadata:\n  annotations:\n    avp.kubernetes.io/path: secret/data/app\n",
        )
        .unwrap();

        let err = Template::new(manifest, &backend, Some(&validator))
            .await
            .err()
            .unwrap();
        assert!(matches!(err, Error::PathDisallowed { .. }));
        assert_eq!(backend.lookup_count(), 0);
    }

    #[tokio::test]
    async fn test_validator_rejects_inline_path() {
        let backend = backend().await;
        let validator = PathValidator::new("^kv/").unwrap();
        let manifest = Manifest::from_yaml(
            "kind: ConfigMap\ndata:\n  ok: <path:kv/shared#token>\n  no: <path:secret/data/app#password>\n",
        )
        .unwrap();

        let mut template = Template::new(manifest, &backend, Some(&validator))
            .await
            .unwrap();
        let err = template.replace().await.unwrap_err();
        assert!(err.to_string().contains("disallowed by AVP_PATH_VALIDATION"));
        assert_eq!(
            template.manifest().as_map()["data"]["no"],
            json!("<path:secret/data/app#password>")
        );
        assert_eq!(backend.lookup_count(), 1);
    }
}
