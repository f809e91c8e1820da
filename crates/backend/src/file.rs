use crate::Backend;
use async_trait::async_trait;
use avp_core::{Annotations, Error, Result, SecretMap, MANIFEST_EXTENSIONS};
use serde_json::Value;
use std::path::{Component, Path, PathBuf};

/// Filesystem-backed secrets read from plain YAML or JSON files.
///
/// A secret path is a file path relative to the secret directory, with or
/// without its extension. Each file holds a mapping of secret keys to values.
#[derive(Debug, Clone)]
pub struct FileBackend {
    root: PathBuf,
}

impl FileBackend {
    /// Construct a new file backend rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn file_for(&self, path: &str) -> Result<Option<PathBuf>> {
        let relative = Path::new(path.trim_start_matches("./"));
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if path.is_empty() || escapes {
            return Err(Error::backend(
                "file",
                format!("secret path '{path}' must stay inside {}", self.root.display()),
            ));
        }

        let candidate = self.root.join(relative);
        if candidate.is_file() {
            return Ok(Some(candidate));
        }
        for extension in MANIFEST_EXTENSIONS {
            let with_extension = self.root.join(format!("{}.{extension}", relative.display()));
            if with_extension.is_file() {
                return Ok(Some(with_extension));
            }
        }
        Ok(None)
    }
}

#[async_trait]
impl Backend for FileBackend {
    fn name(&self) -> &str {
        "file"
    }

    async fn login(&mut self) -> Result<()> {
        if !self.root.is_dir() {
            return Err(Error::authentication(
                "file",
                format!("secret directory {} does not exist", self.root.display()),
            ));
        }
        tracing::debug!(root = %self.root.display(), "using file secret backend");
        Ok(())
    }

    async fn lookup(
        &self,
        path: &str,
        version: Option<&str>,
        _annotations: &Annotations,
    ) -> Result<SecretMap> {
        if let Some(version) = version {
            tracing::debug!(path, version, "file backend ignores secret versions");
        }

        let file = self
            .file_for(path)?
            .ok_or_else(|| Error::secret_not_found(path))?;
        let text = tokio::fs::read_to_string(&file)
            .await
            .map_err(|e| Error::file_system(&file, "read", e))?;
        let value: Value = serde_yaml::from_str(&text)
            .map_err(|e| Error::parse(file.display().to_string(), e.to_string()))?;

        match value {
            Value::Object(map) => Ok(map.into_iter().collect()),
            Value::Null => Err(Error::secret_not_found(path)),
            _ => Err(Error::backend(
                "file",
                format!("{} must contain a mapping of secret keys", file.display()),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::fs;
    use tempfile::TempDir;

    fn backend_with(files: &[(&str, &str)]) -> (TempDir, FileBackend) {
        let dir = TempDir::new().unwrap();
        for (name, content) in files {
            let path = dir.path().join(name);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, content).unwrap();
        }
        let backend = FileBackend::new(dir.path());
        (dir, backend)
    }

    #[tokio::test]
    async fn test_lookup_yaml_without_extension() {
        let (_dir, mut backend) = backend_with(&[("app/db.yaml", "user: admin\nport: 5432\n")]);
        backend.login().await.unwrap();

        let secrets = backend.lookup("app/db", None, &Annotations::new()).await.unwrap();
        assert_eq!(secrets.get("user"), Some(&json!("admin")));
        assert_eq!(secrets.get("port"), Some(&json!(5432)));
    }

    #[tokio::test]
    async fn test_lookup_json_with_extension() {
        let (_dir, backend) = backend_with(&[("api.json", r#"{"token": "abc"}"#)]);
        let secrets = backend.lookup("api.json", None, &Annotations::new()).await.unwrap();
        assert_eq!(secrets.get("token"), Some(&json!("abc")));
    }

    #[tokio::test]
    async fn test_missing_file_is_not_found() {
        let (_dir, backend) = backend_with(&[]);
        let err = backend.lookup("nope", None, &Annotations::new()).await.unwrap_err();
        assert!(matches!(err, Error::SecretNotFound { .. }));
    }

    #[tokio::test]
    async fn test_paths_cannot_escape_root() {
        let (_dir, backend) = backend_with(&[]);
        for path in ["../etc/passwd", "/etc/passwd", "a/../../b"] {
            let err = backend.lookup(path, None, &Annotations::new()).await.unwrap_err();
            assert!(matches!(err, Error::Backend { .. }), "{path}");
        }
    }

    #[tokio::test]
    async fn test_non_mapping_file_is_rejected() {
        let (_dir, backend) = backend_with(&[("list.yaml", "- a\n- b\n")]);
        let err = backend.lookup("list", None, &Annotations::new()).await.unwrap_err();
        assert!(err.to_string().contains("must contain a mapping"));
    }

    #[tokio::test]
    async fn test_login_requires_directory() {
        let mut backend = FileBackend::new("/definitely/not/here");
        let err = backend.login().await.unwrap_err();
        assert!(matches!(err, Error::Authentication { .. }));
    }
}
