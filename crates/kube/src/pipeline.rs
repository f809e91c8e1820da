use crate::template::Template;
use crate::validation::PathValidator;
use avp_backend::Backend;
use avp_config::Config;
use avp_core::{Manifest, Result, AVP_IGNORE_ANNOTATION, DOCUMENT_SEPARATOR};

/// Drives manifests from input to serialized output
#[derive(Debug, Clone, Default)]
pub struct Pipeline {
    validator: Option<PathValidator>,
}

impl Pipeline {
    /// Compile the path validator of `config`.
    ///
    /// An invalid pattern fails here, before any manifest is touched.
    pub fn new(config: &Config) -> Result<Self> {
        let validator = PathValidator::compile(config.path_validation.as_deref())?;
        if let Some(validator) = &validator {
            tracing::debug!(pattern = validator.pattern(), "secret path validation enabled");
        }
        Ok(Self { validator })
    }

    #[must_use]
    pub fn validator(&self) -> Option<&PathValidator> {
        self.validator.as_ref()
    }

    /// Log in to `backend` once, then process every manifest.
    ///
    /// A failed login is returned as-is and no manifest is processed.
    pub async fn run(&self, manifests: Vec<Manifest>, backend: &mut dyn Backend) -> Result<String> {
        backend.login().await?;
        tracing::debug!(backend = backend.name(), "logged in to secret backend");
        process_manifests(manifests, &*backend, self.validator()).await
    }
}

/// Substitute secrets into `manifests` and serialize them in input order.
///
/// Each manifest is written as YAML followed by a `---` line. Manifests with
/// the ignore annotation set are passed through untouched. The first failing
/// manifest aborts the run and nothing is returned.
pub async fn process_manifests(
    manifests: Vec<Manifest>,
    backend: &dyn Backend,
    validator: Option<&PathValidator>,
) -> Result<String> {
    let mut output = String::new();

    for manifest in manifests {
        let manifest = if manifest.is_ignored() {
            tracing::debug!(
                namespace = manifest.namespace().unwrap_or_default(),
                name = manifest.name(),
                annotation = AVP_IGNORE_ANNOTATION,
                "skipping manifest"
            );
            manifest
        } else {
            let mut template = Template::new(manifest, backend, validator).await?;
            template.replace().await?;
            template.into_manifest()
        };

        output.push_str(&manifest.to_yaml()?);
        output.push_str(DOCUMENT_SEPARATOR);
        output.push('\n');
    }

    Ok(output)
}
