use crate::manifests;
use avp_backend::build_backend;
use avp_config::Config;
use avp_core::{Error, Manifest, Result, STDIN_PATH};
use avp_kube::Pipeline;
use std::path::Path;
use tokio::io::AsyncWriteExt;

/// Run `generate` and write the manifests to stdout in a single write.
///
/// Nothing is written unless every manifest was processed.
pub async fn execute(path: &str, config: &Config) -> Result<()> {
    let output = generate(path, config).await?;

    let mut stdout = tokio::io::stdout();
    stdout
        .write_all(output.as_bytes())
        .await
        .map_err(|e| Error::file_system("<stdout>", "write", e))?;
    stdout
        .flush()
        .await
        .map_err(|e| Error::file_system("<stdout>", "flush", e))
}

/// Produce the output stream for `path` without writing it
pub async fn generate(path: &str, config: &Config) -> Result<String> {
    let pipeline = Pipeline::new(config)?;
    let manifests = discover(path)?;
    tracing::debug!(count = manifests.len(), "read manifests");

    let mut backend = build_backend(config)?;
    pipeline.run(manifests, backend.as_mut()).await
}

fn discover(path: &str) -> Result<Vec<Manifest>> {
    if path == STDIN_PATH {
        return manifests::read_manifest_data(std::io::stdin().lock());
    }
    let files = manifests::list_files(Path::new(path))?;
    manifests::read_files_as_manifests(&files)
}
