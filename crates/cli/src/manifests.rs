//! Manifest discovery: files, directories and standard input to manifests

use avp_core::{Error, ErrorList, Manifest, Result, MANIFEST_EXTENSIONS};
use serde::Deserialize;
use serde_json::Value;
use std::io::Read;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// List the manifest files below `root`.
///
/// A file is returned as-is. Directories are walked recursively and only
/// `.yaml`, `.yml` and `.json` files are kept, in path order.
pub fn list_files(root: &Path) -> Result<Vec<PathBuf>> {
    if root.is_file() {
        return Ok(vec![root.to_path_buf()]);
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry.map_err(|e| {
            Error::discovery(format!("could not list files in {}: {e}", root.display()))
        })?;
        if entry.file_type().is_file() && has_manifest_extension(entry.path()) {
            files.push(entry.into_path());
        }
    }

    if files.is_empty() {
        return Err(Error::discovery(format!(
            "no YAML or JSON files were found in {}",
            root.display()
        )));
    }
    tracing::debug!(count = files.len(), root = %root.display(), "found manifest files");
    Ok(files)
}

/// Parse every file, reporting all unreadable files together
pub fn read_files_as_manifests(files: &[PathBuf]) -> Result<Vec<Manifest>> {
    let mut errors = ErrorList::new();
    let mut manifests = Vec::new();

    for file in files {
        let parsed = std::fs::read_to_string(file)
            .map_err(|e| Error::file_system(file, "read", e))
            .and_then(|text| parse_documents(&text, &file.display().to_string()));
        if let Some(documents) = errors.collect(parsed) {
            manifests.extend(documents);
        }
    }

    errors.into_result("could not read YAML/JSON files", manifests)
}

/// Parse a manifest stream, typically standard input
pub fn read_manifest_data(mut reader: impl Read) -> Result<Vec<Manifest>> {
    let mut text = String::new();
    reader
        .read_to_string(&mut text)
        .map_err(|e| Error::discovery(format!("could not read manifests from standard input: {e}")))?;
    parse_documents(&text, "standard input")
}

/// Split a multi-document YAML (or JSON) stream, skipping empty documents
fn parse_documents(text: &str, origin: &str) -> Result<Vec<Manifest>> {
    let mut manifests = Vec::new();
    for document in serde_yaml::Deserializer::from_str(text) {
        let value = Value::deserialize(document).map_err(|e| Error::parse(origin, e.to_string()))?;
        if value.is_null() {
            continue;
        }
        let manifest = Manifest::from_value(value).map_err(|e| match e {
            Error::Parse { message, .. } => Error::parse(origin, message),
            other => other,
        })?;
        manifests.push(manifest);
    }
    Ok(manifests)
}

fn has_manifest_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| MANIFEST_EXTENSIONS.contains(&ext))
}
