//! Path utilities for locating the secret directory

use avp_core::{Error, Result, GIT_ROOT_MARKER};
use std::path::{Component, Path, PathBuf};

/// Find the root of the repository containing `start`.
///
/// Walks up from `start` until a directory holding a `.git` entry (directory
/// or worktree file) is found and returns that directory.
pub fn detect_git_root(start: &Path) -> Result<PathBuf> {
    for dir in start.ancestors() {
        if dir.join(".git").exists() {
            return Ok(dir.to_path_buf());
        }
    }
    Err(Error::configuration(format!(
        "could not find a git repository in '{}' or any parent directory",
        start.display()
    )))
}

/// Resolve the configured secret directory to an absolute path.
///
/// - empty: the current working directory
/// - absolute: kept as is
/// - `GIT_ROOT` or `GIT_ROOT/<sub>`: relative to the repository root found by
///   `git_root` starting at `cwd`
/// - anything else: relative to `cwd`
pub fn resolve_secret_dir<F>(configured: &str, cwd: &Path, git_root: F) -> Result<PathBuf>
where
    F: FnOnce(&Path) -> Result<PathBuf>,
{
    let configured = configured.trim();
    if configured.is_empty() {
        return Ok(cwd.to_path_buf());
    }

    let path = Path::new(configured);
    if path.is_absolute() {
        return Ok(clean_path(path));
    }

    if let Some(rest) = configured.strip_prefix(GIT_ROOT_MARKER) {
        let rest = rest.trim_start_matches(['/', '\\']);
        let root = git_root(cwd)?;
        return Ok(clean_path(&root.join(rest)));
    }

    Ok(clean_path(&cwd.join(path)))
}

/// Lexically normalise a path, dropping `.` and folding `..` components
pub fn clean_path(path: &Path) -> PathBuf {
    let mut cleaned = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                let popped = matches!(cleaned.components().next_back(), Some(Component::Normal(_)))
                    && cleaned.pop();
                if !popped && !cleaned.has_root() {
                    cleaned.push("..");
                }
            }
            other => cleaned.push(other.as_os_str()),
        }
    }
    if cleaned.as_os_str().is_empty() {
        cleaned.push(".");
    }
    cleaned
}
