//! Test fixtures and filesystem helpers.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tempfile::TempDir;

/// Create a fresh temporary directory that is removed on drop.
///
/// # Errors
///
/// Returns an error when the directory cannot be created.
pub fn temp_dir() -> Result<TempDir> {
    tempfile::Builder::new()
        .prefix("vfsgen-test-")
        .tempdir()
        .context("failed to create temporary directory")
}

/// Create a file (and its parent directories) with the given contents.
///
/// # Errors
///
/// Returns an error when the file cannot be written.
pub fn touch(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    fs::write(path, contents).with_context(|| format!("failed to write {}", path.display()))
}

/// Target of a symbolic link, or `None` if `path` is not a link.
#[must_use]
pub fn read_link(path: &Path) -> Option<PathBuf> {
    fs::read_link(path).ok()
}
