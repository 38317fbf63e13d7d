//! Filesystem primitives for workspace directories.

use anyhow::Context;
use std::fs;
use std::path::Path;

/// Create a directory and all of its parents.
pub fn create_dir(path: &Path) -> anyhow::Result<()> {
    fs::create_dir_all(path)
        .with_context(|| format!("Failed to create directory: {}", path.display()))
}

/// Remove a directory tree. A missing directory is not an error.
pub fn remove_dir(path: &Path) -> anyhow::Result<()> {
    if !path.exists() {
        return Ok(());
    }
    fs::remove_dir_all(path)
        .with_context(|| format!("Failed to remove directory: {}", path.display()))
}

/// Empty a directory, keeping the directory itself.
///
/// Entries whose name is in `keep` are left untouched. This lets a workspace
/// rooted at the main module reset its content without losing the metadata
/// directory.
pub fn reset_dir(path: &Path, keep: &[&str]) -> anyhow::Result<()> {
    if !path.exists() {
        return create_dir(path);
    }
    let entries = fs::read_dir(path)
        .with_context(|| format!("Failed to read directory: {}", path.display()))?;
    for entry in entries {
        let entry =
            entry.with_context(|| format!("Failed to read entry in: {}", path.display()))?;
        let name = entry.file_name();
        if keep.iter().any(|k| name.as_os_str() == *k) {
            continue;
        }
        let entry_path = entry.path();
        let file_type = entry
            .file_type()
            .with_context(|| format!("Failed to stat: {}", entry_path.display()))?;
        if file_type.is_dir() {
            fs::remove_dir_all(&entry_path).with_context(|| {
                format!("Failed to remove directory: {}", entry_path.display())
            })?;
        } else {
            fs::remove_file(&entry_path)
                .with_context(|| format!("Failed to remove file: {}", entry_path.display()))?;
        }
    }
    Ok(())
}

/// Write bytes atomically (tmp + rename).
pub fn write_atomic(path: &Path, bytes: &[u8]) -> anyhow::Result<()> {
    let parent = path
        .parent()
        .ok_or_else(|| anyhow::anyhow!("Path has no parent: {}", path.display()))?;
    create_dir(parent)?;

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let tmp_path = parent.join(format!("{}.{}.tmp", file_name, std::process::id()));

    fs::write(&tmp_path, bytes)
        .with_context(|| format!("Failed to write tmp file: {}", tmp_path.display()))?;

    // Remove target first on Windows for replace semantics
    if cfg!(windows) && path.exists() {
        fs::remove_file(path)
            .with_context(|| format!("Failed to remove existing file: {}", path.display()))?;
    }
    fs::rename(&tmp_path, path)
        .with_context(|| format!("Failed to rename tmp file: {}", tmp_path.display()))?;
    Ok(())
}
