//! File system helpers for the install phase.
//!
//! Every write that lands on a path the user depends on (the installed
//! binary, the version label) goes through a temporary file in the same
//! directory followed by a `rename`, so a crash never leaves a half-written
//! file at the final path.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

/// Ensures a directory exists, creating it and its parents if necessary.
///
/// # Errors
///
/// Fails if the path exists but is not a directory, or if creation fails.
pub async fn ensure_dir(path: &Path) -> Result<()> {
    match fs::metadata(path).await {
        Ok(meta) if meta.is_dir() => Ok(()),
        Ok(_) => Err(anyhow::anyhow!("Path exists but is not a directory: {}", path.display())),
        Err(_) => fs::create_dir_all(path)
            .await
            .with_context(|| format!("Failed to create directory: {}", path.display())),
    }
}

/// Path of the sibling temporary file used by [`atomic_write`].
fn temp_sibling(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Atomically writes content to a file.
///
/// 1. Write to `<path>.tmp`
/// 2. Sync to disk
/// 3. Rename over `path`
pub async fn atomic_write(path: &Path, content: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        ensure_dir(parent).await?;
    }

    let temp_path = temp_sibling(path);
    {
        let mut file = fs::File::create(&temp_path)
            .await
            .with_context(|| format!("Failed to create temp file: {}", temp_path.display()))?;
        file.write_all(content)
            .await
            .with_context(|| format!("Failed to write to temp file: {}", temp_path.display()))?;
        file.sync_all().await.context("Failed to sync file to disk")?;
    }

    fs::rename(&temp_path, path)
        .await
        .with_context(|| format!("Failed to rename temp file to: {}", path.display()))
}

/// Set `0o755` on `path`.
#[cfg(unix)]
pub async fn set_executable(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let mut perms = fs::metadata(path).await?.permissions();
    perms.set_mode(0o755);
    fs::set_permissions(path, perms).await
}

/// No executable bit outside Unix.
#[cfg(not(unix))]
pub async fn set_executable(_path: &Path) -> std::io::Result<()> {
    Ok(())
}
