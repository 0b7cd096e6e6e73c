use crate::utils::fs::atomic_write;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, warn};

/// On-disk record of the installed binary and its version label.
///
/// The record is two artifacts: the binary itself and a one-line text file
/// holding the last-known-good version label. The digest is never stored; it
/// is recomputed from the binary when needed.
///
/// Only the orchestrator writes through this store. Writing a label asserts
/// that the binary at [`binary_path`](Self::binary_path) corresponds to it.
#[derive(Debug, Clone)]
pub struct InstallStateStore {
    binary_path: PathBuf,
    version_file: PathBuf,
}

impl InstallStateStore {
    /// Create a store for `binary_path` with labels kept in `version_file`.
    pub fn new(binary_path: PathBuf, version_file: PathBuf) -> Self {
        Self {
            binary_path,
            version_file,
        }
    }

    /// Location of the installed binary.
    pub fn binary_path(&self) -> &Path {
        &self.binary_path
    }

    /// Location of the version label file.
    pub fn version_file(&self) -> &Path {
        &self.version_file
    }

    /// Whether a binary is currently installed.
    pub async fn binary_exists(&self) -> bool {
        fs::metadata(&self.binary_path).await.map(|meta| meta.is_file()).unwrap_or(false)
    }

    /// The persisted version label, if any.
    ///
    /// An absent, empty or unreadable file yields `None`. Treating an unreadable
    /// label as absent only ever leads to re-verification or reinstall, never
    /// to a wrong "up-to-date" verdict.
    pub async fn read_version(&self) -> Option<String> {
        match fs::read_to_string(&self.version_file).await {
            Ok(content) => {
                let label = content.trim();
                if label.is_empty() {
                    None
                } else {
                    Some(label.to_string())
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No version file at {}", self.version_file.display());
                None
            }
            Err(e) => {
                warn!("Ignoring unreadable version file {}: {e}", self.version_file.display());
                None
            }
        }
    }

    /// Persist `label` as the installed version.
    pub async fn write_version(&self, label: &str) -> Result<()> {
        atomic_write(&self.version_file, label.as_bytes()).await.with_context(|| {
            format!("Failed to record version in {}", self.version_file.display())
        })?;
        debug!(version = label, "Recorded installed version");
        Ok(())
    }
}
