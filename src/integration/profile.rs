//! Software rendering switch in the login profile.
//!
//! Some drivers crash the Electron GPU process of the managed app. Setting
//! `LIBGL_ALWAYS_SOFTWARE=1` for the session avoids it. The change only takes
//! effect after the next login.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::debug;

/// Variable assignment looked for in the profile.
const SOFTWARE_RENDERING: &str = "LIBGL_ALWAYS_SOFTWARE=1";

/// `~/.profile`, if a home directory is known.
pub fn default_profile_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".profile"))
}

/// Append `export LIBGL_ALWAYS_SOFTWARE=1` to `profile` unless present.
///
/// Returns whether the file was changed.
pub async fn ensure_software_rendering(profile: &Path) -> Result<bool> {
    let existing = match fs::read_to_string(profile).await {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
        Err(e) => {
            return Err(e).with_context(|| format!("Failed to read {}", profile.display()));
        }
    };

    if existing.contains(SOFTWARE_RENDERING) {
        debug!("{SOFTWARE_RENDERING} already set in {}", profile.display());
        return Ok(false);
    }

    let mut addition = String::new();
    if !existing.is_empty() && !existing.ends_with('\n') {
        addition.push('\n');
    }
    addition.push_str("export ");
    addition.push_str(SOFTWARE_RENDERING);
    addition.push('\n');

    let mut file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(profile)
        .await
        .with_context(|| format!("Failed to open {}", profile.display()))?;
    file.write_all(addition.as_bytes())
        .await
        .with_context(|| format!("Failed to write {}", profile.display()))?;
    file.flush().await?;

    Ok(true)
}
