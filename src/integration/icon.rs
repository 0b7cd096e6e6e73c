//! Application icon acquisition.

use crate::update::transport::{Criticality, Fetcher, NoProgress, Transport};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// A 1x1 transparent PNG, written when no icon could be downloaded.
pub const PLACEHOLDER_PNG: &[u8] = &[
    0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44,
    0x52, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x06, 0x00, 0x00, 0x00, 0x1F,
    0x15, 0xC4, 0x89, 0x00, 0x00, 0x00, 0x0A, 0x49, 0x44, 0x41, 0x54, 0x78, 0x9C, 0x63, 0x00,
    0x01, 0x00, 0x00, 0x05, 0x00, 0x01, 0x0D, 0x0A, 0x2D, 0xB4, 0x00, 0x00, 0x00, 0x00, 0x49,
    0x45, 0x4E, 0x44, 0xAE, 0x42, 0x60, 0x82,
];

/// Where the installed icon came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IconSource {
    /// Downloaded from this URL.
    Downloaded(String),
    /// Built-in placeholder image.
    Placeholder,
    /// Empty file; even the placeholder could not be written.
    Empty,
    /// Nothing could be written at all.
    Missing,
}

impl fmt::Display for IconSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Downloaded(url) => write!(f, "downloaded from {url}"),
            Self::Placeholder => write!(f, "placeholder"),
            Self::Empty => write!(f, "empty file"),
            Self::Missing => write!(f, "missing"),
        }
    }
}

fn partial_path(icon_path: &Path) -> PathBuf {
    let mut name = icon_path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".part");
    icon_path.with_file_name(name)
}

/// Install an icon at `icon_path`.
///
/// Tries each URL in order as a best-effort download, then falls back to
/// [`PLACEHOLDER_PNG`], then to an empty file. Never fails.
pub async fn install_icon<F: Fetcher>(
    transport: &Transport<F>,
    urls: &[String],
    icon_path: &Path,
) -> IconSource {
    if let Some(parent) = icon_path.parent() {
        if let Err(e) = tokio::fs::create_dir_all(parent).await {
            warn!("Cannot create {}: {e}", parent.display());
            return IconSource::Missing;
        }
    }

    let partial = partial_path(icon_path);
    for url in urls {
        match transport.fetch(url, &partial, Criticality::BestEffort, &NoProgress).await {
            Ok(true) => match tokio::fs::rename(&partial, icon_path).await {
                Ok(()) => {
                    info!("Icon saved to {}", icon_path.display());
                    return IconSource::Downloaded(url.clone());
                }
                Err(e) => warn!("Failed to move icon into place: {e}"),
            },
            Ok(false) => debug!("Icon not available from {url}"),
            Err(e) => warn!("Icon download from {url} failed: {e:#}"),
        }
    }
    let _ = tokio::fs::remove_file(&partial).await;

    warn!("All icon downloads failed, using a placeholder icon");
    if let Err(e) = tokio::fs::write(icon_path, PLACEHOLDER_PNG).await {
        warn!("Placeholder icon creation failed: {e}");
        return match tokio::fs::write(icon_path, b"").await {
            Ok(()) => IconSource::Empty,
            Err(e) => {
                warn!("Cannot write {}: {e}", icon_path.display());
                IconSource::Missing
            }
        };
    }
    IconSource::Placeholder
}
