//! Freedesktop menu entry for the managed application.

use crate::config::InstallerConfig;
use crate::utils::fs::atomic_write;
use anyhow::Result;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const KEYWORDS: &[&str] = &["code", "editor", "IDE", "AI"];
const MIME_TYPES: &[&str] = &["text/plain", "inode/directory", "application/x-code-workspace"];

/// A `[Desktop Entry]` of type `Application`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DesktopEntry {
    /// `Name=`
    pub name: String,
    /// `Comment=`
    pub comment: String,
    /// Binary started by the entry
    pub exec: PathBuf,
    /// Arguments appended to `Exec=`
    pub args: Vec<String>,
    /// `Icon=`
    pub icon: PathBuf,
    /// `Categories=`
    pub categories: Vec<String>,
    /// `Keywords=`
    pub keywords: Vec<String>,
    /// `StartupWMClass=`
    pub startup_wm_class: String,
    /// `MimeType=`
    pub mime_types: Vec<String>,
}

impl DesktopEntry {
    /// Entry launching the installed binary with the configured flags.
    pub fn from_config(config: &InstallerConfig) -> Self {
        Self {
            name: config.app_name.clone(),
            comment: config.desktop_comment.clone(),
            exec: config.binary_path(),
            args: config.launch_args.clone(),
            icon: config.icon_path(),
            categories: config.desktop_categories.clone(),
            keywords: KEYWORDS.iter().map(ToString::to_string).collect(),
            startup_wm_class: config.app_name.to_lowercase(),
            mime_types: MIME_TYPES.iter().map(ToString::to_string).collect(),
        }
    }

    /// The `Exec=` value, each argument quoted if needed.
    fn exec_line(&self) -> String {
        std::iter::once(self.exec.to_string_lossy().into_owned())
            .chain(self.args.iter().cloned())
            .map(|arg| quote_exec_arg(&arg))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Render the file content.
    pub fn render(&self) -> String {
        let list = |items: &[String]| {
            items.iter().map(|item| format!("{item};")).collect::<String>()
        };

        format!(
            "[Desktop Entry]\n\
             Name={}\n\
             Comment={}\n\
             Exec={}\n\
             Icon={}\n\
             Type=Application\n\
             Categories={}\n\
             Keywords={}\n\
             StartupWMClass={}\n\
             Terminal=false\n\
             MimeType={}\n",
            self.name,
            self.comment,
            self.exec_line(),
            self.icon.display(),
            list(&self.categories),
            list(&self.keywords),
            self.startup_wm_class,
            list(&self.mime_types),
        )
    }

    /// Write the entry to `path`, creating parent directories.
    pub async fn write(&self, path: &Path) -> Result<()> {
        atomic_write(path, self.render().as_bytes()).await?;
        debug!("Desktop entry written to {}", path.display());
        Ok(())
    }
}

/// Quote an `Exec=` argument if it contains reserved characters.
fn quote_exec_arg(arg: &str) -> String {
    const RESERVED: &[char] = &[
        ' ', '\t', '\n', '"', '\'', '\\', '>', '<', '~', '|', '&', ';', '$', '*', '?', '#', '(',
        ')', '`',
    ];
    if !arg.contains(RESERVED) {
        return arg.to_string();
    }
    let mut quoted = String::with_capacity(arg.len() + 2);
    quoted.push('"');
    for c in arg.chars() {
        if matches!(c, '"' | '`' | '$' | '\\') {
            quoted.push('\\');
        }
        quoted.push(c);
    }
    quoted.push('"');
    quoted
}

/// Refresh the desktop menu cache for `applications_dir`.
///
/// Best-effort: returns whether `update-desktop-database` ran successfully.
pub async fn refresh_desktop_database(applications_dir: &Path) -> bool {
    let Ok(tool) = which::which("update-desktop-database") else {
        debug!("update-desktop-database not installed, skipping menu refresh");
        return false;
    };

    match tokio::process::Command::new(tool).arg(applications_dir).output().await {
        Ok(output) if output.status.success() => true,
        Ok(output) => {
            warn!(
                "update-desktop-database failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            );
            false
        }
        Err(e) => {
            warn!("Failed to run update-desktop-database: {e}");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn entry() -> DesktopEntry {
        let config = InstallerConfig::for_install_dir("/home/u/Applications/cursor");
        DesktopEntry::from_config(&config)
    }

    #[test]
    fn test_render_cursor_entry() {
        let rendered = entry().render();

        assert!(rendered.starts_with("[Desktop Entry]\n"));
        assert!(rendered.contains("Name=Cursor\n"));
        assert!(rendered.contains("Comment=AI-first code editor\n"));
        assert!(rendered.contains(
            "Exec=/home/u/Applications/cursor/cursor.AppImage --no-sandbox --disable-gpu\n"
        ));
        assert!(rendered.contains("Icon=/home/u/Applications/cursor/cursor.png\n"));
        assert!(rendered.contains("Categories=Development;IDE;TextEditor;\n"));
        assert!(rendered.contains("Keywords=code;editor;IDE;AI;\n"));
        assert!(rendered.contains("StartupWMClass=cursor\n"));
        assert!(rendered.contains("Terminal=false\n"));
        assert!(rendered.contains(
            "MimeType=text/plain;inode/directory;application/x-code-workspace;\n"
        ));
    }

    #[test]
    fn test_exec_quotes_paths_with_spaces() {
        let mut entry = entry();
        entry.exec = PathBuf::from("/home/u/My Apps/app.AppImage");
        entry.args = vec!["--flag=$HOME".to_string()];

        assert_eq!(entry.exec_line(), r#""/home/u/My Apps/app.AppImage" "--flag=\$HOME""#);
    }

    #[tokio::test]
    async fn test_write_creates_parent_dirs() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("share").join("applications").join("cursor.desktop");

        entry().write(&path).await.unwrap();

        let content = tokio::fs::read_to_string(&path).await.unwrap();
        assert_eq!(content, entry().render());
    }
}
