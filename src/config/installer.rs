use crate::constants::{
    DEFAULT_DOWNLOAD_ATTEMPTS, DEFAULT_METADATA_TIMEOUT_SECS, DEFAULT_REQUEST_TIMEOUT_SECS,
    DEFAULT_RETRY_DELAY_MS, DEFAULT_TERMINATION_GRACE_MS,
};
use crate::core::AiupError;
use crate::update::transport::RetryPolicy;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;
use tracing::debug;

/// Environment variable that overrides the configuration file location.
pub const CONFIG_PATH_ENV: &str = "AIUP_CONFIG_PATH";

/// Complete configuration of one managed application.
///
/// Every component of the installer receives the values it needs from this
/// struct instead of reading global constants, so tests can point the whole
/// state machine at a temporary directory and a fake endpoint.
///
/// The defaults reproduce the Cursor AppImage installer. All fields are
/// optional in the TOML file; missing fields fall back to the defaults.
///
/// # TOML Example
///
/// ```toml
/// app_name = "Cursor"
/// install_dir = "~/Applications/cursor"
/// binary_name = "cursor.AppImage"
/// api_url = "https://www.cursor.com/api/download?platform=linux-x64&releaseTrack=stable"
/// download_attempts = 3
/// retry_delay_ms = 2000
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InstallerConfig {
    /// Human readable application name, used for the desktop entry.
    pub app_name: String,
    /// Directory holding the binary, icon and version file. `~` is expanded.
    pub install_dir: PathBuf,
    /// File name of the installed binary inside `install_dir`.
    pub binary_name: String,
    /// File name of the icon inside `install_dir`.
    pub icon_name: String,
    /// File name of the version label file inside `install_dir`.
    pub version_file_name: String,
    /// Release metadata endpoint.
    pub api_url: String,
    /// Icon locations, tried in order.
    pub icon_urls: Vec<String>,
    /// `User-Agent` header sent with every request.
    pub user_agent: String,
    /// Compatibility flags passed to the application on launch.
    pub launch_args: Vec<String>,
    /// Location of the freedesktop menu entry. `~` is expanded.
    pub desktop_file: PathBuf,
    /// `Comment=` line of the desktop entry.
    pub desktop_comment: String,
    /// `Categories=` entries of the desktop entry.
    pub desktop_categories: Vec<String>,
    /// Per-request timeout for downloads, in seconds.
    pub request_timeout_secs: u64,
    /// Timeout for the metadata request, in seconds.
    pub metadata_timeout_secs: u64,
    /// Number of download attempts before a fetch is reported as failed.
    pub download_attempts: u32,
    /// Fixed delay between download attempts, in milliseconds.
    pub retry_delay_ms: u64,
    /// Grace interval between graceful and forceful termination, in milliseconds.
    pub termination_grace_ms: u64,
    /// Re-verify the installed binary by digest even when the version label
    /// already matches (only when the endpoint supplies a digest).
    pub verify_on_label_match: bool,
    /// Append `LIBGL_ALWAYS_SOFTWARE=1` to `~/.profile`.
    pub set_software_rendering: bool,
}

impl Default for InstallerConfig {
    fn default() -> Self {
        Self {
            app_name: "Cursor".to_string(),
            install_dir: PathBuf::from("~/Applications/cursor"),
            binary_name: "cursor.AppImage".to_string(),
            icon_name: "cursor.png".to_string(),
            version_file_name: ".version".to_string(),
            api_url: "https://www.cursor.com/api/download?platform=linux-x64&releaseTrack=stable"
                .to_string(),
            icon_urls: vec![
                "https://www.cursor.com/assets/images/logo.png".to_string(),
                "https://www.cursor.com/favicon.png".to_string(),
                "https://raw.githubusercontent.com/getcursor/cursor/main/resources/icon.png"
                    .to_string(),
            ],
            user_agent: concat!("aiup/", env!("CARGO_PKG_VERSION")).to_string(),
            launch_args: vec!["--no-sandbox".to_string(), "--disable-gpu".to_string()],
            desktop_file: PathBuf::from("~/.local/share/applications/cursor.desktop"),
            desktop_comment: "AI-first code editor".to_string(),
            desktop_categories: vec![
                "Development".to_string(),
                "IDE".to_string(),
                "TextEditor".to_string(),
            ],
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            metadata_timeout_secs: DEFAULT_METADATA_TIMEOUT_SECS,
            download_attempts: DEFAULT_DOWNLOAD_ATTEMPTS,
            retry_delay_ms: DEFAULT_RETRY_DELAY_MS,
            termination_grace_ms: DEFAULT_TERMINATION_GRACE_MS,
            verify_on_label_match: false,
            set_software_rendering: true,
        }
    }
}

impl InstallerConfig {
    /// Load the configuration using the standard lookup order.
    ///
    /// 1. `explicit` path (from `--config`)
    /// 2. `AIUP_CONFIG_PATH` environment variable
    /// 3. `~/.aiup/config.toml`
    ///
    /// A missing file at the default location is not an error; the defaults
    /// are used instead. A missing file at an explicitly requested location is.
    pub async fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load_from(path).await;
        }

        if let Ok(env_path) = std::env::var(CONFIG_PATH_ENV) {
            return Self::load_from(Path::new(&env_path)).await;
        }

        let path = Self::default_path()?;
        if path.exists() {
            Self::load_from(&path).await
        } else {
            debug!("No config at {}, using defaults", path.display());
            Self::default().finalize()
        }
    }

    /// Load and validate the configuration from a specific TOML file.
    pub async fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config from {}", path.display()))?;

        let config: Self = toml::from_str(&content).map_err(|e| AiupError::ConfigError {
            message: format!("{}: {e}", path.display()),
        })?;

        debug!("Loaded config from {}", path.display());
        config.finalize()
    }

    /// Default configuration file location (`~/.aiup/config.toml`).
    pub fn default_path() -> Result<PathBuf> {
        let home = dirs::home_dir()
            .ok_or_else(|| anyhow::anyhow!("Unable to determine home directory"))?;
        Ok(home.join(".aiup").join("config.toml"))
    }

    /// Configuration rooted at `install_dir`, for tests and embedding.
    ///
    /// Disables profile editing and uses a zero retry delay.
    pub fn for_install_dir(install_dir: impl Into<PathBuf>) -> Self {
        let install_dir = install_dir.into();
        Self {
            desktop_file: install_dir.join("app.desktop"),
            install_dir,
            retry_delay_ms: 0,
            termination_grace_ms: 0,
            set_software_rendering: false,
            ..Self::default()
        }
    }

    /// Expand `~` in path fields and validate values.
    pub fn finalize(mut self) -> Result<Self> {
        self.install_dir = expand_tilde(&self.install_dir);
        self.desktop_file = expand_tilde(&self.desktop_file);
        self.validate()?;
        Ok(self)
    }

    fn validate(&self) -> Result<(), AiupError> {
        let invalid = |message: String| AiupError::ConfigError {
            message,
        };

        if self.api_url.trim().is_empty() {
            return Err(invalid("api_url must not be empty".to_string()));
        }
        if self.download_attempts == 0 {
            return Err(invalid("download_attempts must be at least 1".to_string()));
        }
        for (field, name) in [
            ("binary_name", &self.binary_name),
            ("icon_name", &self.icon_name),
            ("version_file_name", &self.version_file_name),
        ] {
            if name.is_empty() || name.contains('/') || name == "." || name == ".." {
                return Err(invalid(format!("{field} must be a plain file name, got '{name}'")));
            }
        }
        if self.binary_name == self.version_file_name {
            return Err(invalid("binary_name and version_file_name must differ".to_string()));
        }
        Ok(())
    }

    /// Final location of the installed binary.
    pub fn binary_path(&self) -> PathBuf {
        self.install_dir.join(&self.binary_name)
    }

    /// Location of the icon.
    pub fn icon_path(&self) -> PathBuf {
        self.install_dir.join(&self.icon_name)
    }

    /// Location of the version label file.
    pub fn version_file(&self) -> PathBuf {
        self.install_dir.join(&self.version_file_name)
    }

    /// Retry policy for downloads.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::fixed(self.download_attempts, Duration::from_millis(self.retry_delay_ms))
    }

    /// Grace interval for graceful termination.
    pub fn termination_grace(&self) -> Duration {
        Duration::from_millis(self.termination_grace_ms)
    }

    /// Download request timeout.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Metadata request timeout.
    pub fn metadata_timeout(&self) -> Duration {
        Duration::from_secs(self.metadata_timeout_secs)
    }
}

fn expand_tilde(path: &Path) -> PathBuf {
    let raw = path.to_string_lossy();
    PathBuf::from(shellexpand::tilde(&raw).into_owned())
}
