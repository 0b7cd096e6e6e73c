//! Progress indicators for AIUP downloads.
//!
//! Thin wrapper around `indicatif` with consistent styling. Two shapes are
//! used by the installer:
//!
//! - a byte bar with percentage when the server advertises a total size
//! - a byte spinner when it does not
//!
//! # Environment Variables
//!
//! - `AIUP_NO_PROGRESS`: Set to any value to disable all progress indicators
//!
//! # Examples
//!
//! ```rust,no_run
//! use aiup_cli::utils::progress::ProgressBar;
//!
//! let progress = ProgressBar::download(Some(1024), "Downloading AppImage");
//! progress.set_position(512);
//! progress.finish_with_message("done");
//! ```

use indicatif::{ProgressBar as IndicatifBar, ProgressStyle as IndicatifStyle};
use std::time::Duration;

/// Environment variable that disables progress output.
pub const NO_PROGRESS_ENV: &str = "AIUP_NO_PROGRESS";

/// Checks if progress bars should be disabled.
fn is_progress_disabled() -> bool {
    std::env::var(NO_PROGRESS_ENV).is_ok()
}

/// A progress bar with consistent styling.
///
/// Hidden automatically when `AIUP_NO_PROGRESS` is set, so callers never
/// need to branch on quiet mode themselves.
#[derive(Debug, Clone)]
pub struct ProgressBar {
    inner: IndicatifBar,
}

impl ProgressBar {
    /// Create a download indicator.
    ///
    /// With a known `total` this is a bar showing percentage and bytes;
    /// otherwise a spinner showing the bytes received so far.
    pub fn download(total: Option<u64>, prefix: impl Into<String>) -> Self {
        let bar = if is_progress_disabled() {
            IndicatifBar::hidden()
        } else {
            match total {
                Some(len) => {
                    let bar = IndicatifBar::new(len);
                    bar.set_style(ProgressStyle::download());
                    bar
                }
                None => {
                    let bar = IndicatifBar::new_spinner();
                    bar.set_style(ProgressStyle::download_spinner());
                    bar.enable_steady_tick(Duration::from_millis(100));
                    bar
                }
            }
        };
        bar.set_prefix(prefix.into());
        Self {
            inner: bar,
        }
    }

    /// Create a progress indicator that never draws.
    pub fn hidden() -> Self {
        Self {
            inner: IndicatifBar::hidden(),
        }
    }

    /// Set the message displayed next to the indicator.
    pub fn set_message(&self, msg: impl Into<String>) {
        self.inner.set_message(msg.into());
    }

    /// Set the absolute position (bytes received).
    pub fn set_position(&self, pos: u64) {
        self.inner.set_position(pos);
    }

    /// Current position.
    pub fn position(&self) -> u64 {
        self.inner.position()
    }

    /// Finish and leave a final message on screen.
    pub fn finish_with_message(&self, msg: impl Into<String>) {
        self.inner.finish_with_message(msg.into());
    }

    /// Finish and erase the indicator.
    pub fn finish_and_clear(&self) {
        self.inner.finish_and_clear();
    }
}

/// Predefined styles for AIUP progress indicators.
pub struct ProgressStyle;

impl ProgressStyle {
    /// Byte bar with percentage.
    pub fn download() -> IndicatifStyle {
        IndicatifStyle::default_bar()
            .template(
                "{prefix:.bold.cyan} [{bar:40.cyan/blue}] {percent:>3}% {bytes}/{total_bytes} ({eta})",
            )
            .unwrap_or_else(|_| IndicatifStyle::default_bar())
            .progress_chars("━╸━")
    }

    /// Spinner with a byte counter, for downloads without a known size.
    pub fn download_spinner() -> IndicatifStyle {
        IndicatifStyle::default_spinner()
            .template("{prefix:.bold.cyan} {spinner:.cyan} {bytes} ({bytes_per_sec})")
            .unwrap_or_else(|_| IndicatifStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"])
    }
}
