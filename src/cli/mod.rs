//! Command-line interface for AIUP.
//!
//! `aiup` has no subcommands: a plain invocation runs the whole installer.
//!
//! 1. Platform check
//! 2. Software rendering switch in `~/.profile` (if configured)
//! 3. Update state machine (resolve, decide, install)
//! 4. Icon and desktop entry
//! 5. Launch the application
//!
//! `--check` stops after the decision and never modifies anything.
//!
//! # Global Options
//!
//! - `--verbose` / `--quiet` - log level (`RUST_LOG` takes precedence)
//! - `--config` - configuration file instead of `~/.aiup/config.toml`
//! - `--no-progress` - no progress bars (also `AIUP_NO_PROGRESS`)
//!
//! # Example
//!
//! ```bash
//! aiup                      # install or update, then launch
//! aiup --check              # report whether an update is available
//! aiup --no-launch -v       # update only, with debug logs
//! ```

use crate::config::InstallerConfig;
use crate::integration::desktop::{DesktopEntry, refresh_desktop_database};
use crate::integration::icon::install_icon;
use crate::integration::{launch, preflight, profile};
use crate::update::{
    CheckReport, HttpFetcher, IndicatifObserver, ProcessGuard, ProcessMatcher, ProcfsLister,
    SignalTerminator, Transport, UpdateOrchestrator, UpdateOutcome,
};
use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Self-updating installer for AppImage applications.
#[derive(Parser, Debug)]
#[command(
    name = "aiup",
    about = "Install or update an AppImage application and launch it",
    version,
    long_about = "aiup keeps a single AppImage current: it asks the vendor's release endpoint \
                  for the latest build, downloads and verifies it only when needed, stops \
                  running instances, swaps the binary atomically and launches it."
)]
pub struct Cli {
    /// Enable debug logging.
    #[arg(short, long, conflicts_with = "quiet")]
    verbose: bool,

    /// Only print errors.
    #[arg(short, long)]
    quiet: bool,

    /// Path to the configuration file.
    ///
    /// Defaults to `$AIUP_CONFIG_PATH`, then `~/.aiup/config.toml`.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Disable progress bars.
    #[arg(long)]
    no_progress: bool,

    /// Do not start the application afterwards.
    #[arg(long)]
    no_launch: bool,

    /// Do not create or refresh the desktop menu entry.
    #[arg(long)]
    no_desktop: bool,

    /// Only report whether an update is available.
    #[arg(long)]
    check: bool,
}

impl Cli {
    /// Log filter for the selected verbosity. `RUST_LOG` wins when set.
    fn log_filter(&self) -> EnvFilter {
        if std::env::var("RUST_LOG").is_ok() {
            return EnvFilter::from_default_env();
        }
        let level = if self.verbose {
            "aiup_cli=debug"
        } else if self.quiet {
            "error"
        } else {
            "warn"
        };
        EnvFilter::new(level)
    }

    fn init_logging(&self) {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(self.log_filter())
            .with_writer(std::io::stderr)
            .with_target(false)
            .try_init();
    }

    fn status(&self, message: impl std::fmt::Display) {
        if !self.quiet {
            println!("{} {message}", "==>".green().bold());
        }
    }

    /// Run the installer.
    ///
    /// # Errors
    ///
    /// Any fatal error of the update run, the desktop entry or the launch.
    pub async fn execute(self) -> Result<()> {
        self.init_logging();

        let config = InstallerConfig::load(self.config.as_deref()).await?;
        preflight::check_platform()?;

        let fetcher = HttpFetcher::new(
            &config.user_agent,
            config.request_timeout(),
            config.metadata_timeout(),
        )?;
        let transport = Transport::new(fetcher, config.retry_policy());
        let guard = ProcessGuard::new(
            ProcfsLister::default(),
            SignalTerminator,
            ProcessMatcher::for_current_user(&config.binary_path()),
            config.termination_grace(),
        );
        let orchestrator = UpdateOrchestrator::new(&config, transport, guard);

        if self.check {
            let report = orchestrator.check().await?;
            self.status(check_summary(&config.app_name, &report));
            return Ok(());
        }

        if config.set_software_rendering {
            self.apply_software_rendering().await;
        }

        let orchestrator = if self.no_progress || self.quiet {
            orchestrator
        } else {
            orchestrator.with_observer(IndicatifObserver::new(config.app_name.clone()))
        };

        self.status(format!("Checking for {} updates", config.app_name));
        let outcome = orchestrator.run().await?;
        let installed = matches!(outcome, UpdateOutcome::Installed { .. });
        match &outcome {
            UpdateOutcome::Installed {
                version,
                ..
            } => self.status(format!("Installed {} {version}", config.app_name)),
            UpdateOutcome::UpToDate {
                version,
                ..
            } => self.status(format!("{} {version} is up to date", config.app_name)),
        }

        let icon_path = config.icon_path();
        if installed || !icon_path.exists() {
            let source = install_icon(orchestrator.transport(), &config.icon_urls, &icon_path).await;
            self.status(format!("Icon: {source}"));
        }

        if !self.no_desktop && (installed || !config.desktop_file.exists()) {
            DesktopEntry::from_config(&config).write(&config.desktop_file).await.with_context(
                || format!("Failed to create desktop entry {}", config.desktop_file.display()),
            )?;
            if let Some(dir) = config.desktop_file.parent() {
                refresh_desktop_database(dir).await;
            }
            self.status(format!("Desktop entry at {}", config.desktop_file.display()));
        }

        if !self.no_launch {
            launch::launch(&config.binary_path(), &config.launch_args)?;
            self.status(format!("Launched {}", config.app_name));
        }

        Ok(())
    }

    async fn apply_software_rendering(&self) {
        let Some(path) = profile::default_profile_path() else {
            tracing::warn!("No home directory, not editing the login profile");
            return;
        };
        match profile::ensure_software_rendering(&path).await {
            Ok(true) => self.status(format!(
                "Added LIBGL_ALWAYS_SOFTWARE=1 to {}; log out or run `source {}` to apply it",
                path.display(),
                path.display()
            )),
            Ok(false) => {}
            Err(e) => tracing::warn!("Failed to update {}: {e:#}", path.display()),
        }
    }
}

/// One-line answer to `--check`.
///
/// An up-to-date install is reported with the resolved label, which is what
/// the binary matched even when the version file is missing or stale.
fn check_summary(app_name: &str, report: &CheckReport) -> String {
    if report.decision.needs_install() {
        let installed = report.installed_version.as_deref().unwrap_or("none");
        format!(
            "Update available: {} (installed: {installed}, {})",
            report.release.version_label, report.decision
        )
    } else {
        format!("{app_name} {} is up to date", report.release.version_label)
    }
}
