//! Configuration for AIUP.
//!
//! The installer is driven entirely by an [`InstallerConfig`] that is loaded once
//! at startup and passed down to every component. No component reads fixed paths
//! or URLs on its own.
//!
//! # Location Priority
//!
//! 1. `--config <path>` on the command line
//! 2. `AIUP_CONFIG_PATH` environment variable
//! 3. `~/.aiup/config.toml`
//! 4. Built-in defaults (the Cursor AppImage layout)

mod installer;

pub use installer::{CONFIG_PATH_ENV, InstallerConfig};
