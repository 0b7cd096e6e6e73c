//! AIUP - AppImage updater
//!
//! Keeps a single AppImage application current. Each run asks the vendor's
//! release endpoint for the latest build, decides whether the installed copy
//! is current, and if not replaces it with a freshly downloaded, verified
//! copy after stopping any running instance.
//!
//! # Architecture Overview
//!
//! The core is the update state machine in [`update`]:
//!
//! ```text
//! ReleaseResolver -> UpdateOrchestrator -> (ChecksumVerifier <-> InstallStateStore)
//!     -> decision -> [skip | ProcessGuard -> Transport -> staging
//!                           -> ChecksumVerifier -> rename -> InstallStateStore]
//! ```
//!
//! Three guarantees hold on every path, including errors and interrupts:
//!
//! - An existing working install is never corrupted
//! - The old version is not left running next to the new one
//! - Unverified bytes never reach the install path
//!
//! # Modules
//!
//! - [`update`] - resolver, transport, verifier, state store, process guard, orchestrator
//! - [`integration`] - icon, desktop entry, login profile, launch, platform check
//! - [`config`] - [`InstallerConfig`](config::InstallerConfig) loaded from TOML
//! - [`core`] - error types and user-facing error reporting
//! - [`utils`] - atomic writes, install lock, progress bars
//! - [`cli`] - the `aiup` command
//!
//! # Configuration
//!
//! The defaults install Cursor to `~/Applications/cursor`. Any other AppImage
//! with a JSON release endpoint can be managed with a `~/.aiup/config.toml`:
//!
//! ```toml
//! app_name = "Editor"
//! install_dir = "~/Applications/editor"
//! binary_name = "editor.AppImage"
//! api_url = "https://example.com/api/latest"
//! ```

pub mod cli;
pub mod config;
pub mod constants;
pub mod core;
pub mod integration;
pub mod update;
pub mod utils;

// test_utils module is available for both unit tests and integration tests
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
