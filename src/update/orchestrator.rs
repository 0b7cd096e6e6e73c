//! The update state machine.
//!
//! ```text
//! Resolving -> Deciding -> UpToDate ------------------------------------> Done
//!                       \-> Guarding -> Fetching -> Verifying -> Swapping -> Recording -> Done
//! ```
//!
//! Everything from `Guarding` to `Recording` runs under the install lock. The
//! only destructive step is the `rename` in `Swapping`, which happens after the
//! downloaded bytes have been fully written, synced and verified.

use crate::config::InstallerConfig;
use crate::constants::default_lock_timeout;
use crate::core::AiupError;
use crate::update::guard::{ProcessGuard, ProcessLister, ProcessTerminator};
use crate::update::release::{ReleaseInfo, ReleaseResolver};
use crate::update::state::InstallStateStore;
use crate::update::transport::{Criticality, Fetcher, NoProgress, ProgressObserver, Transport};
use crate::update::verification::{ChecksumVerifier, Sha256Digest};
use crate::utils::fs::set_executable;
use crate::utils::lock::InstallLock;
use anyhow::Result;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

/// States of one update run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateState {
    /// Querying the release endpoint
    Resolving,
    /// Comparing the release with the install
    Deciding,
    /// Nothing to install
    UpToDate,
    /// Stopping running instances
    Guarding,
    /// Downloading into the staging directory
    Fetching,
    /// Hashing the download
    Verifying,
    /// Renaming the download onto the binary path
    Swapping,
    /// Writing the version label
    Recording,
    /// Finished
    Done,
}

impl fmt::Display for UpdateState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Resolving => "resolving",
            Self::Deciding => "deciding",
            Self::UpToDate => "up-to-date",
            Self::Guarding => "guarding",
            Self::Fetching => "fetching",
            Self::Verifying => "verifying",
            Self::Swapping => "swapping",
            Self::Recording => "recording",
            Self::Done => "done",
        };
        f.write_str(name)
    }
}

/// Why the orchestrator decided to install or skip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// No binary at the install path.
    NotInstalled,
    /// The persisted label equals the resolved one. Nothing was hashed.
    LabelMatch,
    /// The local binary hashes to the advertised digest.
    DigestMatch(Sha256Digest),
    /// The local binary hashes to something else.
    DigestMismatch {
        /// Advertised digest
        expected: Sha256Digest,
        /// Digest of the local binary
        actual: Sha256Digest,
    },
    /// The local binary could not be hashed.
    LocalUnreadable,
    /// Labels differ and there is no digest to settle it.
    Unverifiable,
}

impl Decision {
    /// Whether this decision leads to the install phase.
    pub fn needs_install(&self) -> bool {
        !matches!(self, Self::LabelMatch | Self::DigestMatch(_))
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotInstalled => write!(f, "not installed"),
            Self::LabelMatch => write!(f, "installed version matches"),
            Self::DigestMatch(_) => write!(f, "installed binary matches the release checksum"),
            Self::DigestMismatch {
                ..
            } => write!(f, "installed binary differs from the release"),
            Self::LocalUnreadable => write!(f, "installed binary could not be read"),
            Self::Unverifiable => write!(f, "installed version differs"),
        }
    }
}

/// Result of a successful run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// Nothing was downloaded.
    UpToDate {
        /// The resolved version label
        version: String,
        /// Whether a missing or stale label file was rewritten
        backfilled: bool,
    },
    /// A new binary was installed.
    Installed {
        /// The recorded version label
        version: String,
        /// Digest of the installed bytes
        digest: Sha256Digest,
    },
}

impl UpdateOutcome {
    /// Version label the install now corresponds to.
    pub fn version(&self) -> &str {
        match self {
            Self::UpToDate {
                version,
                ..
            }
            | Self::Installed {
                version,
                ..
            } => version,
        }
    }
}

/// Result of [`UpdateOrchestrator::check`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckReport {
    /// What the endpoint advertised
    pub release: ReleaseInfo,
    /// Label in the version file, if any
    pub installed_version: Option<String>,
    /// What a full run would do
    pub decision: Decision,
}

/// Ties resolver, verifier, store, guard and transport together.
pub struct UpdateOrchestrator<F, L, T> {
    install_dir: PathBuf,
    verify_on_label_match: bool,
    lock_timeout: Duration,
    resolver: ReleaseResolver,
    store: InstallStateStore,
    transport: Transport<F>,
    guard: ProcessGuard<L, T>,
    observer: Box<dyn ProgressObserver>,
}

impl<F, L, T> UpdateOrchestrator<F, L, T>
where
    F: Fetcher,
    L: ProcessLister,
    T: ProcessTerminator,
{
    /// Build an orchestrator for `config`.
    pub fn new(config: &InstallerConfig, transport: Transport<F>, guard: ProcessGuard<L, T>) -> Self {
        Self {
            install_dir: config.install_dir.clone(),
            verify_on_label_match: config.verify_on_label_match,
            lock_timeout: default_lock_timeout(),
            resolver: ReleaseResolver::new(config.api_url.clone()),
            store: InstallStateStore::new(config.binary_path(), config.version_file()),
            transport,
            guard,
            observer: Box::new(NoProgress),
        }
    }

    /// Report download progress to `observer`.
    pub fn with_observer(mut self, observer: impl ProgressObserver + 'static) -> Self {
        self.observer = Box::new(observer);
        self
    }

    /// Override how long to wait for the install lock.
    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    /// The install state store.
    pub fn store(&self) -> &InstallStateStore {
        &self.store
    }

    /// The transport used for downloads.
    pub fn transport(&self) -> &Transport<F> {
        &self.transport
    }

    fn enter(&self, state: UpdateState) {
        debug!(%state, "Update state");
    }

    /// Resolve and decide without touching the install.
    pub async fn check(&self) -> Result<CheckReport> {
        self.enter(UpdateState::Resolving);
        let release = self.resolver.resolve(self.transport.fetcher()).await?;
        self.enter(UpdateState::Deciding);
        let decision = self.decide(&release).await;
        Ok(CheckReport {
            installed_version: self.store.read_version().await,
            release,
            decision,
        })
    }

    /// Run the full state machine.
    ///
    /// # Errors
    ///
    /// Any [`AiupError`] of the resolve or install phases. On error the
    /// previously installed binary and version label are left untouched.
    pub async fn run(&self) -> Result<UpdateOutcome> {
        self.enter(UpdateState::Resolving);
        let release = self.resolver.resolve(self.transport.fetcher()).await?;

        self.enter(UpdateState::Deciding);
        let decision = self.decide(&release).await;
        info!(version = %release.version_label, decision = %decision, "Update decision");

        let outcome = if decision.needs_install() {
            self.install(&release).await?
        } else {
            self.enter(UpdateState::UpToDate);
            let backfilled = match decision {
                Decision::DigestMatch(_) => {
                    self.repair_mode().await;
                    self.backfill(&release.version_label).await
                }
                _ => false,
            };
            UpdateOutcome::UpToDate {
                version: release.version_label,
                backfilled,
            }
        };

        self.enter(UpdateState::Done);
        Ok(outcome)
    }

    /// Decide whether `release` needs installing.
    ///
    /// Evaluated in order, first match wins:
    ///
    /// 1. No binary installed: install
    /// 2. Persisted label equals the resolved label: skip without hashing,
    ///    unless `verify_on_label_match` is set and a digest is available
    /// 3. Digest advertised: hash the local binary and compare
    /// 4. Otherwise: install
    pub async fn decide(&self, release: &ReleaseInfo) -> Decision {
        if !self.store.binary_exists().await {
            return Decision::NotInstalled;
        }

        let label_matches =
            self.store.read_version().await.as_deref() == Some(release.version_label.as_str());
        if label_matches && !(self.verify_on_label_match && release.expected_digest.is_some()) {
            return Decision::LabelMatch;
        }

        let Some(expected) = release.expected_digest else {
            return Decision::Unverifiable;
        };

        match ChecksumVerifier::digest(self.store.binary_path()).await {
            Ok(actual) if ChecksumVerifier::equal(&expected, &actual) => {
                Decision::DigestMatch(actual)
            }
            Ok(actual) => Decision::DigestMismatch {
                expected,
                actual,
            },
            Err(e) => {
                warn!("Cannot hash installed binary, reinstalling: {e:#}");
                Decision::LocalUnreadable
            }
        }
    }

    /// A digest match without a matching label means a run stopped between
    /// swap and record, possibly before the binary was made executable.
    async fn repair_mode(&self) {
        let binary_path = self.store.binary_path();
        if let Err(e) = set_executable(binary_path).await {
            warn!("Could not make {} executable: {e}", binary_path.display());
        }
    }

    /// Record `label` after a digest match. Failure is only a warning.
    async fn backfill(&self, label: &str) -> bool {
        if self.store.read_version().await.as_deref() == Some(label) {
            return false;
        }
        match self.store.write_version(label).await {
            Ok(()) => true,
            Err(e) => {
                warn!("Could not record version {label}: {e:#}");
                false
            }
        }
    }

    async fn install(&self, release: &ReleaseInfo) -> Result<UpdateOutcome> {
        tokio::fs::create_dir_all(&self.install_dir)
            .await
            .map_err(|e| AiupError::install_io("create install directory", &self.install_dir, &e))?;
        let _lock = InstallLock::acquire_with_timeout(&self.install_dir, self.lock_timeout).await?;

        self.enter(UpdateState::Guarding);
        let report = self.guard.terminate_running_instances().await?;
        if !report.matched.is_empty() {
            info!(stopped = report.matched.len(), "Stopped running instances");
        }

        self.enter(UpdateState::Fetching);
        // Same file system as the binary so the swap is a plain rename
        let staging = tempfile::Builder::new()
            .prefix(".aiup-download-")
            .tempdir_in(&self.install_dir)
            .map_err(|e| AiupError::install_io("create staging directory", &self.install_dir, &e))?;
        let staged = staging.path().join("download");
        self.transport
            .fetch(&release.locator, &staged, Criticality::Fatal, self.observer.as_ref())
            .await?;

        self.enter(UpdateState::Verifying);
        let actual = ChecksumVerifier::digest(&staged).await?;
        match release.expected_digest {
            Some(expected) if !ChecksumVerifier::equal(&expected, &actual) => {
                drop(staging);
                return Err(AiupError::IntegrityMismatch {
                    expected: expected.to_hex(),
                    actual: actual.to_hex(),
                }
                .into());
            }
            Some(_) => debug!(digest = %actual, "Checksum verified"),
            None => warn!(
                "No checksum published for {}, installing unverified download ({actual})",
                release.version_label
            ),
        }

        self.enter(UpdateState::Swapping);
        let binary_path = self.store.binary_path();
        // Mode travels with the rename; a crash after it cannot leave a non-executable binary
        set_executable(&staged)
            .await
            .map_err(|e| AiupError::install_io("set executable permission", &staged, &e))?;
        tokio::fs::rename(&staged, binary_path)
            .await
            .map_err(|e| AiupError::install_io("replace binary", binary_path, &e))?;
        set_executable(binary_path)
            .await
            .map_err(|e| AiupError::install_io("set executable permission", binary_path, &e))?;

        self.enter(UpdateState::Recording);
        self.store.write_version(&release.version_label).await?;

        info!(version = %release.version_label, digest = %actual, "Installed release");
        Ok(UpdateOutcome::Installed {
            version: release.version_label.clone(),
            digest: actual,
        })
    }
}
