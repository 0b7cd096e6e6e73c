//! Update decision and atomic install.
//!
//! # Components
//!
//! - [`verification`] - SHA-256 digests of installed and downloaded files
//! - [`transport`] - retrying downloads with progress reporting
//! - [`release`] - release metadata lookup
//! - [`state`] - the installed binary and its version label on disk
//! - [`guard`] - stopping running instances before the swap
//! - [`orchestrator`] - the state machine tying them together
//!
//! # Guarantees
//!
//! - An existing working install is never replaced by bytes that failed
//!   verification or were not fully downloaded
//! - No instance of the old version is left running when the new one lands
//! - The version label is written only after the binary it describes
//!
//! # Example
//!
//! ```rust,no_run
//! use aiup_cli::config::InstallerConfig;
//! use aiup_cli::update::{
//!     HttpFetcher, ProcessGuard, ProcessMatcher, ProcfsLister, SignalTerminator, Transport,
//!     UpdateOrchestrator,
//! };
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = InstallerConfig::load(None).await?;
//! let fetcher =
//!     HttpFetcher::new(&config.user_agent, config.request_timeout(), config.metadata_timeout())?;
//! let guard = ProcessGuard::new(
//!     ProcfsLister::default(),
//!     SignalTerminator,
//!     ProcessMatcher::for_current_user(&config.binary_path()),
//!     config.termination_grace(),
//! );
//! let orchestrator =
//!     UpdateOrchestrator::new(&config, Transport::new(fetcher, config.retry_policy()), guard);
//! let outcome = orchestrator.run().await?;
//! println!("{} is current", outcome.version());
//! # Ok(())
//! # }
//! ```

pub mod guard;
pub mod orchestrator;
pub mod release;
pub mod state;
pub mod transport;
pub mod verification;

pub use guard::{
    ProcessGuard, ProcessInfo, ProcessLister, ProcessMatcher, ProcessTerminator, ProcfsLister,
    Signal, SignalOutcome, SignalTerminator, TerminationReport,
};
pub use orchestrator::{CheckReport, Decision, UpdateOrchestrator, UpdateOutcome, UpdateState};
pub use release::{ReleaseInfo, ReleaseResolver};
pub use state::InstallStateStore;
pub use transport::{
    Backoff, ByteStream, Criticality, DownloadAttempt, DownloadProgress, Fetcher, HttpFetcher,
    IndicatifObserver, NoProgress, ProgressObserver, RetryPolicy, Transport,
};
pub use verification::{ChecksumVerifier, Sha256Digest};
