//! Global constants used throughout the AIUP codebase.
//!
//! This module contains timeout durations, retry parameters, and buffer sizes
//! that are used across multiple modules. Defining them centrally makes the
//! magic numbers discoverable and keeps the defaults in
//! [`InstallerConfig`](crate::config::InstallerConfig) consistent.

use std::time::Duration;

/// Default timeout for install lock acquisition (30 seconds).
///
/// Installs are short once the download has finished, so a second installer
/// run waiting longer than this is almost certainly stuck.
pub fn default_lock_timeout() -> Duration {
    Duration::from_secs(30)
}

/// Maximum backoff delay for exponential backoff (500ms).
pub const MAX_BACKOFF_DELAY_MS: u64 = 500;

/// Starting delay for exponential backoff (10ms).
///
/// Doubles on each retry attempt until [`MAX_BACKOFF_DELAY_MS`] is reached.
pub const STARTING_BACKOFF_DELAY_MS: u64 = 10;

/// Chunk size used when hashing files (8 KiB).
pub const HASH_CHUNK_SIZE: usize = 8 * 1024;

/// Buffer size for the download writer (64 KiB).
pub const DOWNLOAD_BUFFER_SIZE: usize = 64 * 1024;

/// Default number of download attempts before giving up.
pub const DEFAULT_DOWNLOAD_ATTEMPTS: u32 = 3;

/// Default fixed delay between download attempts (2 seconds).
pub const DEFAULT_RETRY_DELAY_MS: u64 = 2_000;

/// Default per-request timeout for binary downloads (60 seconds).
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 60;

/// Default timeout for the release metadata request (15 seconds).
pub const DEFAULT_METADATA_TIMEOUT_SECS: u64 = 15;

/// Default grace interval after a graceful termination request (1 second).
pub const DEFAULT_TERMINATION_GRACE_MS: u64 = 1_000;

/// How often survivors are polled while waiting out the grace interval.
pub const TERMINATION_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Settle time after a forceful kill before the final survivor check.
pub const FORCE_KILL_SETTLE: Duration = Duration::from_millis(200);

/// Version label used when the release endpoint does not report one.
pub const UNKNOWN_VERSION: &str = "unknown";
