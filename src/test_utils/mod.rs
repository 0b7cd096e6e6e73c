//! Test utilities for AIUP
//!
//! In-memory stand-ins for the capabilities the update state machine depends
//! on, so tests can drive it without a network or real processes:
//!
//! - [`FakeFetcher`] - scripted HTTP bodies, failures and JSON documents
//! - [`RecordingObserver`] - captures progress reports
//! - [`FakeProcessTable`] - a process table with scripted signal behaviour
//!
//! Fakes share their state between clones, so a test can hand one clone to the
//! code under test and inspect another afterwards.
//!
//! # Example
//!
//! ```rust,no_run
//! use aiup_cli::test_utils::FakeFetcher;
//!
//! let fetcher = FakeFetcher::new()
//!     .with_json("https://example.com/api", r#"{"downloadUrl":"https://example.com/app"}"#)
//!     .with_body("https://example.com/app", b"binary".to_vec());
//! assert_eq!(fetcher.open_count("https://example.com/app"), 0);
//! ```

mod fetcher;
mod processes;

pub use fetcher::{FakeFetcher, FakeStream, RecordingObserver};
pub use processes::{FakeProcess, FakeProcessTable, running_app};

use std::sync::Once;
use tracing::Level;
use tracing_subscriber::EnvFilter;

/// Global flag to ensure logging is only initialized once in tests
static INIT_LOGGING: Once = Once::new();

/// Initialize logging for tests.
///
/// Only the first call has an effect. Uses `level` if given, otherwise
/// `RUST_LOG`; with neither, logging stays off.
///
/// ```bash
/// RUST_LOG=aiup_cli=debug cargo test
/// ```
pub fn init_test_logging(level: Option<Level>) {
    INIT_LOGGING.call_once(|| {
        let filter = if let Some(level) = level {
            EnvFilter::new(level.to_string())
        } else if std::env::var("RUST_LOG").is_ok() {
            EnvFilter::from_default_env()
        } else {
            return;
        };

        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .with_thread_ids(false)
            .try_init();
    });
}
