//! Retrying byte transfer from a URL into a file.
//!
//! The network primitive itself sits behind the [`Fetcher`] trait so the
//! retry, truncation and progress logic here can be exercised without a
//! server. [`HttpFetcher`] is the production implementation built on
//! `reqwest`.

use crate::constants::{DOWNLOAD_BUFFER_SIZE, MAX_BACKOFF_DELAY_MS, STARTING_BACKOFF_DELAY_MS};
use crate::core::AiupError;
use crate::utils::progress::ProgressBar;
use anyhow::{Context, Result};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio_retry::strategy::{ExponentialBackoff, FixedInterval};
use tracing::{debug, info, warn};

/// A response body that can be read chunk by chunk.
pub trait ByteStream: Send {
    /// Total size advertised by the server, if any.
    ///
    /// Informational only: it may be absent or wrong.
    fn content_length(&self) -> Option<u64>;

    /// Next chunk of the body, or `None` once the server signalled end of data.
    fn next_chunk(&mut self) -> impl Future<Output = Result<Option<Vec<u8>>>> + Send;
}

/// The network fetch capability.
///
/// Implementations only move bytes; retries and file handling belong to
/// [`Transport`].
pub trait Fetcher: Send + Sync {
    /// Body type produced by [`open`](Fetcher::open).
    type Stream: ByteStream;

    /// Issue a request for `locator` and return its body once the status is known
    /// to be successful.
    fn open(&self, locator: &str) -> impl Future<Output = Result<Self::Stream>> + Send;

    /// Fetch a small JSON document as text.
    fn get_json_text(&self, locator: &str) -> impl Future<Output = Result<String>> + Send;
}

/// `reqwest`-backed [`Fetcher`].
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    metadata_timeout: Duration,
}

impl HttpFetcher {
    /// Build a fetcher with the given `User-Agent` and timeouts.
    ///
    /// `read_timeout` bounds each socket read rather than the whole transfer,
    /// so large downloads are not cut off while still making progress.
    pub fn new(user_agent: &str, read_timeout: Duration, metadata_timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .connect_timeout(read_timeout)
            .read_timeout(read_timeout)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            metadata_timeout,
        })
    }
}

/// Body of a `reqwest` response.
#[derive(Debug)]
pub struct HttpStream {
    response: reqwest::Response,
}

impl ByteStream for HttpStream {
    fn content_length(&self) -> Option<u64> {
        self.response.content_length()
    }

    async fn next_chunk(&mut self) -> Result<Option<Vec<u8>>> {
        let chunk = self.response.chunk().await.context("Failed to read response body")?;
        Ok(chunk.map(|bytes| bytes.to_vec()))
    }
}

impl Fetcher for HttpFetcher {
    type Stream = HttpStream;

    async fn open(&self, locator: &str) -> Result<HttpStream> {
        let response = self
            .client
            .get(locator)
            .send()
            .await
            .with_context(|| format!("Request to {locator} failed"))?
            .error_for_status()
            .with_context(|| format!("Server rejected request to {locator}"))?;

        Ok(HttpStream {
            response,
        })
    }

    async fn get_json_text(&self, locator: &str) -> Result<String> {
        let response = self
            .client
            .get(locator)
            .header(reqwest::header::ACCEPT, "application/json")
            .timeout(self.metadata_timeout)
            .send()
            .await
            .with_context(|| format!("Request to {locator} failed"))?
            .error_for_status()
            .with_context(|| format!("Server rejected request to {locator}"))?;

        response.text().await.context("Failed to read response body")
    }
}

/// Delay schedule between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    /// Retry immediately.
    None,
    /// The same delay before every retry.
    Fixed(Duration),
    /// Exponential backoff starting at `initial_ms`, capped at `max_delay`.
    Exponential {
        /// First delay in milliseconds
        initial_ms: u64,
        /// Upper bound for any delay
        max_delay: Duration,
    },
}

/// Bounded retry policy for [`Transport`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total number of attempts, including the first. Never zero.
    pub max_attempts: u32,
    /// Delay schedule between attempts.
    pub backoff: Backoff,
}

impl RetryPolicy {
    /// `max_attempts` attempts with no delay in between.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff: Backoff::None,
        }
    }

    /// `max_attempts` attempts separated by a fixed `delay`.
    pub fn fixed(max_attempts: u32, delay: Duration) -> Self {
        let backoff = if delay.is_zero() {
            Backoff::None
        } else {
            Backoff::Fixed(delay)
        };
        Self {
            max_attempts: max_attempts.max(1),
            backoff,
        }
    }

    /// `max_attempts` attempts with exponential backoff (10ms → 500ms).
    pub fn exponential(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff: Backoff::Exponential {
                initial_ms: STARTING_BACKOFF_DELAY_MS,
                max_delay: Duration::from_millis(MAX_BACKOFF_DELAY_MS),
            },
        }
    }

    /// The delays taken between attempts; exactly `max_attempts - 1` items.
    pub fn delays(&self) -> Box<dyn Iterator<Item = Duration> + Send> {
        let retries = self.max_attempts.saturating_sub(1) as usize;
        match self.backoff {
            Backoff::None => Box::new(std::iter::repeat_n(Duration::ZERO, retries)),
            Backoff::Fixed(delay) => Box::new(
                FixedInterval::from_millis(delay.as_millis() as u64).take(retries),
            ),
            Backoff::Exponential {
                initial_ms,
                max_delay,
            } => Box::new(
                ExponentialBackoff::from_millis(initial_ms).max_delay(max_delay).take(retries),
            ),
        }
    }
}

/// Whether an exhausted fetch aborts the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Criticality {
    /// Exhausted retries produce [`AiupError::FetchFailed`].
    Fatal,
    /// Exhausted retries produce `Ok(false)` so the caller can fall back.
    BestEffort,
}

/// Progress as reported to observers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadProgress {
    /// Percentage of the advertised total (capped at 100).
    Percent(u8),
    /// Raw bytes received; the server did not advertise a total.
    Bytes(u64),
}

/// State of one attempt of one [`Transport::fetch`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadAttempt {
    /// File being written
    pub destination: PathBuf,
    /// Bytes written so far
    pub bytes_written: u64,
    /// Size advertised by the server
    pub total_expected: Option<u64>,
}

impl DownloadAttempt {
    fn new(destination: &Path, total_expected: Option<u64>) -> Self {
        Self {
            destination: destination.to_path_buf(),
            bytes_written: 0,
            total_expected: total_expected.filter(|total| *total > 0),
        }
    }

    fn record(&mut self, len: usize) {
        self.bytes_written = self.bytes_written.saturating_add(len as u64);
    }

    /// Current progress of this attempt.
    pub fn progress(&self) -> DownloadProgress {
        match self.total_expected {
            Some(total) => {
                let percent = (self.bytes_written.saturating_mul(100) / total).min(100);
                DownloadProgress::Percent(percent as u8)
            }
            None => DownloadProgress::Bytes(self.bytes_written),
        }
    }
}

/// Receives progress updates from [`Transport`].
///
/// Within one attempt, the reported byte counts never decrease. A retry starts
/// a new attempt with a fresh `on_start`.
pub trait ProgressObserver: Send + Sync {
    /// An attempt started; `total` is the advertised size if any.
    fn on_start(&self, _total: Option<u64>) {}
    /// A chunk was written.
    fn on_progress(&self, _attempt: &DownloadAttempt) {}
    /// The attempt failed and will be abandoned.
    fn on_abandon(&self) {}
    /// The body was fully written.
    fn on_finish(&self, _bytes: u64) {}
}

/// Observer that ignores every update.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressObserver for NoProgress {}

/// Observer drawing an `indicatif` bar on the terminal.
#[derive(Debug)]
pub struct IndicatifObserver {
    label: String,
    bar: Mutex<Option<ProgressBar>>,
}

impl IndicatifObserver {
    /// Create an observer whose bar is prefixed with `label`.
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            bar: Mutex::new(None),
        }
    }

    fn with_bar(&self, f: impl FnOnce(&ProgressBar)) {
        if let Ok(guard) = self.bar.lock() {
            if let Some(bar) = guard.as_ref() {
                f(bar);
            }
        }
    }
}

impl ProgressObserver for IndicatifObserver {
    fn on_start(&self, total: Option<u64>) {
        if let Ok(mut guard) = self.bar.lock() {
            *guard = Some(ProgressBar::download(total, self.label.clone()));
        }
    }

    fn on_progress(&self, attempt: &DownloadAttempt) {
        self.with_bar(|bar| bar.set_position(attempt.bytes_written));
    }

    fn on_abandon(&self) {
        self.with_bar(ProgressBar::finish_and_clear);
    }

    fn on_finish(&self, _bytes: u64) {
        self.with_bar(ProgressBar::finish_and_clear);
    }
}

/// Fetches a locator into a destination file with bounded retries.
pub struct Transport<F> {
    fetcher: F,
    policy: RetryPolicy,
}

impl<F: Fetcher> Transport<F> {
    /// Create a transport over `fetcher` using `policy`.
    pub fn new(fetcher: F, policy: RetryPolicy) -> Self {
        Self {
            fetcher,
            policy,
        }
    }

    /// The underlying fetcher.
    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    /// The retry policy.
    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Download `locator` into `destination`.
    ///
    /// The destination is truncated at the start of every attempt. After a
    /// failed attempt its content is indeterminate. Success is declared only
    /// when the body stream reports end of data and the file has been flushed
    /// and synced.
    ///
    /// # Returns
    ///
    /// - `Ok(true)` - the body was fully written
    /// - `Ok(false)` - every attempt failed and `criticality` is
    ///   [`Criticality::BestEffort`]
    ///
    /// # Errors
    ///
    /// [`AiupError::FetchFailed`] once every attempt failed and `criticality`
    /// is [`Criticality::Fatal`].
    pub async fn fetch(
        &self,
        locator: &str,
        destination: &Path,
        criticality: Criticality,
        observer: &dyn ProgressObserver,
    ) -> Result<bool> {
        let max_attempts = self.policy.max_attempts;
        let mut delays = self.policy.delays();
        let mut attempt = 0u32;

        let last_error = loop {
            attempt += 1;
            debug!(url = %locator, attempt, max_attempts, "Starting download attempt");

            match self.attempt(locator, destination, observer).await {
                Ok(bytes) => {
                    info!(url = %locator, bytes, attempt, "Download complete");
                    return Ok(true);
                }
                Err(e) => {
                    observer.on_abandon();
                    warn!("Download of {locator} failed (attempt {attempt}/{max_attempts}): {e:#}");

                    match delays.next() {
                        Some(delay) if attempt < max_attempts => {
                            if !delay.is_zero() {
                                tokio::time::sleep(delay).await;
                            }
                        }
                        _ => break e,
                    }
                }
            }
        };

        match criticality {
            Criticality::Fatal => Err(AiupError::FetchFailed {
                url: locator.to_string(),
                attempts: attempt,
                reason: format!("{last_error:#}"),
            }
            .into()),
            Criticality::BestEffort => Ok(false),
        }
    }

    async fn attempt(
        &self,
        locator: &str,
        destination: &Path,
        observer: &dyn ProgressObserver,
    ) -> Result<u64> {
        let mut stream = self.fetcher.open(locator).await?;

        // File::create truncates whatever a previous attempt left behind
        let file = File::create(destination)
            .await
            .with_context(|| format!("Failed to create {}", destination.display()))?;
        let mut writer = BufWriter::with_capacity(DOWNLOAD_BUFFER_SIZE, file);

        let mut state = DownloadAttempt::new(destination, stream.content_length());
        observer.on_start(state.total_expected);

        while let Some(chunk) = stream.next_chunk().await? {
            if chunk.is_empty() {
                continue;
            }
            writer
                .write_all(&chunk)
                .await
                .with_context(|| format!("Failed to write {}", destination.display()))?;
            state.record(chunk.len());
            observer.on_progress(&state);
        }

        writer.flush().await.context("Failed to flush download")?;
        writer.into_inner().sync_all().await.context("Failed to sync download to disk")?;

        observer.on_finish(state.bytes_written);
        Ok(state.bytes_written)
    }
}
