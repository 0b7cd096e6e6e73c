//! Scripted [`Fetcher`] and a recording [`ProgressObserver`].

use crate::update::transport::{ByteStream, DownloadAttempt, DownloadProgress, Fetcher, ProgressObserver};
use anyhow::{Result, anyhow};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, Copy)]
enum Advertised {
    Actual,
    Missing,
    Fixed(u64),
}

#[derive(Debug, Default)]
struct FetcherState {
    bodies: HashMap<String, Vec<u8>>,
    json: HashMap<String, String>,
    failures: HashMap<String, usize>,
    opens: HashMap<String, usize>,
}

/// In-memory [`Fetcher`].
///
/// Unknown locators fail to open, like an unreachable host. Every `open` is
/// counted, successful or not.
#[derive(Debug, Clone)]
pub struct FakeFetcher {
    state: Arc<Mutex<FetcherState>>,
    chunk_size: usize,
    advertised: Advertised,
}

impl Default for FakeFetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeFetcher {
    /// Fetcher that knows no locators.
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(FetcherState::default())),
            chunk_size: 8 * 1024,
            advertised: Advertised::Actual,
        }
    }

    /// Serve `body` for `url`.
    pub fn with_body(self, url: &str, body: Vec<u8>) -> Self {
        self.state.lock().unwrap().bodies.insert(url.to_string(), body);
        self
    }

    /// Serve `json` from `get_json_text(url)`.
    pub fn with_json(self, url: &str, json: impl Into<String>) -> Self {
        self.state.lock().unwrap().json.insert(url.to_string(), json.into());
        self
    }

    /// Split bodies into chunks of `size` bytes.
    pub fn with_chunk_size(mut self, size: usize) -> Self {
        self.chunk_size = size.max(1);
        self
    }

    /// The first `times` opens of `url` yield one chunk and then fail.
    pub fn fail_mid_stream(self, url: &str, times: usize) -> Self {
        self.state.lock().unwrap().failures.insert(url.to_string(), times);
        self
    }

    /// Do not advertise a content length.
    pub fn without_content_length(mut self) -> Self {
        self.advertised = Advertised::Missing;
        self
    }

    /// Advertise `length` regardless of the real body size.
    pub fn with_advertised_length(mut self, length: u64) -> Self {
        self.advertised = Advertised::Fixed(length);
        self
    }

    /// How many times `url` was opened.
    pub fn open_count(&self, url: &str) -> usize {
        self.state.lock().unwrap().opens.get(url).copied().unwrap_or(0)
    }
}

/// Body produced by [`FakeFetcher`].
#[derive(Debug)]
pub struct FakeStream {
    chunks: VecDeque<Vec<u8>>,
    content_length: Option<u64>,
    fail_after_first: bool,
    delivered: usize,
}

impl ByteStream for FakeStream {
    fn content_length(&self) -> Option<u64> {
        self.content_length
    }

    async fn next_chunk(&mut self) -> Result<Option<Vec<u8>>> {
        if self.fail_after_first && self.delivered >= 1 {
            return Err(anyhow!("connection reset by peer"));
        }
        self.delivered += 1;
        Ok(self.chunks.pop_front())
    }
}

impl Fetcher for FakeFetcher {
    type Stream = FakeStream;

    async fn open(&self, locator: &str) -> Result<FakeStream> {
        let mut state = self.state.lock().unwrap();
        *state.opens.entry(locator.to_string()).or_default() += 1;

        let body = state
            .bodies
            .get(locator)
            .cloned()
            .ok_or_else(|| anyhow!("connection refused: {locator}"))?;

        let fail_after_first = match state.failures.get_mut(locator) {
            Some(left) if *left > 0 => {
                *left -= 1;
                true
            }
            _ => false,
        };

        let content_length = match self.advertised {
            Advertised::Actual => Some(body.len() as u64),
            Advertised::Missing => None,
            Advertised::Fixed(length) => Some(length),
        };

        Ok(FakeStream {
            chunks: body.chunks(self.chunk_size).map(<[u8]>::to_vec).collect(),
            content_length,
            fail_after_first,
            delivered: 0,
        })
    }

    async fn get_json_text(&self, locator: &str) -> Result<String> {
        self.state
            .lock()
            .unwrap()
            .json
            .get(locator)
            .cloned()
            .ok_or_else(|| anyhow!("connection refused: {locator}"))
    }
}

/// [`ProgressObserver`] that records every report.
#[derive(Debug, Default)]
pub struct RecordingObserver {
    progress: Mutex<Vec<DownloadProgress>>,
    starts: Mutex<Vec<Option<u64>>>,
    finished: Mutex<Vec<u64>>,
    abandoned: Mutex<usize>,
}

impl RecordingObserver {
    /// Progress reports in order, across all attempts.
    pub fn progress(&self) -> Vec<DownloadProgress> {
        self.progress.lock().unwrap().clone()
    }

    /// Advertised totals of each started attempt.
    pub fn starts(&self) -> Vec<Option<u64>> {
        self.starts.lock().unwrap().clone()
    }

    /// Byte counts of completed downloads.
    pub fn finished(&self) -> Vec<u64> {
        self.finished.lock().unwrap().clone()
    }

    /// Number of abandoned attempts.
    pub fn abandoned(&self) -> usize {
        *self.abandoned.lock().unwrap()
    }
}

impl ProgressObserver for RecordingObserver {
    fn on_start(&self, total: Option<u64>) {
        self.starts.lock().unwrap().push(total);
    }

    fn on_progress(&self, attempt: &DownloadAttempt) {
        self.progress.lock().unwrap().push(attempt.progress());
    }

    fn on_abandon(&self) {
        *self.abandoned.lock().unwrap() += 1;
    }

    fn on_finish(&self, bytes: u64) {
        self.finished.lock().unwrap().push(bytes);
    }
}
