//! Series provider trait and structured error types.
//!
//! The SeriesProvider trait abstracts over remote statistical APIs (FRED, BLS)
//! so the fetch orchestration can be driven by a mock in tests.

use crate::domain::{Frequency, SeriesError};
use chrono::NaiveDate;
use std::path::PathBuf;
use thiserror::Error;

/// Structured error types for data operations.
///
/// These are displayable directly in CLI output.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("missing credential: {0}")]
    MissingCredential(String),

    #[error("required source file not found: {}", path.display())]
    MissingSource { path: PathBuf },

    #[error("network unreachable: {0}")]
    NetworkUnreachable(String),

    #[error("provider returned HTTP {status}: {body}")]
    HttpStatus { status: u16, body: String },

    #[error("rate limited by provider")]
    RateLimited,

    #[error("response format changed: {0}")]
    ResponseFormatChanged(String),

    #[error("series not found: {series_id}")]
    SeriesNotFound { series_id: String },

    #[error("series '{series_id}' returned no observations")]
    EmptySeries { series_id: String },

    #[error("failed to read {}: {reason}", path.display())]
    Ingest { path: PathBuf, reason: String },

    #[error(transparent)]
    DuplicateObservation(#[from] SeriesError),

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("data error: {0}")]
    Other(String),
}

impl DataError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        DataError::Io {
            path: path.into(),
            source,
        }
    }
}

/// One request for a single provider series.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeriesRequest {
    pub series_id: String,
    pub start: NaiveDate,
    /// Ask the provider to aggregate to this frequency before returning.
    pub frequency: Option<Frequency>,
}

impl SeriesRequest {
    pub fn new(series_id: impl Into<String>, start: NaiveDate) -> Self {
        Self {
            series_id: series_id.into(),
            start,
            frequency: None,
        }
    }

    pub fn with_frequency(mut self, frequency: Option<Frequency>) -> Self {
        self.frequency = frequency;
        self
    }
}

/// A dated value as returned by a provider. Placeholder readings are
/// already dropped.
pub type DatedValue = (NaiveDate, f64);

/// Trait for remote series providers (FRED, BLS).
///
/// Implementations make exactly one logical request per call and never retry.
pub trait SeriesProvider: Send + Sync {
    /// Human-readable name of this provider.
    fn name(&self) -> &str;

    /// Fetch every observation from `request.start` onward, in date order.
    fn fetch(&self, request: &SeriesRequest) -> Result<Vec<DatedValue>, DataError>;
}

/// Progress callback for multi-series fetches.
pub trait FetchProgress: Send {
    /// Called when starting to fetch a series.
    fn on_start(&self, label: &str, index: usize, total: usize);

    /// Called when a series fetch completes.
    fn on_complete(&self, label: &str, index: usize, total: usize, result: &Result<usize, DataError>);

    /// Called when the entire batch is done.
    fn on_batch_complete(&self, succeeded: usize, failed: usize, total: usize);
}

/// Simple progress reporter that prints to stdout.
pub struct StdoutProgress;

impl FetchProgress for StdoutProgress {
    fn on_start(&self, label: &str, index: usize, total: usize) {
        println!("[{}/{}] Fetching {label}...", index + 1, total);
    }

    fn on_complete(
        &self,
        label: &str,
        _index: usize,
        _total: usize,
        result: &Result<usize, DataError>,
    ) {
        match result {
            Ok(rows) => println!("  OK: {label} ({rows} observations)"),
            Err(e) => println!("  FAIL: {label}: {e}"),
        }
    }

    fn on_batch_complete(&self, succeeded: usize, failed: usize, total: usize) {
        println!("\nFetch complete: {succeeded}/{total} succeeded, {failed} failed");
    }
}

/// Progress reporter that discards everything.
pub struct SilentProgress;

impl FetchProgress for SilentProgress {
    fn on_start(&self, _label: &str, _index: usize, _total: usize) {}

    fn on_complete(
        &self,
        _label: &str,
        _index: usize,
        _total: usize,
        _result: &Result<usize, DataError>,
    ) {
    }

    fn on_batch_complete(&self, _succeeded: usize, _failed: usize, _total: usize) {}
}
