//! Market-data provider trait and structured error types.
//!
//! The MarketDataProvider trait abstracts over price-series sources so the
//! acquisition stage can swap implementations and mock for tests.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A single daily price observation from a provider, before normalization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub date: NaiveDate,
    pub price: f64,
}

/// Structured error types for acquisition.
///
/// Transient variants (bad status, empty payload, transport and parse
/// failures) are retried inside the provider; what escapes here is the
/// last error after retries were exhausted.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("network unreachable: {0}")]
    NetworkUnreachable(String),

    #[error("HTTP {status} for '{source_id}'")]
    BadStatus { source_id: String, status: u16 },

    #[error("empty payload for '{source_id}'")]
    EmptyPayload { source_id: String },

    #[error("malformed response: {0}")]
    MalformedResponse(String),

    #[error("io error: {0}")]
    Io(String),

    #[error("data error: {0}")]
    Other(String),
}

/// Trait for market-data providers.
///
/// Implementations handle the specifics of one external source, including
/// their own bounded retry policy. Callers see only the final outcome.
pub trait MarketDataProvider: Send + Sync {
    /// Human-readable name of this provider.
    fn name(&self) -> &str;

    /// Fetch a trailing window of daily prices for a source identifier.
    fn fetch(&self, source_id: &str, window_days: u32) -> Result<Vec<PricePoint>, DataError>;
}

/// Progress callback for the per-instrument acquisition loop.
pub trait FetchProgress {
    /// Called when starting to fetch an instrument.
    fn on_start(&self, symbol: &str, index: usize, total: usize);

    /// Called when an instrument fetch completes.
    fn on_complete(&self, symbol: &str, index: usize, total: usize, result: &Result<(), DataError>);

    /// Called when the entire batch is done.
    fn on_batch_complete(&self, succeeded: usize, failed: usize, total: usize);
}

/// Simple progress reporter that prints to stdout.
pub struct StdoutProgress;

impl FetchProgress for StdoutProgress {
    fn on_start(&self, symbol: &str, index: usize, total: usize) {
        println!("[{}/{}] Fetching {symbol}...", index + 1, total);
    }

    fn on_complete(
        &self,
        symbol: &str,
        _index: usize,
        _total: usize,
        result: &Result<(), DataError>,
    ) {
        match result {
            Ok(()) => println!("  OK: {symbol}"),
            Err(e) => println!("  FAIL: {symbol}: {e}"),
        }
    }

    fn on_batch_complete(&self, succeeded: usize, failed: usize, total: usize) {
        println!("\nAcquisition complete: {succeeded}/{total} succeeded, {failed} failed");
    }
}
