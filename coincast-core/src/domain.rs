//! Row types shared by the pipeline stages.
//!
//! Each stage regenerates its output wholesale, so these are plain value
//! types with no identity or update semantics.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A tracked instrument: the display symbol plus the identifier the
/// external market-data source knows it by.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instrument {
    pub symbol: String,
    pub source_id: String,
}

impl Instrument {
    pub fn new(symbol: impl Into<String>, source_id: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            source_id: source_id.into(),
        }
    }
}

/// One raw price observation as fetched from the external source.
///
/// The wire timestamp is collapsed to a UTC calendar day at parse time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawObservation {
    pub date: NaiveDate,
    pub symbol: String,
    pub price: f64,
}

/// One normalized row: a gap-filled daily price with lagged change features.
///
/// For a given symbol the `date` sequence is strictly increasing with no
/// missing calendar day. The change columns are `None` inside the leading
/// lag window where not enough history exists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessedRow {
    pub date: NaiveDate,
    pub symbol: String,
    pub price: f64,
    pub daily_change_pct: Option<f64>,
    pub weekly_change_pct: Option<f64>,
    pub monthly_change_pct: Option<f64>,
}

/// One forecast row: point estimate with a two-sided confidence bound.
///
/// Forecast dates immediately follow the last processed date for the
/// symbol. Instruments that fail the minimum-data guard or the model fit
/// have no rows at all — absence is the failure signal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastRow {
    pub date: NaiveDate,
    pub symbol: String,
    pub forecast: f64,
    pub ci_lower: f64,
    pub ci_upper: f64,
}
