//! Column-schema reconciliation for heterogeneous raw files.
//!
//! Raw files arrive with inconsistent headers (`Date`, `datetime`, `Close`,
//! `Adj Close`, ...) and sometimes no symbol column at all. Reconciliation
//! applies a small ordered rule set per column — exact match first, then a
//! case-insensitive alias, then (for `symbol` only) a fallback derived from
//! the file name — and either returns a fully resolved layout or rejects
//! the file naming the columns that could not be obtained.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use std::path::Path;
use thiserror::Error;

/// Header names accepted as the `date` column, matched case-insensitively.
pub const DATE_ALIASES: &[&str] = &["date", "datetime"];

/// Header names accepted as the `price` column, matched case-insensitively.
pub const PRICE_ALIASES: &[&str] = &["price", "close", "adj close"];

/// A file whose headers cannot be reconciled is rejected, not coerced.
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("missing required column(s): {}", missing.join(", "))]
    MissingColumns { missing: Vec<&'static str> },
}

/// Resolved column positions for one raw file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnLayout {
    pub date: usize,
    pub price: usize,
    /// `None` when the file has no symbol column; the caller substitutes
    /// the file-stem symbol for every row.
    pub symbol: Option<usize>,
}

/// Apply the reconciliation rules to a header row.
///
/// An exact canonical header always wins; an alias is only promoted when
/// the canonical name is absent, so re-running the rules on already
/// canonical output resolves to the same layout.
pub fn resolve_columns(headers: &[String]) -> Result<ColumnLayout, SchemaError> {
    let trimmed: Vec<&str> = headers.iter().map(|h| h.trim()).collect();

    let date = find_column(&trimmed, "date", DATE_ALIASES);
    let price = find_column(&trimmed, "price", PRICE_ALIASES);
    let symbol = trimmed.iter().position(|h| *h == "symbol");

    match (date, price) {
        (Some(date), Some(price)) => Ok(ColumnLayout {
            date,
            price,
            symbol,
        }),
        (date, price) => {
            let mut missing = Vec::new();
            if date.is_none() {
                missing.push("date");
            }
            if price.is_none() {
                missing.push("price");
            }
            Err(SchemaError::MissingColumns { missing })
        }
    }
}

fn find_column(headers: &[&str], exact: &str, aliases: &[&str]) -> Option<usize> {
    if let Some(i) = headers.iter().position(|h| *h == exact) {
        return Some(i);
    }
    headers.iter().position(|h| {
        let lower = h.to_ascii_lowercase();
        aliases.iter().any(|a| *a == lower)
    })
}

/// The implicit instrument identifier for files without a symbol column.
pub fn symbol_from_path(path: &Path) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("UNKNOWN")
        .to_string()
}

/// Parse a date cell, collapsing any timezone offset to a UTC calendar day.
///
/// Accepts RFC 3339, offset datetimes with a space separator, naive
/// datetimes, and bare dates. Returns `None` when unparseable — the row is
/// dropped, not the file.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.to_utc().date_naive());
    }
    if let Ok(dt) = DateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f%:z") {
        return Some(dt.to_utc().date_naive());
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
        return Some(dt.date());
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(dt.date());
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()
}

/// Parse a price cell. Non-numeric and non-finite values become `None`.
pub fn parse_price(raw: &str) -> Option<f64> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    s.parse::<f64>().ok().filter(|p| p.is_finite())
}
