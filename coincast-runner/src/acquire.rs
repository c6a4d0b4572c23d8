//! Acquisition stage: fetch each configured instrument and replace its raw
//! file.
//!
//! One file per instrument under the raw directory, overwritten wholesale
//! on every run. A fetch that exhausts its retries leaves any prior raw
//! file untouched and the loop continues with the remaining instruments.

use crate::config::PipelineConfig;
use coincast_core::data::{DataError, FetchProgress, MarketDataProvider, PricePoint};
use coincast_core::domain::{Instrument, RawObservation};
use std::fs;
use std::path::Path;

/// Column order of a raw file.
pub const RAW_HEADERS: [&str; 3] = ["date", "symbol", "price"];

/// Fetch all configured instruments and persist one raw CSV each.
///
/// Returns a summary of successes and failures; failures are per-instrument
/// and never abort the batch.
pub fn acquire_all(
    provider: &dyn MarketDataProvider,
    config: &PipelineConfig,
    progress: &dyn FetchProgress,
) -> AcquireSummary {
    let total = config.instruments.len();
    let mut succeeded = 0;
    let mut failed = 0;
    let mut errors: Vec<(String, DataError)> = Vec::new();

    for (i, instrument) in config.instruments.iter().enumerate() {
        progress.on_start(&instrument.symbol, i, total);

        let result = acquire_single(provider, config, instrument);
        progress.on_complete(&instrument.symbol, i, total, &result);

        match result {
            Ok(()) => succeeded += 1,
            Err(e) => {
                errors.push((instrument.symbol.clone(), e));
                failed += 1;
            }
        }
    }

    progress.on_batch_complete(succeeded, failed, total);

    AcquireSummary {
        total,
        succeeded,
        failed,
        errors,
    }
}

/// Fetch one instrument and atomically replace its raw file.
fn acquire_single(
    provider: &dyn MarketDataProvider,
    config: &PipelineConfig,
    instrument: &Instrument,
) -> Result<(), DataError> {
    let points = provider.fetch(&instrument.source_id, config.fetch.window_days)?;
    let rows = shape_observations(&instrument.symbol, points);

    fs::create_dir_all(&config.paths.raw_dir)
        .map_err(|e| DataError::Io(format!("failed to create raw dir: {e}")))?;

    let path = config.paths.raw_dir.join(format!("{}.csv", instrument.symbol));
    write_raw_csv(&path, &rows)
}

/// Label fetched points with the instrument symbol.
fn shape_observations(symbol: &str, points: Vec<PricePoint>) -> Vec<RawObservation> {
    points
        .into_iter()
        .map(|p| RawObservation {
            date: p.date,
            symbol: symbol.to_string(),
            price: p.price,
        })
        .collect()
}

/// Write a raw CSV, replacing any prior file (tmp + rename, so a failed
/// write never leaves a half-written file).
fn write_raw_csv(path: &Path, rows: &[RawObservation]) -> Result<(), DataError> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(RAW_HEADERS)
        .map_err(|e| DataError::Io(e.to_string()))?;
    for row in rows {
        wtr.write_record([
            &row.date.to_string(),
            row.symbol.as_str(),
            &row.price.to_string(),
        ])
        .map_err(|e| DataError::Io(e.to_string()))?;
    }
    let data = wtr
        .into_inner()
        .map_err(|e| DataError::Io(format!("failed to flush CSV writer: {e}")))?;

    let tmp = path.with_extension("csv.tmp");
    fs::write(&tmp, data).map_err(|e| DataError::Io(format!("write {}: {e}", tmp.display())))?;
    fs::rename(&tmp, path).map_err(|e| {
        let _ = fs::remove_file(&tmp);
        DataError::Io(format!("atomic rename failed: {e}"))
    })
}

/// Summary of one acquisition run.
#[derive(Debug)]
pub struct AcquireSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub errors: Vec<(String, DataError)>,
}

impl AcquireSummary {
    pub fn all_succeeded(&self) -> bool {
        self.failed == 0
    }
}
