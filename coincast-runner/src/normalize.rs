//! Normalization stage: reconcile raw files onto the canonical daily
//! schema.
//!
//! Every raw file is transformed independently — reconcile columns, parse
//! and clean rows, reindex onto a gap-free daily calendar, gap-fill, and
//! derive the lagged change features. A file that cannot be reconciled or
//! has no valid rows is rejected with no output; the rest continue. Output
//! is 1:1 by input file: a multi-symbol raw file yields one processed file
//! with the symbols emitted together.

use crate::config::PipelineConfig;
use chrono::NaiveDate;
use coincast_core::domain::ProcessedRow;
use coincast_core::schema::{self, SchemaError};
use coincast_core::series::{fill_forward_backward, pct_change, reindex_daily};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Column order of a processed file. The derived headers are part of the
/// stable contract with the dashboard collaborator.
pub const PROCESSED_HEADERS: [&str; 6] = [
    "date",
    "symbol",
    "price",
    "Daily_Change_%",
    "Weekly_Change_7d_%",
    "Monthly_Change_30d_%",
];

/// Lags, in days, of the three derived change columns.
pub const CHANGE_LAGS: [usize; 3] = [1, 7, 30];

/// Why a raw file produced no processed output.
#[derive(Debug, Error)]
pub enum NormalizeError {
    #[error("cannot read file: {0}")]
    Unreadable(String),

    #[error("file has no data rows")]
    Empty,

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error("no valid rows after cleaning")]
    NoValidRows,

    #[error("cannot write output: {0}")]
    Write(String),
}

/// Normalize every raw file into a processed file.
///
/// Rejections are per-file and never abort the stage. Finding no raw files
/// at all is the catastrophic case: the stage warns and returns having
/// written nothing.
pub fn normalize_all(config: &PipelineConfig) -> NormalizeSummary {
    let raw_files = discover_csv_files(&config.paths.raw_dir);

    let mut summary = NormalizeSummary {
        files_found: raw_files.len(),
        ..NormalizeSummary::default()
    };

    if raw_files.is_empty() {
        eprintln!(
            "WARNING: no raw files found in {}",
            config.paths.raw_dir.display()
        );
        return summary;
    }

    println!("Found {} raw files", raw_files.len());

    for path in &raw_files {
        let name = file_name(path);

        match process_file(path) {
            Ok(table) => {
                let out_path = config.paths.processed_dir.join(&name);
                if let Err(e) = write_processed_csv(&config.paths.processed_dir, &out_path, &table.rows)
                {
                    eprintln!("WARNING: skipping {name}: {e}");
                    summary.rejected.push((name, e));
                    continue;
                }

                if table.dropped_rows > 0 {
                    println!("Dropped {} rows from {name}", table.dropped_rows);
                }
                let start = table.rows.first().map(|r| r.date).unwrap_or_default();
                let end = table.rows.last().map(|r| r.date).unwrap_or_default();
                println!(
                    "Processed {name}: rows={}, {start} -> {end}",
                    table.rows.len()
                );

                summary.processed.push(FileReport {
                    file: name,
                    rows: table.rows.len(),
                    dropped_rows: table.dropped_rows,
                    start,
                    end,
                });
            }
            Err(e) => {
                eprintln!("WARNING: skipping {name}: {e}");
                summary.rejected.push((name, e));
            }
        }
    }

    println!(
        "\nNormalization complete: {}/{} files processed",
        summary.processed.len(),
        summary.files_found
    );

    summary
}

/// Transform one raw file into processed rows.
pub fn process_file(path: &Path) -> Result<ProcessedTable, NormalizeError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(path)
        .map_err(|e| NormalizeError::Unreadable(e.to_string()))?;

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| NormalizeError::Unreadable(e.to_string()))?
        .iter()
        .map(|h| h.to_string())
        .collect();
    if headers.iter().all(|h| h.trim().is_empty()) {
        return Err(NormalizeError::Empty);
    }

    let layout = schema::resolve_columns(&headers)?;
    let fallback_symbol = schema::symbol_from_path(path);

    // Clean: parse each row, dropping those without a usable date and price.
    let mut observations: Vec<(NaiveDate, (Option<String>, f64))> = Vec::new();
    let mut total_rows = 0usize;

    for record in reader.records() {
        let Ok(record) = record else {
            total_rows += 1;
            continue;
        };
        total_rows += 1;

        let date = record.get(layout.date).and_then(schema::parse_date);
        let price = record.get(layout.price).and_then(schema::parse_price);
        let symbol = layout.symbol.and_then(|idx| {
            record
                .get(idx)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        });

        if let (Some(date), Some(price)) = (date, price) {
            observations.push((date, (symbol, price)));
        }
    }

    if total_rows == 0 {
        return Err(NormalizeError::Empty);
    }
    let dropped_rows = total_rows - observations.len();
    if observations.is_empty() {
        return Err(NormalizeError::NoValidRows);
    }

    // Calendar enforcement: one slot per day over the observed span, then
    // nearest-value fill for the synthesized gaps.
    let grid = reindex_daily(observations).ok_or(NormalizeError::NoValidRows)?;

    let price_slots: Vec<Option<f64>> = grid
        .slots
        .iter()
        .map(|slot| slot.as_ref().map(|(_, price)| *price))
        .collect();
    let symbol_slots: Vec<Option<String>> = grid
        .slots
        .iter()
        .map(|slot| slot.as_ref().and_then(|(symbol, _)| symbol.clone()))
        .collect();

    let prices = fill_forward_backward(&price_slots).ok_or(NormalizeError::NoValidRows)?;
    let symbols = fill_forward_backward(&symbol_slots)
        .unwrap_or_else(|| vec![fallback_symbol; grid.len()]);

    let daily = pct_change(&prices, CHANGE_LAGS[0]);
    let weekly = pct_change(&prices, CHANGE_LAGS[1]);
    let monthly = pct_change(&prices, CHANGE_LAGS[2]);

    let rows = (0..grid.len())
        .map(|i| ProcessedRow {
            date: grid.date_at(i),
            symbol: symbols[i].clone(),
            price: prices[i],
            daily_change_pct: daily[i],
            weekly_change_pct: weekly[i],
            monthly_change_pct: monthly[i],
        })
        .collect();

    Ok(ProcessedTable { rows, dropped_rows })
}

/// One file's processed rows plus cleaning observability.
#[derive(Debug)]
pub struct ProcessedTable {
    pub rows: Vec<ProcessedRow>,
    pub dropped_rows: usize,
}

fn write_processed_csv(
    dir: &Path,
    path: &Path,
    rows: &[ProcessedRow],
) -> Result<(), NormalizeError> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(PROCESSED_HEADERS)
        .map_err(|e| NormalizeError::Write(e.to_string()))?;
    for row in rows {
        wtr.write_record([
            row.date.to_string(),
            row.symbol.clone(),
            row.price.to_string(),
            optional_cell(row.daily_change_pct),
            optional_cell(row.weekly_change_pct),
            optional_cell(row.monthly_change_pct),
        ])
        .map_err(|e| NormalizeError::Write(e.to_string()))?;
    }
    let data = wtr
        .into_inner()
        .map_err(|e| NormalizeError::Write(format!("failed to flush CSV writer: {e}")))?;

    fs::create_dir_all(dir).map_err(|e| NormalizeError::Write(e.to_string()))?;
    let tmp = path.with_extension("csv.tmp");
    fs::write(&tmp, data).map_err(|e| NormalizeError::Write(e.to_string()))?;
    fs::rename(&tmp, path).map_err(|e| {
        let _ = fs::remove_file(&tmp);
        NormalizeError::Write(format!("atomic rename failed: {e}"))
    })
}

fn optional_cell(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

/// All `.csv` files directly under `dir`, sorted by name for deterministic
/// processing order.
pub(crate) fn discover_csv_files(dir: &Path) -> Vec<PathBuf> {
    let Ok(entries) = fs::read_dir(dir) else {
        return Vec::new();
    };

    let mut files: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.extension().and_then(|e| e.to_str()) == Some("csv"))
        .collect();
    files.sort();
    files
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("<unnamed>")
        .to_string()
}

/// Summary of one normalization run.
#[derive(Debug, Default)]
pub struct NormalizeSummary {
    pub files_found: usize,
    pub processed: Vec<FileReport>,
    pub rejected: Vec<(String, NormalizeError)>,
}

/// Per-file observability: row count, cleaning drops, and the date span.
#[derive(Debug)]
pub struct FileReport {
    pub file: String,
    pub rows: usize,
    pub dropped_rows: usize,
    pub start: NaiveDate,
    pub end: NaiveDate,
}
