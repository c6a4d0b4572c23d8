//! Forecasting stage: per-instrument ARIMA forecasts over the processed
//! output.
//!
//! Reads the union of all processed files, groups rows by symbol, and fits
//! each group independently. Input may come from heterogeneous processed
//! files, so the columns are re-reconciled and the daily calendar re-derived
//! defensively before fitting. Groups that fail the minimum-data guard or
//! the fit are skipped with a warning — never aborting the batch — and
//! simply have no output file.

use crate::config::{ModelSettings, PipelineConfig};
use crate::normalize::discover_csv_files;
use chrono::{Duration, NaiveDate};
use coincast_core::domain::ForecastRow;
use coincast_core::model::{ArimaModel, ModelError};
use coincast_core::schema;
use coincast_core::series::{fill_forward_backward, reindex_daily};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Column order of a forecast file.
pub const FORECAST_HEADERS: [&str; 5] = ["date", "symbol", "forecast", "ci_lower", "ci_upper"];

/// Below this many daily price points the model order is not identifiable.
pub const MIN_OBSERVATIONS: usize = 7;

/// Why a symbol group produced no forecast file.
#[derive(Debug, Error)]
pub enum GroupSkip {
    #[error("not enough data: {observed} daily prices, need {required}")]
    TooFewObservations { observed: usize, required: usize },

    #[error(transparent)]
    Fit(#[from] ModelError),

    #[error("cannot write output: {0}")]
    Write(String),
}

/// Forecast every symbol found in the processed output.
///
/// Finding no processed files at all is the catastrophic case: the stage
/// warns and returns having written nothing.
pub fn forecast_all(config: &PipelineConfig) -> ForecastSummary {
    let processed_files = discover_csv_files(&config.paths.processed_dir);

    let mut summary = ForecastSummary {
        files_found: processed_files.len(),
        ..ForecastSummary::default()
    };

    if processed_files.is_empty() {
        eprintln!(
            "WARNING: no processed files found in {}",
            config.paths.processed_dir.display()
        );
        return summary;
    }

    let groups = load_symbol_groups(&processed_files);
    summary.groups = groups.len();

    for (symbol, observations) in groups {
        match forecast_group(&symbol, observations, &config.model) {
            Ok(rows) => {
                let path = config
                    .paths
                    .forecast_dir
                    .join(format!("forecast_{symbol}.csv"));
                match write_forecast_csv(&config.paths.forecast_dir, &path, &rows) {
                    Ok(()) => {
                        println!("Forecast {symbol}: {} rows", rows.len());
                        summary.forecasted.push(symbol);
                    }
                    Err(e) => {
                        eprintln!("WARNING: forecast failed for {symbol}: {e}");
                        summary.skipped.push((symbol, e));
                    }
                }
            }
            Err(e) => {
                eprintln!("WARNING: forecast failed for {symbol}: {e}");
                summary.skipped.push((symbol, e));
            }
        }
    }

    println!(
        "\nForecasting complete: {}/{} symbols forecast",
        summary.forecasted.len(),
        summary.groups
    );

    summary
}

/// Read the union of processed files into per-symbol observations.
///
/// Files whose columns cannot be reconciled are skipped with a warning;
/// rows with unparseable cells are dropped. BTreeMap keeps the group order
/// deterministic.
fn load_symbol_groups(files: &[std::path::PathBuf]) -> BTreeMap<String, Vec<(NaiveDate, f64)>> {
    let mut groups: BTreeMap<String, Vec<(NaiveDate, f64)>> = BTreeMap::new();

    for path in files {
        let mut reader = match csv::ReaderBuilder::new().flexible(true).from_path(path) {
            Ok(reader) => reader,
            Err(e) => {
                eprintln!("WARNING: cannot read {}: {e}", path.display());
                continue;
            }
        };

        let headers: Vec<String> = match reader.headers() {
            Ok(headers) => headers.iter().map(|h| h.to_string()).collect(),
            Err(e) => {
                eprintln!("WARNING: cannot read {}: {e}", path.display());
                continue;
            }
        };

        let layout = match schema::resolve_columns(&headers) {
            Ok(layout) => layout,
            Err(e) => {
                eprintln!("WARNING: skipping {}: {e}", path.display());
                continue;
            }
        };
        let fallback_symbol = schema::symbol_from_path(path);

        for record in reader.records().flatten() {
            let date = record.get(layout.date).and_then(schema::parse_date);
            let price = record.get(layout.price).and_then(schema::parse_price);
            let symbol = layout
                .symbol
                .and_then(|idx| record.get(idx))
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .unwrap_or(&fallback_symbol)
                .to_string();

            if let (Some(date), Some(price)) = (date, price) {
                groups.entry(symbol).or_default().push((date, price));
            }
        }
    }

    groups
}

/// Fit and forecast one symbol group.
fn forecast_group(
    symbol: &str,
    observations: Vec<(NaiveDate, f64)>,
    settings: &ModelSettings,
) -> Result<Vec<ForecastRow>, GroupSkip> {
    // Defensive re-normalization: the same calendar and fill policy as the
    // normalization stage, in case a processed file predates it.
    let grid = reindex_daily(observations).ok_or(GroupSkip::TooFewObservations {
        observed: 0,
        required: MIN_OBSERVATIONS,
    })?;
    let prices =
        fill_forward_backward(&grid.slots).ok_or(GroupSkip::TooFewObservations {
            observed: 0,
            required: MIN_OBSERVATIONS,
        })?;

    let observed = prices.iter().filter(|p| p.is_finite()).count();
    if observed < MIN_OBSERVATIONS {
        return Err(GroupSkip::TooFewObservations {
            observed,
            required: MIN_OBSERVATIONS,
        });
    }

    let model = ArimaModel::fit(&prices, settings.order)?;
    let forecast = model.forecast(settings.horizon, settings.confidence);

    let last = grid.end();
    let rows = (0..settings.horizon)
        .map(|i| ForecastRow {
            date: last + Duration::days(i as i64 + 1),
            symbol: symbol.to_string(),
            forecast: forecast.point[i],
            ci_lower: forecast.lower[i],
            ci_upper: forecast.upper[i],
        })
        .collect();

    Ok(rows)
}

fn write_forecast_csv(dir: &Path, path: &Path, rows: &[ForecastRow]) -> Result<(), GroupSkip> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(FORECAST_HEADERS)
        .map_err(|e| GroupSkip::Write(e.to_string()))?;
    for row in rows {
        wtr.write_record([
            row.date.to_string(),
            row.symbol.clone(),
            row.forecast.to_string(),
            row.ci_lower.to_string(),
            row.ci_upper.to_string(),
        ])
        .map_err(|e| GroupSkip::Write(e.to_string()))?;
    }
    let data = wtr
        .into_inner()
        .map_err(|e| GroupSkip::Write(format!("failed to flush CSV writer: {e}")))?;

    fs::create_dir_all(dir).map_err(|e| GroupSkip::Write(e.to_string()))?;
    let tmp = path.with_extension("csv.tmp");
    fs::write(&tmp, data).map_err(|e| GroupSkip::Write(e.to_string()))?;
    fs::rename(&tmp, path).map_err(|e| {
        let _ = fs::remove_file(&tmp);
        GroupSkip::Write(format!("atomic rename failed: {e}"))
    })
}

/// Summary of one forecasting run.
#[derive(Debug, Default)]
pub struct ForecastSummary {
    pub files_found: usize,
    pub groups: usize,
    pub forecasted: Vec<String>,
    pub skipped: Vec<(String, GroupSkip)>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DataPaths, PipelineConfig};

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn test_config(dir: &Path) -> PipelineConfig {
        PipelineConfig {
            paths: DataPaths {
                raw_dir: dir.join("raw"),
                processed_dir: dir.join("processed"),
                forecast_dir: dir.join("forecasted"),
            },
            ..PipelineConfig::default()
        }
    }

    fn write_processed(config: &PipelineConfig, name: &str, content: &str) {
        fs::create_dir_all(&config.paths.processed_dir).unwrap();
        fs::write(config.paths.processed_dir.join(name), content).unwrap();
    }

    fn daily_rows(symbol: &str, start: &str, prices: &[f64]) -> String {
        let mut content = String::from("date,symbol,price\n");
        let start = d(start);
        for (i, price) in prices.iter().enumerate() {
            content.push_str(&format!(
                "{},{symbol},{price}\n",
                start + Duration::days(i as i64)
            ));
        }
        content
    }

    #[test]
    fn forecast_has_exactly_horizon_contiguous_rows() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        let prices: Vec<f64> = (0..10).map(|i| 100.0 + i as f64).collect();
        write_processed(&config, "BTC.csv", &daily_rows("BTC", "2024-01-01", &prices));

        let summary = forecast_all(&config);
        assert_eq!(summary.forecasted, vec!["BTC".to_string()]);

        let content =
            fs::read_to_string(config.paths.forecast_dir.join("forecast_BTC.csv")).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines[0], "date,symbol,forecast,ci_lower,ci_upper");
        assert_eq!(lines.len(), 1 + 30);

        // Dates start the day after the last observation and step by one.
        let mut expected = d("2024-01-11");
        for line in &lines[1..] {
            assert!(line.starts_with(&expected.to_string()));
            expected += Duration::days(1);
        }
    }

    #[test]
    fn band_brackets_the_point_estimate_in_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        let prices: Vec<f64> = (0..20).map(|i| 50.0 + (i % 5) as f64).collect();
        write_processed(&config, "ETH.csv", &daily_rows("ETH", "2024-01-01", &prices));

        forecast_all(&config);

        let mut reader = csv::Reader::from_path(
            config.paths.forecast_dir.join("forecast_ETH.csv"),
        )
        .unwrap();
        for record in reader.records() {
            let record = record.unwrap();
            let forecast: f64 = record[2].parse().unwrap();
            let lower: f64 = record[3].parse().unwrap();
            let upper: f64 = record[4].parse().unwrap();
            assert!(lower <= forecast && forecast <= upper);
        }
    }

    #[test]
    fn too_few_observations_writes_no_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        write_processed(
            &config,
            "XRP.csv",
            &daily_rows("XRP", "2024-01-01", &[0.5, 0.51, 0.52]),
        );

        let summary = forecast_all(&config);

        assert!(summary.forecasted.is_empty());
        assert_eq!(summary.skipped.len(), 1);
        assert!(matches!(
            summary.skipped[0].1,
            GroupSkip::TooFewObservations { observed: 3, .. }
        ));
        assert!(!config.paths.forecast_dir.join("forecast_XRP.csv").exists());
    }

    #[test]
    fn groups_span_multiple_processed_files() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        let prices: Vec<f64> = (0..8).map(|i| 10.0 + i as f64 * 0.5).collect();
        write_processed(&config, "a.csv", &daily_rows("BTC", "2024-01-01", &prices));
        write_processed(&config, "b.csv", &daily_rows("ETH", "2024-01-01", &prices));

        let summary = forecast_all(&config);

        assert_eq!(summary.groups, 2);
        assert_eq!(
            summary.forecasted,
            vec!["BTC".to_string(), "ETH".to_string()]
        );
        assert!(config.paths.forecast_dir.join("forecast_BTC.csv").exists());
        assert!(config.paths.forecast_dir.join("forecast_ETH.csv").exists());
    }

    #[test]
    fn file_without_symbol_column_groups_by_file_stem() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        let mut content = String::from("date,price\n");
        for i in 0..10 {
            content.push_str(&format!("{},{}\n", d("2024-01-01") + Duration::days(i), 100 + i));
        }
        write_processed(&config, "SOLANA.csv", &content);

        let summary = forecast_all(&config);
        assert_eq!(summary.forecasted, vec!["SOLANA".to_string()]);
    }

    #[test]
    fn empty_processed_dir_is_catastrophic_but_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());

        let summary = forecast_all(&config);

        assert_eq!(summary.files_found, 0);
        assert_eq!(summary.groups, 0);
        assert!(!config.paths.forecast_dir.exists());
    }

    #[test]
    fn one_bad_group_does_not_stop_the_others() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        let good: Vec<f64> = (0..12).map(|i| 30.0 + i as f64).collect();
        write_processed(&config, "GOOD.csv", &daily_rows("GOOD", "2024-01-01", &good));
        write_processed(
            &config,
            "SHORT.csv",
            &daily_rows("SHORT", "2024-01-01", &[1.0, 2.0]),
        );

        let summary = forecast_all(&config);

        assert_eq!(summary.forecasted, vec!["GOOD".to_string()]);
        assert_eq!(summary.skipped.len(), 1);
        assert_eq!(summary.skipped[0].0, "SHORT");
    }
}
