//! Coincast runner — the three file-based pipeline stages.
//!
//! Acquisition → Normalization → Forecasting, strictly sequential, each
//! stage consuming only the files the prior stage persisted. The stages
//! expose no wait/signal primitive; an external orchestrator decides when
//! (and whether) to invoke them, and may do so redundantly.
//!
//! Per-instrument and per-file failures never cross unit boundaries: each
//! stage returns a summary of successes and failures instead of an error,
//! and the absence of an output file is the downstream failure signal.

pub mod acquire;
pub mod config;
pub mod forecast;
pub mod normalize;

pub use acquire::{acquire_all, AcquireSummary};
pub use config::{DataPaths, FetchPolicy, ModelSettings, PipelineConfig};
pub use forecast::{forecast_all, ForecastSummary};
pub use normalize::{normalize_all, NormalizeSummary};
