//! Pipeline configuration.
//!
//! Everything the stages need — acquisition targets, file locations, fetch
//! policy, model settings — is constructed once at process start and passed
//! in explicitly. Nothing reads ambient globals, so a test can point a
//! whole pipeline at a temp directory by building a config.

use anyhow::{Context, Result};
use coincast_core::domain::Instrument;
use coincast_core::model::ArimaOrder;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level configuration for all three stages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Tracked instruments, in acquisition order.
    pub instruments: Vec<Instrument>,
    pub paths: DataPaths,
    pub fetch: FetchPolicy,
    pub model: ModelSettings,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            instruments: vec![
                Instrument::new("BITCOIN", "bitcoin"),
                Instrument::new("ETHEREUM", "ethereum"),
                Instrument::new("BINANCECOIN", "binancecoin"),
                Instrument::new("SOLANA", "solana"),
                Instrument::new("RIPPLE", "ripple"),
            ],
            paths: DataPaths::default(),
            fetch: FetchPolicy::default(),
            model: ModelSettings::default(),
        }
    }
}

impl PipelineConfig {
    /// Load a configuration from a TOML file. Missing sections keep their
    /// defaults.
    pub fn from_toml_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        toml::from_str(&text).with_context(|| format!("invalid config {}", path.display()))
    }
}

/// Where each stage reads and writes its files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataPaths {
    pub raw_dir: PathBuf,
    pub processed_dir: PathBuf,
    pub forecast_dir: PathBuf,
}

impl Default for DataPaths {
    fn default() -> Self {
        Self {
            raw_dir: PathBuf::from("data/raw"),
            processed_dir: PathBuf::from("data/processed"),
            forecast_dir: PathBuf::from("data/forecasted"),
        }
    }
}

/// Acquisition policy: request window and bounded-retry behavior.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchPolicy {
    /// Historical window requested per instrument, in days.
    pub window_days: u32,
    /// Quote currency for the external source.
    pub vs_currency: String,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
    /// Total attempts per instrument (first try included).
    pub max_attempts: u32,
    /// Fixed delay before each re-attempt, in seconds. Deliberately not
    /// exponential backoff.
    pub retry_delay_secs: u64,
}

impl Default for FetchPolicy {
    fn default() -> Self {
        Self {
            window_days: 30,
            vs_currency: "usd".to_string(),
            timeout_secs: 20,
            max_attempts: 3,
            retry_delay_secs: 2,
        }
    }
}

impl FetchPolicy {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_secs)
    }
}

/// Forecast model settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelSettings {
    pub order: ArimaOrder,
    /// Forecast horizon in days.
    pub horizon: usize,
    /// Two-sided confidence level for the band. Explicit rather than an
    /// implicit model default.
    pub confidence: f64,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            order: ArimaOrder::default(),
            horizon: 30,
            confidence: 0.95,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_tracked_universe() {
        let config = PipelineConfig::default();

        assert_eq!(config.instruments.len(), 5);
        assert_eq!(config.instruments[0].symbol, "BITCOIN");
        assert_eq!(config.instruments[0].source_id, "bitcoin");
        assert_eq!(config.fetch.window_days, 30);
        assert_eq!(config.fetch.max_attempts, 3);
        assert_eq!(config.fetch.retry_delay(), Duration::from_secs(2));
        assert_eq!(config.fetch.timeout(), Duration::from_secs(20));
        assert_eq!(config.model.order, ArimaOrder::new(1, 1, 1));
        assert_eq!(config.model.horizon, 30);
        assert_eq!(config.model.confidence, 0.95);
    }

    #[test]
    fn partial_toml_keeps_defaults_elsewhere() {
        let config: PipelineConfig = toml::from_str(
            r#"
            [model]
            horizon = 14
            confidence = 0.90

            [[instruments]]
            symbol = "BITCOIN"
            source_id = "bitcoin"
            "#,
        )
        .unwrap();

        assert_eq!(config.model.horizon, 14);
        assert_eq!(config.model.confidence, 0.90);
        assert_eq!(config.model.order, ArimaOrder::default());
        assert_eq!(config.instruments.len(), 1);
        assert_eq!(config.fetch.window_days, 30);
        assert_eq!(config.paths, DataPaths::default());
    }

    #[test]
    fn toml_roundtrip_preserves_the_config() {
        let original = PipelineConfig::default();
        let text = toml::to_string(&original).unwrap();
        let restored: PipelineConfig = toml::from_str(&text).unwrap();
        assert_eq!(restored, original);
    }
}
