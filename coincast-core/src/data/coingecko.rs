//! CoinGecko market-data provider.
//!
//! Fetches a trailing window of daily prices from the `market_chart`
//! endpoint. Transient failures (non-success status, empty payload,
//! transport or parse errors) are retried a bounded number of times with a
//! fixed delay between attempts (no exponential backoff).

use super::provider::{DataError, MarketDataProvider, PricePoint};
use chrono::DateTime;
use serde::Deserialize;
use std::time::Duration;

/// `market_chart` response body. Only the price matrix is consumed; market
/// caps and volumes are ignored.
#[derive(Debug, Deserialize)]
struct MarketChartResponse {
    #[serde(default)]
    prices: Vec<(f64, f64)>,
}

/// CoinGecko price-series provider.
pub struct CoinGeckoProvider {
    client: reqwest::blocking::Client,
    base_url: String,
    vs_currency: String,
    interval: String,
    max_attempts: u32,
    retry_delay: Duration,
}

impl CoinGeckoProvider {
    pub const DEFAULT_BASE_URL: &'static str = "https://api.coingecko.com/api/v3";

    /// Build a provider with the given fetch policy.
    ///
    /// `max_attempts` is the total number of tries per instrument;
    /// `retry_delay` elapses before each re-attempt.
    pub fn new(
        vs_currency: impl Into<String>,
        timeout: Duration,
        max_attempts: u32,
        retry_delay: Duration,
    ) -> Self {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("coincast/", env!("CARGO_PKG_VERSION")))
            .build()
            .expect("failed to build HTTP client");

        Self {
            client,
            base_url: Self::DEFAULT_BASE_URL.to_string(),
            vs_currency: vs_currency.into(),
            interval: "daily".to_string(),
            max_attempts: max_attempts.max(1),
            retry_delay,
        }
    }

    /// Point the provider at a different host (tests, mirrors).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Build the `market_chart` URL for a coin and window.
    fn chart_url(&self, source_id: &str, window_days: u32) -> String {
        format!(
            "{}/coins/{source_id}/market_chart?vs_currency={}&days={window_days}&interval={}",
            self.base_url, self.vs_currency, self.interval
        )
    }

    /// One request/parse attempt, no retry.
    fn fetch_once(&self, source_id: &str, window_days: u32) -> Result<Vec<PricePoint>, DataError> {
        let url = self.chart_url(source_id, window_days);

        let resp = self
            .client
            .get(&url)
            .send()
            .map_err(|e| DataError::NetworkUnreachable(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(DataError::BadStatus {
                source_id: source_id.to_string(),
                status: status.as_u16(),
            });
        }

        let chart: MarketChartResponse = resp.json().map_err(|e| {
            DataError::MalformedResponse(format!("failed to parse response for {source_id}: {e}"))
        })?;

        points_from_chart(source_id, chart)
    }
}

impl MarketDataProvider for CoinGeckoProvider {
    fn name(&self) -> &str {
        "coingecko"
    }

    fn fetch(&self, source_id: &str, window_days: u32) -> Result<Vec<PricePoint>, DataError> {
        let mut last_error = None;

        for attempt in 0..self.max_attempts {
            if attempt > 0 {
                std::thread::sleep(self.retry_delay);
            }

            match self.fetch_once(source_id, window_days) {
                Ok(points) => return Ok(points),
                Err(e) => last_error = Some(e),
            }
        }

        Err(last_error.unwrap_or_else(|| DataError::Other("no fetch attempts made".into())))
    }
}

/// Reshape the price matrix into dated points.
///
/// Timestamps arrive as epoch milliseconds and are collapsed to UTC
/// calendar days. An empty matrix is an error so the retry loop treats it
/// like a failed request.
fn points_from_chart(
    source_id: &str,
    chart: MarketChartResponse,
) -> Result<Vec<PricePoint>, DataError> {
    if chart.prices.is_empty() {
        return Err(DataError::EmptyPayload {
            source_id: source_id.to_string(),
        });
    }

    let mut points = Vec::with_capacity(chart.prices.len());
    for (ms, price) in chart.prices {
        let date = DateTime::from_timestamp_millis(ms as i64)
            .map(|dt| dt.naive_utc().date())
            .ok_or_else(|| DataError::MalformedResponse(format!("invalid timestamp: {ms}")))?;
        points.push(PricePoint { date, price });
    }

    Ok(points)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn parse_chart(json: &str) -> MarketChartResponse {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn parses_price_matrix_into_daily_points() {
        // 2024-01-01T00:00:00Z and 2024-01-02T00:00:00Z in epoch millis
        let chart = parse_chart(
            r#"{"prices": [[1704067200000, 42000.5], [1704153600000, 42750.25]],
                "market_caps": [], "total_volumes": []}"#,
        );

        let points = points_from_chart("bitcoin", chart).unwrap();

        assert_eq!(points.len(), 2);
        assert_eq!(points[0].date, NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
        assert_eq!(points[0].price, 42000.5);
        assert_eq!(points[1].date, NaiveDate::from_ymd_opt(2024, 1, 2).unwrap());
    }

    #[test]
    fn intraday_timestamp_collapses_to_calendar_day() {
        // 2024-01-01T13:45:00Z
        let chart = parse_chart(r#"{"prices": [[1704116700000, 100.0]]}"#);

        let points = points_from_chart("bitcoin", chart).unwrap();
        assert_eq!(points[0].date, NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
    }

    #[test]
    fn empty_payload_is_an_error() {
        let chart = parse_chart(r#"{"prices": []}"#);

        let err = points_from_chart("bitcoin", chart).unwrap_err();
        assert!(matches!(err, DataError::EmptyPayload { .. }));
        assert!(err.to_string().contains("bitcoin"));
    }

    #[test]
    fn missing_prices_key_is_an_empty_payload() {
        let chart = parse_chart(r#"{"market_caps": []}"#);

        let err = points_from_chart("ethereum", chart).unwrap_err();
        assert!(matches!(err, DataError::EmptyPayload { .. }));
    }

    #[test]
    fn chart_url_carries_query_parameters() {
        let provider = CoinGeckoProvider::new(
            "usd",
            Duration::from_secs(20),
            3,
            Duration::from_secs(2),
        );

        let url = provider.chart_url("bitcoin", 30);
        assert_eq!(
            url,
            "https://api.coingecko.com/api/v3/coins/bitcoin/market_chart\
             ?vs_currency=usd&days=30&interval=daily"
        );
    }
}
