//! Market-data acquisition.

pub mod coingecko;
pub mod provider;

pub use coingecko::CoinGeckoProvider;
pub use provider::{DataError, FetchProgress, MarketDataProvider, PricePoint, StdoutProgress};
