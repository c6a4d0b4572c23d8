//! Statistical forecasting models.

pub mod arima;

pub use arima::{ArimaModel, ArimaOrder, Forecast, ModelError};
