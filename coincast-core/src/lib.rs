//! Coincast core — domain types, market-data acquisition, schema
//! reconciliation, daily-calendar series operations, and ARIMA forecasting.
//!
//! This crate contains everything the pipeline stages compute with:
//! - Row types for the raw, processed, and forecast datasets
//! - The market-data provider trait and its CoinGecko implementation
//! - Column-reconciliation rules for heterogeneous raw files
//! - Daily reindexing, gap-filling, and percentage-change features
//! - ARIMA model fitting and interval forecasting
//!
//! File discovery, CSV persistence, and stage orchestration live in
//! `coincast-runner`; the two crates are coupled only through these types.

pub mod data;
pub mod domain;
pub mod model;
pub mod schema;
pub mod series;
