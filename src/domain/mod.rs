//! Core domain types and logic.

pub mod ohlcv;
pub mod price_series;
pub mod indicator;
pub mod order;
pub mod position;
pub mod portfolio;
pub mod execution;
pub mod strategy;
pub mod backtest;
pub mod metrics;
pub mod config_validation;
pub mod error;
