//! Core domain types and logic.

pub mod ohlcv;
pub mod order;
pub mod position;
pub mod portfolio;
pub mod broker;
pub mod indicator;
pub mod strategy;
pub mod strategies;
pub mod backtest;
pub mod trades;
pub mod metrics;
pub mod benchmark;
pub mod selection;
pub mod config_validation;
pub mod error;
