//! Core domain types and logic.

pub mod ohlcv;
pub mod indicator;
pub mod features;
pub mod returns;
pub mod metrics;
pub mod allocation;
pub mod backtest;
pub mod ensemble;
pub mod config;
pub mod error;
