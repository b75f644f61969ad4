//! Technical indicator implementations.
//!
//! This module provides types for representing indicator values and series:
//! - `IndicatorPoint`: A single point in an indicator time series
//! - `IndicatorValue`: Enum for different indicator output shapes
//! - `IndicatorType`: Enum for indicator identity + parameters
//! - `IndicatorSeries`: A time series of indicator values
//!
//! Every calculator returns a series with exactly one point per input bar.
//! Points inside the warmup window carry `valid == false`.

pub mod atr;
pub mod bollinger;
pub mod ema;
pub mod ma_ratio;
pub mod macd;
pub mod obv;
pub mod returns;
pub mod rsi;
pub mod sma;
pub mod stochastic;
pub mod volatility;
pub mod vwap;

pub use ema::calculate_ema;
pub use sma::{calculate_sma, rolling_mean};

use chrono::NaiveDateTime;

/// Value reported by oscillators when their denominator collapses to zero.
pub const NEUTRAL_SENTINEL: f64 = 50.0;

#[derive(Debug, Clone)]
pub struct IndicatorPoint {
    pub timestamp: NaiveDateTime,
    pub valid: bool,
    pub value: IndicatorValue,
}

impl IndicatorPoint {
    pub(crate) fn warmup(timestamp: NaiveDateTime, value: IndicatorValue) -> Self {
        IndicatorPoint {
            timestamp,
            valid: false,
            value,
        }
    }

    pub(crate) fn simple(timestamp: NaiveDateTime, valid: bool, value: f64) -> Self {
        IndicatorPoint {
            timestamp,
            valid,
            value: IndicatorValue::Simple(value),
        }
    }
}

#[derive(Debug, Clone)]
pub enum IndicatorValue {
    Simple(f64),
    Macd {
        line: f64,
        signal: f64,
        histogram: f64,
    },
    Stochastic {
        k: f64,
        d: f64,
    },
    Bollinger {
        upper: f64,
        middle: f64,
        lower: f64,
        pct_b: f64,
    },
}

/// How the running VWAP accumulators are reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VwapReset {
    /// Cumulative since the first bar of the series.
    #[default]
    Never,
    /// Restart whenever the calendar date changes.
    Daily,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndicatorType {
    Sma(usize),
    Ema(usize),
    Rsi(usize),
    Atr(usize),
    Obv,
    Vwap(VwapReset),
    Macd {
        fast: usize,
        slow: usize,
        signal: usize,
    },
    Stochastic {
        k_period: usize,
        d_period: usize,
    },
    Bollinger {
        period: usize,
        stddev_mult_x100: u32,
    },
    Returns(usize),
    Volatility(usize),
    PriceToMa(usize),
}

#[derive(Debug, Clone)]
pub struct IndicatorSeries {
    pub indicator_type: IndicatorType,
    pub values: Vec<IndicatorPoint>,
}

impl IndicatorSeries {
    /// Scalar view of the series: `Some` for warmed `Simple` points.
    pub fn simple_values(&self) -> Vec<Option<f64>> {
        self.values
            .iter()
            .map(|p| match p.value {
                IndicatorValue::Simple(v) if p.valid => Some(v),
                _ => None,
            })
            .collect()
    }

    pub fn warmed_count(&self) -> usize {
        self.values.iter().filter(|p| p.valid).count()
    }
}
