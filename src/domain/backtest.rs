//! Turnover-aware signal backtest.
//!
//! `returns[t]` is realized over bar t (close[t-1] -> close[t]) and is
//! indexed like `signals[t]`. A position chosen from the signal at bar t
//! earns the return of bar t+1, so the strategy never trades on information
//! it could not have had.

use std::collections::HashMap;

use chrono::NaiveDateTime;
use tracing::{debug, warn};

use crate::domain::error::QuantError;
use crate::domain::metrics::{equity_curve, EquityCurve, RiskParams, RiskReport};
use crate::domain::ohlcv::{validate_prices, PricePoint};
use crate::domain::returns::bar_returns;

pub const DEFAULT_COST_BPS: f64 = 10.0;
pub const DEFAULT_THRESHOLD: f64 = 0.5;
pub const MIN_BARS: usize = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Position {
    Flat = 0,
    Long = 1,
}

impl Position {
    /// Long when the score reaches the threshold. Unscored bars stay flat.
    pub fn from_signal(signal: Option<f64>, threshold: f64) -> Self {
        match signal {
            Some(s) if s >= threshold => Position::Long,
            _ => Position::Flat,
        }
    }

    pub fn exposure(self) -> f64 {
        self as i32 as f64
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BacktestConfig {
    /// Round-trip-agnostic cost per unit of turnover, in basis points.
    pub cost_bps: f64,
    pub threshold: f64,
    pub min_bars: usize,
    pub risk: RiskParams,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        BacktestConfig {
            cost_bps: DEFAULT_COST_BPS,
            threshold: DEFAULT_THRESHOLD,
            min_bars: MIN_BARS,
            risk: RiskParams::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct BacktestResult {
    /// One per bar after truncation.
    pub positions: Vec<Position>,
    /// `turnover[t]`, `costs[t]` and `strategy_returns[t]` belong to the
    /// position held from bar t to bar t+1.
    pub turnover: Vec<f64>,
    pub costs: Vec<f64>,
    pub strategy_returns: Vec<f64>,
    pub equity: EquityCurve,
    pub report: RiskReport,
    pub trades: usize,
    pub total_cost: f64,
}

impl BacktestResult {
    pub fn final_equity(&self) -> f64 {
        self.equity.last().copied().unwrap_or(1.0)
    }
}

pub fn run_backtest(
    returns: &[f64],
    signals: &[Option<f64>],
    config: &BacktestConfig,
) -> Result<BacktestResult, QuantError> {
    let n = returns.len().min(signals.len());
    if returns.len() != signals.len() {
        warn!(
            returns = returns.len(),
            signals = signals.len(),
            kept = n,
            "return and signal lengths differ, truncating to shared prefix"
        );
    }
    let returns = &returns[..n];
    let signals = &signals[..n];

    if let Some(t) = returns.iter().position(|r| !r.is_finite()) {
        return Err(QuantError::invalid(format!("non-finite return at bar {}", t)));
    }
    for (t, s) in signals.iter().enumerate() {
        if let Some(v) = s {
            if !v.is_finite() || !(0.0..=1.0).contains(v) {
                return Err(QuantError::invalid(format!(
                    "signal {} at bar {} outside [0, 1]",
                    v, t
                )));
            }
        }
    }

    let need = config.min_bars.max(2);
    if n < need {
        return Err(QuantError::insufficient("backtest", n, need));
    }

    let positions: Vec<Position> = signals
        .iter()
        .map(|s| Position::from_signal(*s, config.threshold))
        .collect();

    let cost_rate = config.cost_bps / 10_000.0;
    let mut turnover = Vec::with_capacity(n - 1);
    let mut costs = Vec::with_capacity(n - 1);
    let mut strategy_returns = Vec::with_capacity(n - 1);
    let mut previous = Position::Flat;

    for t in 0..n - 1 {
        let held = positions[t];
        let traded = (held.exposure() - previous.exposure()).abs();
        let cost = traded * cost_rate;

        turnover.push(traded);
        costs.push(cost);
        strategy_returns.push(held.exposure() * returns[t + 1] - cost);
        previous = held;
    }

    let trades = turnover.iter().filter(|x| **x > 0.0).count();
    let total_cost = costs.iter().sum();
    let equity = equity_curve(&strategy_returns);
    let report = RiskReport::compute(&strategy_returns, &config.risk)?;

    debug!(bars = n, trades, total_cost, "backtest complete");

    Ok(BacktestResult {
        positions,
        turnover,
        costs,
        strategy_returns,
        equity,
        report,
        trades,
        total_cost,
    })
}

/// Place externally produced scores on the bars of a price series. Bars
/// without a score stay `None`; scores on timestamps with no bar are dropped.
pub fn align_signals(prices: &[PricePoint], signals: &[(NaiveDateTime, f64)]) -> Vec<Option<f64>> {
    let by_time: HashMap<NaiveDateTime, f64> = signals.iter().copied().collect();
    let aligned: Vec<Option<f64>> = prices
        .iter()
        .map(|p| by_time.get(&p.timestamp).copied())
        .collect();

    let matched = aligned.iter().flatten().count();
    if matched < signals.len() {
        warn!(
            dropped = signals.len() - matched,
            "signals without a matching bar were ignored"
        );
    }
    aligned
}

/// Backtest against a price series, deriving bar-aligned returns first.
pub fn run_backtest_on_prices(
    prices: &[PricePoint],
    signals: &[Option<f64>],
    config: &BacktestConfig,
) -> Result<BacktestResult, QuantError> {
    validate_prices(prices)?;
    let returns = bar_returns(prices)?;
    run_backtest(&returns, signals, config)
}
