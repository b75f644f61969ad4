//! RSI (Relative Strength Index) indicator implementation.
//!
//! Uses Wilder's smoothing (alpha = 1/n) for average gain/loss, applied
//! recursively from the first price change rather than re-seeded per window:
//! - avg[1] = first gain (loss)
//! - avg[i] = avg[i-1] + (x[i] - avg[i-1]) / n
//!
//! Formula: RSI = 100 - (100 / (1 + avg_gain / avg_loss))
//! If avg_loss == 0: RSI = 100, or the neutral 50 when avg_gain is also 0.
//!
//! Warmup: first n bars are invalid (fewer than n price changes observed).

use crate::domain::indicator::{
    IndicatorPoint, IndicatorSeries, IndicatorType, NEUTRAL_SENTINEL,
};
use crate::domain::ohlcv::PricePoint;

pub const DEFAULT_PERIOD: usize = 14;

pub fn calculate_rsi(prices: &[PricePoint], period: usize) -> IndicatorSeries {
    let mut values = Vec::with_capacity(prices.len());
    let alpha = if period > 0 { 1.0 / period as f64 } else { 0.0 };

    let mut avg_gain = 0.0;
    let mut avg_loss = 0.0;

    for (i, p) in prices.iter().enumerate() {
        if i == 0 {
            values.push(IndicatorPoint::simple(p.timestamp, false, 0.0));
            continue;
        }

        let change = p.close - prices[i - 1].close;
        let gain = change.max(0.0);
        let loss = (-change).max(0.0);

        if i == 1 {
            avg_gain = gain;
            avg_loss = loss;
        } else {
            avg_gain += alpha * (gain - avg_gain);
            avg_loss += alpha * (loss - avg_loss);
        }

        let valid = period > 0 && i >= period;
        values.push(IndicatorPoint::simple(
            p.timestamp,
            valid,
            rsi_from_averages(avg_gain, avg_loss),
        ));
    }

    IndicatorSeries {
        indicator_type: IndicatorType::Rsi(period),
        values,
    }
}

fn rsi_from_averages(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 {
        if avg_gain == 0.0 {
            NEUTRAL_SENTINEL
        } else {
            100.0
        }
    } else {
        100.0 - (100.0 / (1.0 + avg_gain / avg_loss))
    }
}
