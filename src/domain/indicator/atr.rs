//! ATR (Average True Range) with Wilder smoothing.
//!
//! TR[0] = high - low, TR[i] = max(h - l, |h - C[i-1]|, |l - C[i-1]|).
//! ATR[0] = TR[0], ATR[i] = ATR[i-1] + (TR[i] - ATR[i-1]) / n.
//! Warmup: first (n-1) bars are invalid.

use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType};
use crate::domain::ohlcv::PricePoint;

pub const DEFAULT_PERIOD: usize = 14;

pub fn calculate_atr(prices: &[PricePoint], period: usize) -> IndicatorSeries {
    let mut values = Vec::with_capacity(prices.len());
    let alpha = if period > 0 { 1.0 / period as f64 } else { 0.0 };
    let mut atr = 0.0;

    for (i, p) in prices.iter().enumerate() {
        let tr = if i == 0 {
            p.high - p.low
        } else {
            p.true_range(prices[i - 1].close)
        };

        if i == 0 {
            atr = tr;
        } else {
            atr += alpha * (tr - atr);
        }

        let valid = period > 0 && i + 1 >= period;
        values.push(IndicatorPoint::simple(p.timestamp, valid, atr));
    }

    IndicatorSeries {
        indicator_type: IndicatorType::Atr(period),
        values,
    }
}
