//! Trailing h-bar return: close[t] / close[t-h] - 1.
//!
//! Warmup: first h bars. A zero base close yields 0.0.

use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType};
use crate::domain::ohlcv::PricePoint;

pub const DEFAULT_HORIZONS: [usize; 4] = [1, 5, 10, 20];

pub fn calculate_returns(prices: &[PricePoint], horizon: usize) -> IndicatorSeries {
    let values = prices
        .iter()
        .enumerate()
        .map(|(i, p)| {
            if horizon == 0 || i < horizon {
                return IndicatorPoint::simple(p.timestamp, false, 0.0);
            }
            let base = prices[i - horizon].close;
            let ret = if base != 0.0 { p.close / base - 1.0 } else { 0.0 };
            IndicatorPoint::simple(p.timestamp, true, ret)
        })
        .collect();

    IndicatorSeries {
        indicator_type: IndicatorType::Returns(horizon),
        values,
    }
}
