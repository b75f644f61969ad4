//! Price-to-moving-average ratio: close / SMA(n).
//!
//! Warmup matches SMA(n). A zero average yields 1.0.

use crate::domain::indicator::{rolling_mean, IndicatorPoint, IndicatorSeries, IndicatorType};
use crate::domain::ohlcv::{closes, PricePoint};

pub const DEFAULT_PERIODS: [usize; 3] = [10, 20, 50];

pub fn calculate_price_to_ma(prices: &[PricePoint], period: usize) -> IndicatorSeries {
    let means = rolling_mean(&closes(prices), period);

    let values = prices
        .iter()
        .zip(means)
        .map(|(p, mean)| match mean {
            Some(m) if m != 0.0 => IndicatorPoint::simple(p.timestamp, true, p.close / m),
            Some(_) => IndicatorPoint::simple(p.timestamp, true, 1.0),
            None => IndicatorPoint::simple(p.timestamp, false, 0.0),
        })
        .collect();

    IndicatorSeries {
        indicator_type: IndicatorType::PriceToMa(period),
        values,
    }
}
