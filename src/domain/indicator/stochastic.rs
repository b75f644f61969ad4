//! Stochastic oscillator (%K / %D).
//!
//! %K = 100 * (C - lowest_low(k)) / (highest_high(k) - lowest_low(k))
//! %D = SMA(%K, d)
//!
//! A flat range (highest == lowest) yields the neutral value 50.
//! Warmup: (k - 1) + (d - 1) bars.

use crate::domain::indicator::{
    IndicatorPoint, IndicatorSeries, IndicatorType, IndicatorValue, NEUTRAL_SENTINEL,
};
use crate::domain::ohlcv::PricePoint;

pub const DEFAULT_K_PERIOD: usize = 14;
pub const DEFAULT_D_PERIOD: usize = 3;

pub fn calculate_stochastic(
    prices: &[PricePoint],
    k_period: usize,
    d_period: usize,
) -> IndicatorSeries {
    let n = prices.len();
    let mut k_values: Vec<Option<f64>> = vec![None; n];

    if k_period > 0 {
        for i in (k_period - 1)..n {
            let window = &prices[i + 1 - k_period..=i];
            let lowest = window.iter().map(|p| p.low).fold(f64::INFINITY, f64::min);
            let highest = window
                .iter()
                .map(|p| p.high)
                .fold(f64::NEG_INFINITY, f64::max);
            let range = highest - lowest;
            k_values[i] = Some(if range > 0.0 {
                100.0 * (prices[i].close - lowest) / range
            } else {
                NEUTRAL_SENTINEL
            });
        }
    }

    let mut values = Vec::with_capacity(n);
    for (i, p) in prices.iter().enumerate() {
        let d = if d_period > 0 && i + 1 >= d_period {
            k_values[i + 1 - d_period..=i]
                .iter()
                .copied()
                .collect::<Option<Vec<f64>>>()
                .map(|w| w.iter().sum::<f64>() / d_period as f64)
        } else {
            None
        };

        let point = match (k_values[i], d) {
            (Some(k), Some(d)) => IndicatorPoint {
                timestamp: p.timestamp,
                valid: true,
                value: IndicatorValue::Stochastic { k, d },
            },
            (k, _) => IndicatorPoint::warmup(
                p.timestamp,
                IndicatorValue::Stochastic {
                    k: k.unwrap_or(0.0),
                    d: 0.0,
                },
            ),
        };
        values.push(point);
    }

    IndicatorSeries {
        indicator_type: IndicatorType::Stochastic { k_period, d_period },
        values,
    }
}
