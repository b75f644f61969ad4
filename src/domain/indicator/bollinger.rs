//! Bollinger Bands indicator.
//!
//! Bollinger Bands consist of:
//! - Middle: Simple Moving Average (SMA) over n periods
//! - Upper: Middle + (multiplier × StdDev)
//! - Lower: Middle - (multiplier × StdDev)
//! - %b: (Close - Lower) / (Upper - Lower), 0.5 when the band is flat
//!
//! Where StdDev is population standard deviation (divides by N, not N-1).
//!
//! Default parameters: period=20, multiplier=2.0
//! Warmup: first (period-1) bars are invalid.

use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType, IndicatorValue};
use crate::domain::ohlcv::PricePoint;

pub const DEFAULT_PERIOD: usize = 20;
pub const DEFAULT_STDDEV_MULT_X100: u32 = 200;

const FLAT_BAND_PCT_B: f64 = 0.5;

pub fn calculate_bollinger(
    prices: &[PricePoint],
    period: usize,
    stddev_mult_x100: u32,
) -> IndicatorSeries {
    let mut values = Vec::with_capacity(prices.len());
    let mult = stddev_mult_x100 as f64 / 100.0;

    for (i, p) in prices.iter().enumerate() {
        let valid = period > 0 && i + 1 >= period;

        let value = if valid {
            let window = &prices[i + 1 - period..=i];

            let middle: f64 = window.iter().map(|b| b.close).sum::<f64>() / period as f64;
            let variance: f64 = window
                .iter()
                .map(|b| {
                    let diff = b.close - middle;
                    diff * diff
                })
                .sum::<f64>()
                / period as f64;

            let stddev = variance.sqrt();
            let upper = middle + mult * stddev;
            let lower = middle - mult * stddev;
            let width = upper - lower;
            let pct_b = if width > 0.0 {
                (p.close - lower) / width
            } else {
                FLAT_BAND_PCT_B
            };

            IndicatorValue::Bollinger {
                upper,
                middle,
                lower,
                pct_b,
            }
        } else {
            IndicatorValue::Bollinger {
                upper: 0.0,
                middle: 0.0,
                lower: 0.0,
                pct_b: 0.0,
            }
        };

        values.push(IndicatorPoint {
            timestamp: p.timestamp,
            valid,
            value,
        });
    }

    IndicatorSeries {
        indicator_type: IndicatorType::Bollinger {
            period,
            stddev_mult_x100,
        },
        values,
    }
}
