//! Simple Moving Average indicator.
//!
//! SMA(n)[i] = mean(C[i-n+1..=i]). Warmup: first (n-1) bars are invalid.

use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType};
use crate::domain::ohlcv::PricePoint;

pub fn calculate_sma(prices: &[PricePoint], period: usize) -> IndicatorSeries {
    let closes: Vec<f64> = prices.iter().map(|p| p.close).collect();
    let means = rolling_mean(&closes, period);

    let values = prices
        .iter()
        .zip(means)
        .map(|(p, m)| IndicatorPoint::simple(p.timestamp, m.is_some(), m.unwrap_or(0.0)))
        .collect();

    IndicatorSeries {
        indicator_type: IndicatorType::Sma(period),
        values,
    }
}

/// Trailing mean over `period` values using a running sum.
///
/// Returns `None` until the window is full, and everywhere when `period == 0`.
pub fn rolling_mean(values: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut out = Vec::with_capacity(values.len());
    if period == 0 {
        out.resize(values.len(), None);
        return out;
    }

    let mut sum = 0.0;
    for (i, &v) in values.iter().enumerate() {
        sum += v;
        if i >= period {
            sum -= values[i - period];
        }
        if i + 1 >= period {
            out.push(Some(sum / period as f64));
        } else {
            out.push(None);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn make_prices(closes: &[f64]) -> Vec<PricePoint> {
        closes
            .iter()
            .enumerate()
            .map(|(i, &close)| PricePoint {
                timestamp: NaiveDate::from_ymd_opt(2024, 1, (i + 1) as u32)
                    .unwrap()
                    .and_hms_opt(0, 0, 0)
                    .unwrap(),
                open: close,
                high: close,
                low: close,
                close,
                volume: 1000.0,
            })
            .collect()
    }

    #[test]
    fn sma_warmup_and_values() {
        let prices = make_prices(&[1.0, 2.0, 3.0, 4.0, 5.0]);
        let series = calculate_sma(&prices, 3);

        assert_eq!(series.values.len(), 5);
        assert_eq!(
            series.simple_values(),
            vec![None, None, Some(2.0), Some(3.0), Some(4.0)]
        );
    }

    #[test]
    fn sma_period_longer_than_series() {
        let prices = make_prices(&[1.0, 2.0]);
        let series = calculate_sma(&prices, 5);
        assert_eq!(series.warmed_count(), 0);
        assert_eq!(series.values.len(), 2);
    }

    #[test]
    fn rolling_mean_zero_period_is_all_none() {
        assert_eq!(rolling_mean(&[1.0, 2.0], 0), vec![None, None]);
    }
}
