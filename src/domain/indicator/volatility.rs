//! Rolling volatility: sample standard deviation (N-1) of one-bar simple
//! returns over a trailing window. Not annualized.
//!
//! Warmup: the first `window` bars (a window of returns needs window + 1
//! closes). A window below 2 never warms.

use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType};
use crate::domain::ohlcv::PricePoint;

pub const DEFAULT_WINDOWS: [usize; 2] = [5, 20];

pub fn calculate_volatility(prices: &[PricePoint], window: usize) -> IndicatorSeries {
    // rets[i] is the return realized on bar i; rets[0] is undefined.
    let rets: Vec<f64> = prices
        .iter()
        .enumerate()
        .map(|(i, p)| {
            if i == 0 {
                return 0.0;
            }
            let base = prices[i - 1].close;
            if base != 0.0 { p.close / base - 1.0 } else { 0.0 }
        })
        .collect();

    let values = prices
        .iter()
        .enumerate()
        .map(|(i, p)| {
            if window < 2 || i < window {
                return IndicatorPoint::simple(p.timestamp, false, 0.0);
            }
            let slice = &rets[i + 1 - window..=i];
            IndicatorPoint::simple(p.timestamp, true, sample_std(slice))
        })
        .collect();

    IndicatorSeries {
        indicator_type: IndicatorType::Volatility(window),
        values,
    }
}

fn sample_std(values: &[f64]) -> f64 {
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
    var.sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};

    fn make_prices(closes: &[f64]) -> Vec<PricePoint> {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        closes
            .iter()
            .enumerate()
            .map(|(i, &close)| PricePoint {
                timestamp: start + Duration::days(i as i64),
                open: close,
                high: close,
                low: close,
                close,
                volume: 1000.0,
            })
            .collect()
    }

    #[test]
    fn volatility_warmup() {
        let series = calculate_volatility(&make_prices(&[100.0, 101.0, 102.0, 103.0]), 2);
        assert!(!series.values[0].valid);
        assert!(!series.values[1].valid);
        assert!(series.values[2].valid);
    }

    #[test]
    fn volatility_sample_std() {
        // returns +10%, -10%: mean 0, sample variance 0.02
        let values =
            calculate_volatility(&make_prices(&[100.0, 110.0, 99.0]), 2).simple_values();
        assert!((values[2].unwrap() - 0.02_f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn volatility_constant_growth_is_zero() {
        let closes: Vec<f64> = (0..10).map(|i| 100.0 * 1.01_f64.powi(i)).collect();
        let values = calculate_volatility(&make_prices(&closes), 5).simple_values();
        assert!(values[9].unwrap().abs() < 1e-12);
    }

    #[test]
    fn volatility_window_one_never_warms() {
        let series = calculate_volatility(&make_prices(&[1.0, 2.0, 3.0]), 1);
        assert_eq!(series.warmed_count(), 0);
    }
}
