//! OBV (On-Balance Volume) indicator implementation.

use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType};
use crate::domain::ohlcv::PricePoint;

/// Calculate OBV (On-Balance Volume) indicator.
///
/// OBV[0] = 0 (no previous close to compare against)
/// If close[i] > close[i-1]: OBV[i] = OBV[i-1] + volume[i]
/// If close[i] < close[i-1]: OBV[i] = OBV[i-1] - volume[i]
/// If close[i] == close[i-1]: OBV[i] = OBV[i-1]
///
/// No warmup period; all bars are valid.
pub fn calculate_obv(prices: &[PricePoint]) -> IndicatorSeries {
    let mut values = Vec::with_capacity(prices.len());
    let mut obv: f64 = 0.0;

    for (i, p) in prices.iter().enumerate() {
        if i > 0 {
            let prev_close = prices[i - 1].close;
            if p.close > prev_close {
                obv += p.volume;
            } else if p.close < prev_close {
                obv -= p.volume;
            }
        }
        values.push(IndicatorPoint::simple(p.timestamp, true, obv));
    }

    IndicatorSeries {
        indicator_type: IndicatorType::Obv,
        values,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn make_point(day: u32, close: f64, volume: f64) -> PricePoint {
        PricePoint {
            timestamp: NaiveDate::from_ymd_opt(2024, 1, day)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap(),
            open: close,
            high: close,
            low: close,
            close,
            volume,
        }
    }

    #[test]
    fn obv_starts_at_zero() {
        let series = calculate_obv(&[make_point(1, 100.0, 1000.0)]);
        assert_eq!(series.simple_values(), vec![Some(0.0)]);
    }

    #[test]
    fn obv_signed_accumulation() {
        let prices = vec![
            make_point(1, 100.0, 1000.0),
            make_point(2, 105.0, 500.0),
            make_point(3, 102.0, 200.0),
            make_point(4, 102.0, 900.0),
        ];
        let values = calculate_obv(&prices).simple_values();
        assert_eq!(
            values,
            vec![Some(0.0), Some(500.0), Some(300.0), Some(300.0)]
        );
    }

    #[test]
    fn obv_all_points_valid() {
        let prices = vec![make_point(1, 100.0, 1.0), make_point(2, 99.0, 1.0)];
        assert_eq!(calculate_obv(&prices).warmed_count(), 2);
    }
}
