//! VWAP (Volume Weighted Average Price).
//!
//! VWAP[i] = sum(TP[j] * V[j]) / sum(V[j]) over the current accumulation
//! window, where TP = (H + L + C) / 3. The window starts at the first bar
//! ([`VwapReset::Never`]) or at the first bar of each calendar day
//! ([`VwapReset::Daily`]). Zero accumulated volume yields the bar's typical
//! price. No warmup.

use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType, VwapReset};
use crate::domain::ohlcv::PricePoint;

pub fn calculate_vwap(prices: &[PricePoint], reset: VwapReset) -> IndicatorSeries {
    let mut values = Vec::with_capacity(prices.len());
    let mut pv_sum = 0.0;
    let mut vol_sum = 0.0;

    for (i, p) in prices.iter().enumerate() {
        let new_session = match reset {
            VwapReset::Never => false,
            VwapReset::Daily => i > 0 && p.timestamp.date() != prices[i - 1].timestamp.date(),
        };
        if new_session {
            pv_sum = 0.0;
            vol_sum = 0.0;
        }

        let tp = p.typical_price();
        pv_sum += tp * p.volume;
        vol_sum += p.volume;

        let vwap = if vol_sum > 0.0 { pv_sum / vol_sum } else { tp };
        values.push(IndicatorPoint::simple(p.timestamp, true, vwap));
    }

    IndicatorSeries {
        indicator_type: IndicatorType::Vwap(reset),
        values,
    }
}
