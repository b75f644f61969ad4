//! Price bar representation and input validation.

use crate::domain::error::QuantError;
use chrono::NaiveDateTime;

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PricePoint {
    pub timestamp: NaiveDateTime,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl PricePoint {
    /// (high + low + close) / 3
    pub fn typical_price(&self) -> f64 {
        (self.high + self.low + self.close) / 3.0
    }

    /// max(high - low, |high - prev_close|, |low - prev_close|)
    pub fn true_range(&self, prev_close: f64) -> f64 {
        let hl = self.high - self.low;
        let hc = (self.high - prev_close).abs();
        let lc = (self.low - prev_close).abs();
        hl.max(hc).max(lc)
    }
}

/// Reject series that are unsorted, duplicated, non-finite or negative.
///
/// An empty series is valid; minimum-length checks belong to the caller.
pub fn validate_prices(prices: &[PricePoint]) -> Result<(), QuantError> {
    for (i, p) in prices.iter().enumerate() {
        let fields = [p.open, p.high, p.low, p.close, p.volume];
        if fields.iter().any(|v| !v.is_finite()) {
            return Err(QuantError::invalid(format!(
                "non-finite value in bar {} ({})",
                i, p.timestamp
            )));
        }
        if fields.iter().any(|v| *v < 0.0) {
            return Err(QuantError::invalid(format!(
                "negative price or volume in bar {} ({})",
                i, p.timestamp
            )));
        }
        if p.high < p.low {
            return Err(QuantError::invalid(format!(
                "high below low in bar {} ({})",
                i, p.timestamp
            )));
        }
        if i > 0 && p.timestamp <= prices[i - 1].timestamp {
            return Err(QuantError::invalid(format!(
                "timestamps not strictly ascending at bar {} ({})",
                i, p.timestamp
            )));
        }
    }
    Ok(())
}

pub fn closes(prices: &[PricePoint]) -> Vec<f64> {
    prices.iter().map(|p| p.close).collect()
}
