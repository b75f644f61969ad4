//! Data access port trait.

use chrono::NaiveDateTime;

use crate::domain::error::QuantError;
use crate::domain::ohlcv::PricePoint;

pub trait DataPort {
    /// Price history of one asset in ascending timestamp order.
    fn load_prices(&self, asset: &str) -> Result<Vec<PricePoint>, QuantError>;

    /// Externally produced `(timestamp, score)` pairs, ascending.
    fn load_signals(&self, name: &str) -> Result<Vec<(NaiveDateTime, f64)>, QuantError>;

    fn list_assets(&self) -> Result<Vec<String>, QuantError>;
}
