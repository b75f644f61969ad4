//! CSV file data adapter.
//!
//! Prices live in `<base>/<ASSET>.csv` with the header
//! `timestamp,open,high,low,close,volume`; signal files have
//! `timestamp,signal`. Timestamps are `%Y-%m-%d` or `%Y-%m-%d %H:%M:%S`.

use crate::domain::error::QuantError;
use crate::domain::ohlcv::PricePoint;
use crate::ports::data_port::DataPort;
use chrono::{NaiveDate, NaiveDateTime};
use csv::StringRecord;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

pub struct CsvAdapter {
    base_path: PathBuf,
}

impl CsvAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn csv_path(&self, asset: &str) -> PathBuf {
        self.base_path.join(format!("{}.csv", asset))
    }

    fn read_records(path: &Path) -> Result<Vec<StringRecord>, QuantError> {
        let content = fs::read_to_string(path).map_err(|e| QuantError::Data {
            reason: format!("failed to read {}: {}", path.display(), e),
        })?;
        let mut rdr = csv::Reader::from_reader(content.as_bytes());
        rdr.records()
            .map(|r| {
                r.map_err(|e| QuantError::Data {
                    reason: format!("CSV parse error in {}: {}", path.display(), e),
                })
            })
            .collect()
    }
}

pub fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S")
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(value, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

fn timestamp_field(record: &StringRecord, row: usize) -> Result<NaiveDateTime, QuantError> {
    let raw = record.get(0).ok_or_else(|| QuantError::Data {
        reason: format!("row {}: missing timestamp column", row),
    })?;
    parse_timestamp(raw).ok_or_else(|| QuantError::Data {
        reason: format!("row {}: invalid timestamp '{}'", row, raw),
    })
}

fn number_field(record: &StringRecord, index: usize, name: &str, row: usize) -> Result<f64, QuantError> {
    record
        .get(index)
        .ok_or_else(|| QuantError::Data {
            reason: format!("row {}: missing {} column", row, name),
        })?
        .trim()
        .parse()
        .map_err(|e| QuantError::Data {
            reason: format!("row {}: invalid {} value: {}", row, name, e),
        })
}

impl DataPort for CsvAdapter {
    fn load_prices(&self, asset: &str) -> Result<Vec<PricePoint>, QuantError> {
        let path = self.csv_path(asset);
        let records = Self::read_records(&path)?;

        let mut prices = Vec::with_capacity(records.len());
        for (row, record) in records.iter().enumerate() {
            prices.push(PricePoint {
                timestamp: timestamp_field(record, row + 1)?,
                open: number_field(record, 1, "open", row + 1)?,
                high: number_field(record, 2, "high", row + 1)?,
                low: number_field(record, 3, "low", row + 1)?,
                close: number_field(record, 4, "close", row + 1)?,
                volume: number_field(record, 5, "volume", row + 1)?,
            });
        }

        prices.sort_by_key(|p| p.timestamp);
        debug!(asset, bars = prices.len(), "loaded prices");
        Ok(prices)
    }

    fn load_signals(&self, name: &str) -> Result<Vec<(NaiveDateTime, f64)>, QuantError> {
        let path = self.base_path.join(name);
        let records = Self::read_records(&path)?;

        let mut signals = Vec::with_capacity(records.len());
        for (row, record) in records.iter().enumerate() {
            signals.push((
                timestamp_field(record, row + 1)?,
                number_field(record, 1, "signal", row + 1)?,
            ));
        }

        signals.sort_by_key(|(t, _)| *t);
        Ok(signals)
    }

    fn list_assets(&self) -> Result<Vec<String>, QuantError> {
        let entries = fs::read_dir(&self.base_path).map_err(|e| QuantError::Data {
            reason: format!(
                "failed to read directory {}: {}",
                self.base_path.display(),
                e
            ),
        })?;

        let mut assets = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| QuantError::Data {
                reason: format!("directory entry error: {}", e),
            })?;

            let name = entry.file_name();
            let name_str = name.to_string_lossy();

            if let Some(asset) = name_str.strip_suffix(".csv") {
                assets.push(asset.to_string());
            }
        }

        assets.sort();
        Ok(assets)
    }
}
