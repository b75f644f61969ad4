#![allow(dead_code)]

use chrono::{Duration, NaiveDate, NaiveDateTime};
use quantfolio::domain::error::QuantError;
use quantfolio::domain::features::FeatureVector;
pub use quantfolio::domain::ohlcv::PricePoint;
use quantfolio::ports::data_port::DataPort;
use quantfolio::ports::model_port::SignalModel;
use std::collections::HashMap;

pub struct MockDataPort {
    pub prices: HashMap<String, Vec<PricePoint>>,
    pub signals: HashMap<String, Vec<(NaiveDateTime, f64)>>,
    pub errors: HashMap<String, String>,
}

impl MockDataPort {
    pub fn new() -> Self {
        Self {
            prices: HashMap::new(),
            signals: HashMap::new(),
            errors: HashMap::new(),
        }
    }

    pub fn with_prices(mut self, asset: &str, prices: Vec<PricePoint>) -> Self {
        self.prices.insert(asset.to_string(), prices);
        self
    }

    pub fn with_signals(mut self, name: &str, signals: Vec<(NaiveDateTime, f64)>) -> Self {
        self.signals.insert(name.to_string(), signals);
        self
    }

    pub fn with_error(mut self, asset: &str, reason: &str) -> Self {
        self.errors.insert(asset.to_string(), reason.to_string());
        self
    }
}

impl DataPort for MockDataPort {
    fn load_prices(&self, asset: &str) -> Result<Vec<PricePoint>, QuantError> {
        if let Some(reason) = self.errors.get(asset) {
            return Err(QuantError::Data {
                reason: reason.clone(),
            });
        }
        self.prices.get(asset).cloned().ok_or_else(|| QuantError::Data {
            reason: format!("no prices for {}", asset),
        })
    }

    fn load_signals(&self, name: &str) -> Result<Vec<(NaiveDateTime, f64)>, QuantError> {
        self.signals.get(name).cloned().ok_or_else(|| QuantError::Data {
            reason: format!("no signals named {}", name),
        })
    }

    fn list_assets(&self) -> Result<Vec<String>, QuantError> {
        let mut assets: Vec<String> = self.prices.keys().cloned().collect();
        assets.sort();
        Ok(assets)
    }
}

pub fn day(i: usize) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2023, 1, 2)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
        + Duration::days(i as i64)
}

/// Deterministic wavy price path: drift plus two sine components scaled by
/// `vol`, so different seeds give different but reproducible series.
pub fn generate_prices(count: usize, start_price: f64, vol: f64, seed: u64) -> Vec<PricePoint> {
    let phase = seed as f64 * 1.7;
    let mut close = start_price;
    (0..count)
        .map(|i| {
            let t = i as f64;
            let r = 0.0003 + vol * ((t * 0.9 + phase).sin() + 0.5 * (t * 0.23 + 2.0 * phase).cos());
            if i > 0 {
                close *= 1.0 + r;
            }
            PricePoint {
                timestamp: day(i),
                open: close * (1.0 - vol * 0.2),
                high: close * (1.0 + vol),
                low: close * (1.0 - vol),
                close,
                volume: 10_000.0 + 500.0 * (t * 0.3).sin().abs(),
            }
        })
        .collect()
}

/// Long when the 5-bar return feature is positive.
pub struct MomentumModel;

impl SignalModel for MomentumModel {
    fn name(&self) -> &str {
        "momentum"
    }

    fn fit_predict(
        &self,
        _train: &[FeatureVector],
        _labels: &[f64],
        test: &[FeatureVector],
    ) -> Result<Vec<Option<f64>>, QuantError> {
        Ok(test
            .iter()
            .map(|row| row.get("ret_5").map(|r| if r > 0.0 { 1.0 } else { 0.0 }))
            .collect())
    }
}

/// Share of up-moves seen in training.
pub struct BaseRateModel;

impl SignalModel for BaseRateModel {
    fn name(&self) -> &str {
        "base-rate"
    }

    fn fit_predict(
        &self,
        _train: &[FeatureVector],
        labels: &[f64],
        test: &[FeatureVector],
    ) -> Result<Vec<Option<f64>>, QuantError> {
        let ups = labels.iter().filter(|l| **l > 0.0).count();
        let rate = ups as f64 / labels.len() as f64;
        Ok(vec![Some(rate); test.len()])
    }
}
