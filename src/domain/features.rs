//! Feature extraction: turns a price history into one named feature vector
//! per bar by running every configured indicator over it.

use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use rayon::prelude::*;
use tracing::debug;

use crate::domain::error::QuantError;
use crate::domain::indicator::{
    atr, bollinger, ma_ratio, macd, obv, returns, rsi, stochastic, volatility, vwap, IndicatorSeries,
    IndicatorValue, VwapReset,
};
use crate::domain::ohlcv::{validate_prices, PricePoint};

/// Periods for every indicator in the feature set.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureConfig {
    pub rsi_period: usize,
    pub atr_period: usize,
    pub vwap_reset: VwapReset,
    pub stoch_k: usize,
    pub stoch_d: usize,
    pub macd_fast: usize,
    pub macd_slow: usize,
    pub macd_signal: usize,
    pub bb_period: usize,
    pub bb_stddev_mult_x100: u32,
    pub return_horizons: Vec<usize>,
    pub vol_windows: Vec<usize>,
    pub ma_periods: Vec<usize>,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        FeatureConfig {
            rsi_period: rsi::DEFAULT_PERIOD,
            atr_period: atr::DEFAULT_PERIOD,
            vwap_reset: VwapReset::Never,
            stoch_k: stochastic::DEFAULT_K_PERIOD,
            stoch_d: stochastic::DEFAULT_D_PERIOD,
            macd_fast: macd::DEFAULT_FAST,
            macd_slow: macd::DEFAULT_SLOW,
            macd_signal: macd::DEFAULT_SIGNAL,
            bb_period: bollinger::DEFAULT_PERIOD,
            bb_stddev_mult_x100: bollinger::DEFAULT_STDDEV_MULT_X100,
            return_horizons: returns::DEFAULT_HORIZONS.to_vec(),
            vol_windows: volatility::DEFAULT_WINDOWS.to_vec(),
            ma_periods: ma_ratio::DEFAULT_PERIODS.to_vec(),
        }
    }
}

impl FeatureConfig {
    /// Column names in output order.
    pub fn feature_names(&self) -> Vec<String> {
        let mut names = vec![
            format!("rsi_{}", self.rsi_period),
            format!("atr_{}", self.atr_period),
            "vwap".to_string(),
            "obv".to_string(),
            "stoch_k".to_string(),
            "stoch_d".to_string(),
            "macd_line".to_string(),
            "macd_signal".to_string(),
            "macd_hist".to_string(),
            "bb_upper".to_string(),
            "bb_middle".to_string(),
            "bb_lower".to_string(),
            "bb_pct_b".to_string(),
        ];
        names.extend(self.return_horizons.iter().map(|h| format!("ret_{}", h)));
        names.extend(self.vol_windows.iter().map(|w| format!("vol_{}", w)));
        names.extend(self.ma_periods.iter().map(|n| format!("px_ma_{}", n)));
        names
    }
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct FeatureVector {
    pub timestamp: NaiveDateTime,
    pub values: BTreeMap<String, Option<f64>>,
}

impl FeatureVector {
    /// Value of a named feature, `None` if unknown or still warming up.
    pub fn get(&self, name: &str) -> Option<f64> {
        self.values.get(name).copied().flatten()
    }

    pub fn is_warm(&self) -> bool {
        self.values.values().all(Option::is_some)
    }
}

/// Compute the full feature set for one price history.
///
/// The output has one vector per input bar, in the same order.
pub fn compute_features(
    prices: &[PricePoint],
    config: &FeatureConfig,
) -> Result<Vec<FeatureVector>, QuantError> {
    validate_prices(prices)?;

    let mut columns: Vec<(String, Vec<Option<f64>>)> = Vec::new();

    columns.push((
        format!("rsi_{}", config.rsi_period),
        rsi::calculate_rsi(prices, config.rsi_period).simple_values(),
    ));
    columns.push((
        format!("atr_{}", config.atr_period),
        atr::calculate_atr(prices, config.atr_period).simple_values(),
    ));
    columns.push((
        "vwap".into(),
        vwap::calculate_vwap(prices, config.vwap_reset).simple_values(),
    ));
    columns.push((
        "obv".into(),
        obv::calculate_obv(prices).simple_values(),
    ));

    let stoch = stochastic::calculate_stochastic(prices, config.stoch_k, config.stoch_d);
    columns.push(("stoch_k".into(), component(&stoch, |v| match v {
        IndicatorValue::Stochastic { k, .. } => Some(*k),
        _ => None,
    })));
    columns.push(("stoch_d".into(), component(&stoch, |v| match v {
        IndicatorValue::Stochastic { d, .. } => Some(*d),
        _ => None,
    })));

    let macd_series =
        macd::calculate_macd(prices, config.macd_fast, config.macd_slow, config.macd_signal);
    columns.push(("macd_line".into(), component(&macd_series, |v| match v {
        IndicatorValue::Macd { line, .. } => Some(*line),
        _ => None,
    })));
    columns.push(("macd_signal".into(), component(&macd_series, |v| match v {
        IndicatorValue::Macd { signal, .. } => Some(*signal),
        _ => None,
    })));
    columns.push(("macd_hist".into(), component(&macd_series, |v| match v {
        IndicatorValue::Macd { histogram, .. } => Some(*histogram),
        _ => None,
    })));

    let bb = bollinger::calculate_bollinger(prices, config.bb_period, config.bb_stddev_mult_x100);
    columns.push(("bb_upper".into(), component(&bb, |v| match v {
        IndicatorValue::Bollinger { upper, .. } => Some(*upper),
        _ => None,
    })));
    columns.push(("bb_middle".into(), component(&bb, |v| match v {
        IndicatorValue::Bollinger { middle, .. } => Some(*middle),
        _ => None,
    })));
    columns.push(("bb_lower".into(), component(&bb, |v| match v {
        IndicatorValue::Bollinger { lower, .. } => Some(*lower),
        _ => None,
    })));
    columns.push(("bb_pct_b".into(), component(&bb, |v| match v {
        IndicatorValue::Bollinger { pct_b, .. } => Some(*pct_b),
        _ => None,
    })));

    for &h in &config.return_horizons {
        columns.push((
            format!("ret_{}", h),
            returns::calculate_returns(prices, h).simple_values(),
        ));
    }
    for &w in &config.vol_windows {
        columns.push((
            format!("vol_{}", w),
            volatility::calculate_volatility(prices, w).simple_values(),
        ));
    }
    for &n in &config.ma_periods {
        columns.push((
            format!("px_ma_{}", n),
            ma_ratio::calculate_price_to_ma(prices, n).simple_values(),
        ));
    }

    debug!(
        bars = prices.len(),
        features = columns.len(),
        "computed feature columns"
    );

    let vectors = prices
        .iter()
        .enumerate()
        .map(|(i, p)| FeatureVector {
            timestamp: p.timestamp,
            values: columns
                .iter()
                .map(|(name, col)| (name.clone(), col[i]))
                .collect(),
        })
        .collect();

    Ok(vectors)
}

/// Compute features for several assets in parallel, preserving input order.
pub fn compute_feature_panel(
    assets: &[(String, Vec<PricePoint>)],
    config: &FeatureConfig,
) -> Result<Vec<(String, Vec<FeatureVector>)>, QuantError> {
    assets
        .par_iter()
        .map(|(name, prices)| {
            compute_features(prices, config).map(|features| (name.clone(), features))
        })
        .collect()
}

/// Extract one field of a multi-valued indicator as a scalar column.
fn component<F>(series: &IndicatorSeries, pick: F) -> Vec<Option<f64>>
where
    F: Fn(&IndicatorValue) -> Option<f64>,
{
    series
        .values
        .iter()
        .map(|p| if p.valid { pick(&p.value) } else { None })
        .collect()
}
