//! Engine configuration: reads every section through a [`ConfigPort`] and
//! validates ranges before anything runs.

use crate::domain::allocation::AllocationParams;
use crate::domain::backtest::BacktestConfig;
use crate::domain::ensemble::WalkForwardConfig;
use crate::domain::error::QuantError;
use crate::domain::features::FeatureConfig;
use crate::domain::indicator::VwapReset;
use crate::domain::metrics::RiskParams;
use crate::ports::config_port::ConfigPort;

pub const DEFAULT_FOLDS: usize = 5;

#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub risk: RiskParams,
    pub backtest: BacktestConfig,
    pub allocation: AllocationParams,
    pub features: FeatureConfig,
    pub walk_forward: WalkForwardConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            risk: RiskParams::default(),
            backtest: BacktestConfig::default(),
            allocation: AllocationParams::default(),
            features: FeatureConfig::default(),
            walk_forward: WalkForwardConfig::new(DEFAULT_FOLDS),
        }
    }
}

impl EngineConfig {
    /// Build from a config source. Missing keys keep their defaults.
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, QuantError> {
        let risk = read_risk(config)?;
        let backtest = read_backtest(config, &risk)?;
        let allocation = read_allocation(config)?;
        let features = read_features(config)?;
        let walk_forward = read_walk_forward(config)?;
        Ok(EngineConfig {
            risk,
            backtest,
            allocation,
            features,
            walk_forward,
        })
    }
}

fn invalid(section: &str, key: &str, reason: impl Into<String>) -> QuantError {
    QuantError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: reason.into(),
    }
}

fn count(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: usize,
    min: usize,
) -> Result<usize, QuantError> {
    let value = config.get_int(section, key, default as i64)?;
    if value < min as i64 {
        return Err(invalid(section, key, format!("{} must be at least {}", key, min)));
    }
    Ok(value as usize)
}

fn count_list(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: &[usize],
) -> Result<Vec<usize>, QuantError> {
    let Some(raw) = config.get_string(section, key) else {
        return Ok(default.to_vec());
    };
    if raw.trim().is_empty() {
        return Ok(default.to_vec());
    }
    raw.split(',')
        .map(|item| match item.trim().parse::<usize>() {
            Ok(v) if v >= 1 => Ok(v),
            _ => Err(invalid(
                section,
                key,
                format!("'{}' is not a positive integer", item.trim()),
            )),
        })
        .collect()
}

fn read_risk(config: &dyn ConfigPort) -> Result<RiskParams, QuantError> {
    let defaults = RiskParams::default();

    let periods_per_year = config.get_double("risk", "periods_per_year", defaults.periods_per_year)?;
    if periods_per_year <= 0.0 {
        return Err(invalid(
            "risk",
            "periods_per_year",
            "periods_per_year must be positive",
        ));
    }

    let risk_free_rate = config.get_double("risk", "risk_free_rate", defaults.risk_free_rate)?;
    if !(0.0..1.0).contains(&risk_free_rate) {
        return Err(invalid(
            "risk",
            "risk_free_rate",
            "risk_free_rate must be between 0 and 1",
        ));
    }

    let confidence = config.get_double("risk", "confidence", defaults.confidence)?;
    if confidence <= 0.0 || confidence >= 1.0 {
        return Err(invalid(
            "risk",
            "confidence",
            "confidence must be strictly between 0 and 1",
        ));
    }

    Ok(RiskParams {
        periods_per_year,
        risk_free_rate,
        confidence,
    })
}

fn read_backtest(config: &dyn ConfigPort, risk: &RiskParams) -> Result<BacktestConfig, QuantError> {
    let defaults = BacktestConfig::default();

    let cost_bps = config.get_double("backtest", "cost_bps", defaults.cost_bps)?;
    if cost_bps < 0.0 {
        return Err(invalid("backtest", "cost_bps", "cost_bps must be non-negative"));
    }

    let threshold = config.get_double("backtest", "threshold", defaults.threshold)?;
    if !(0.0..=1.0).contains(&threshold) {
        return Err(invalid(
            "backtest",
            "threshold",
            "threshold must be between 0 and 1",
        ));
    }

    let min_bars = count(config, "backtest", "min_bars", defaults.min_bars, 2)?;

    Ok(BacktestConfig {
        cost_bps,
        threshold,
        min_bars,
        risk: *risk,
    })
}

fn read_allocation(config: &dyn ConfigPort) -> Result<AllocationParams, QuantError> {
    let defaults = AllocationParams::default();

    let max_weight = config.get_double("allocation", "max_weight", defaults.max_weight)?;
    if max_weight <= 0.0 || max_weight > 1.0 {
        return Err(invalid(
            "allocation",
            "max_weight",
            "max_weight must be in (0, 1]",
        ));
    }

    let target_return = config.get_optional_double("allocation", "target_return")?;

    let kelly_safety = config.get_double("allocation", "kelly_safety", defaults.kelly_safety)?;
    if kelly_safety <= 0.0 || kelly_safety > 1.0 {
        return Err(invalid(
            "allocation",
            "kelly_safety",
            "kelly_safety must be in (0, 1]",
        ));
    }

    let max_iterations = count(
        config,
        "allocation",
        "max_iterations",
        defaults.max_iterations as usize,
        1,
    )? as u64;

    Ok(AllocationParams {
        max_weight,
        target_return,
        kelly_safety,
        max_iterations,
    })
}

fn read_features(config: &dyn ConfigPort) -> Result<FeatureConfig, QuantError> {
    let d = FeatureConfig::default();
    let s = "features";

    let vwap_reset = match config.get_string(s, "vwap_reset") {
        None => d.vwap_reset,
        Some(v) => match v.trim().to_lowercase().as_str() {
            "" | "never" => VwapReset::Never,
            "daily" => VwapReset::Daily,
            other => {
                return Err(invalid(
                    s,
                    "vwap_reset",
                    format!("'{}' is not one of never, daily", other),
                ))
            }
        },
    };

    let macd_fast = count(config, s, "macd_fast", d.macd_fast, 1)?;
    let macd_slow = count(config, s, "macd_slow", d.macd_slow, 1)?;
    if macd_fast >= macd_slow {
        return Err(invalid(
            s,
            "macd_fast",
            "macd_fast must be shorter than macd_slow",
        ));
    }

    let bb_mult = config.get_double(s, "bb_stddev_mult", d.bb_stddev_mult_x100 as f64 / 100.0)?;
    if bb_mult <= 0.0 {
        return Err(invalid(s, "bb_stddev_mult", "bb_stddev_mult must be positive"));
    }

    Ok(FeatureConfig {
        rsi_period: count(config, s, "rsi_period", d.rsi_period, 1)?,
        atr_period: count(config, s, "atr_period", d.atr_period, 1)?,
        vwap_reset,
        stoch_k: count(config, s, "stoch_k", d.stoch_k, 1)?,
        stoch_d: count(config, s, "stoch_d", d.stoch_d, 1)?,
        macd_fast,
        macd_slow,
        macd_signal: count(config, s, "macd_signal", d.macd_signal, 1)?,
        bb_period: count(config, s, "bb_period", d.bb_period, 1)?,
        bb_stddev_mult_x100: (bb_mult * 100.0).round() as u32,
        return_horizons: count_list(config, s, "return_horizons", &d.return_horizons)?,
        vol_windows: count_list(config, s, "vol_windows", &d.vol_windows)?,
        ma_periods: count_list(config, s, "ma_periods", &d.ma_periods)?,
    })
}

fn read_walk_forward(config: &dyn ConfigPort) -> Result<WalkForwardConfig, QuantError> {
    Ok(WalkForwardConfig {
        n_folds: count(config, "walk_forward", "n_folds", DEFAULT_FOLDS, 1)?,
        embargo: count(config, "walk_forward", "embargo", 0, 0)?,
        min_train: count(config, "walk_forward", "min_train", 1, 1)?,
    })
}
