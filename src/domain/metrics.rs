//! Risk and performance statistics over a periodic return series.
//!
//! Every function returns `None` for series of length <= 1 or containing
//! non-finite values. Degenerate denominators map to documented sentinels
//! so no metric ever yields NaN or infinity.

use crate::domain::error::QuantError;

pub const DEFAULT_PERIODS_PER_YEAR: f64 = 252.0;
pub const DEFAULT_CONFIDENCE: f64 = 0.95;

/// Stand-in magnitude for Sortino and Calmar when their risk denominator
/// is zero. Carries the sign of the numerator.
pub const RATIO_SENTINEL: f64 = 1_000.0;

/// Compounded wealth path starting at 1.0, one point longer than the
/// returns that produced it.
pub type EquityCurve = Vec<f64>;

#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RiskParams {
    pub periods_per_year: f64,
    /// Annual risk-free rate, de-annualized as `rf / periods_per_year`.
    pub risk_free_rate: f64,
    pub confidence: f64,
}

impl Default for RiskParams {
    fn default() -> Self {
        RiskParams {
            periods_per_year: DEFAULT_PERIODS_PER_YEAR,
            risk_free_rate: 0.0,
            confidence: DEFAULT_CONFIDENCE,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RiskReport {
    pub observations: usize,
    pub var_95: Option<f64>,
    pub cvar_95: Option<f64>,
    pub sharpe: Option<f64>,
    pub sortino: Option<f64>,
    pub calmar: Option<f64>,
    pub max_drawdown: Option<f64>,
    pub win_rate: Option<f64>,
}

impl RiskReport {
    /// Bundle the standard metrics for one return series.
    ///
    /// VaR and CVaR are evaluated at `params.confidence`.
    pub fn compute(returns: &[f64], params: &RiskParams) -> Result<Self, QuantError> {
        if let Some(i) = returns.iter().position(|r| !r.is_finite()) {
            return Err(QuantError::invalid(format!(
                "non-finite return at index {}",
                i
            )));
        }

        Ok(RiskReport {
            observations: returns.len(),
            var_95: value_at_risk(returns, params.confidence),
            cvar_95: conditional_value_at_risk(returns, params.confidence),
            sharpe: sharpe_ratio(returns, params),
            sortino: sortino_ratio(returns, params),
            calmar: calmar_ratio(returns, params.periods_per_year),
            max_drawdown: usable(returns).and_then(|r| max_drawdown(&equity_curve(r))),
            win_rate: win_rate(returns),
        })
    }
}

fn usable(returns: &[f64]) -> Option<&[f64]> {
    if returns.len() <= 1 || returns.iter().any(|r| !r.is_finite()) {
        None
    } else {
        Some(returns)
    }
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample standard deviation (N-1). Callers guarantee `len >= 2`.
///
/// Deviations at rounding-noise level relative to the mean are reported as
/// exactly 0.0, so a constant series never divides by ~1e-17.
fn sample_std(values: &[f64]) -> f64 {
    let m = mean(values);
    let var = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    let sd = var.sqrt();
    if sd <= f64::EPSILON * m.abs().max(1.0) {
        0.0
    } else {
        sd
    }
}

fn sentinel(numerator: f64) -> f64 {
    if numerator > 0.0 {
        RATIO_SENTINEL
    } else if numerator < 0.0 {
        -RATIO_SENTINEL
    } else {
        0.0
    }
}

fn bounded_ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator > 0.0 {
        let ratio = numerator / denominator;
        if ratio.is_finite() {
            return ratio;
        }
    }
    sentinel(numerator)
}

pub fn equity_curve(returns: &[f64]) -> EquityCurve {
    let mut curve = Vec::with_capacity(returns.len() + 1);
    let mut equity = 1.0;
    curve.push(equity);
    for r in returns {
        equity *= 1.0 + r;
        curve.push(equity);
    }
    curve
}

/// Fractional distance below the running peak at every point (all <= 0).
pub fn drawdown_series(equity: &[f64]) -> Vec<f64> {
    let mut peak = f64::NEG_INFINITY;
    equity
        .iter()
        .map(|&e| {
            if e > peak {
                peak = e;
            }
            if peak > 0.0 { (e - peak) / peak } else { 0.0 }
        })
        .collect()
}

/// Deepest drawdown of an equity curve, as a non-positive fraction.
pub fn max_drawdown(equity: &[f64]) -> Option<f64> {
    usable(equity)?;
    Some(drawdown_series(equity).into_iter().fold(0.0, f64::min))
}

/// Empirical `(1 - confidence)` quantile with linear interpolation between
/// order statistics. Reported as a return, so losses are negative.
pub fn value_at_risk(returns: &[f64], confidence: f64) -> Option<f64> {
    let returns = usable(returns)?;
    if !(confidence > 0.0 && confidence < 1.0) {
        return None;
    }

    let mut sorted = returns.to_vec();
    sorted.sort_by(f64::total_cmp);

    let h = (sorted.len() - 1) as f64 * (1.0 - confidence);
    let lo = h.floor() as usize;
    let hi = h.ceil() as usize;
    Some(sorted[lo] + (h - lo as f64) * (sorted[hi] - sorted[lo]))
}

/// Mean of all returns at or below the VaR quantile.
pub fn conditional_value_at_risk(returns: &[f64], confidence: f64) -> Option<f64> {
    let var = value_at_risk(returns, confidence)?;
    let tail: Vec<f64> = returns.iter().copied().filter(|r| *r <= var).collect();
    if tail.is_empty() {
        return Some(var);
    }
    Some(mean(&tail))
}

/// √ppy × mean(r - rf/ppy) / std(r). Zero dispersion, including a constant
/// series, yields 0.0.
pub fn sharpe_ratio(returns: &[f64], params: &RiskParams) -> Option<f64> {
    let returns = usable(returns)?;
    let excess = mean(returns) - params.risk_free_rate / params.periods_per_year;
    let std = sample_std(returns);
    if std > 0.0 {
        Some(params.periods_per_year.sqrt() * excess / std)
    } else {
        Some(0.0)
    }
}

/// Like Sharpe, with the sample deviation of the negative returns as the
/// denominator.
pub fn sortino_ratio(returns: &[f64], params: &RiskParams) -> Option<f64> {
    let returns = usable(returns)?;
    let excess = mean(returns) - params.risk_free_rate / params.periods_per_year;

    let downside: Vec<f64> = returns.iter().copied().filter(|r| *r < 0.0).collect();
    let downside_std = if downside.len() >= 2 {
        sample_std(&downside)
    } else {
        0.0
    };

    Some(bounded_ratio(
        params.periods_per_year.sqrt() * excess,
        downside_std,
    ))
}

/// Compound annual growth rate of the series: final^(ppy/N) - 1.
pub fn cagr(returns: &[f64], periods_per_year: f64) -> Option<f64> {
    let returns = usable(returns)?;
    let final_equity = returns.iter().fold(1.0, |e, r| e * (1.0 + r));
    if final_equity <= 0.0 {
        return Some(-1.0);
    }
    let growth = final_equity.powf(periods_per_year / returns.len() as f64) - 1.0;
    Some(if growth.is_finite() { growth } else { RATIO_SENTINEL })
}

/// CAGR / |max drawdown|.
pub fn calmar_ratio(returns: &[f64], periods_per_year: f64) -> Option<f64> {
    let growth = cagr(returns, periods_per_year)?;
    let mdd = max_drawdown(&equity_curve(returns))?;
    Some(bounded_ratio(growth, mdd.abs()))
}

/// Share of non-zero returns that are positive; 0.0 when all are zero.
pub fn win_rate(returns: &[f64]) -> Option<f64> {
    let returns = usable(returns)?;
    let wins = returns.iter().filter(|r| **r > 0.0).count();
    let decided = returns.iter().filter(|r| **r != 0.0).count();
    if decided == 0 {
        Some(0.0)
    } else {
        Some(wins as f64 / decided as f64)
    }
}

/// Sample standard deviation scaled by √ppy.
pub fn annualized_volatility(returns: &[f64], periods_per_year: f64) -> Option<f64> {
    let returns = usable(returns)?;
    Some(sample_std(returns) * periods_per_year.sqrt())
}

/// Trailing-window annualized volatility, aligned with the input.
pub fn rolling_volatility(
    returns: &[f64],
    window: usize,
    periods_per_year: f64,
) -> Vec<Option<f64>> {
    rolling(returns, window, |w| annualized_volatility(w, periods_per_year))
}

/// Trailing-window Sharpe ratio, aligned with the input.
pub fn rolling_sharpe(returns: &[f64], window: usize, params: &RiskParams) -> Vec<Option<f64>> {
    rolling(returns, window, |w| sharpe_ratio(w, params))
}

fn rolling<F>(returns: &[f64], window: usize, stat: F) -> Vec<Option<f64>>
where
    F: Fn(&[f64]) -> Option<f64>,
{
    (0..returns.len())
        .map(|i| {
            if window < 2 || i + 1 < window {
                None
            } else {
                stat(&returns[i + 1 - window..=i])
            }
        })
        .collect()
}
