//! Portfolio weight allocation over an aligned returns panel.
//!
//! Every method produces long-only weights that sum to one and respect the
//! per-asset cap in [`AllocationParams::max_weight`].

pub mod hrp;
pub mod kelly;
pub mod mean_variance;
pub mod risk_parity;

use std::fmt;
use std::str::FromStr;

use rayon::prelude::*;
use tracing::debug;

use crate::domain::error::QuantError;
use crate::domain::returns::ReturnsPanel;

pub const DEFAULT_MAX_WEIGHT: f64 = 0.4;
pub const DEFAULT_MAX_ITERATIONS: u64 = 20_000;

/// Slack allowed when checking sums and caps.
pub(crate) const WEIGHT_TOLERANCE: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum AllocationMethod {
    MeanVariance,
    RiskParity,
    Hrp,
    Kelly,
}

impl AllocationMethod {
    pub const ALL: [AllocationMethod; 4] = [
        AllocationMethod::MeanVariance,
        AllocationMethod::RiskParity,
        AllocationMethod::Hrp,
        AllocationMethod::Kelly,
    ];
}

impl fmt::Display for AllocationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AllocationMethod::MeanVariance => "mean-variance",
            AllocationMethod::RiskParity => "risk-parity",
            AllocationMethod::Hrp => "hrp",
            AllocationMethod::Kelly => "kelly",
        };
        write!(f, "{}", name)
    }
}

impl FromStr for AllocationMethod {
    type Err = QuantError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mean-variance" | "mv" => Ok(AllocationMethod::MeanVariance),
            "risk-parity" | "rp" => Ok(AllocationMethod::RiskParity),
            "hrp" => Ok(AllocationMethod::Hrp),
            "kelly" => Ok(AllocationMethod::Kelly),
            other => Err(QuantError::invalid(format!(
                "unknown allocation method '{}'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AllocationParams {
    pub max_weight: f64,
    /// Minimum expected per-period return for mean-variance.
    pub target_return: Option<f64>,
    pub kelly_safety: f64,
    pub max_iterations: u64,
}

impl Default for AllocationParams {
    fn default() -> Self {
        AllocationParams {
            max_weight: DEFAULT_MAX_WEIGHT,
            target_return: None,
            kelly_safety: kelly::DEFAULT_SAFETY,
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }
}

/// Asset weights in panel order.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Weights {
    entries: Vec<(String, f64)>,
}

impl Weights {
    pub(crate) fn from_parts(assets: &[String], values: Vec<f64>) -> Self {
        Weights {
            entries: assets.iter().cloned().zip(values).collect(),
        }
    }

    pub fn get(&self, asset: &str) -> Option<f64> {
        self.entries
            .iter()
            .find(|(name, _)| name == asset)
            .map(|(_, w)| *w)
    }

    pub fn sum(&self) -> f64 {
        self.entries.iter().map(|(_, w)| w).sum()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.entries.iter().map(|(name, w)| (name.as_str(), *w))
    }

    pub fn values(&self) -> Vec<f64> {
        self.entries.iter().map(|(_, w)| *w).collect()
    }
}

/// Allocate weights with one method.
pub fn allocate(
    panel: &ReturnsPanel,
    method: AllocationMethod,
    params: &AllocationParams,
) -> Result<Weights, QuantError> {
    check_preconditions(panel, params)?;
    debug!(
        %method,
        assets = panel.n_assets(),
        periods = panel.n_periods(),
        "allocating"
    );

    let weights = match method {
        AllocationMethod::MeanVariance => mean_variance::allocate(panel, params)?,
        AllocationMethod::RiskParity => risk_parity::allocate(panel, params)?,
        AllocationMethod::Hrp => hrp::allocate(panel, params)?,
        AllocationMethod::Kelly => kelly::allocate(panel, params)?,
    };
    Ok(weights)
}

/// Run several methods over the same panel in parallel.
///
/// Results come back in the order of `methods`; one failing method does not
/// affect the others.
pub fn allocate_all(
    panel: &ReturnsPanel,
    methods: &[AllocationMethod],
    params: &AllocationParams,
) -> Vec<(AllocationMethod, Result<Weights, QuantError>)> {
    methods
        .par_iter()
        .map(|&method| (method, allocate(panel, method, params)))
        .collect()
}

/// Per-period portfolio return `Σ w_i r_i[t]`, matching weights to panel
/// columns by asset name.
pub fn blend_returns(panel: &ReturnsPanel, weights: &Weights) -> Result<Vec<f64>, QuantError> {
    let mut blended = vec![0.0; panel.n_periods()];
    for (asset, w) in weights.iter() {
        let idx = panel
            .assets()
            .iter()
            .position(|a| a == asset)
            .ok_or_else(|| QuantError::invalid(format!("no returns for asset '{}'", asset)))?;
        for (b, r) in blended.iter_mut().zip(&panel.columns()[idx]) {
            *b += w * r;
        }
    }
    Ok(blended)
}

fn check_preconditions(panel: &ReturnsPanel, params: &AllocationParams) -> Result<(), QuantError> {
    let n = panel.n_assets();
    if n < 2 {
        return Err(QuantError::insufficient("allocation assets", n, 2));
    }
    if panel.n_periods() < 2 {
        return Err(QuantError::insufficient(
            "allocation periods",
            panel.n_periods(),
            2,
        ));
    }
    if !(params.max_weight > 0.0 && params.max_weight <= 1.0) {
        return Err(QuantError::invalid(format!(
            "max_weight must be in (0, 1], got {}",
            params.max_weight
        )));
    }
    if (n as f64) * params.max_weight < 1.0 - WEIGHT_TOLERANCE {
        return Err(QuantError::infeasible(format!(
            "{} assets capped at {} cannot sum to 1",
            n, params.max_weight
        )));
    }
    Ok(())
}

/// Euclidean projection onto `{w : Σw = 1, lower <= w_i <= upper}`.
///
/// Finds the shift τ with `Σ clamp(v_i - τ, lower, upper) = 1` by bisection.
/// Callers guarantee `n * lower <= 1 <= n * upper`.
pub(crate) fn project_capped_simplex(v: &[f64], lower: f64, upper: f64) -> Vec<f64> {
    let total = |tau: f64| -> f64 { v.iter().map(|x| (x - tau).clamp(lower, upper)).sum() };

    let max_v = v.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let min_v = v.iter().copied().fold(f64::INFINITY, f64::min);
    // total(lo) = n * upper >= 1, total(hi) = n * lower <= 1
    let mut lo = min_v - upper;
    let mut hi = max_v - lower;

    for _ in 0..200 {
        let mid = 0.5 * (lo + hi);
        if total(mid) > 1.0 {
            lo = mid;
        } else {
            hi = mid;
        }
        if hi - lo < 1e-15 {
            break;
        }
    }

    let tau = 0.5 * (lo + hi);
    v.iter().map(|x| (x - tau).clamp(lower, upper)).collect()
}

/// Normalize non-negative raw weights and redistribute any excess above
/// `max_weight` proportionally over the uncapped assets until none exceed it.
pub(crate) fn cap_weights(raw: &[f64], max_weight: f64) -> Vec<f64> {
    let total: f64 = raw.iter().map(|w| w.max(0.0)).sum();
    let n = raw.len();
    let mut w: Vec<f64> = if total > 0.0 {
        raw.iter().map(|x| x.max(0.0) / total).collect()
    } else {
        vec![1.0 / n as f64; n]
    };
    let mut capped = vec![false; n];

    for _ in 0..n {
        let mut excess = 0.0;
        for i in 0..n {
            if !capped[i] && w[i] > max_weight {
                excess += w[i] - max_weight;
                w[i] = max_weight;
                capped[i] = true;
            }
        }
        if excess <= 0.0 {
            break;
        }

        let free: Vec<usize> = (0..n).filter(|&i| !capped[i]).collect();
        if free.is_empty() {
            break;
        }
        let free_total: f64 = free.iter().map(|&i| w[i]).sum();
        for &i in &free {
            let share = if free_total > 0.0 {
                w[i] / free_total
            } else {
                1.0 / free.len() as f64
            };
            w[i] += excess * share;
        }
    }
    w
}
