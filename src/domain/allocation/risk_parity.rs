//! Equal-risk-contribution allocation.
//!
//! Risk contribution of asset i: RC_i = w_i (Σw)_i / √(wᵀΣw). The solver
//! minimizes Σ (RC_i / ΣRC - 1/n)² with Nelder–Mead over an unconstrained
//! parameter vector that is mapped into the feasible set
//! `{Σw = 1, MIN_WEIGHT <= w_i <= min(MAX_WEIGHT, max_weight)}` by
//! projection, so every simplex vertex is a valid portfolio.

use argmin::core::{CostFunction, Executor, State, TerminationReason, TerminationStatus};
use argmin::solver::neldermead::NelderMead;
use nalgebra::{DMatrix, DVector};
use tracing::debug;

use crate::domain::allocation::{project_capped_simplex, AllocationParams, Weights};
use crate::domain::error::QuantError;
use crate::domain::returns::ReturnsPanel;

pub const MIN_WEIGHT: f64 = 0.01;
pub const MAX_WEIGHT: f64 = 0.5;

const SD_TOLERANCE: f64 = 1e-14;
const INITIAL_STEP: f64 = 0.05;

struct RiskParityCost {
    cov: DMatrix<f64>,
    lower: f64,
    upper: f64,
}

impl RiskParityCost {
    fn weights(&self, x: &[f64]) -> Vec<f64> {
        project_capped_simplex(x, self.lower, self.upper)
    }
}

impl CostFunction for RiskParityCost {
    type Param = Vec<f64>;
    type Output = f64;

    fn cost(&self, x: &Self::Param) -> Result<Self::Output, argmin::core::Error> {
        let w = self.weights(x);
        Ok(contribution_dispersion(&self.cov, &w))
    }
}

/// Σ (RC_i / ΣRC - 1/n)²; zero at equal risk contribution.
pub fn contribution_dispersion(cov: &DMatrix<f64>, w: &[f64]) -> f64 {
    let rc = relative_contributions(cov, w);
    let target = 1.0 / w.len() as f64;
    rc.iter().map(|c| (c - target).powi(2)).sum()
}

/// Each asset's share of total portfolio variance.
pub fn relative_contributions(cov: &DMatrix<f64>, w: &[f64]) -> Vec<f64> {
    let w_vec = DVector::from_column_slice(w);
    let sigma_w = cov * &w_vec;
    let variance = w_vec.dot(&sigma_w);
    if variance <= 0.0 {
        return vec![1.0 / w.len() as f64; w.len()];
    }
    w.iter()
        .zip(sigma_w.iter())
        .map(|(wi, si)| wi * si / variance)
        .collect()
}

pub fn allocate(panel: &ReturnsPanel, params: &AllocationParams) -> Result<Weights, QuantError> {
    let n = panel.n_assets();
    let lower = MIN_WEIGHT;
    let upper = MAX_WEIGHT.min(params.max_weight);
    if (n as f64) * upper < 1.0 || (n as f64) * lower > 1.0 {
        return Err(QuantError::infeasible(format!(
            "risk parity bounds [{}, {}] cannot hold {} assets",
            lower, upper, n
        )));
    }

    let cov = panel.covariance();
    if let Some(i) = (0..n).find(|&i| cov[(i, i)] <= 0.0) {
        return Err(QuantError::invalid(format!(
            "asset '{}' has zero variance",
            panel.assets()[i]
        )));
    }

    // Start from inverse-volatility weights.
    let inv_vol: Vec<f64> = (0..n).map(|i| 1.0 / cov[(i, i)].sqrt()).collect();
    let total: f64 = inv_vol.iter().sum();
    let x0: Vec<f64> = project_capped_simplex(
        &inv_vol.iter().map(|v| v / total).collect::<Vec<_>>(),
        lower,
        upper,
    );

    let mut simplex = Vec::with_capacity(n + 1);
    simplex.push(x0.clone());
    for i in 0..n {
        let mut point = x0.clone();
        point[i] += INITIAL_STEP;
        simplex.push(point);
    }

    let cost = RiskParityCost { cov, lower, upper };
    let setup_err =
        |e: argmin::core::Error| QuantError::invalid(format!("risk parity solver: {}", e));

    let solver = NelderMead::new(simplex)
        .with_sd_tolerance(SD_TOLERANCE)
        .map_err(setup_err)?;
    let res = Executor::new(cost, solver)
        .configure(|state| state.max_iters(params.max_iterations))
        .run()
        .map_err(setup_err)?;

    let iterations = res.state.get_iter();
    if matches!(
        res.state.get_termination_status(),
        TerminationStatus::Terminated(TerminationReason::MaxItersReached)
    ) {
        return Err(QuantError::NonConvergence {
            solver: "risk parity".into(),
            iterations,
        });
    }

    let best = res.state.get_best_param().cloned().unwrap_or(x0);
    let weights = project_capped_simplex(&best, lower, upper);
    debug!(
        iterations,
        dispersion = res.state.get_best_cost(),
        "risk parity converged"
    );
    Ok(Weights::from_parts(panel.assets(), weights))
}
