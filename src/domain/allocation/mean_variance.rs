//! Minimum-variance allocation with an optional return floor.
//!
//! minimize wᵀΣw  s.t.  Σw = 1, 0 <= w_i <= max_weight, μᵀw >= target
//!
//! Solved by projected gradient descent with step 1/L, L = 2·λmax(Σ). The
//! feasible set is the capped simplex intersected with the return
//! half-space; projection onto it uses Dykstra's alternating projections.

use nalgebra::{DMatrix, DVector};
use tracing::debug;

use crate::domain::allocation::{
    project_capped_simplex, AllocationParams, Weights, WEIGHT_TOLERANCE,
};
use crate::domain::error::QuantError;
use crate::domain::returns::ReturnsPanel;

const STEP_TOLERANCE: f64 = 1e-10;
const DYKSTRA_MAX_ITERS: usize = 500;
const DYKSTRA_TOLERANCE: f64 = 1e-13;

pub fn allocate(panel: &ReturnsPanel, params: &AllocationParams) -> Result<Weights, QuantError> {
    let cov = panel.covariance();
    let mu = panel.means();
    let weights = minimize_variance(&cov, &mu, params)?;
    Ok(Weights::from_parts(panel.assets(), weights))
}

/// Highest `μᵀw` reachable under the caps: fill the best assets first.
pub fn max_attainable_return(mu: &[f64], max_weight: f64) -> f64 {
    let mut sorted = mu.to_vec();
    sorted.sort_by(|a, b| b.total_cmp(a));

    let mut remaining = 1.0_f64;
    let mut total = 0.0;
    for m in sorted {
        if remaining <= 0.0 {
            break;
        }
        let w = remaining.min(max_weight);
        total += w * m;
        remaining -= w;
    }
    total
}

fn minimize_variance(
    cov: &DMatrix<f64>,
    mu: &DVector<f64>,
    params: &AllocationParams,
) -> Result<Vec<f64>, QuantError> {
    let n = cov.nrows();
    let mu_vec: Vec<f64> = mu.iter().copied().collect();

    if let Some(target) = params.target_return {
        let best = max_attainable_return(&mu_vec, params.max_weight);
        if best < target - WEIGHT_TOLERANCE {
            return Err(QuantError::infeasible(format!(
                "target return {} exceeds the attainable maximum {} under a {} cap",
                target, best, params.max_weight
            )));
        }
    }

    let feasible = FeasibleSet {
        mu: mu_vec,
        max_weight: params.max_weight,
        target: params.target_return,
    };

    let lipschitz = 2.0 * cov.clone().symmetric_eigen().eigenvalues.max();
    let mut w = feasible.project(&vec![1.0 / n as f64; n]);

    if lipschitz <= 0.0 {
        debug!("zero covariance, every feasible point is optimal");
        return Ok(w);
    }
    let step = 1.0 / lipschitz;

    for iter in 0..params.max_iterations {
        let w_vec = DVector::from_column_slice(&w);
        let grad = cov * &w_vec * 2.0;
        let trial: Vec<f64> = w
            .iter()
            .zip(grad.iter())
            .map(|(wi, gi)| wi - step * gi)
            .collect();
        let next = feasible.project(&trial);

        let change = next
            .iter()
            .zip(&w)
            .map(|(a, b)| (a - b).abs())
            .fold(0.0, f64::max);
        w = next;

        if change < STEP_TOLERANCE {
            debug!(iterations = iter + 1, "mean-variance converged");
            return Ok(w);
        }
    }

    Err(QuantError::NonConvergence {
        solver: "mean-variance".into(),
        iterations: params.max_iterations,
    })
}

struct FeasibleSet {
    mu: Vec<f64>,
    max_weight: f64,
    target: Option<f64>,
}

impl FeasibleSet {
    fn project(&self, v: &[f64]) -> Vec<f64> {
        match self.target {
            None => project_capped_simplex(v, 0.0, self.max_weight),
            Some(target) => self.dykstra(v, target),
        }
    }

    fn project_half_space(&self, v: &[f64], target: f64) -> Vec<f64> {
        let dot: f64 = v.iter().zip(&self.mu).map(|(a, b)| a * b).sum();
        let norm_sq: f64 = self.mu.iter().map(|m| m * m).sum();
        if dot >= target || norm_sq == 0.0 {
            return v.to_vec();
        }
        let scale = (target - dot) / norm_sq;
        v.iter().zip(&self.mu).map(|(a, m)| a + scale * m).collect()
    }

    /// Dykstra's alternating projections; the returned point lies in the
    /// capped simplex.
    fn dykstra(&self, v: &[f64], target: f64) -> Vec<f64> {
        let n = v.len();
        let mut x = v.to_vec();
        let mut p = vec![0.0; n];
        let mut q = vec![0.0; n];
        let mut y = project_capped_simplex(&x, 0.0, self.max_weight);

        for _ in 0..DYKSTRA_MAX_ITERS {
            let shifted: Vec<f64> = x.iter().zip(&p).map(|(a, b)| a + b).collect();
            let y_next = project_capped_simplex(&shifted, 0.0, self.max_weight);
            for i in 0..n {
                p[i] = shifted[i] - y_next[i];
            }

            let shifted: Vec<f64> = y_next.iter().zip(&q).map(|(a, b)| a + b).collect();
            let x_next = self.project_half_space(&shifted, target);
            for i in 0..n {
                q[i] = shifted[i] - x_next[i];
            }

            let change = x_next
                .iter()
                .zip(&x)
                .chain(y_next.iter().zip(&y))
                .map(|(a, b)| (a - b).abs())
                .fold(0.0, f64::max);
            x = x_next;
            y = y_next;
            if change < DYKSTRA_TOLERANCE {
                break;
            }
        }
        y
    }
}
