//! Fractional Kelly sizing.
//!
//! Kelly % = (b·p - q) / b
//! where:
//! - b = |avg_win / avg_loss| (payoff ratio)
//! - p = probability of a winning period
//! - q = 1 - p

use tracing::debug;

use crate::domain::allocation::{cap_weights, AllocationParams, Weights};
use crate::domain::error::QuantError;
use crate::domain::returns::ReturnsPanel;

pub const DEFAULT_SAFETY: f64 = 0.25;

/// Safety-scaled Kelly fraction clamped to [0, 1].
///
/// Returns 0.0 when the edge cannot be estimated: no average loss, a
/// non-positive average win, or out-of-range inputs.
pub fn kelly_fraction(win_probability: f64, avg_win: f64, avg_loss: f64, safety: f64) -> f64 {
    let inputs_ok = [win_probability, avg_win, avg_loss, safety]
        .iter()
        .all(|v| v.is_finite());
    if !inputs_ok || !(0.0..=1.0).contains(&win_probability) {
        return 0.0;
    }
    if avg_loss == 0.0 || avg_win <= 0.0 {
        return 0.0;
    }

    let b = (avg_win / avg_loss).abs();
    let p = win_probability;
    let q = 1.0 - p;
    let kelly = (b * p - q) / b;

    (kelly * safety).clamp(0.0, 1.0)
}

/// Win probability, average win and average absolute loss of a return
/// series. Zero returns are ignored.
pub fn edge_estimate(returns: &[f64]) -> (f64, f64, f64) {
    let wins: Vec<f64> = returns.iter().copied().filter(|r| *r > 0.0).collect();
    let losses: Vec<f64> = returns.iter().copied().filter(|r| *r < 0.0).collect();
    let decided = wins.len() + losses.len();
    if decided == 0 {
        return (0.0, 0.0, 0.0);
    }

    let p = wins.len() as f64 / decided as f64;
    let avg_win = if wins.is_empty() {
        0.0
    } else {
        wins.iter().sum::<f64>() / wins.len() as f64
    };
    let avg_loss = if losses.is_empty() {
        0.0
    } else {
        losses.iter().map(|l| l.abs()).sum::<f64>() / losses.len() as f64
    };
    (p, avg_win, avg_loss)
}

pub fn allocate(panel: &ReturnsPanel, params: &AllocationParams) -> Result<Weights, QuantError> {
    let fractions: Vec<f64> = panel
        .columns()
        .iter()
        .map(|col| {
            let (p, win, loss) = edge_estimate(col);
            kelly_fraction(p, win, loss, params.kelly_safety)
        })
        .collect();
    debug!(?fractions, "kelly fractions");

    if fractions.iter().all(|f| *f <= 0.0) {
        return Err(QuantError::infeasible(
            "no asset has a positive Kelly edge",
        ));
    }

    let weights = cap_weights(&fractions, params.max_weight);
    Ok(Weights::from_parts(panel.assets(), weights))
}
