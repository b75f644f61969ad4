//! Hierarchical Risk Parity.
//!
//! 1. distance d_ij = √(0.5 (1 - ρ_ij))
//! 2. single-linkage agglomeration into a flat linkage table
//! 3. quasi-diagonal leaf order from the table
//! 4. top-down bisection, splitting weight by inverse cluster variance
//!
//! Assets are sorted by name first, so the result does not depend on the
//! column order of the panel.

use nalgebra::DMatrix;
use tracing::debug;

use crate::domain::allocation::{cap_weights, AllocationParams, Weights};
use crate::domain::error::QuantError;
use crate::domain::returns::ReturnsPanel;

/// One merge step. Ids below `n` are leaves; merge `k` creates id `n + k`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinkageRow {
    pub left: usize,
    pub right: usize,
    pub distance: f64,
    pub size: usize,
}

pub fn allocate(panel: &ReturnsPanel, params: &AllocationParams) -> Result<Weights, QuantError> {
    let sorted = panel.sorted_by_name();
    let cov = sorted.covariance();
    let n = sorted.n_assets();

    if let Some(i) = (0..n).find(|&i| cov[(i, i)] <= 0.0) {
        return Err(QuantError::invalid(format!(
            "asset '{}' has zero variance",
            sorted.assets()[i]
        )));
    }

    let dist = correlation_distance(&sorted.correlation());
    let linkage = single_linkage(&dist);
    let order = quasi_diagonal_order(&linkage, n);
    let raw = bisection_weights(&order, &cov);
    debug!(?order, "hrp leaf order");

    let capped = cap_weights(&raw, params.max_weight);

    // Back to the caller's column order.
    let by_name: Vec<f64> = panel
        .assets()
        .iter()
        .map(|name| {
            sorted
                .assets()
                .iter()
                .position(|a| a == name)
                .map_or(0.0, |i| capped[i])
        })
        .collect();
    Ok(Weights::from_parts(panel.assets(), by_name))
}

pub fn correlation_distance(corr: &DMatrix<f64>) -> DMatrix<f64> {
    corr.map(|c| (0.5 * (1.0 - c)).max(0.0).sqrt())
}

/// Single-linkage clustering. Ties go to the lowest pair of ids.
pub fn single_linkage(dist: &DMatrix<f64>) -> Vec<LinkageRow> {
    let n = dist.nrows();
    if n < 2 {
        return Vec::new();
    }

    let mut d = dist.clone();
    let mut active = vec![true; n];
    // Cluster id currently stored in each slot.
    let mut node_id: Vec<usize> = (0..n).collect();
    let mut size = vec![1usize; n];
    let mut table = Vec::with_capacity(n - 1);

    for step in 0..(n - 1) {
        let mut best = (f64::INFINITY, 0, 0);
        for i in 0..n {
            if !active[i] {
                continue;
            }
            for j in (i + 1)..n {
                if active[j] && d[(i, j)] < best.0 {
                    best = (d[(i, j)], i, j);
                }
            }
        }
        let (distance, a, b) = best;

        let (left, right) = if node_id[a] < node_id[b] {
            (node_id[a], node_id[b])
        } else {
            (node_id[b], node_id[a])
        };
        table.push(LinkageRow {
            left,
            right,
            distance,
            size: size[a] + size[b],
        });

        node_id[a] = n + step;
        size[a] += size[b];
        active[b] = false;
        for k in 0..n {
            if active[k] && k != a {
                let merged = d[(a, k)].min(d[(b, k)]);
                d[(a, k)] = merged;
                d[(k, a)] = merged;
            }
        }
    }
    table
}

/// Leaf order obtained by repeatedly expanding cluster ids into their
/// children, starting from the root.
pub fn quasi_diagonal_order(linkage: &[LinkageRow], n: usize) -> Vec<usize> {
    let Some(root) = linkage.last() else {
        return (0..n).collect();
    };

    let mut order = vec![root.left, root.right];
    while order.iter().any(|&id| id >= n) {
        let mut expanded = Vec::with_capacity(order.len() + 1);
        for id in order {
            if id >= n {
                let row = &linkage[id - n];
                expanded.push(row.left);
                expanded.push(row.right);
            } else {
                expanded.push(id);
            }
        }
        order = expanded;
    }
    order
}

/// Variance of a cluster held at its inverse-variance weights.
pub fn cluster_variance(indices: &[usize], cov: &DMatrix<f64>) -> f64 {
    let inv: Vec<f64> = indices.iter().map(|&i| 1.0 / cov[(i, i)]).collect();
    let total: f64 = inv.iter().sum();
    let w: Vec<f64> = inv.iter().map(|v| v / total).collect();

    let mut var = 0.0;
    for (a, &i) in indices.iter().enumerate() {
        for (b, &j) in indices.iter().enumerate() {
            var += w[a] * w[b] * cov[(i, j)];
        }
    }
    var
}

/// Top-down bisection over `order` with an explicit work stack.
pub fn bisection_weights(order: &[usize], cov: &DMatrix<f64>) -> Vec<f64> {
    let mut weights = vec![1.0; cov.nrows()];
    let mut stack: Vec<(usize, usize)> = vec![(0, order.len())];

    while let Some((start, end)) = stack.pop() {
        if end - start <= 1 {
            continue;
        }
        let mid = start + (end - start) / 2;
        let left = &order[start..mid];
        let right = &order[mid..end];

        let var_left = cluster_variance(left, cov);
        let var_right = cluster_variance(right, cov);
        let denom = var_left + var_right;
        let alpha = if denom > 0.0 {
            1.0 - var_left / denom
        } else {
            0.5
        };

        for &i in left {
            weights[i] *= alpha;
        }
        for &i in right {
            weights[i] *= 1.0 - alpha;
        }
        stack.push((start, mid));
        stack.push((mid, end));
    }

    let total: f64 = weights.iter().sum();
    weights.iter().map(|w| w / total).collect()
}
