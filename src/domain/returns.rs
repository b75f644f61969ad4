//! Return derivation and the multi-asset returns panel.

use std::collections::{BTreeSet, HashMap, HashSet};

use chrono::NaiveDateTime;
use nalgebra::{DMatrix, DVector};

use crate::domain::error::QuantError;
use crate::domain::ohlcv::PricePoint;

/// Simple returns `c[t] / c[t-1] - 1`; one fewer element than `closes`.
pub fn simple_returns(closes: &[f64]) -> Result<Vec<f64>, QuantError> {
    closes
        .windows(2)
        .enumerate()
        .map(|(i, w)| {
            if w[0] == 0.0 || !w[0].is_finite() || !w[1].is_finite() {
                Err(QuantError::invalid(format!(
                    "cannot compute return at index {} from {} -> {}",
                    i + 1,
                    w[0],
                    w[1]
                )))
            } else {
                Ok(w[1] / w[0] - 1.0)
            }
        })
        .collect()
}

/// Bar-aligned returns: `r[t]` is realized over bar t (close[t-1] -> close[t]).
///
/// Same length as `prices`; `r[0]` is 0.0 since no prior close exists.
pub fn bar_returns(prices: &[PricePoint]) -> Result<Vec<f64>, QuantError> {
    if prices.is_empty() {
        return Ok(Vec::new());
    }
    let closes: Vec<f64> = prices.iter().map(|p| p.close).collect();
    let mut out = Vec::with_capacity(prices.len());
    out.push(0.0);
    out.extend(simple_returns(&closes)?);
    Ok(out)
}

/// Aligned per-asset return columns sharing one time axis.
#[derive(Debug, Clone, PartialEq)]
pub struct ReturnsPanel {
    assets: Vec<String>,
    columns: Vec<Vec<f64>>,
}

impl ReturnsPanel {
    /// Build a panel, rejecting ragged columns, duplicate names and
    /// non-finite values.
    pub fn new(assets: Vec<String>, columns: Vec<Vec<f64>>) -> Result<Self, QuantError> {
        if assets.len() != columns.len() {
            return Err(QuantError::invalid(format!(
                "{} asset names for {} return columns",
                assets.len(),
                columns.len()
            )));
        }

        let mut seen = HashSet::new();
        for name in &assets {
            if !seen.insert(name.as_str()) {
                return Err(QuantError::invalid(format!("duplicate asset '{}'", name)));
            }
        }

        if let Some(first) = columns.first() {
            let len = first.len();
            for (name, col) in assets.iter().zip(&columns) {
                if col.len() != len {
                    return Err(QuantError::invalid(format!(
                        "series '{}' has {} periods, expected {}",
                        name,
                        col.len(),
                        len
                    )));
                }
                if let Some(t) = col.iter().position(|v| !v.is_finite()) {
                    return Err(QuantError::invalid(format!(
                        "non-finite return for '{}' at period {}",
                        name, t
                    )));
                }
            }
        }

        Ok(ReturnsPanel { assets, columns })
    }

    pub fn assets(&self) -> &[String] {
        &self.assets
    }

    pub fn columns(&self) -> &[Vec<f64>] {
        &self.columns
    }

    pub fn n_assets(&self) -> usize {
        self.assets.len()
    }

    pub fn n_periods(&self) -> usize {
        self.columns.first().map_or(0, Vec::len)
    }

    /// Copy of the panel with columns sorted by asset name.
    pub fn sorted_by_name(&self) -> ReturnsPanel {
        let mut order: Vec<usize> = (0..self.n_assets()).collect();
        order.sort_by(|&a, &b| self.assets[a].cmp(&self.assets[b]));
        ReturnsPanel {
            assets: order.iter().map(|&i| self.assets[i].clone()).collect(),
            columns: order.iter().map(|&i| self.columns[i].clone()).collect(),
        }
    }

    /// Per-asset arithmetic mean return.
    pub fn means(&self) -> DVector<f64> {
        DVector::from_iterator(
            self.n_assets(),
            self.columns
                .iter()
                .map(|c| c.iter().sum::<f64>() / c.len().max(1) as f64),
        )
    }

    /// Sample covariance matrix (N-1 denominator).
    pub fn covariance(&self) -> DMatrix<f64> {
        let n = self.n_assets();
        let t = self.n_periods();
        let means = self.means();
        let denom = (t.saturating_sub(1)).max(1) as f64;

        let mut cov = DMatrix::zeros(n, n);
        for i in 0..n {
            for j in i..n {
                let c = self.columns[i]
                    .iter()
                    .zip(&self.columns[j])
                    .map(|(a, b)| (a - means[i]) * (b - means[j]))
                    .sum::<f64>()
                    / denom;
                cov[(i, j)] = c;
                cov[(j, i)] = c;
            }
        }
        cov
    }

    /// Pearson correlation; pairs involving a zero-variance series are 0.
    pub fn correlation(&self) -> DMatrix<f64> {
        correlation_from_covariance(&self.covariance())
    }
}

pub fn correlation_from_covariance(cov: &DMatrix<f64>) -> DMatrix<f64> {
    let n = cov.nrows();
    let sd: Vec<f64> = (0..n).map(|i| cov[(i, i)].max(0.0).sqrt()).collect();
    DMatrix::from_fn(n, n, |i, j| {
        if i == j {
            1.0
        } else {
            let denom = sd[i] * sd[j];
            if denom > 1e-15 {
                (cov[(i, j)] / denom).clamp(-1.0, 1.0)
            } else {
                0.0
            }
        }
    })
}

/// Align several price histories on their common timestamps and turn the
/// closes into a returns panel.
///
/// Returns the timestamps of the return periods (each the later bar of its
/// pair) alongside the panel.
pub fn align_panel(
    histories: &[(String, Vec<PricePoint>)],
) -> Result<(Vec<NaiveDateTime>, ReturnsPanel), QuantError> {
    let indexes: Vec<HashMap<NaiveDateTime, f64>> = histories
        .iter()
        .map(|(_, prices)| prices.iter().map(|p| (p.timestamp, p.close)).collect())
        .collect();

    let mut common: BTreeSet<NaiveDateTime> = match histories.first() {
        Some((_, prices)) => prices.iter().map(|p| p.timestamp).collect(),
        None => BTreeSet::new(),
    };
    for index in indexes.iter().skip(1) {
        common.retain(|ts| index.contains_key(ts));
    }
    let timeline: Vec<NaiveDateTime> = common.into_iter().collect();

    let mut columns = Vec::with_capacity(histories.len());
    for index in &indexes {
        let closes: Vec<f64> = timeline
            .iter()
            .filter_map(|ts| index.get(ts).copied())
            .collect();
        columns.push(simple_returns(&closes)?);
    }

    let assets = histories.iter().map(|(name, _)| name.clone()).collect();
    let panel = ReturnsPanel::new(assets, columns)?;
    let stamps = timeline.into_iter().skip(1).collect();
    Ok((stamps, panel))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn ts(day: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, day)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    fn make_point(day: u32, close: f64) -> PricePoint {
        PricePoint {
            timestamp: ts(day),
            open: close,
            high: close,
            low: close,
            close,
            volume: 1000.0,
        }
    }

    #[test]
    fn simple_returns_length_and_values() {
        let r = simple_returns(&[100.0, 110.0, 99.0]).unwrap();
        assert_eq!(r.len(), 2);
        assert!((r[0] - 0.10).abs() < 1e-12);
        assert!((r[1] + 0.10).abs() < 1e-12);
    }

    #[test]
    fn simple_returns_zero_close_rejected() {
        assert!(matches!(
            simple_returns(&[0.0, 1.0]),
            Err(QuantError::InvalidInput { .. })
        ));
    }

    #[test]
    fn bar_returns_are_bar_aligned() {
        let prices = vec![make_point(1, 100.0), make_point(2, 105.0)];
        let r = bar_returns(&prices).unwrap();
        assert_eq!(r.len(), 2);
        assert_eq!(r[0], 0.0);
        assert!((r[1] - 0.05).abs() < 1e-12);
    }

    #[test]
    fn panel_rejects_ragged_columns() {
        let err = ReturnsPanel::new(
            vec!["A".into(), "B".into()],
            vec![vec![0.1, 0.2], vec![0.1]],
        )
        .unwrap_err();
        assert!(matches!(err, QuantError::InvalidInput { .. }));
    }

    #[test]
    fn panel_rejects_nan() {
        let err = ReturnsPanel::new(vec!["A".into()], vec![vec![0.1, f64::NAN]]).unwrap_err();
        assert!(matches!(err, QuantError::InvalidInput { .. }));
    }

    #[test]
    fn panel_rejects_duplicate_names() {
        let err = ReturnsPanel::new(
            vec!["A".into(), "A".into()],
            vec![vec![0.1], vec![0.2]],
        )
        .unwrap_err();
        assert!(matches!(err, QuantError::InvalidInput { .. }));
    }

    #[test]
    fn covariance_matches_hand_calculation() {
        let panel = ReturnsPanel::new(
            vec!["A".into(), "B".into()],
            vec![vec![1.0, 2.0, 3.0], vec![2.0, 4.0, 6.0]],
        )
        .unwrap();
        let cov = panel.covariance();
        assert!((cov[(0, 0)] - 1.0).abs() < 1e-12);
        assert!((cov[(1, 1)] - 4.0).abs() < 1e-12);
        assert!((cov[(0, 1)] - 2.0).abs() < 1e-12);

        let corr = panel.correlation();
        assert!((corr[(0, 1)] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn correlation_zero_variance_is_zero() {
        let panel = ReturnsPanel::new(
            vec!["A".into(), "B".into()],
            vec![vec![1.0, 1.0, 1.0], vec![1.0, 2.0, 3.0]],
        )
        .unwrap();
        let corr = panel.correlation();
        assert_eq!(corr[(0, 1)], 0.0);
        assert_eq!(corr[(0, 0)], 1.0);
    }

    #[test]
    fn sorted_by_name_reorders_columns() {
        let panel = ReturnsPanel::new(
            vec!["B".into(), "A".into()],
            vec![vec![0.2], vec![0.1]],
        )
        .unwrap();
        let sorted = panel.sorted_by_name();
        assert_eq!(sorted.assets(), &["A".to_string(), "B".to_string()]);
        assert_eq!(sorted.columns()[0], vec![0.1]);
    }

    #[test]
    fn align_panel_intersects_timestamps() {
        let a = vec![make_point(1, 100.0), make_point(2, 110.0), make_point(3, 121.0)];
        let b = vec![make_point(1, 50.0), make_point(3, 55.0), make_point(4, 60.0)];
        let (stamps, panel) = align_panel(&[("A".into(), a), ("B".into(), b)]).unwrap();

        assert_eq!(stamps, vec![ts(3)]);
        assert_eq!(panel.n_periods(), 1);
        assert!((panel.columns()[0][0] - 0.21).abs() < 1e-12);
        assert!((panel.columns()[1][0] - 0.10).abs() < 1e-12);
    }
}
