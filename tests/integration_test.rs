//! End-to-end tests across the domain components.
//!
//! Tests cover:
//! - Features -> walk-forward ensemble -> backtest
//! - Allocation over aligned multi-asset panels
//! - Risk report on a known return series

mod common;

use approx::assert_relative_eq;
use common::*;
use quantfolio::domain::allocation::{allocate, allocate_all, blend_returns, AllocationMethod, AllocationParams};
use quantfolio::domain::backtest::{run_backtest, BacktestConfig, Position};
use quantfolio::domain::ensemble::{
    next_bar_labels, train_and_score, train_and_score_with, WalkForwardConfig,
};
use quantfolio::domain::error::QuantError;
use quantfolio::domain::features::{compute_feature_panel, compute_features, FeatureConfig};
use quantfolio::domain::metrics::{RiskParams, RiskReport};
use quantfolio::domain::returns::{align_panel, bar_returns};
use quantfolio::ports::model_port::SignalModel;

mod signal_pipeline {
    use super::*;

    #[test]
    fn features_to_ensemble_to_backtest() {
        let prices = generate_prices(300, 100.0, 0.01, 1);
        let features = compute_features(&prices, &FeatureConfig::default()).unwrap();
        let returns = bar_returns(&prices).unwrap();
        let labels = next_bar_labels(&returns);

        let models: Vec<Box<dyn SignalModel>> = vec![Box::new(MomentumModel), Box::new(BaseRateModel)];
        let output = train_and_score(&features, &labels, &models, 4).unwrap();

        assert_eq!(output.ensemble.len(), 300);
        assert!(output.ensemble[..60].iter().all(Option::is_none));
        assert!(output.ensemble[60..].iter().all(Option::is_some));
        assert_eq!(output.per_model.len(), 2);

        let result = run_backtest(&returns, &output.ensemble, &BacktestConfig::default()).unwrap();
        assert!(result.positions[..60].iter().all(|p| *p == Position::Flat));
        assert_eq!(result.strategy_returns.len(), 299);
        assert_eq!(result.equity.len(), 300);
        assert!(result.equity.iter().all(|e| e.is_finite() && *e > 0.0));
        assert_eq!(result.report.observations, 299);
        assert!(result.report.max_drawdown.unwrap() <= 0.0);
    }

    #[test]
    fn embargo_and_min_train_respected() {
        let prices = generate_prices(200, 50.0, 0.02, 2);
        let features = compute_features(&prices, &FeatureConfig::default()).unwrap();
        let labels = next_bar_labels(&bar_returns(&prices).unwrap());

        let models: Vec<Box<dyn SignalModel>> = vec![Box::new(BaseRateModel)];
        let config = WalkForwardConfig {
            n_folds: 3,
            embargo: 5,
            min_train: 40,
        };
        let output = train_and_score_with(&features, &labels, &models, &config).unwrap();
        assert_eq!(output.ensemble.iter().flatten().count(), 150);

        let too_strict = WalkForwardConfig {
            min_train: 100,
            ..config
        };
        let err = train_and_score_with(&features, &labels, &models, &too_strict).unwrap_err();
        assert!(matches!(err, QuantError::InsufficientData { .. }));
    }

    #[test]
    fn feature_panel_runs_per_asset() {
        let histories = vec![
            ("AAA".to_string(), generate_prices(120, 10.0, 0.01, 3)),
            ("BBB".to_string(), generate_prices(120, 20.0, 0.02, 4)),
        ];
        let panel = compute_feature_panel(&histories, &FeatureConfig::default()).unwrap();
        assert_eq!(panel.len(), 2);
        assert_eq!(panel[0].0, "AAA");
        assert_eq!(panel[1].1.len(), 120);
        assert!(panel[1].1[119].is_warm());
    }
}

mod allocation_pipeline {
    use super::*;

    fn histories() -> Vec<(String, Vec<PricePoint>)> {
        vec![
            ("CALM".to_string(), generate_prices(252, 100.0, 0.004, 5)),
            ("MID".to_string(), generate_prices(252, 50.0, 0.01, 6)),
            ("WILD".to_string(), generate_prices(252, 20.0, 0.04, 7)),
        ]
    }

    #[test]
    fn every_method_respects_budget_and_caps() {
        let (stamps, panel) = align_panel(&histories()).unwrap();
        assert_eq!(stamps.len(), 251);

        let params = AllocationParams::default();
        let results = allocate_all(&panel, &AllocationMethod::ALL, &params);
        assert_eq!(results.len(), 4);

        for (method, result) in results {
            match result {
                Ok(w) => {
                    assert!((w.sum() - 1.0).abs() < 1e-6, "{} sums to {}", method, w.sum());
                    for (asset, x) in w.iter() {
                        assert!(
                            x >= -1e-9 && x <= params.max_weight + 1e-6,
                            "{} gives {} weight {}",
                            method,
                            asset,
                            x
                        );
                    }
                }
                Err(e) => assert!(
                    method == AllocationMethod::Kelly && matches!(e, QuantError::Infeasible { .. }),
                    "{} failed: {}",
                    method,
                    e
                ),
            }
        }
    }

    #[test]
    fn volatile_asset_is_underweighted_by_risk_based_methods() {
        let (_, panel) = align_panel(&histories()).unwrap();
        let params = AllocationParams::default();
        for method in [AllocationMethod::Hrp, AllocationMethod::RiskParity, AllocationMethod::MeanVariance] {
            let w = allocate(&panel, method, &params).unwrap();
            assert!(
                w.get("WILD").unwrap() < w.get("CALM").unwrap(),
                "{}: WILD {} vs CALM {}",
                method,
                w.get("WILD").unwrap(),
                w.get("CALM").unwrap()
            );
        }
    }

    #[test]
    fn blended_series_feeds_risk_report() {
        let (_, panel) = align_panel(&histories()).unwrap();
        let w = allocate(&panel, AllocationMethod::Hrp, &AllocationParams::default()).unwrap();
        let blended = blend_returns(&panel, &w).unwrap();
        assert_eq!(blended.len(), panel.n_periods());

        let report = RiskReport::compute(&blended, &RiskParams::default()).unwrap();
        assert_eq!(report.observations, 251);
        assert!(report.sharpe.is_some());
        assert!(report.cvar_95.unwrap() <= report.var_95.unwrap());
    }

    #[test]
    fn single_asset_is_insufficient() {
        let (_, panel) = align_panel(&histories()[..1]).unwrap();
        let err = allocate(&panel, AllocationMethod::Hrp, &AllocationParams::default()).unwrap_err();
        assert!(matches!(err, QuantError::InsufficientData { .. }));
    }
}

mod risk_report {
    use super::*;

    #[test]
    fn known_series_matches_reference_values() {
        let returns = [0.01, -0.02, 0.03, -0.01, 0.02];
        let report = RiskReport::compute(&returns, &RiskParams::default()).unwrap();

        assert_relative_eq!(report.sharpe.unwrap(), 4.593220484431882, epsilon = 1e-6);
        assert_relative_eq!(report.sortino.unwrap(), 13.469966592386191, epsilon = 1e-6);
        assert_relative_eq!(report.calmar.unwrap(), 166.2818359645609, epsilon = 1e-6);
        assert_relative_eq!(report.win_rate.unwrap(), 0.6, epsilon = 1e-12);
    }

    #[test]
    fn short_series_reports_nothing() {
        let report = RiskReport::compute(&[0.01], &RiskParams::default()).unwrap();
        assert_eq!(report.sharpe, None);
        assert_eq!(report.sortino, None);
        assert_eq!(report.calmar, None);
        assert_eq!(report.var_95, None);
        assert_eq!(report.max_drawdown, None);
        assert_eq!(report.observations, 1);
    }
}
