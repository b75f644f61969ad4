//! Walk-forward training and scoring of signal models.
//!
//! The series is split into expanding-window folds. Test blocks of equal
//! size tile the tail; each fold trains on everything before its test block
//! (minus an optional embargo). Rows ahead of the first test block are never
//! scored.

use std::collections::{BTreeMap, BTreeSet};

use rayon::prelude::*;
use tracing::debug;

use crate::domain::error::QuantError;
use crate::domain::features::FeatureVector;
use crate::ports::model_port::SignalModel;

/// Per-bar scores in [0, 1]; `None` where nothing was scored.
pub type SignalSeries = Vec<Option<f64>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WalkForwardConfig {
    pub n_folds: usize,
    /// Bars dropped between the end of training and the test block.
    pub embargo: usize,
    pub min_train: usize,
}

impl WalkForwardConfig {
    pub fn new(n_folds: usize) -> Self {
        WalkForwardConfig {
            n_folds,
            embargo: 0,
            min_train: 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fold {
    pub index: usize,
    /// Training covers `[0, train_end)`.
    pub train_end: usize,
    pub test_start: usize,
    pub test_end: usize,
}

impl Fold {
    pub fn test_len(&self) -> usize {
        self.test_end - self.test_start
    }
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct EnsembleOutput {
    pub per_model: BTreeMap<String, SignalSeries>,
    pub ensemble: SignalSeries,
}

/// Binary targets for bar-aligned returns: 1.0 when the next bar's return
/// is positive, else 0.0. The last bar has no next return and gets 0.0.
pub fn next_bar_labels(returns: &[f64]) -> Vec<f64> {
    (0..returns.len())
        .map(|t| match returns.get(t + 1) {
            Some(r) if *r > 0.0 => 1.0,
            _ => 0.0,
        })
        .collect()
}

pub fn expanding_window_folds(
    n: usize,
    config: &WalkForwardConfig,
) -> Result<Vec<Fold>, QuantError> {
    if config.n_folds == 0 {
        return Err(QuantError::invalid("walk-forward needs at least one fold"));
    }
    let test_size = n / (config.n_folds + 1);
    if test_size == 0 {
        return Err(QuantError::insufficient(
            "walk-forward",
            n,
            config.n_folds + 1,
        ));
    }

    let first_test = n - config.n_folds * test_size;
    let mut folds = Vec::with_capacity(config.n_folds);
    for k in 0..config.n_folds {
        let test_start = first_test + k * test_size;
        let train_end = test_start.saturating_sub(config.embargo);
        if train_end < config.min_train.max(1) {
            return Err(QuantError::insufficient(
                format!("walk-forward fold {} training window", k),
                train_end,
                config.min_train.max(1),
            ));
        }
        folds.push(Fold {
            index: k,
            train_end,
            test_start,
            test_end: test_start + test_size,
        });
    }

    debug!(n, test_size, first_test, folds = folds.len(), "walk-forward layout");
    Ok(folds)
}

pub fn train_and_score(
    features: &[FeatureVector],
    labels: &[f64],
    models: &[Box<dyn SignalModel>],
    n_folds: usize,
) -> Result<EnsembleOutput, QuantError> {
    train_and_score_with(features, labels, models, &WalkForwardConfig::new(n_folds))
}

pub fn train_and_score_with(
    features: &[FeatureVector],
    labels: &[f64],
    models: &[Box<dyn SignalModel>],
    config: &WalkForwardConfig,
) -> Result<EnsembleOutput, QuantError> {
    if features.len() != labels.len() {
        return Err(QuantError::invalid(format!(
            "{} feature rows but {} labels",
            features.len(),
            labels.len()
        )));
    }
    if models.is_empty() {
        return Err(QuantError::invalid("no models to train"));
    }
    let mut seen = BTreeSet::new();
    for model in models {
        if !seen.insert(model.name()) {
            return Err(QuantError::invalid(format!(
                "duplicate model name '{}'",
                model.name()
            )));
        }
    }

    let n = features.len();
    let folds = expanding_window_folds(n, config)?;

    let jobs: Vec<(usize, &Fold)> = (0..models.len())
        .flat_map(|m| folds.iter().map(move |f| (m, f)))
        .collect();

    type Scored = (usize, Fold, Vec<Option<f64>>);
    let scored: Vec<Scored> = jobs
        .par_iter()
        .map(|&(m, fold)| -> Result<Scored, QuantError> {
            let model = &models[m];
            let test = &features[fold.test_start..fold.test_end];
            let out = model.fit_predict(
                &features[..fold.train_end],
                &labels[..fold.train_end],
                test,
            )?;
            check_output(model.name(), fold, &out)?;
            Ok((m, *fold, out))
        })
        .collect::<Result<_, _>>()?;

    let mut series: Vec<SignalSeries> = vec![vec![None; n]; models.len()];
    for (m, fold, out) in scored {
        series[m][fold.test_start..fold.test_end].copy_from_slice(&out);
    }

    let ensemble = (0..n)
        .map(|t| {
            let present: Vec<f64> = series.iter().filter_map(|s| s[t]).collect();
            if present.is_empty() {
                None
            } else {
                Some(present.iter().sum::<f64>() / present.len() as f64)
            }
        })
        .collect();

    let per_model = models
        .iter()
        .zip(series)
        .map(|(model, s)| (model.name().to_string(), s))
        .collect();

    Ok(EnsembleOutput {
        per_model,
        ensemble,
    })
}

fn check_output(name: &str, fold: &Fold, out: &[Option<f64>]) -> Result<(), QuantError> {
    if out.len() != fold.test_len() {
        return Err(QuantError::invalid(format!(
            "model '{}' returned {} scores for a fold of {}",
            name,
            out.len(),
            fold.test_len()
        )));
    }
    if let Some(bad) = out
        .iter()
        .flatten()
        .find(|v| !v.is_finite() || !(0.0..=1.0).contains(*v))
    {
        return Err(QuantError::invalid(format!(
            "model '{}' scored {} in fold {}, outside [0, 1]",
            name, bad, fold.index
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};

    fn rows(n: usize) -> Vec<FeatureVector> {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        (0..n)
            .map(|i| FeatureVector {
                timestamp: start + Duration::days(i as i64),
                values: BTreeMap::from([("x".to_string(), Some(i as f64))]),
            })
            .collect()
    }

    struct Constant(&'static str, f64);

    impl SignalModel for Constant {
        fn name(&self) -> &str {
            self.0
        }

        fn fit_predict(
            &self,
            _train: &[FeatureVector],
            _labels: &[f64],
            test: &[FeatureVector],
        ) -> Result<Vec<Option<f64>>, QuantError> {
            Ok(vec![Some(self.1); test.len()])
        }
    }

    /// Fraction of positive labels seen in training.
    struct HitRate;

    impl SignalModel for HitRate {
        fn name(&self) -> &str {
            "hit-rate"
        }

        fn fit_predict(
            &self,
            _train: &[FeatureVector],
            labels: &[f64],
            test: &[FeatureVector],
        ) -> Result<Vec<Option<f64>>, QuantError> {
            let ups = labels.iter().filter(|l| **l > 0.0).count();
            let p = ups as f64 / labels.len() as f64;
            Ok(vec![Some(p); test.len()])
        }
    }

    /// Fails if any training row is not strictly earlier than the test block.
    struct NoPeek;

    impl SignalModel for NoPeek {
        fn name(&self) -> &str {
            "no-peek"
        }

        fn fit_predict(
            &self,
            train: &[FeatureVector],
            _labels: &[f64],
            test: &[FeatureVector],
        ) -> Result<Vec<Option<f64>>, QuantError> {
            let (Some(last), Some(first)) = (train.last(), test.first()) else {
                return Err(QuantError::invalid("empty fold"));
            };
            if last.timestamp >= first.timestamp {
                return Err(QuantError::invalid("training overlaps test block"));
            }
            Ok(vec![Some(0.5); test.len()])
        }
    }

    /// Scores only every other row of the test block.
    struct Sparse;

    impl SignalModel for Sparse {
        fn name(&self) -> &str {
            "sparse"
        }

        fn fit_predict(
            &self,
            _train: &[FeatureVector],
            _labels: &[f64],
            test: &[FeatureVector],
        ) -> Result<Vec<Option<f64>>, QuantError> {
            Ok((0..test.len())
                .map(|i| if i % 2 == 1 { Some(0.8) } else { None })
                .collect())
        }
    }

    struct Broken(Vec<Option<f64>>);

    impl SignalModel for Broken {
        fn name(&self) -> &str {
            "broken"
        }

        fn fit_predict(
            &self,
            _train: &[FeatureVector],
            _labels: &[f64],
            _test: &[FeatureVector],
        ) -> Result<Vec<Option<f64>>, QuantError> {
            Ok(self.0.clone())
        }
    }

    struct Failing;

    impl SignalModel for Failing {
        fn name(&self) -> &str {
            "failing"
        }

        fn fit_predict(
            &self,
            _train: &[FeatureVector],
            _labels: &[f64],
            _test: &[FeatureVector],
        ) -> Result<Vec<Option<f64>>, QuantError> {
            Err(QuantError::NonConvergence {
                solver: "inner".into(),
                iterations: 7,
            })
        }
    }

    #[test]
    fn labels_look_one_bar_ahead() {
        let labels = next_bar_labels(&[0.0, 0.02, -0.01, 0.0, 0.03]);
        assert_eq!(labels, vec![1.0, 0.0, 0.0, 1.0, 0.0]);
        assert!(next_bar_labels(&[]).is_empty());
    }

    #[test]
    fn folds_tile_the_tail() {
        let folds = expanding_window_folds(100, &WalkForwardConfig::new(4)).unwrap();
        assert_eq!(folds.len(), 4);
        assert_eq!(folds[0].test_start, 20);
        assert_eq!(folds[3].test_end, 100);
        for pair in folds.windows(2) {
            assert_eq!(pair[0].test_end, pair[1].test_start);
        }
        assert!(folds.iter().all(|f| f.train_end == f.test_start));
    }

    #[test]
    fn remainder_goes_to_first_training_window() {
        let folds = expanding_window_folds(23, &WalkForwardConfig::new(3)).unwrap();
        // test size 5, first test starts at 23 - 15
        assert_eq!(folds[0].test_start, 8);
        assert_eq!(folds[0].test_len(), 5);
        assert_eq!(folds[2].test_end, 23);
    }

    #[test]
    fn embargo_shrinks_training() {
        let config = WalkForwardConfig {
            embargo: 3,
            ..WalkForwardConfig::new(2)
        };
        let folds = expanding_window_folds(30, &config).unwrap();
        assert_eq!(folds[0].test_start, 10);
        assert_eq!(folds[0].train_end, 7);
        assert_eq!(folds[1].train_end, 17);
    }

    #[test]
    fn fold_layout_errors() {
        assert!(matches!(
            expanding_window_folds(10, &WalkForwardConfig::new(0)),
            Err(QuantError::InvalidInput { .. })
        ));
        assert!(matches!(
            expanding_window_folds(3, &WalkForwardConfig::new(5)),
            Err(QuantError::InsufficientData { .. })
        ));
        let config = WalkForwardConfig {
            min_train: 15,
            ..WalkForwardConfig::new(4)
        };
        assert!(matches!(
            expanding_window_folds(50, &config),
            Err(QuantError::InsufficientData { .. })
        ));
    }

    #[test]
    fn head_is_unscored_and_tail_is_scored() {
        let features = rows(50);
        let labels = vec![1.0; 50];
        let models: Vec<Box<dyn SignalModel>> = vec![Box::new(Constant("c", 0.3))];
        let out = train_and_score(&features, &labels, &models, 4).unwrap();

        let series = &out.per_model["c"];
        assert!(series[..10].iter().all(Option::is_none));
        assert!(series[10..].iter().all(|s| *s == Some(0.3)));
        assert_eq!(out.ensemble, *series);
    }

    #[test]
    fn training_never_reaches_test_block() {
        let features = rows(60);
        let labels = vec![0.0; 60];
        let models: Vec<Box<dyn SignalModel>> = vec![Box::new(NoPeek)];
        let config = WalkForwardConfig {
            embargo: 2,
            ..WalkForwardConfig::new(5)
        };
        let out = train_and_score_with(&features, &labels, &models, &config).unwrap();
        assert_eq!(out.ensemble.iter().flatten().count(), 50);
    }

    #[test]
    fn expanding_window_sees_more_labels() {
        // Labels flip from down to up halfway: later folds learn more ups.
        let features = rows(40);
        let labels: Vec<f64> = (0..40).map(|i| if i < 20 { -1.0 } else { 1.0 }).collect();
        let models: Vec<Box<dyn SignalModel>> = vec![Box::new(HitRate)];
        let out = train_and_score(&features, &labels, &models, 3).unwrap();

        let s = &out.per_model["hit-rate"];
        assert_eq!(s[10], Some(0.0));
        // fold 2 trains on [0, 30): 10 ups of 30
        assert!((s[30].unwrap() - 1.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn ensemble_skips_missing_scores() {
        let features = rows(20);
        let labels = vec![0.0; 20];
        let models: Vec<Box<dyn SignalModel>> =
            vec![Box::new(Constant("c", 0.2)), Box::new(Sparse)];
        let out = train_and_score(&features, &labels, &models, 1).unwrap();

        // single fold scores [10, 20)
        assert_eq!(out.ensemble[5], None);
        assert!((out.ensemble[10].unwrap() - 0.2).abs() < 1e-12);
        assert!((out.ensemble[11].unwrap() - 0.5).abs() < 1e-12);
        assert_eq!(out.per_model.len(), 2);
    }

    #[test]
    fn bad_model_output_rejected() {
        let features = rows(20);
        let labels = vec![0.0; 20];

        let short: Vec<Box<dyn SignalModel>> = vec![Box::new(Broken(vec![Some(0.5); 3]))];
        assert!(matches!(
            train_and_score(&features, &labels, &short, 1),
            Err(QuantError::InvalidInput { .. })
        ));

        let mut scores = vec![Some(0.5); 10];
        scores[4] = Some(1.5);
        let out_of_range: Vec<Box<dyn SignalModel>> = vec![Box::new(Broken(scores))];
        assert!(matches!(
            train_and_score(&features, &labels, &out_of_range, 1),
            Err(QuantError::InvalidInput { .. })
        ));
    }

    #[test]
    fn model_error_propagates() {
        let features = rows(20);
        let labels = vec![0.0; 20];
        let models: Vec<Box<dyn SignalModel>> = vec![Box::new(Failing)];
        let err = train_and_score(&features, &labels, &models, 2).unwrap_err();
        assert!(matches!(err, QuantError::NonConvergence { iterations: 7, .. }));
    }

    #[test]
    fn input_mismatches_rejected() {
        let features = rows(20);
        let models: Vec<Box<dyn SignalModel>> =
            vec![Box::new(Constant("c", 0.1)), Box::new(Constant("c", 0.9))];
        assert!(matches!(
            train_and_score(&features, &[0.0; 20], &models, 2),
            Err(QuantError::InvalidInput { .. })
        ));
        assert!(matches!(
            train_and_score(&features, &[0.0; 19], &models[..1], 2),
            Err(QuantError::InvalidInput { .. })
        ));
        assert!(matches!(
            train_and_score(&features, &[0.0; 20], &[], 2),
            Err(QuantError::InvalidInput { .. })
        ));
    }
}
