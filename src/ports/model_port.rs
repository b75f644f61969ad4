//! Signal model port.

use crate::domain::error::QuantError;
use crate::domain::features::FeatureVector;

/// A trainable scorer. Implementations are treated as black boxes: each call
/// fits on `train`/`labels` and scores every row of `test`.
///
/// Returned scores lie in [0, 1]; `None` marks a row the model declines to
/// score. The output must have exactly `test.len()` entries.
pub trait SignalModel: Send + Sync {
    fn name(&self) -> &str;

    fn fit_predict(
        &self,
        train: &[FeatureVector],
        labels: &[f64],
        test: &[FeatureVector],
    ) -> Result<Vec<Option<f64>>, QuantError>;
}
