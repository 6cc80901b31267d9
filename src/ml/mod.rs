//! Machine Learning Module
//!
//! Point-forecast regressors used by the band strategies:
//! - Ordinary least squares over day-lagged values
//! - Random forest over a block of lagged values
//!
//! Both are trained on the flattened history window and queried for the
//! next 144 slots.

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod forest;
pub mod linear;

pub use forest::*;
pub use linear::*;

/// ML Model Type
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ModelType {
    LinearRegression,
    RandomForest,
}

/// Training summary reported after each fit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FitSummary {
    pub model_type: ModelType,
    pub training_samples: usize,
    pub feature_count: usize,
    /// In-sample root mean square error
    pub rmse: f64,
}

impl FitSummary {
    pub fn new(model_type: ModelType, features: usize, predictions: &[f64], targets: &[f64]) -> Self {
        let n = predictions.len().max(1) as f64;
        let mse = predictions
            .iter()
            .zip(targets)
            .map(|(p, t)| (p - t).powi(2))
            .sum::<f64>()
            / n;
        Self {
            model_type,
            training_samples: targets.len(),
            feature_count: features,
            rmse: mse.sqrt(),
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum ModelError {
    #[error("Cannot train on empty dataset")]
    EmptyDataset,

    #[error("Feature and target count mismatch: {features} features, {targets} targets")]
    CountMismatch { features: usize, targets: usize },

    #[error("All feature vectors must have the same length")]
    RaggedFeatures,

    #[error("Training failed: {0}")]
    Training(String),

    #[error("Prediction failed: {0}")]
    Prediction(String),
}

/// Check shape consistency of a training set and return the feature count.
pub(crate) fn check_training_set(x: &[Vec<f64>], y: &[f64]) -> Result<usize, ModelError> {
    if x.is_empty() || y.is_empty() {
        return Err(ModelError::EmptyDataset);
    }
    if x.len() != y.len() {
        return Err(ModelError::CountMismatch {
            features: x.len(),
            targets: y.len(),
        });
    }
    let n_features = x[0].len();
    if x.iter().any(|row| row.len() != n_features) {
        return Err(ModelError::RaggedFeatures);
    }
    Ok(n_features)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fit_summary_rmse() {
        let summary = FitSummary::new(ModelType::LinearRegression, 2, &[1.0, 3.0], &[1.0, 1.0]);
        assert_eq!(summary.training_samples, 2);
        assert!((summary.rmse - 2.0_f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_check_training_set() {
        assert_eq!(check_training_set(&[], &[]), Err(ModelError::EmptyDataset));
        assert_eq!(
            check_training_set(&[vec![1.0]], &[1.0, 2.0]),
            Err(ModelError::CountMismatch { features: 1, targets: 2 })
        );
        assert_eq!(
            check_training_set(&[vec![1.0], vec![1.0, 2.0]], &[1.0, 2.0]),
            Err(ModelError::RaggedFeatures)
        );
        assert_eq!(check_training_set(&[vec![1.0, 2.0]], &[1.0]), Ok(2));
    }
}
