use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

use super::{check_training_set, FitSummary, ModelError, ModelType};

/// Linear model without intercept fitted by ordinary least squares.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinearModel {
    pub coefficients: Vec<f64>,
    pub summary: FitSummary,
}

impl LinearModel {
    /// Solve `min ||X θ - y||²`.
    ///
    /// Uses an SVD solve, so rank-deficient designs (e.g. an all-zero history)
    /// still produce the minimum-norm solution instead of failing.
    pub fn fit(x: &[Vec<f64>], y: &[f64]) -> Result<Self, ModelError> {
        let n_features = check_training_set(x, y)?;
        let design = DMatrix::from_fn(x.len(), n_features, |i, j| x[i][j]);
        let target = DVector::from_column_slice(y);

        let theta = design
            .clone()
            .svd(true, true)
            .solve(&target, 1e-12)
            .map_err(|e| ModelError::Training(e.to_string()))?;

        let coefficients: Vec<f64> = theta.iter().copied().collect();
        let fitted: Vec<f64> = (&design * &theta).iter().copied().collect();
        let summary = FitSummary::new(ModelType::LinearRegression, n_features, &fitted, y);

        Ok(Self {
            coefficients,
            summary,
        })
    }

    pub fn predict(&self, features: &[f64]) -> f64 {
        self.coefficients
            .iter()
            .zip(features)
            .map(|(c, f)| c * f)
            .sum()
    }

    /// Training residuals `y - X θ`.
    pub fn residuals(&self, x: &[Vec<f64>], y: &[f64]) -> Vec<f64> {
        x.iter().zip(y).map(|(row, t)| t - self.predict(row)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recovers_exact_coefficients() {
        // y = 2 a - 0.5 b
        let x: Vec<Vec<f64>> = (0..20)
            .map(|i| vec![i as f64, (i * i % 7) as f64])
            .collect();
        let y: Vec<f64> = x.iter().map(|r| 2.0 * r[0] - 0.5 * r[1]).collect();

        let model = LinearModel::fit(&x, &y).unwrap();
        assert!((model.coefficients[0] - 2.0).abs() < 1e-9);
        assert!((model.coefficients[1] + 0.5).abs() < 1e-9);
        assert!(model.summary.rmse < 1e-9);
        assert!(model.residuals(&x, &y).iter().all(|r| r.abs() < 1e-9));
    }

    #[test]
    fn test_all_zero_design_does_not_fail() {
        let x = vec![vec![0.0, 0.0]; 10];
        let y = vec![0.0; 10];
        let model = LinearModel::fit(&x, &y).unwrap();
        assert_eq!(model.predict(&[1.0, 1.0]), 0.0);
    }

    #[test]
    fn test_empty_dataset() {
        assert!(matches!(LinearModel::fit(&[], &[]), Err(ModelError::EmptyDataset)));
    }
}
