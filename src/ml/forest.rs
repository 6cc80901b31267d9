//! SmartCore random forest wrapper
//!
//! Point forecaster for the Markov-chain strategy, trained on a block of
//! day-lagged values.

use smartcore::ensemble::random_forest_regressor::{
    RandomForestRegressor, RandomForestRegressorParameters,
};
use smartcore::linalg::basic::matrix::DenseMatrix;

use super::{check_training_set, FitSummary, ModelError, ModelType};

/// Random forest regressor over lagged features
pub struct LagForest {
    model: RandomForestRegressor<f64, f64, DenseMatrix<f64>, Vec<f64>>,
    pub summary: FitSummary,
    pub n_trees: usize,
}

impl LagForest {
    /// Training parameters
    ///
    /// - 50 trees
    /// - Max depth 10
    /// - Min samples split 5
    pub fn default_parameters(seed: u64) -> RandomForestRegressorParameters {
        RandomForestRegressorParameters {
            max_depth: Some(10),
            min_samples_leaf: 2,
            min_samples_split: 5,
            n_trees: 50,
            m: None, // sqrt(n_features)
            keep_samples: false,
            seed,
        }
    }

    fn to_matrix(x: &[Vec<f64>], n_features: usize) -> DenseMatrix<f64> {
        let mut flat_data = Vec::with_capacity(x.len() * n_features);
        for row in x {
            flat_data.extend_from_slice(row);
        }
        DenseMatrix::new(x.len(), n_features, flat_data, false)
    }

    pub fn train(
        x: &[Vec<f64>],
        y: &[f64],
        params: RandomForestRegressorParameters,
    ) -> Result<Self, ModelError> {
        let n_features = check_training_set(x, y)?;
        let n_trees = params.n_trees;

        let x_matrix = Self::to_matrix(x, n_features);
        let y_vec = y.to_vec();

        let model = RandomForestRegressor::fit(&x_matrix, &y_vec, params)
            .map_err(|e| ModelError::Training(format!("{:?}", e)))?;

        let fitted = model
            .predict(&x_matrix)
            .map_err(|e| ModelError::Prediction(format!("{:?}", e)))?;
        let summary = FitSummary::new(ModelType::RandomForest, n_features, &fitted, y);

        Ok(Self {
            model,
            summary,
            n_trees,
        })
    }

    /// Predict one value per feature row.
    pub fn predict(&self, x: &[Vec<f64>]) -> Result<Vec<f64>, ModelError> {
        let n_features = x.first().map(Vec::len).unwrap_or(0);
        if x.is_empty() || n_features != self.summary.feature_count {
            return Err(ModelError::Prediction(format!(
                "expected {} features per row",
                self.summary.feature_count
            )));
        }
        self.model
            .predict(&Self::to_matrix(x, n_features))
            .map_err(|e| ModelError::Prediction(format!("{:?}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_parameters() {
        let params = LagForest::default_parameters(42);
        assert_eq!(params.n_trees, 50);
        assert_eq!(params.max_depth, Some(10));
        assert_eq!(params.min_samples_split, 5);
        assert!(!params.keep_samples);
    }

    fn small_forest(n_trees: usize, seed: u64) -> RandomForestRegressorParameters {
        let mut params = LagForest::default_parameters(seed);
        params.n_trees = n_trees;
        params.min_samples_split = 2;
        params.min_samples_leaf = 1;
        params
    }

    #[test]
    fn test_train_and_predict() {
        // y = 2x1 + 3x2
        let x: Vec<Vec<f64>> = vec![
            vec![1.0, 1.0],
            vec![2.0, 1.0],
            vec![1.0, 2.0],
            vec![2.0, 2.0],
            vec![3.0, 3.0],
            vec![4.0, 2.0],
            vec![2.0, 4.0],
            vec![3.0, 1.0],
            vec![1.0, 3.0],
            vec![4.0, 4.0],
        ];
        let y: Vec<f64> = x.iter().map(|r| 2.0 * r[0] + 3.0 * r[1]).collect();

        let params = small_forest(10, 7);
        let model = LagForest::train(&x, &y, params).unwrap();
        assert_eq!(model.summary.training_samples, 10);
        assert_eq!(model.n_trees, 10);

        let pred = model.predict(&[vec![3.0, 3.0]]).unwrap();
        assert_eq!(pred.len(), 1);
        assert!(pred[0] > 5.0 && pred[0] < 20.0);
    }

    #[test]
    fn test_predict_rejects_wrong_width() {
        let x = vec![vec![1.0, 2.0]; 6];
        let y = vec![1.0; 6];
        let model = LagForest::train(&x, &y, small_forest(3, 1)).unwrap();
        assert!(model.predict(&[vec![1.0]]).is_err());
    }
}
