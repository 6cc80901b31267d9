use ndarray::{Array1, Array2};
use rand::rngs::StdRng;
use rand_distr::{Distribution, Normal};
use tracing::debug;

use super::features::{create_lag_features, next_day_features, slot_std};
use super::{
    ForecastError, ForecastStrategy, QuantityForecast, StrategyInput, StrategyKind,
    MIN_HISTORY_DAYS,
};
use crate::domain::{BandForecast, Quantity, HORIZON};
use crate::ml::LinearModel;
use crate::scenario::{reduce, Reduction};

/// Lag-regression point forecast with clustered Monte-Carlo margins.
///
/// Each slot is regressed on the same slot one and two days earlier. The
/// residual spread per slot drives Gaussian scenarios around the point
/// forecast, which are reduced to three representatives with the point
/// forecast forced among them.
pub struct RegressionClusteringStrategy {
    pub scenarios: usize,
    pub lags: Vec<usize>,
}

impl Default for RegressionClusteringStrategy {
    fn default() -> Self {
        Self {
            scenarios: 100,
            lags: vec![HORIZON, 2 * HORIZON],
        }
    }
}

impl RegressionClusteringStrategy {
    fn monte_carlo(
        &self,
        point: &Array1<f64>,
        std: &[f64],
        rng: &mut StdRng,
    ) -> Result<Array2<f64>, ForecastError> {
        let noise = std
            .iter()
            .map(|s| Normal::new(0.0, *s).map_err(|e| ForecastError::Noise(e.to_string())))
            .collect::<Result<Vec<_>, _>>()?;

        let mut scenarios = Array2::zeros((self.scenarios, point.len()));
        for mut row in scenarios.rows_mut() {
            for (t, v) in row.iter_mut().enumerate() {
                *v = point[t] + noise[t].sample(rng);
            }
        }
        Ok(scenarios)
    }

    /// Point forecast and the reduced scenario set it was forced into.
    pub(crate) fn reduced(
        &self,
        input: &StrategyInput,
        quantity: Quantity,
        rng: &mut StdRng,
    ) -> Result<(Array1<f64>, Reduction), ForecastError> {
        input.require_days(MIN_HISTORY_DAYS)?;
        let series = input.history.flatten();

        let (x, y) = create_lag_features(&series, &self.lags);
        let model = LinearModel::fit(&x, &y)?;
        let std = slot_std(&model.residuals(&x, &y));
        debug!(
            %quantity,
            coefficients = ?model.coefficients,
            rmse = model.summary.rmse,
            "lag regression fitted"
        );

        let point: Array1<f64> = next_day_features(&series, &self.lags)
            .iter()
            .map(|row| model.predict(row))
            .collect();

        let scenarios = self.monte_carlo(&point, &std, rng)?;
        let reduction = reduce(&scenarios, Some(point.view()), Some(input.history.values()))?;
        Ok((point, reduction))
    }
}

impl ForecastStrategy for RegressionClusteringStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Arima
    }

    fn forecast(
        &self,
        input: &StrategyInput,
        quantity: Quantity,
        rng: &mut StdRng,
    ) -> Result<QuantityForecast, ForecastError> {
        let (point, reduction) = self.reduced(input, quantity, rng)?;
        Ok(QuantityForecast {
            band: BandForecast::around(point.view(), &reduction.centers),
            silhouette: reduction.silhouette,
        })
    }
}
