use rand::rngs::StdRng;
use tracing::debug;

use super::{
    median_row_by_mean, ForecastError, ForecastStrategy, QuantityForecast, StrategyInput,
    StrategyKind, MIN_HISTORY_DAYS,
};
use crate::domain::{BandForecast, Quantity};
use crate::scenario::reduce;

/// Clusters the full history window into three representative days.
///
/// The representative with the median mean is the center; the margins span
/// all three representatives.
pub struct ClusteringStrategy;

impl ForecastStrategy for ClusteringStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Clustering
    }

    fn forecast(
        &self,
        input: &StrategyInput,
        quantity: Quantity,
        _rng: &mut StdRng,
    ) -> Result<QuantityForecast, ForecastError> {
        input.require_days(MIN_HISTORY_DAYS)?;
        let reduction = reduce(input.history.values(), None, None)?;
        debug!(%quantity, silhouette = ?reduction.silhouette, "history clustered");

        let center = median_row_by_mean(&reduction.centers);
        Ok(QuantityForecast {
            band: BandForecast::around(reduction.centers.row(center), &reduction.centers),
            silhouette: reduction.silhouette,
        })
    }
}
