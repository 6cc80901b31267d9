use rand::rngs::StdRng;

use super::{
    median_row_by_mean, ForecastError, ForecastStrategy, QuantityForecast, StrategyInput,
    StrategyKind, MIN_HISTORY_DAYS,
};
use crate::domain::{BandForecast, Quantity};

/// Median-of-three baseline.
///
/// Takes the three most recent days, uses the one with the median mean as
/// center and the elementwise spread of all three as margins.
pub struct NoClusteringStrategy;

impl ForecastStrategy for NoClusteringStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::NoClustering
    }

    fn forecast(
        &self,
        input: &StrategyInput,
        _quantity: Quantity,
        _rng: &mut StdRng,
    ) -> Result<QuantityForecast, ForecastError> {
        input.require_days(MIN_HISTORY_DAYS)?;
        let recent = input.history.most_recent(MIN_HISTORY_DAYS);
        let center = median_row_by_mean(&recent);
        Ok(QuantityForecast::plain(BandForecast::around(
            recent.row(center),
            &recent,
        )))
    }
}
