use std::sync::Arc;

use futures::future::join_all;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{debug, info};

use super::{ForecastError, ForecastStrategy, QuantityForecast, StrategyInput, StrategyKind};
use crate::domain::Quantity;

/// Where the per-quantity generators get their seed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeedPolicy {
    /// Every stochastic step derives from this seed; runs are reproducible.
    Fixed(u64),
    /// Fresh OS entropy per run; scenario sampling is not reproducible.
    Entropy,
}

impl SeedPolicy {
    pub fn rng_for(&self, quantity: Quantity) -> StdRng {
        match self {
            Self::Fixed(seed) => StdRng::seed_from_u64(seed.wrapping_add(quantity.seed_offset())),
            Self::Entropy => StdRng::from_entropy(),
        }
    }
}

impl From<Option<u64>> for SeedPolicy {
    fn from(seed: Option<u64>) -> Self {
        seed.map_or(Self::Entropy, Self::Fixed)
    }
}

/// Runs one strategy over every quantity.
pub struct ForecastEngine {
    pub strategy: Arc<dyn ForecastStrategy>,
    pub seeds: SeedPolicy,
}

impl ForecastEngine {
    pub fn new(strategy: Arc<dyn ForecastStrategy>, seeds: SeedPolicy) -> Self {
        Self { strategy, seeds }
    }

    pub fn kind(&self) -> StrategyKind {
        self.strategy.kind()
    }

    /// Forecast a single quantity on the current thread.
    pub fn forecast_one(
        &self,
        quantity: Quantity,
        input: &StrategyInput,
    ) -> Result<QuantityForecast, ForecastError> {
        let mut rng = self.seeds.rng_for(quantity);
        self.strategy.forecast(input, quantity, &mut rng)
    }

    /// Forecast every quantity concurrently on the blocking pool.
    ///
    /// Results come back in input order, one per quantity, so a failure of
    /// one quantity does not hide the others.
    pub async fn forecast_all(
        &self,
        inputs: Vec<(Quantity, StrategyInput)>,
    ) -> Vec<(Quantity, Result<QuantityForecast, ForecastError>)> {
        info!(strategy = %self.kind(), quantities = inputs.len(), "Forecasting");

        let tasks = inputs.into_iter().map(|(quantity, input)| {
            let strategy = Arc::clone(&self.strategy);
            let mut rng = self.seeds.rng_for(quantity);
            let handle = tokio::task::spawn_blocking(move || {
                strategy.forecast(&input, quantity, &mut rng)
            });
            async move {
                let result = match handle.await {
                    Ok(result) => result,
                    Err(e) => Err(ForecastError::Task(e.to_string())),
                };
                debug!(%quantity, ok = result.is_ok(), "forecast finished");
                (quantity, result)
            }
        });

        join_all(tasks).await
    }
}
