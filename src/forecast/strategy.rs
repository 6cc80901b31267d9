use ndarray::{Array2, ArrayView1};
use ordered_float::OrderedFloat;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use strum::{EnumIter, IntoEnumIterator};

use super::{
    BootstrapBackend, BootstrapSettings, BootstrapStrategy, ClusteringStrategy, ForecastError,
    MarkovChainStrategy, NoClusteringStrategy, RegressionClusteringStrategy,
};
use crate::domain::{BandForecast, HistoryWindow, Quantity};

/// Minimum number of history days every strategy needs.
pub const MIN_HISTORY_DAYS: usize = 3;

/// Closed set of forecast strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum StrategyKind {
    NoClustering,
    BayesBoot,
    Clustering,
    /// Lag-regression point forecast with clustered Monte-Carlo margins
    Arima,
    MarkovChain,
}

impl StrategyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NoClustering => "NoClustering",
            Self::BayesBoot => "BayesBoot",
            Self::Clustering => "Clustering",
            Self::Arima => "ARIMA",
            Self::MarkovChain => "MarkovChain",
        }
    }

    /// Whether the strategy consumes per-slot covariates instead of history
    pub fn needs_covariates(&self) -> bool {
        matches!(self, Self::BayesBoot)
    }

    /// Instantiate the strategy.
    ///
    /// The bootstrap variant needs a backend; asking for it without one fails
    /// here rather than at forecast time.
    pub fn build(
        self,
        backend: Option<Arc<dyn BootstrapBackend>>,
        settings: BootstrapSettings,
    ) -> Result<Arc<dyn ForecastStrategy>, ForecastError> {
        Ok(match self {
            Self::NoClustering => Arc::new(NoClusteringStrategy),
            Self::Clustering => Arc::new(ClusteringStrategy),
            Self::Arima => Arc::new(RegressionClusteringStrategy::default()),
            Self::MarkovChain => Arc::new(MarkovChainStrategy::default()),
            Self::BayesBoot => {
                let backend = backend.ok_or(ForecastError::BackendUnavailable)?;
                Arc::new(BootstrapStrategy::new(backend, settings))
            }
        })
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StrategyKind {
    type Err = ForecastError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::iter()
            .find(|k| k.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ForecastError::UnknownStrategy(s.to_string()))
    }
}

impl TryFrom<String> for StrategyKind {
    type Error = ForecastError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<StrategyKind> for String {
    fn from(kind: StrategyKind) -> Self {
        kind.as_str().to_string()
    }
}

/// Everything a strategy may consume for one quantity.
#[derive(Debug, Clone)]
pub struct StrategyInput {
    pub history: HistoryWindow,
    /// One covariate vector per slot, only used by the bootstrap variant
    pub covariates: Option<Vec<Vec<f64>>>,
}

impl StrategyInput {
    pub fn from_history(history: HistoryWindow) -> Self {
        Self {
            history,
            covariates: None,
        }
    }

    pub(crate) fn require_days(&self, required: usize) -> Result<(), ForecastError> {
        let actual = self.history.days();
        if actual < required {
            return Err(ForecastError::InsufficientHistory { required, actual });
        }
        Ok(())
    }
}

/// Band forecast plus reporting diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuantityForecast {
    pub band: BandForecast,
    /// Silhouette of the scenario reduction, when one was performed
    pub silhouette: Option<f64>,
}

impl QuantityForecast {
    pub fn plain(band: BandForecast) -> Self {
        Self {
            band,
            silhouette: None,
        }
    }
}

/// History window → band forecast.
///
/// Implementations are pure functions of their inputs and the supplied
/// generator, so the three quantities can be forecast in parallel.
pub trait ForecastStrategy: Send + Sync {
    fn kind(&self) -> StrategyKind;

    fn forecast(
        &self,
        input: &StrategyInput,
        quantity: Quantity,
        rng: &mut StdRng,
    ) -> Result<QuantityForecast, ForecastError>;
}

fn row_mean(row: ArrayView1<'_, f64>) -> f64 {
    row.mean().unwrap_or(0.0)
}

/// Index of the row whose mean is the median of all row means.
///
/// Ties keep the earlier row first.
pub fn median_row_by_mean(rows: &Array2<f64>) -> usize {
    let mut order: Vec<usize> = (0..rows.nrows()).collect();
    order.sort_by_key(|i| OrderedFloat(row_mean(rows.row(*i))));
    order[order.len() / 2]
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use rstest::rstest;

    #[rstest]
    #[case("NoClustering", StrategyKind::NoClustering)]
    #[case("BayesBoot", StrategyKind::BayesBoot)]
    #[case("Clustering", StrategyKind::Clustering)]
    #[case("ARIMA", StrategyKind::Arima)]
    #[case("markovchain", StrategyKind::MarkovChain)]
    fn test_parse_strategy(#[case] name: &str, #[case] expected: StrategyKind) {
        assert_eq!(name.parse::<StrategyKind>().unwrap(), expected);
    }

    #[test]
    fn test_unknown_strategy_fails_fast() {
        let err = "Prophet".parse::<StrategyKind>().unwrap_err();
        assert!(matches!(err, ForecastError::UnknownStrategy(ref s) if s == "Prophet"));
    }

    #[test]
    fn test_strategy_serde_round_trip_names() {
        let json = serde_json::to_string(&StrategyKind::Arima).unwrap();
        assert_eq!(json, "\"ARIMA\"");
        assert!(serde_json::from_str::<StrategyKind>("\"Nope\"").is_err());
    }

    #[test]
    fn test_bootstrap_needs_backend() {
        let err = StrategyKind::BayesBoot
            .build(None, BootstrapSettings::default())
            .err()
            .unwrap();
        assert!(matches!(err, ForecastError::BackendUnavailable));
        assert!(StrategyKind::Clustering
            .build(None, BootstrapSettings::default())
            .is_ok());
    }

    #[test]
    fn test_median_row_by_mean() {
        let rows = array![[5.0, 5.0], [1.0, 1.0], [3.0, 3.0]];
        assert_eq!(median_row_by_mean(&rows), 2);
    }
}
