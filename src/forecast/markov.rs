use ndarray::{Array1, Array2};
use rand::rngs::StdRng;
use rand::Rng;
use tracing::debug;

use super::features::LagMatrix;
use super::{
    ForecastError, ForecastStrategy, QuantityForecast, StrategyInput, StrategyKind,
    MIN_HISTORY_DAYS,
};
use crate::domain::{BandForecast, Quantity, HORIZON};
use crate::ml::LagForest;
use crate::scenario::{
    quantize_days, reduce, KMeans, MarkovChain, Normalization, NormalizationRange, Reduction,
    ScenarioSynthesizer, StateScale, TransitionMatrix, DEFAULT_DIGITS, MARKOV_SCENARIOS,
};

/// Number of consecutive day-lags fed to the forest (144..184).
const FOREST_LAGS: usize = 40;

/// Random-forest point forecast with Markov-chain scenario margins.
///
/// The point forecast selects the historical days whose cluster it falls in;
/// those days are quantized into a discrete-state chain, sampled, rescaled
/// and reduced to three representatives with the point forecast forced in.
pub struct MarkovChainStrategy {
    pub digits: usize,
    pub scenarios: usize,
    pub trees: usize,
}

impl Default for MarkovChainStrategy {
    fn default() -> Self {
        Self {
            digits: DEFAULT_DIGITS,
            scenarios: MARKOV_SCENARIOS,
            trees: 50,
        }
    }
}

fn lags() -> Vec<usize> {
    (HORIZON..HORIZON + FOREST_LAGS).collect()
}

impl MarkovChainStrategy {
    fn point_forecast(
        &self,
        series: &[f64],
        rng: &mut StdRng,
    ) -> Result<Array1<f64>, ForecastError> {
        let lags = lags();
        let matrix = LagMatrix::build(series, &lags);

        let mut params = LagForest::default_parameters(rng.gen());
        params.n_trees = self.trees;
        let forest = LagForest::train(&matrix.x, &matrix.y, params)?;
        debug!(rmse = forest.summary.rmse, trees = forest.n_trees, "lag forest trained");

        Ok(Array1::from(forest.predict(&matrix.next_day(&lags))?))
    }

    /// Normalization and initial state per quantity.
    fn chain_setup(&self, quantity: Quantity) -> (Normalization, usize) {
        if quantity.is_pv() {
            (Normalization::MinMax, 0)
        } else {
            (Normalization::Quantile, self.digits / 2)
        }
    }

    /// Point forecast and the reduced scenario set it was forced into.
    pub(crate) fn reduced(
        &self,
        input: &StrategyInput,
        quantity: Quantity,
        rng: &mut StdRng,
    ) -> Result<(Array1<f64>, Reduction), ForecastError> {
        input.require_days(MIN_HISTORY_DAYS)?;
        let history = input.history.values();
        let point = self.point_forecast(&input.history.flatten(), rng)?;

        let days = KMeans::default().fit(history)?;
        let cluster = days.predict(point.view());
        let mut mask: Vec<bool> = days.labels.iter().map(|l| *l == cluster).collect();
        if !mask.iter().any(|m| *m) {
            mask.iter_mut().for_each(|m| *m = true);
        }
        let matched = input.history.select_days(&mask);

        let (normalization, initial_state) = self.chain_setup(quantity);
        let states = quantize_days(&matched, normalization, self.digits);
        let matrix = TransitionMatrix::estimate(&states, self.digits);
        debug!(
            %quantity,
            matched_days = matched.nrows(),
            states = states.len(),
            persistence = matrix.persistence(),
            "transition matrix estimated"
        );

        let synthesizer = ScenarioSynthesizer {
            chain: MarkovChain::new(matrix)?,
            scale: state_scale(&matched, normalization),
            initial_state,
            count: self.scenarios,
        };
        let scenarios = synthesizer.synthesize(rng)?;
        let reduction = reduce(&scenarios, Some(point.view()), Some(history))?;
        Ok((point, reduction))
    }
}

/// Physical range the chain states are mapped back onto.
///
/// PV spans the per-slot minimum to maximum of the matched days, so state 0
/// is the lowest observed value at that slot rather than zero generation.
/// Demands share one q05..q95 range over all matched values.
fn state_scale(matched: &Array2<f64>, normalization: Normalization) -> StateScale {
    match normalization {
        Normalization::MinMax => StateScale::per_slot_range(matched),
        Normalization::Quantile => {
            let flat: Vec<f64> = matched.iter().copied().collect();
            let range = NormalizationRange::of(&flat, normalization);
            StateScale::uniform(range.low, range.high, HORIZON)
        }
    }
}

impl ForecastStrategy for MarkovChainStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::MarkovChain
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
