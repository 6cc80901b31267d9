use ndarray::Array2;
use rand::distributions::{Distribution, WeightedIndex};
use rand::Rng;

use super::{ScenarioError, ScenarioSet, TransitionMatrix};

/// Number of sample paths drawn per forecast.
pub const MARKOV_SCENARIOS: usize = 30;

/// Discrete-state chain that can be sampled step by step.
pub struct MarkovChain {
    matrix: TransitionMatrix,
    rows: Vec<WeightedIndex<f64>>,
}

impl MarkovChain {
    pub fn new(matrix: TransitionMatrix) -> Result<Self, ScenarioError> {
        let rows = matrix
            .as_array()
            .rows()
            .into_iter()
            .enumerate()
            .map(|(i, row)| {
                WeightedIndex::new(row.iter().copied()).map_err(|e| {
                    ScenarioError::InvalidTransitionRow {
                        row: i,
                        reason: e.to_string(),
                    }
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { matrix, rows })
    }

    pub fn size(&self) -> usize {
        self.matrix.size()
    }

    /// Sample a path of `length` states; the first element is `initial`.
    pub fn simulate<R: Rng + ?Sized>(
        &self,
        initial: usize,
        length: usize,
        rng: &mut R,
    ) -> Result<Vec<usize>, ScenarioError> {
        if initial >= self.size() {
            return Err(ScenarioError::InvalidInitialState {
                state: initial,
                size: self.size(),
            });
        }

        let mut path = Vec::with_capacity(length);
        let mut state = initial;
        for _ in 0..length {
            path.push(state);
            state = self.rows[state].sample(rng);
        }
        Ok(path)
    }
}

/// Maps chain states back to physical values slot by slot.
///
/// `value[t] = low[t] + state / (size - 1) * (high[t] - low[t])`
#[derive(Debug, Clone, PartialEq)]
pub struct StateScale {
    pub low: Vec<f64>,
    pub high: Vec<f64>,
}

impl StateScale {
    /// Same range for every slot
    pub fn uniform(low: f64, high: f64, horizon: usize) -> Self {
        Self {
            low: vec![low; horizon],
            high: vec![high; horizon],
        }
    }

    /// Per-slot minimum and maximum over the given days (rows).
    pub fn per_slot_range(days: &Array2<f64>) -> Self {
        let low = days
            .columns()
            .into_iter()
            .map(|c| c.iter().copied().fold(f64::INFINITY, f64::min))
            .collect();
        let high = days
            .columns()
            .into_iter()
            .map(|c| c.iter().copied().fold(f64::NEG_INFINITY, f64::max))
            .collect();
        Self { low, high }
    }

    pub fn apply(&self, path: &[usize], size: usize) -> Vec<f64> {
        let denom = size.saturating_sub(1).max(1) as f64;
        path.iter()
            .enumerate()
            .map(|(t, state)| {
                let x = *state as f64 / denom;
                self.low[t] + x * (self.high[t] - self.low[t])
            })
            .collect()
    }
}

/// Draws a [`ScenarioSet`] from a chain and rescales it.
pub struct ScenarioSynthesizer {
    pub chain: MarkovChain,
    pub scale: StateScale,
    pub initial_state: usize,
    pub count: usize,
}

impl ScenarioSynthesizer {
    pub fn synthesize<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<ScenarioSet, ScenarioError> {
        let horizon = self.scale.low.len();
        let mut out = Array2::zeros((self.count, horizon));
        for mut row in out.rows_mut() {
            let path = self.chain.simulate(self.initial_state, horizon, rng)?;
            let values = self.scale.apply(&path, self.chain.size());
            row.iter_mut().zip(values).for_each(|(dst, v)| *dst = v);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use rand::{rngs::StdRng, SeedableRng};

    #[test]
    fn test_absorbing_chain_stays_put() {
        let tm = TransitionMatrix::estimate(&[], 3);
        let chain = MarkovChain::new(tm).unwrap();
        let mut rng = StdRng::seed_from_u64(1);
        let path = chain.simulate(2, 10, &mut rng).unwrap();
        assert_eq!(path, vec![2; 10]);
    }

    #[test]
    fn test_deterministic_cycle() {
        // 0 -> 1 -> 2 -> 0
        let tm = TransitionMatrix::estimate(&[0, 1, 2, 0, 1, 2, 0], 2);
        let chain = MarkovChain::new(tm).unwrap();
        let mut rng = StdRng::seed_from_u64(3);
        assert_eq!(chain.simulate(0, 5, &mut rng).unwrap(), vec![0, 1, 2, 0, 1]);
    }

    #[test]
    fn test_invalid_initial_state() {
        let chain = MarkovChain::new(TransitionMatrix::estimate(&[], 2)).unwrap();
        let mut rng = StdRng::seed_from_u64(3);
        assert!(matches!(
            chain.simulate(5, 3, &mut rng),
            Err(ScenarioError::InvalidInitialState { state: 5, size: 3 })
        ));
    }

    #[test]
    fn test_state_scale() {
        let scale = StateScale::uniform(1.0, 3.0, 3);
        // size 5 -> states map to 0, 0.25, .., 1
        assert_eq!(scale.apply(&[0, 2, 4], 5), vec![1.0, 2.0, 3.0]);

        let days = array![[0.0, 4.0], [2.0, 8.0]];
        let per_slot = StateScale::per_slot_range(&days);
        assert_eq!(per_slot.low, vec![0.0, 4.0]);
        assert_eq!(per_slot.high, vec![2.0, 8.0]);
    }

    #[test]
    fn test_synthesizer_is_reproducible_with_seed() {
        let tm = TransitionMatrix::estimate(&[0, 1, 2, 1, 0, 2, 2, 1, 0, 0, 1], 2);
        let synth = ScenarioSynthesizer {
            chain: MarkovChain::new(tm).unwrap(),
            scale: StateScale::uniform(0.0, 1.0, 20),
            initial_state: 1,
            count: MARKOV_SCENARIOS,
        };
        let a = synth.synthesize(&mut StdRng::seed_from_u64(11)).unwrap();
        let b = synth.synthesize(&mut StdRng::seed_from_u64(11)).unwrap();
        assert_eq!(a.dim(), (MARKOV_SCENARIOS, 20));
        assert_eq!(a, b);
        assert!(a.iter().all(|v| (0.0..=1.0).contains(v)));
    }
}
