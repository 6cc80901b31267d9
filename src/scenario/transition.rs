use ndarray::{Array2, ArrayView1};

/// Row-stochastic transition matrix over `digits + 1` discrete states.
///
/// Every row sums to 1. A state never observed as a transition source keeps
/// a self-loop at its own index.
#[derive(Debug, Clone, PartialEq)]
pub struct TransitionMatrix {
    probabilities: Array2<f64>,
}

impl TransitionMatrix {
    /// Estimate the matrix from consecutive pairs of `states`.
    ///
    /// Labels above `digits` are folded into the top state.
    pub fn estimate(states: &[usize], digits: usize) -> Self {
        let n = digits + 1;
        let mut counts = Array2::<f64>::zeros((n, n));
        for pair in states.windows(2) {
            let from = pair[0].min(digits);
            let to = pair[1].min(digits);
            counts[[from, to]] += 1.0;
        }

        for (i, mut row) in counts.rows_mut().into_iter().enumerate() {
            let total: f64 = row.sum();
            if total > 0.0 {
                row.mapv_inplace(|c| c / total);
            } else {
                row[i] = 1.0;
            }
        }

        Self {
            probabilities: counts,
        }
    }

    /// Number of states
    pub fn size(&self) -> usize {
        self.probabilities.nrows()
    }

    pub fn row(&self, state: usize) -> ArrayView1<'_, f64> {
        self.probabilities.row(state)
    }

    pub fn as_array(&self) -> &Array2<f64> {
        &self.probabilities
    }

    /// Mean of the diagonal; high values mean the chain tends to stay put.
    pub fn persistence(&self) -> f64 {
        self.probabilities.diag().mean().unwrap_or(0.0)
    }
}
