use ndarray::{Array2, ArrayView1, Axis};
use serde::{Deserialize, Serialize};

use super::{TimeSeries, HORIZON};

/// Central trajectory with asymmetric error margins.
///
/// The envelope at slot `t` is `[center[t] - lower[t], center[t] + upper[t]]`.
/// Both margins are non-negative for every strategy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BandForecast {
    pub center: TimeSeries,
    pub upper_margin: TimeSeries,
    pub lower_margin: TimeSeries,
}

impl BandForecast {
    /// Envelope spanned by `trajectories` (rows) around `center`.
    ///
    /// Margins are `max_over_rows - center` and `center - min_over_rows`,
    /// floored at zero so a center outside the trajectory set still yields a
    /// valid band.
    pub fn around(center: ArrayView1<'_, f64>, trajectories: &Array2<f64>) -> Self {
        let max = trajectories.fold_axis(Axis(0), f64::NEG_INFINITY, |a, &b| a.max(b));
        let min = trajectories.fold_axis(Axis(0), f64::INFINITY, |a, &b| a.min(b));

        let upper_margin = max
            .iter()
            .zip(center.iter())
            .map(|(hi, c)| (hi - c).max(0.0))
            .collect();
        let lower_margin = min
            .iter()
            .zip(center.iter())
            .map(|(lo, c)| (c - lo).max(0.0))
            .collect();

        Self {
            center: center.to_vec(),
            upper_margin,
            lower_margin,
        }
    }

    /// Band from `[low, median, high]` triples, one per slot.
    pub fn from_quantiles(triples: &[[f64; 3]], scale: f64) -> Self {
        let center = triples.iter().map(|[_, median, _]| median * scale).collect();
        let upper_margin = triples
            .iter()
            .map(|[_, median, high]| ((high - median) * scale).max(0.0))
            .collect();
        let lower_margin = triples
            .iter()
            .map(|[low, median, _]| ((median - low) * scale).max(0.0))
            .collect();
        Self {
            center,
            upper_margin,
            lower_margin,
        }
    }

    /// Constant center with zero margins
    pub fn flat(value: f64) -> Self {
        Self {
            center: vec![value; HORIZON],
            upper_margin: vec![0.0; HORIZON],
            lower_margin: vec![0.0; HORIZON],
        }
    }

    pub fn len(&self) -> usize {
        self.center.len()
    }

    pub fn is_empty(&self) -> bool {
        self.center.is_empty()
    }

    /// Clamp center and margins to be non-negative (physical generation).
    pub fn clamp_non_negative(&mut self) {
        for v in self
            .center
            .iter_mut()
            .chain(self.upper_margin.iter_mut())
            .chain(self.lower_margin.iter_mut())
        {
            *v = v.max(0.0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_around_computes_envelope() {
        let rows = array![[1.0, 2.0], [3.0, 0.0], [2.0, 1.0]];
        let band = BandForecast::around(rows.row(2), &rows);
        assert_eq!(band.center, vec![2.0, 1.0]);
        assert_eq!(band.upper_margin, vec![1.0, 1.0]);
        assert_eq!(band.lower_margin, vec![1.0, 1.0]);
    }

    #[test]
    fn test_from_quantiles_scales() {
        let band = BandForecast::from_quantiles(&[[1.0, 2.0, 4.0]], 0.5);
        assert_eq!(band.center, vec![1.0]);
        assert_eq!(band.upper_margin, vec![1.0]);
        assert_eq!(band.lower_margin, vec![0.5]);
    }

    #[test]
    fn test_clamp_non_negative() {
        let mut band = BandForecast {
            center: vec![-1.0, 2.0],
            upper_margin: vec![0.5, 0.5],
            lower_margin: vec![0.0, 3.0],
        };
        band.clamp_non_negative();
        assert_eq!(band.center, vec![0.0, 2.0]);
        assert_eq!(band.lower_margin, vec![0.0, 3.0]);
    }
}
