use ndarray::Array2;
use serde::{Deserialize, Serialize};

/// Number of quantization bins used by the Markov-chain strategy.
pub const DEFAULT_DIGITS: usize = 20;

/// Normalized values at or below this level are dropped before quantization.
pub const NEAR_ZERO_FLOOR: f64 = 0.01;

/// Lower/upper quantiles used for demand normalization.
pub const LOW_QUANTILE: f64 = 1.0 / 20.0;
pub const HIGH_QUANTILE: f64 = 19.0 / 20.0;

/// How raw values are mapped onto `[0, 1]` before binning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Normalization {
    /// `(v - min) / (max - min)` over all values
    MinMax,
    /// `(v - q05) / (q95 - q05)` over all values
    Quantile,
}

/// Linear-interpolated quantile of `values` (`q` in `[0, 1]`).
pub fn quantile(values: &[f64], q: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let pos = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}

/// Bin index of a normalized value.
///
/// Edges sit at `0.05, 0.10, ..., 0.95` (for 20 digits); a value lands in bin
/// `i` when `edge[i-1] < v <= edge[i]`, values above the last edge land in
/// bin `digits - 1`.
pub fn digitize(value: f64, digits: usize) -> usize {
    let step = 1.0 / digits as f64;
    (0..digits - 1)
        .map(|i| step * (i + 1) as f64)
        .take_while(|edge| *edge < value)
        .count()
}

/// Range used to rescale normalized values back to physical units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NormalizationRange {
    pub low: f64,
    pub high: f64,
}

impl NormalizationRange {
    pub fn of(values: &[f64], normalization: Normalization) -> Self {
        match normalization {
            Normalization::MinMax => {
                let low = values.iter().copied().fold(f64::INFINITY, f64::min);
                let high = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
                if values.is_empty() {
                    Self { low: 0.0, high: 0.0 }
                } else {
                    Self { low, high }
                }
            }
            Normalization::Quantile => Self {
                low: quantile(values, LOW_QUANTILE),
                high: quantile(values, HIGH_QUANTILE),
            },
        }
    }

    pub fn width(&self) -> f64 {
        self.high - self.low
    }

    /// Maps `value` onto the unit range; a degenerate range maps everything to 0.
    pub fn normalize(&self, value: f64) -> f64 {
        let width = self.width();
        if width.abs() < 1e-12 {
            0.0
        } else {
            (value - self.low) / width
        }
    }
}

/// Quantize matched historical days into a state sequence.
///
/// Days are concatenated oldest first, normalized, stripped of near-zero
/// values (at or below [`NEAR_ZERO_FLOOR`]) and binned.
pub fn quantize_days(days: &Array2<f64>, normalization: Normalization, digits: usize) -> Vec<usize> {
    let flat: Vec<f64> = days.iter().copied().collect();
    let range = NormalizationRange::of(&flat, normalization);
    flat.iter()
        .map(|v| range.normalize(*v))
        .filter(|v| *v > NEAR_ZERO_FLOOR)
        .map(|v| digitize(v, digits))
        .collect()
}
