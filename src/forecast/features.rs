//! Lag feature engineering for the regression strategies
//!
//! All helpers work on a flattened chronological series (days concatenated
//! oldest first) and produce one feature row per target slot.

use crate::domain::HORIZON;

/// Day-lag design matrix: feature `k` of row `i` is `series[i - lags[k]]`.
///
/// Only rows where every lag is available are kept. Returns `(x, y)`.
pub fn create_lag_features(series: &[f64], lags: &[usize]) -> (Vec<Vec<f64>>, Vec<f64>) {
    let start = lags.iter().copied().max().unwrap_or(0);
    let mut x = Vec::with_capacity(series.len().saturating_sub(start));
    let mut y = Vec::with_capacity(series.len().saturating_sub(start));

    for i in start..series.len() {
        x.push(lags.iter().map(|lag| series[i - lag]).collect());
        y.push(series[i]);
    }

    (x, y)
}

/// Feature rows for the `HORIZON` slots following the end of `series`.
///
/// Lags shorter than the horizon would need unknown values; those entries
/// and any reaching before the start of the series become `None`.
fn future_rows(series: &[f64], lags: &[usize]) -> Vec<Vec<Option<f64>>> {
    let n = series.len();
    (n..n + HORIZON)
        .map(|i| {
            lags.iter()
                .map(|lag| {
                    i.checked_sub(*lag)
                        .filter(|idx| *idx < n)
                        .map(|idx| series[idx])
                })
                .collect()
        })
        .collect()
}

/// Next-day rows for a model trained with [`create_lag_features`].
pub fn next_day_features(series: &[f64], lags: &[usize]) -> Vec<Vec<f64>> {
    future_rows(series, lags)
        .into_iter()
        .map(|row| row.into_iter().map(|v| v.unwrap_or(0.0)).collect())
        .collect()
}

/// Lag matrix over every slot of the series, with gaps filled by column means.
#[derive(Debug, Clone)]
pub struct LagMatrix {
    pub x: Vec<Vec<f64>>,
    pub y: Vec<f64>,
    pub column_means: Vec<f64>,
}

impl LagMatrix {
    /// Row `i` holds `series[i - lag]` for each lag; leading rows without
    /// enough history take the mean of the available values in that column.
    pub fn build(series: &[f64], lags: &[usize]) -> Self {
        let raw: Vec<Vec<Option<f64>>> = (0..series.len())
            .map(|i| {
                lags.iter()
                    .map(|lag| i.checked_sub(*lag).map(|idx| series[idx]))
                    .collect()
            })
            .collect();

        let column_means: Vec<f64> = (0..lags.len())
            .map(|k| {
                let present: Vec<f64> = raw.iter().filter_map(|row| row[k]).collect();
                if present.is_empty() {
                    0.0
                } else {
                    present.iter().sum::<f64>() / present.len() as f64
                }
            })
            .collect();

        let x = raw
            .into_iter()
            .map(|row| fill(row, &column_means))
            .collect();

        Self {
            x,
            y: series.to_vec(),
            column_means,
        }
    }

    /// Next-day feature rows, filled with the training column means.
    pub fn next_day(&self, lags: &[usize]) -> Vec<Vec<f64>> {
        future_rows(&self.y, lags)
            .into_iter()
            .map(|row| fill(row, &self.column_means))
            .collect()
    }
}

fn fill(row: Vec<Option<f64>>, means: &[f64]) -> Vec<f64> {
    row.into_iter()
        .zip(means)
        .map(|(v, m)| v.unwrap_or(*m))
        .collect()
}

/// Population standard deviation of each slot across days.
///
/// `residuals` is a flat chronological series whose length is a multiple of
/// the horizon.
pub fn slot_std(residuals: &[f64]) -> Vec<f64> {
    let days = residuals.len() / HORIZON;
    if days == 0 {
        return vec![0.0; HORIZON];
    }
    (0..HORIZON)
        .map(|t| {
            let column: Vec<f64> = (0..days).map(|d| residuals[d * HORIZON + t]).collect();
            let mean = column.iter().sum::<f64>() / days as f64;
            let variance = column.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / days as f64;
            variance.sqrt()
        })
        .collect()
}
