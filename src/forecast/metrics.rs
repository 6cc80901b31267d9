//! Band forecast validation
//!
//! Compares a band forecast against realized data for the same calendar day:
//! normalized RMS error of the center and the rates at which realized values
//! leave the band by more than a per-quantity threshold.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::{BandForecast, Quantity, TimeSeries};

/// Validation diagnostics for one quantity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub quantity: Quantity,
    /// `sqrt(Σ(center - realized)² / Σ center²)`
    pub normalized_error: f64,
    /// Share of samples above `center + upper + threshold`
    pub positive_violation_rate: f64,
    /// Share of samples below `center - lower - threshold`
    pub negative_violation_rate: f64,
    /// Number of (row, slot) pairs evaluated
    pub sample_count: usize,
}

impl ValidationReport {
    /// Evaluate `band` against every realized row.
    ///
    /// Each row must have the band's length. A zero denominator yields 0 when
    /// the numerator is also 0 and infinity otherwise.
    pub fn calculate(
        band: &BandForecast,
        realized: &[TimeSeries],
        quantity: Quantity,
    ) -> Result<Self, ValidationError> {
        if realized.is_empty() || band.is_empty() {
            return Err(ValidationError::EmptyData);
        }
        if let Some(row) = realized.iter().find(|r| r.len() != band.len()) {
            return Err(ValidationError::DimensionMismatch {
                forecast: band.len(),
                realized: row.len(),
            });
        }

        let pos_threshold = quantity.positive_threshold();
        let neg_threshold = quantity.negative_threshold();

        let mut squared_error = 0.0;
        let mut squared_center = 0.0;
        let mut positive = 0usize;
        let mut negative = 0usize;

        for row in realized {
            for (t, actual) in row.iter().enumerate() {
                let center = band.center[t];
                squared_error += (center - actual).powi(2);
                squared_center += center.powi(2);

                if actual - center - band.upper_margin[t] > pos_threshold {
                    positive += 1;
                }
                if center - band.lower_margin[t] - actual > neg_threshold {
                    negative += 1;
                }
            }
        }

        let normalized_error = if squared_center > 0.0 {
            (squared_error / squared_center).sqrt()
        } else if squared_error == 0.0 {
            0.0
        } else {
            f64::INFINITY
        };

        let sample_count = realized.len() * band.len();
        Ok(Self {
            quantity,
            normalized_error,
            positive_violation_rate: positive as f64 / sample_count as f64,
            negative_violation_rate: negative as f64 / sample_count as f64,
            sample_count,
        })
    }

    /// Total share of samples outside the band
    pub fn band_deviation(&self) -> f64 {
        self.positive_violation_rate + self.negative_violation_rate
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: error={:.2}%, band deviation={:.2}% (above={:.2}%, below={:.2}%)",
            self.quantity,
            self.normalized_error * 100.0,
            self.band_deviation() * 100.0,
            self.positive_violation_rate * 100.0,
            self.negative_violation_rate * 100.0
        )
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("Dimension mismatch: forecast={forecast}, realized={realized}")]
    DimensionMismatch { forecast: usize, realized: usize },

    #[error("Empty data provided")]
    EmptyData,
}
