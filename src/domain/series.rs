use ndarray::{Array2, ArrayView1, Axis};
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Horizon
// ============================================================================

/// Number of 10-minute slots in one day.
pub const HORIZON: usize = 144;

/// Slot length in minutes.
pub const SLOT_MINUTES: i64 = 10;

/// One day of values at 10-minute cadence.
pub type TimeSeries = Vec<f64>;

// ============================================================================
// Quantity
// ============================================================================

/// Physical quantity forecast for the network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Quantity {
    /// PV generation (kW)
    Pv,
    /// Active power demand (kW)
    ActiveDemand,
    /// Reactive power demand (kVar)
    ReactiveDemand,
}

impl Quantity {
    pub const ALL: [Quantity; 3] = [Quantity::Pv, Quantity::ActiveDemand, Quantity::ReactiveDemand];

    /// Human readable label including the unit
    pub fn label(&self) -> &'static str {
        match self {
            Self::Pv => "PV power production (kW)",
            Self::ActiveDemand => "Demand active power (kW)",
            Self::ReactiveDemand => "Demand reactive power (kVar)",
        }
    }

    /// Threshold above the upper band edge counted as a positive violation
    pub fn positive_threshold(&self) -> f64 {
        match self {
            Self::Pv => 0.5,
            Self::ActiveDemand => 0.5,
            Self::ReactiveDemand => 0.1,
        }
    }

    /// Threshold below the lower band edge counted as a negative violation
    pub fn negative_threshold(&self) -> f64 {
        match self {
            Self::Pv => 0.1,
            Self::ActiveDemand => 0.2,
            Self::ReactiveDemand => 0.1,
        }
    }

    /// Offset added to the run seed so each quantity draws an independent stream
    pub fn seed_offset(&self) -> u64 {
        match self {
            Self::Pv => 1,
            Self::ActiveDemand => 2,
            Self::ReactiveDemand => 3,
        }
    }

    pub fn is_pv(&self) -> bool {
        matches!(self, Self::Pv)
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pv => write!(f, "pv"),
            Self::ActiveDemand => write!(f, "p_dem"),
            Self::ReactiveDemand => write!(f, "q_dem"),
        }
    }
}

// ============================================================================
// History window
// ============================================================================

/// `days × 144` matrix of past observations for one quantity.
///
/// Rows are chronological: row 0 is the oldest day, the last row is the most
/// recent one. Non-finite values are replaced by 0 on construction.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryWindow {
    values: Array2<f64>,
}

impl HistoryWindow {
    pub fn new(mut values: Array2<f64>) -> Self {
        values.mapv_inplace(|v| if v.is_finite() { v } else { 0.0 });
        Self { values }
    }

    /// Build a window from a flat chronological series of `days * 144` values.
    pub fn from_flat(values: Vec<f64>, days: usize) -> Option<Self> {
        if values.len() != days * HORIZON {
            return None;
        }
        Array2::from_shape_vec((days, HORIZON), values).ok().map(Self::new)
    }

    pub fn from_rows(rows: &[Vec<f64>]) -> Option<Self> {
        if rows.iter().any(|r| r.len() != HORIZON) {
            return None;
        }
        let flat: Vec<f64> = rows.iter().flatten().copied().collect();
        Self::from_flat(flat, rows.len())
    }

    pub fn days(&self) -> usize {
        self.values.nrows()
    }

    pub fn values(&self) -> &Array2<f64> {
        &self.values
    }

    pub fn row(&self, day: usize) -> ArrayView1<'_, f64> {
        self.values.row(day)
    }

    /// The `n` most recent days, still in chronological order.
    pub fn most_recent(&self, n: usize) -> Array2<f64> {
        let start = self.days().saturating_sub(n);
        self.values.slice(ndarray::s![start.., ..]).to_owned()
    }

    /// Days concatenated oldest first.
    pub fn flatten(&self) -> Vec<f64> {
        self.values.iter().copied().collect()
    }

    /// Keep only the rows selected by `mask`.
    pub fn select_days(&self, mask: &[bool]) -> Array2<f64> {
        let idx: Vec<usize> = mask
            .iter()
            .enumerate()
            .filter_map(|(i, keep)| keep.then_some(i))
            .collect();
        self.values.select(Axis(0), &idx)
    }
}
