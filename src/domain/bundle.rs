use serde::{Deserialize, Serialize};

use super::{BandForecast, TimeSeries, HORIZON};

/// Default voltage margin (p.u.) on both voltage rows.
pub const DEFAULT_VOLTAGE_MARGIN: f64 = 0.03;

/// Default state-of-charge settings: capacity, initial and final SoC.
pub const DEFAULT_SOC: [f64; 3] = [50.0, 0.75, 0.75];

/// Per-row constant prices of the 6 × 144 price matrix.
pub const DEFAULT_PRICES: [f64; 6] = [10.0, 0.0, 1.0, 1.0, 0.5, 0.5];

/// Everything the dispatch optimizer needs for one day.
///
/// The grid descriptor is passed through untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultBundle {
    pub grid: serde_json::Value,
    /// 2 × 144
    pub voltage_margin: Vec<TimeSeries>,
    pub pv: BandForecast,
    pub active_demand: BandForecast,
    pub reactive_demand: BandForecast,
    pub soc: [f64; 3],
    /// 6 × 144
    pub prices: Vec<TimeSeries>,
    pub robustness: f64,
}

impl ResultBundle {
    /// Assemble a bundle with the default voltage, SoC and price settings.
    ///
    /// PV center and margins are clamped to be non-negative.
    pub fn assemble(
        grid: serde_json::Value,
        mut pv: BandForecast,
        active_demand: BandForecast,
        reactive_demand: BandForecast,
        robustness: f64,
    ) -> Self {
        pv.clamp_non_negative();
        Self {
            grid,
            voltage_margin: vec![vec![DEFAULT_VOLTAGE_MARGIN; HORIZON]; 2],
            pv,
            active_demand,
            reactive_demand,
            soc: DEFAULT_SOC,
            prices: DEFAULT_PRICES.iter().map(|p| vec![*p; HORIZON]).collect(),
            robustness,
        }
    }
}

/// Dispatch schedule returned by the optimizer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizerResponse {
    pub active_power: TimeSeries,
    pub reactive_power: TimeSeries,
    pub reserve_active_up: TimeSeries,
    pub reserve_active_down: TimeSeries,
    pub reserve_reactive_up: TimeSeries,
    pub reserve_reactive_down: TimeSeries,
    pub soc_desired: Vec<f64>,
    pub prices: Vec<TimeSeries>,
    pub objective: f64,
}
