//! Quantile-regression bootstrap strategy
//!
//! The quantile model itself lives outside this crate. A [`BootstrapBackend`]
//! answers one `[low, median, high]` triple per horizon step; the strategy
//! turns those into a band and applies the per-quantity unit conversion.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{ForecastError, ForecastStrategy, QuantityForecast, StrategyInput, StrategyKind};
use crate::domain::{BandForecast, Quantity, HORIZON};
use crate::process::{block_on, JsonProcess};

/// External quantile model queried one horizon step at a time.
pub trait BootstrapBackend: Send + Sync {
    /// `[low, median, high]` for horizon step `step` (1-based).
    fn quantiles(
        &self,
        quantity: Quantity,
        covariates: &[f64],
        step: usize,
        n_boot: usize,
    ) -> anyhow::Result<[f64; 3]>;

    /// Triples for every step of the horizon; `covariates[t]` feeds step `t + 1`.
    fn quantiles_for_day(
        &self,
        quantity: Quantity,
        covariates: &[Vec<f64>],
        n_boot: usize,
    ) -> anyhow::Result<Vec<[f64; 3]>> {
        covariates
            .iter()
            .enumerate()
            .map(|(i, row)| self.quantiles(quantity, row, i + 1, n_boot))
            .collect()
    }
}

/// Bootstrap sample count and output scaling.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BootstrapSettings {
    pub n_boot: usize,
    /// Irradiance (W/m²) to PV power (kW)
    pub irradiance_to_power: f64,
    pub active_factor: f64,
    pub reactive_factor: f64,
}

impl Default for BootstrapSettings {
    fn default() -> Self {
        Self {
            n_boot: 10,
            irradiance_to_power: 6.21 / 1000.0,
            active_factor: 0.1,
            reactive_factor: 0.1,
        }
    }
}

impl BootstrapSettings {
    pub fn scale_for(&self, quantity: Quantity) -> f64 {
        match quantity {
            Quantity::Pv => self.irradiance_to_power,
            Quantity::ActiveDemand => self.active_factor,
            Quantity::ReactiveDemand => self.reactive_factor,
        }
    }
}

pub struct BootstrapStrategy {
    backend: Arc<dyn BootstrapBackend>,
    settings: BootstrapSettings,
}

impl BootstrapStrategy {
    pub fn new(backend: Arc<dyn BootstrapBackend>, settings: BootstrapSettings) -> Self {
        Self { backend, settings }
    }
}

impl ForecastStrategy for BootstrapStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::BayesBoot
    }

    fn forecast(
        &self,
        input: &StrategyInput,
        quantity: Quantity,
        _rng: &mut StdRng,
    ) -> Result<QuantityForecast, ForecastError> {
        let covariates = input
            .covariates
            .as_deref()
            .ok_or(ForecastError::MissingCovariates)?;
        if covariates.len() < HORIZON {
            return Err(ForecastError::Bootstrap(format!(
                "expected {} covariate rows, got {}",
                HORIZON,
                covariates.len()
            )));
        }

        info!(%quantity, n_boot = self.settings.n_boot, "Querying bootstrap backend");
        let triples = self
            .backend
            .quantiles_for_day(quantity, &covariates[..HORIZON], self.settings.n_boot)
            .map_err(|e| ForecastError::Bootstrap(format!("{:#}", e)))?;

        Ok(QuantityForecast::plain(BandForecast::from_quantiles(
            &triples,
            self.settings.scale_for(quantity),
        )))
    }
}

#[derive(Debug, Serialize)]
struct QuantileRequest<'a> {
    quantity: Quantity,
    covariates: &'a [f64],
    step: usize,
    n_boot: usize,
}

/// Backend that runs a program per step, writing the request as JSON to its
/// stdin and reading a `[low, median, high]` array from its stdout.
///
/// Each call is bounded by the process timeout; a child that outlives it is
/// killed.
#[derive(Debug, Clone)]
pub struct CommandBootstrapBackend {
    process: JsonProcess,
}

impl CommandBootstrapBackend {
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

    pub fn new(program: impl Into<PathBuf>, args: Vec<String>) -> Self {
        Self {
            process: JsonProcess::new(program, args, Self::DEFAULT_TIMEOUT),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.process.timeout = timeout;
        self
    }
}

impl BootstrapBackend for CommandBootstrapBackend {
    fn quantiles(
        &self,
        quantity: Quantity,
        covariates: &[f64],
        step: usize,
        n_boot: usize,
    ) -> anyhow::Result<[f64; 3]> {
        let request = serde_json::to_vec(&QuantileRequest {
            quantity,
            covariates,
            step,
            n_boot,
        })?;

        let output = block_on(self.process.exchange(&request))??;
        let triple: [f64; 3] = serde_json::from_slice(&output)
            .with_context(|| format!("Invalid quantile response for step {}", step))?;
        debug!(%quantity, step, ?triple, "bootstrap quantiles");
        Ok(triple)
    }
}
