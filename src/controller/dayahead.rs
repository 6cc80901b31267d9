use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use itertools::Itertools;
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::config::Config;
use crate::data::{covariates, history_window, realized_window, DataError, MeasurementTable};
use crate::domain::{BandForecast, Quantity, ResultBundle, TimeSeries};
use crate::forecast::{
    BootstrapBackend, BootstrapSettings, CommandBootstrapBackend, ForecastEngine, ForecastError,
    QuantityForecast, SeedPolicy, StrategyInput, StrategyKind, ValidationError, ValidationReport,
};
use crate::optimizer::{
    ArchiveOutcome, HandoffError, OptimizerHandoff, ProcessOptimizer, ResultStore, StoreError,
};
use crate::repo::{HistoricalSource, Repositories, TopologySource};

/// Steps of one day-ahead run, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum Phase {
    SelectStrategy,
    LoadHistory,
    Forecast,
    Validate,
    Assemble,
    PersistWorking,
    InvokeOptimizer,
    CollectResult,
    PersistArchive,
    Done,
}

/// Parameters of one run. Data up to `date` is used to forecast `date + 1`.
#[derive(Debug, Clone, PartialEq)]
pub struct DayAheadRequest {
    pub robustness: f64,
    pub strategy: StrategyKind,
    pub date: NaiveDate,
    pub previous_days: usize,
}

impl DayAheadRequest {
    pub const DEFAULT_PREVIOUS_DAYS: usize = 10;

    pub fn new(robustness: f64, strategy: StrategyKind, date: NaiveDate) -> Self {
        Self {
            robustness,
            strategy,
            date,
            previous_days: Self::DEFAULT_PREVIOUS_DAYS,
        }
    }

    pub fn with_previous_days(mut self, days: usize) -> Self {
        self.previous_days = days;
        self
    }

    pub fn forecast_date(&self) -> NaiveDate {
        self.date.succ_opt().unwrap_or(self.date)
    }
}

/// Forecast outcome of one quantity, `None` on success.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuantityStatus {
    pub quantity: Quantity,
    pub error: Option<String>,
}

/// Per-quantity band and diagnostics of a finished run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuantityReport {
    pub quantity: Quantity,
    pub forecast: QuantityForecast,
    /// `None` when realized data for the forecast day is not available
    pub validation: Option<ValidationReport>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DayAheadOutcome {
    pub objective: f64,
    pub success: bool,
    pub quantities: Vec<QuantityReport>,
    pub archive_written: bool,
}

impl DayAheadOutcome {
    pub fn report(&self, quantity: Quantity) -> Option<&QuantityReport> {
        self.quantities.iter().find(|r| r.quantity == quantity)
    }
}

fn describe(statuses: &[QuantityStatus]) -> String {
    statuses
        .iter()
        .map(|s| match &s.error {
            Some(e) => format!("{}: {}", s.quantity, e),
            None => format!("{}: ok", s.quantity),
        })
        .join("; ")
}

#[derive(Debug, Error)]
pub enum DayAheadError {
    #[error("Strategy selection failed: {0}")]
    Strategy(#[source] ForecastError),

    #[error("{phase} failed: {source:#}")]
    Source {
        phase: Phase,
        #[source]
        source: anyhow::Error,
    },

    #[error("{phase} failed for {quantity}: {source}")]
    Data {
        phase: Phase,
        quantity: Quantity,
        #[source]
        source: DataError,
    },

    /// At least one quantity failed. `forecasts` keeps the bands of the
    /// quantities that succeeded.
    #[error("Forecast failed ({})", describe(.statuses))]
    Forecast {
        statuses: Vec<QuantityStatus>,
        forecasts: Vec<(Quantity, QuantityForecast)>,
    },

    #[error("Validation failed for {quantity}: {source}")]
    Validation {
        quantity: Quantity,
        #[source]
        source: ValidationError,
    },

    #[error("{phase} failed: {source}")]
    Store {
        phase: Phase,
        #[source]
        source: StoreError,
    },

    #[error("Optimizer handoff failed: {0}")]
    Handoff(#[from] HandoffError),
}

impl DayAheadError {
    pub fn phase(&self) -> Phase {
        match self {
            Self::Strategy(_) => Phase::SelectStrategy,
            Self::Source { phase, .. } | Self::Data { phase, .. } | Self::Store { phase, .. } => *phase,
            Self::Forecast { .. } => Phase::Forecast,
            Self::Validation { .. } => Phase::Validate,
            Self::Handoff(_) => Phase::InvokeOptimizer,
        }
    }

    /// Quantity the failure is attributed to, when there is a single one.
    pub fn quantity(&self) -> Option<Quantity> {
        match self {
            Self::Data { quantity, .. } | Self::Validation { quantity, .. } => Some(*quantity),
            Self::Forecast { statuses, .. } => {
                let mut failed = statuses.iter().filter(|s| s.error.is_some());
                match (failed.next(), failed.next()) {
                    (Some(only), None) => Some(only.quantity),
                    _ => None,
                }
            }
            _ => None,
        }
    }
}

/// Day-ahead pipeline: forecast, validate, hand off, archive.
pub struct DayAheadRunner {
    history: Arc<dyn HistoricalSource>,
    topology: Arc<dyn TopologySource>,
    optimizer: Arc<dyn OptimizerHandoff>,
    store: ResultStore,
    network: String,
    seeds: SeedPolicy,
    bootstrap: Option<Arc<dyn BootstrapBackend>>,
    bootstrap_settings: BootstrapSettings,
}

impl DayAheadRunner {
    pub fn new(
        repos: Repositories,
        optimizer: Arc<dyn OptimizerHandoff>,
        store: ResultStore,
        network: impl Into<String>,
    ) -> Self {
        Self {
            history: repos.history,
            topology: repos.topology,
            optimizer,
            store,
            network: network.into(),
            seeds: SeedPolicy::Entropy,
            bootstrap: None,
            bootstrap_settings: BootstrapSettings::default(),
        }
    }

    pub fn with_seeds(mut self, seeds: SeedPolicy) -> Self {
        self.seeds = seeds;
        self
    }

    pub fn with_bootstrap(
        mut self,
        backend: Arc<dyn BootstrapBackend>,
        settings: BootstrapSettings,
    ) -> Self {
        self.bootstrap = Some(backend);
        self.bootstrap_settings = settings;
        self
    }

    pub fn from_config(cfg: &Config) -> Self {
        let optimizer = ProcessOptimizer::new(&cfg.handoff.program, cfg.handoff.args.clone())
            .with_timeout(Duration::from_secs(cfg.handoff.timeout_seconds))
            .with_max_attempts(cfg.handoff.max_attempts);

        let mut runner = Self::new(
            Repositories::from_config(cfg),
            Arc::new(optimizer),
            ResultStore::new(&cfg.handoff.output_dir),
            cfg.grid.network.clone(),
        )
        .with_seeds(cfg.forecast.seed.into());

        runner.bootstrap_settings = cfg.bootstrap.settings;
        if let Some(program) = &cfg.bootstrap.program {
            let backend = CommandBootstrapBackend::new(program, cfg.bootstrap.args.clone())
                .with_timeout(Duration::from_secs(cfg.bootstrap.timeout_seconds));
            runner.bootstrap = Some(Arc::new(backend));
        }
        runner
    }

    pub fn store(&self) -> &ResultStore {
        &self.store
    }

    pub async fn run_day_ahead(
        &self,
        request: &DayAheadRequest,
    ) -> Result<DayAheadOutcome, DayAheadError> {
        let forecast_date = request.forecast_date();
        info!(
            phase = %Phase::SelectStrategy,
            strategy = %request.strategy,
            date = %request.date,
            previous_days = request.previous_days,
            "Starting day-ahead run"
        );
        let strategy = request
            .strategy
            .build(self.bootstrap.clone(), self.bootstrap_settings)
            .map_err(DayAheadError::Strategy)?;
        let engine = ForecastEngine::new(strategy, self.seeds);

        info!(phase = %Phase::LoadHistory, "Loading measurements");
        let table = self
            .history
            .day_table(request.date)
            .await
            .map_err(|source| DayAheadError::Source {
                phase: Phase::LoadHistory,
                source,
            })?;
        let inputs = self.strategy_inputs(&table, request)?;
        let realized = self.realized(forecast_date).await;

        info!(phase = %Phase::Forecast, "Forecasting all quantities");
        let forecasts = self.forecast(&engine, inputs).await?;

        info!(phase = %Phase::Validate, "Validating against realized data");
        let mut quantities = Vec::with_capacity(forecasts.len());
        for (quantity, forecast) in forecasts {
            let validation = match realized.as_ref().and_then(|r| r.get(&quantity)) {
                Some(rows) => Some(validate(&forecast.band, rows, quantity)?),
                None => None,
            };
            quantities.push(QuantityReport {
                quantity,
                forecast,
                validation,
            });
        }

        info!(phase = %Phase::Assemble, network = %self.network, "Assembling result bundle");
        let grid = self
            .topology
            .grid(&self.network)
            .await
            .map_err(|source| DayAheadError::Source {
                phase: Phase::Assemble,
                source,
            })?;
        let band = |q: Quantity| -> BandForecast {
            quantities
                .iter()
                .find(|r| r.quantity == q)
                .map(|r| r.forecast.band.clone())
                .unwrap_or_else(|| BandForecast::flat(0.0))
        };
        let bundle = ResultBundle::assemble(
            grid,
            band(Quantity::Pv),
            band(Quantity::ActiveDemand),
            band(Quantity::ReactiveDemand),
            request.robustness,
        );
        if let Some(pv) = quantities.iter_mut().find(|r| r.quantity == Quantity::Pv) {
            pv.forecast.band = bundle.pv.clone();
        }

        info!(phase = %Phase::PersistWorking, %forecast_date, "Persisting request");
        self.store
            .persist_request(forecast_date, &bundle)
            .await
            .map_err(|source| DayAheadError::Store {
                phase: Phase::PersistWorking,
                source,
            })?;

        info!(phase = %Phase::InvokeOptimizer, "Invoking optimizer");
        let response = self.optimizer.solve(&bundle).await?;

        info!(phase = %Phase::CollectResult, objective = response.objective, "Collecting result");
        let collect_err = |source| DayAheadError::Store {
            phase: Phase::CollectResult,
            source,
        };
        self.store
            .persist_response(&response)
            .await
            .map_err(collect_err)?;
        let response = self.store.read_response().await.map_err(collect_err)?;

        info!(phase = %Phase::PersistArchive, %forecast_date, "Archiving result");
        let archive = self
            .store
            .persist_results(forecast_date, &response)
            .await
            .map_err(|source| DayAheadError::Store {
                phase: Phase::PersistArchive,
                source,
            })?;
        if archive == ArchiveOutcome::Skipped {
            info!(%forecast_date, "Existing zero-objective result kept");
        }

        info!(phase = %Phase::Done, objective = response.objective, "Day-ahead run finished");
        Ok(DayAheadOutcome {
            objective: response.objective,
            success: true,
            quantities,
            archive_written: archive == ArchiveOutcome::Written,
        })
    }

    fn strategy_inputs(
        &self,
        table: &MeasurementTable,
        request: &DayAheadRequest,
    ) -> Result<Vec<(Quantity, StrategyInput)>, DayAheadError> {
        Quantity::ALL
            .iter()
            .map(|&quantity| {
                let data_err = |source| DayAheadError::Data {
                    phase: Phase::LoadHistory,
                    quantity,
                    source,
                };
                let history =
                    history_window(table, quantity, request.previous_days).map_err(data_err)?;
                let covariates = if request.strategy.needs_covariates() {
                    Some(covariates(table, quantity).map_err(data_err)?)
                } else {
                    None
                };
                Ok((
                    quantity,
                    StrategyInput {
                        history,
                        covariates,
                    },
                ))
            })
            .collect()
    }

    /// Realized rows per quantity, or `None` when the forecast day is not
    /// available yet.
    async fn realized(
        &self,
        forecast_date: NaiveDate,
    ) -> Option<HashMap<Quantity, Vec<TimeSeries>>> {
        let table = match self.history.day_table(forecast_date).await {
            Ok(table) => table,
            Err(e) => {
                warn!(%forecast_date, error = %e, "No realized data, skipping validation");
                return None;
            }
        };
        let mut rows = HashMap::new();
        for quantity in Quantity::ALL {
            match realized_window(&table, quantity) {
                Ok(r) => {
                    rows.insert(quantity, r);
                }
                Err(e) => {
                    warn!(%forecast_date, %quantity, error = %e, "Incomplete realized data, skipping validation");
                    return None;
                }
            }
        }
        Some(rows)
    }

    async fn forecast(
        &self,
        engine: &ForecastEngine,
        inputs: Vec<(Quantity, StrategyInput)>,
    ) -> Result<Vec<(Quantity, QuantityForecast)>, DayAheadError> {
        let mut statuses = Vec::new();
        let mut forecasts = Vec::new();
        for (quantity, result) in engine.forecast_all(inputs).await {
            match result {
                Ok(forecast) => {
                    if let Some(silhouette) = forecast.silhouette {
                        info!(%quantity, silhouette, "Scenario reduction quality");
                    }
                    statuses.push(QuantityStatus {
                        quantity,
                        error: None,
                    });
                    forecasts.push((quantity, forecast));
                }
                Err(e) => {
                    warn!(%quantity, error = %e, "Forecast failed");
                    statuses.push(QuantityStatus {
                        quantity,
                        error: Some(e.to_string()),
                    });
                }
            }
        }

        if statuses.iter().any(|s| s.error.is_some()) {
            return Err(DayAheadError::Forecast {
                statuses,
                forecasts,
            });
        }
        Ok(forecasts)
    }
}

fn validate(
    band: &BandForecast,
    realized: &[TimeSeries],
    quantity: Quantity,
) -> Result<ValidationReport, DayAheadError> {
    let report = ValidationReport::calculate(band, realized, quantity)
        .map_err(|source| DayAheadError::Validation { quantity, source })?;
    info!(
        %quantity,
        "Error of {} forecast {:.3}%.",
        quantity,
        report.normalized_error * 100.0
    );
    info!(
        %quantity,
        "Deviation from the range of forecast of {} is {:.3}%.",
        quantity,
        report.band_deviation() * 100.0
    );
    Ok(report)
}
