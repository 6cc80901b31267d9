//! End-to-end day-ahead runs over file-backed sources and an external
//! optimizer process.

use std::path::Path;
use std::sync::Arc;

use chrono::{Duration, NaiveDate};
use dayahead_forecaster::controller::{DayAheadRequest, DayAheadRunner, Phase};
use dayahead_forecaster::data::{Column, MeasurementTable};
use dayahead_forecaster::domain::{
    BandForecast, HistoryWindow, OptimizerResponse, Quantity, HORIZON,
};
use dayahead_forecaster::forecast::{
    BootstrapBackend, BootstrapSettings, BootstrapStrategy, ClusteringStrategy, ForecastStrategy,
    MarkovChainStrategy, NoClusteringStrategy, RegressionClusteringStrategy, SeedPolicy,
    StrategyInput, StrategyKind,
};
use dayahead_forecaster::optimizer::{OptimizerHandoff, ProcessOptimizer, ResultStore};
use dayahead_forecaster::repo::{FileMeasurementSource, FileTopologySource, Repositories};
use dayahead_forecaster::scenario::reduce;
use ndarray::Array2;
use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::SeedableRng;

fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, d).unwrap()
}

/// `days` full days ending at 23:50 of `last`, every column at `value`.
fn constant_table(last: NaiveDate, days: usize, value: f64) -> MeasurementTable {
    let first = last - Duration::days(days as i64 - 1);
    let len = days * HORIZON;
    let mut table = MeasurementTable::regular(first.and_hms_opt(0, 0, 0).unwrap(), len);
    for column in [
        Column::Irradiance,
        Column::PvPower,
        Column::ActiveDemand,
        Column::ReactiveDemand,
    ] {
        table = table.with_column(column, vec![value; len]).unwrap();
    }
    table
}

struct Site {
    root: tempfile::TempDir,
}

impl Site {
    fn new() -> Self {
        let site = Self {
            root: tempfile::tempdir().unwrap(),
        };
        std::fs::create_dir_all(site.measurements()).unwrap();
        std::fs::create_dir_all(site.topology()).unwrap();
        std::fs::write(
            site.topology().join("feeder.json"),
            r#"{"buses": [1, 2, 3], "lines": 2}"#,
        )
        .unwrap();
        site
    }

    fn measurements(&self) -> std::path::PathBuf {
        self.root.path().join("measurements")
    }

    fn topology(&self) -> std::path::PathBuf {
        self.root.path().join("topology")
    }

    fn outputs(&self) -> std::path::PathBuf {
        self.root.path().join("outputs")
    }

    fn add_table(&self, date: NaiveDate, table: &MeasurementTable) {
        let path = FileMeasurementSource::new(self.measurements()).path_for(date);
        std::fs::write(path, serde_json::to_vec(table).unwrap()).unwrap();
    }

    /// Optimizer script that swallows the request and answers with `objective`.
    fn optimizer(&self, objective: f64) -> ProcessOptimizer {
        let zeros = vec![0.0; HORIZON];
        let response = OptimizerResponse {
            active_power: vec![1.5; HORIZON],
            reactive_power: zeros.clone(),
            reserve_active_up: zeros.clone(),
            reserve_active_down: zeros.clone(),
            reserve_reactive_up: zeros.clone(),
            reserve_reactive_down: zeros,
            soc_desired: vec![0.75; HORIZON],
            prices: vec![vec![1.0; HORIZON]; 6],
            objective,
        };
        let path = self.root.path().join(format!("response_{}.json", objective));
        std::fs::write(&path, serde_json::to_vec(&response).unwrap()).unwrap();
        shell(&format!("cat > /dev/null; cat '{}'", path.display()))
    }

    fn runner(&self, optimizer: impl OptimizerHandoff + 'static) -> DayAheadRunner {
        DayAheadRunner::new(
            Repositories {
                history: Arc::new(FileMeasurementSource::new(self.measurements())),
                topology: Arc::new(FileTopologySource::new(self.topology())),
            },
            Arc::new(optimizer),
            ResultStore::new(self.outputs()),
            "feeder",
        )
        .with_seeds(SeedPolicy::Fixed(42))
    }
}

fn shell(script: &str) -> ProcessOptimizer {
    ProcessOptimizer::new("sh", vec!["-c".to_string(), script.to_string()])
        .with_timeout(std::time::Duration::from_secs(30))
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> T {
    serde_json::from_slice(&std::fs::read(path).unwrap()).unwrap()
}

#[cfg(unix)]
#[tokio::test]
async fn test_constant_history_yields_flat_bands() {
    let site = Site::new();
    site.add_table(day(10), &constant_table(day(10), 5, 50.0));
    site.add_table(day(11), &constant_table(day(11), 2, 50.0));

    let request =
        DayAheadRequest::new(0.8, StrategyKind::NoClustering, day(10)).with_previous_days(3);
    let outcome = site
        .runner(site.optimizer(12.0))
        .run_day_ahead(&request)
        .await
        .unwrap();

    assert_eq!(outcome.objective, 12.0);
    for quantity in [Quantity::ActiveDemand, Quantity::ReactiveDemand] {
        let report = outcome.report(quantity).unwrap();
        assert_eq!(report.forecast.band, BandForecast::flat(5.0));
        assert_eq!(report.validation.as_ref().unwrap().normalized_error, 0.0);
    }
    let pv = outcome.report(Quantity::Pv).unwrap();
    assert_eq!(pv.forecast.band, BandForecast::flat(0.05));

    let store = ResultStore::new(site.outputs());
    let sent: serde_json::Value = read_json(&store.forecast_path(day(11)));
    assert_eq!(sent["grid"]["lines"], 2);
    assert_eq!(sent["robustness"], 0.8);
    let archived: OptimizerResponse = read_json(&store.results_path(day(11)));
    assert_eq!(archived.objective, 12.0);
    // the working slot ends up holding the response
    let working: OptimizerResponse = read_json(&store.working_path());
    assert_eq!(working.active_power[0], 1.5);
}

#[cfg(unix)]
#[tokio::test]
async fn test_zero_objective_archive_is_written_once() {
    let site = Site::new();
    site.add_table(day(10), &constant_table(day(10), 4, 10.0));
    let request =
        DayAheadRequest::new(1.0, StrategyKind::Clustering, day(10)).with_previous_days(3);

    let first = site
        .runner(site.optimizer(0.0))
        .run_day_ahead(&request)
        .await
        .unwrap();
    assert!(first.archive_written);
    // no realized data for the forecast day yet
    assert!(first.quantities.iter().all(|r| r.validation.is_none()));

    let second = site
        .runner(site.optimizer(0.0))
        .run_day_ahead(&request)
        .await
        .unwrap();
    assert!(!second.archive_written);

    let third = site
        .runner(site.optimizer(3.0))
        .run_day_ahead(&request)
        .await
        .unwrap();
    assert!(third.archive_written);
}

#[cfg(unix)]
#[tokio::test]
async fn test_optimizer_failure_is_reported_with_phase() {
    let site = Site::new();
    site.add_table(day(10), &constant_table(day(10), 4, 10.0));
    let request =
        DayAheadRequest::new(0.9, StrategyKind::NoClustering, day(10)).with_previous_days(3);

    let err = site
        .runner(shell("cat > /dev/null; echo infeasible >&2; exit 1").with_max_attempts(2))
        .run_day_ahead(&request)
        .await
        .unwrap_err();

    assert_eq!(err.phase(), Phase::InvokeOptimizer);
    assert!(err.to_string().contains("2 attempts"));
    // the request was persisted before the handoff
    assert!(ResultStore::new(site.outputs()).forecast_path(day(11)).exists());
    assert!(!ResultStore::new(site.outputs()).results_path(day(11)).exists());
}

#[tokio::test]
async fn test_missing_history_file_fails_in_load_phase() {
    let site = Site::new();
    let request = DayAheadRequest::new(0.9, StrategyKind::NoClustering, day(10));
    let err = site
        .runner(shell("exit 0"))
        .run_day_ahead(&request)
        .await
        .unwrap_err();
    assert_eq!(err.phase(), Phase::LoadHistory);
}

#[test]
fn test_forced_point_estimate_is_a_representative() {
    let rows: Vec<Vec<f64>> = (0..12)
        .map(|i| vec![(i % 4) as f64 * 3.0; HORIZON])
        .collect();
    let trajectories =
        Array2::from_shape_vec((rows.len(), HORIZON), rows.concat()).unwrap();
    let point = ndarray::Array1::from_elem(HORIZON, 4.2);

    let reduction = reduce(&trajectories, Some(point.view()), None).unwrap();
    let forced = reduction.forced_index.unwrap();
    assert_eq!(reduction.centers.row(forced), point.view());
}

/// Quantiles spread unevenly around the first covariate.
struct SkewedBackend;

impl BootstrapBackend for SkewedBackend {
    fn quantiles(
        &self,
        _quantity: Quantity,
        covariates: &[f64],
        _step: usize,
        _n_boot: usize,
    ) -> anyhow::Result<[f64; 3]> {
        let x = covariates[0];
        Ok([x - 1.0, x, x + 2.0])
    }
}

fn levels_history() -> impl Strategy<Value = Vec<Vec<f64>>> {
    prop::collection::vec(
        prop::collection::vec(0.0f64..100.0, HORIZON..=HORIZON),
        4..6,
    )
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(8))]

    #[test]
    fn prop_margins_are_non_negative(rows in levels_history(), seed in any::<u64>()) {
        let mut input = StrategyInput::from_history(HistoryWindow::from_rows(&rows).unwrap());
        input.covariates = Some(rows.last().unwrap().iter().map(|v| vec![*v]).collect());

        let regression = RegressionClusteringStrategy::default();
        let markov = MarkovChainStrategy { trees: 5, ..MarkovChainStrategy::default() };
        let bootstrap = BootstrapStrategy::new(Arc::new(SkewedBackend), BootstrapSettings::default());
        let strategies: [&dyn ForecastStrategy; 5] = [
            &NoClusteringStrategy,
            &ClusteringStrategy,
            &regression,
            &markov,
            &bootstrap,
        ];
        for strategy in strategies {
            let out = strategy
                .forecast(&input, Quantity::ActiveDemand, &mut StdRng::seed_from_u64(seed))
                .unwrap();
            prop_assert_eq!(out.band.len(), HORIZON);
            prop_assert!(out.band.upper_margin.iter().all(|m| *m >= 0.0));
            prop_assert!(out.band.lower_margin.iter().all(|m| *m >= 0.0));
        }
    }
}
